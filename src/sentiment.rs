//! Message sentiment scoring
//!
//! The engine does not model language. A `SentimentScorer` turns one text into a
//! compound score in `[-1, 1]`; this module averages those scores over a message
//! set and maps the average to a coarse status with fixed thresholds.

use crate::config::SentimentThresholds;
use crate::error::ScoreError;
use crate::types::{Message, SentimentStatus, SentimentSummary};

/// Pluggable text sentiment function
pub trait SentimentScorer: Send + Sync {
    /// Compound polarity of `text`, expected in `[-1, 1]`
    fn polarity(&self, text: &str) -> Result<f64, ScoreError>;
}

impl<F> SentimentScorer for F
where
    F: Fn(&str) -> Result<f64, ScoreError> + Send + Sync,
{
    fn polarity(&self, text: &str) -> Result<f64, ScoreError> {
        self(text)
    }
}

/// Normalization constant for squashing raw lexicon sums into `(-1, 1)`
const NORMALIZATION_ALPHA: f64 = 15.0;

/// Word weights for chat text.
///
/// Positive weights in `(0, 4]`, negative in `[-4, 0)`.
const LEXICON: &[(&str, f64)] = &[
    // Positive signals
    ("amazing", 2.8),
    ("awesome", 3.1),
    ("excellent", 2.7),
    ("great", 3.1),
    ("good", 1.9),
    ("nice", 1.8),
    ("love", 3.2),
    ("loved", 2.9),
    ("like", 1.5),
    ("thanks", 1.9),
    ("thank", 1.5),
    ("helpful", 1.8),
    ("cool", 1.3),
    ("fun", 2.3),
    ("happy", 2.7),
    ("glad", 2.0),
    ("welcome", 2.0),
    ("congrats", 2.4),
    ("best", 3.2),
    ("wow", 2.8),
    // Negative signals
    ("bad", -2.5),
    ("terrible", -2.1),
    ("awful", -2.0),
    ("hate", -2.7),
    ("worst", -3.1),
    ("broken", -1.9),
    ("bug", -1.2),
    ("crash", -1.7),
    ("annoying", -1.8),
    ("sad", -2.1),
    ("angry", -2.3),
    ("spam", -1.5),
    ("scam", -2.6),
    ("useless", -1.8),
    ("sucks", -1.5),
    ("problem", -1.7),
    ("fail", -2.5),
    ("failed", -2.3),
];

/// Words that flip the polarity of the next lexicon hit
const NEGATIONS: &[&str] = &["not", "no", "never", "dont", "don't", "isnt", "isn't", "cant", "can't"];

/// Lexicon-based scorer shipped as the default
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconScorer;

impl LexiconScorer {
    /// Score text without the `Result` wrapper; never fails
    pub fn score(text: &str) -> f64 {
        let mut sum = 0.0;
        let mut negate = false;

        for word in text.split_whitespace() {
            let w = word
                .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_lowercase();
            if NEGATIONS.contains(&w.as_str()) {
                negate = true;
                continue;
            }
            if let Some(&(_, weight)) = LEXICON.iter().find(|(lex, _)| *lex == w) {
                sum += if negate { -weight } else { weight };
                negate = false;
            }
        }

        // Exclamation marks amplify whatever direction the text already has
        let bangs = text.matches('!').count().min(4) as f64;
        if sum > 0.0 {
            sum += 0.292 * bangs;
        } else if sum < 0.0 {
            sum -= 0.292 * bangs;
        }

        normalize(sum)
    }
}

impl SentimentScorer for LexiconScorer {
    fn polarity(&self, text: &str) -> Result<f64, ScoreError> {
        Ok(Self::score(text))
    }
}

/// Squash an unbounded sum into `(-1, 1)`
fn normalize(sum: f64) -> f64 {
    if sum == 0.0 {
        return 0.0;
    }
    (sum / (sum * sum + NORMALIZATION_ALPHA).sqrt()).clamp(-1.0, 1.0)
}

/// Map an average score to a status
pub fn classify(average_score: f64, thresholds: &SentimentThresholds) -> SentimentStatus {
    if average_score > thresholds.positive {
        SentimentStatus::Positive
    } else if average_score < thresholds.negative {
        SentimentStatus::Negative
    } else {
        SentimentStatus::Neutral
    }
}

/// Score every message and aggregate.
///
/// Messages without text count as `0`. A scorer failure is logged and also
/// counts as `0`; it never aborts the batch. Scores outside `[-1, 1]` are
/// clamped, so the average stays in that range whatever the scorer returns.
pub fn score_messages(
    messages: &[Message],
    scorer: &dyn SentimentScorer,
    thresholds: &SentimentThresholds,
) -> SentimentSummary {
    if messages.is_empty() {
        return SentimentSummary::default();
    }

    let mut total = 0.0;
    let mut scored_messages = 0;
    let mut failed_messages = 0;

    for (index, message) in messages.iter().enumerate() {
        let Some(text) = message.content.as_deref().filter(|t| !t.trim().is_empty()) else {
            continue;
        };
        scored_messages += 1;

        let result = scorer
            .polarity(text)
            .and_then(|score| if score.is_finite() { Ok(score) } else { Err(ScoreError::NonFinite) });

        match result {
            Ok(score) => total += score.clamp(-1.0, 1.0),
            Err(e) => {
                failed_messages += 1;
                tracing::warn!(
                    index,
                    user_id = %message.user_id,
                    error = %e,
                    "sentiment scoring failed; counting message as neutral"
                );
            }
        }
    }

    let average_score = total / messages.len() as f64;

    SentimentSummary {
        average_score,
        sentiment_status: classify(average_score, thresholds),
        scored_messages,
        failed_messages,
    }
}
