//! Pulse CLI - Command-line interface for Community Pulse
//!
//! Commands:
//! - analyze: Compute the full metrics report for a window
//! - roles: List the members of one orbit
//! - channels: Print the cumulative channel activity series
//! - validate: Validate a record bundle
//! - doctor: Diagnose configuration and environment
//! - schema: Print input and output schema information

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use community_pulse::config::AnalyticsConfig;
use community_pulse::pipeline::PulseProcessor;
use community_pulse::schema::{RecordAdapter, RecordIssue};
use community_pulse::types::{AnalysisRequest, ChannelFilter, Orbit};
use community_pulse::{AnalyticsError, PRODUCER_NAME, PULSE_VERSION};

/// Pulse - Deterministic analytics for community engagement
#[derive(Parser)]
#[command(name = "pulse")]
#[command(version = PULSE_VERSION)]
#[command(about = "Turn community records into engagement, growth and sentiment metrics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the full metrics report for a window
    Analyze {
        #[command(flatten)]
        window: WindowArgs,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// List the members of one orbit, most recently active first
    Roles {
        #[command(flatten)]
        window: WindowArgs,

        /// Orbit to list (ambassador, contributor, member, visitor)
        #[arg(long)]
        role: Orbit,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the cumulative channel activity series
    Channels {
        #[command(flatten)]
        window: WindowArgs,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Validate a record bundle
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

/// Arguments shared by every command that runs an analysis pass
#[derive(Args)]
struct WindowArgs {
    /// Record bundle path (use - for stdin)
    #[arg(short, long)]
    input: PathBuf,

    /// First day of the window (yyyy-mm-dd)
    #[arg(long)]
    start: NaiveDate,

    /// Last day of the window (yyyy-mm-dd)
    #[arg(long)]
    end: NaiveDate,

    /// Channel name, or "all"
    #[arg(long, default_value = "all")]
    channel: ChannelFilter,

    /// Evaluation instant (RFC 3339); defaults to the current time
    #[arg(long)]
    now: Option<DateTime<Utc>>,

    /// Calendar offset in minutes east of UTC
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    utc_offset: i32,

    /// Analytics configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

impl WindowArgs {
    fn request(&self) -> AnalysisRequest {
        AnalysisRequest::new(self.start, self.end, self.now.unwrap_or_else(Utc::now))
            .with_channel(self.channel.clone())
            .with_utc_offset_minutes(self.utc_offset)
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON
    Ndjson,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (record bundle)
    Input,
    /// Output schema (pulse report)
    Output,
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr so reports on stdout stay machine-readable
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), PulseCliError> {
    match cli.command {
        Commands::Analyze {
            window,
            output,
            output_format,
        } => cmd_analyze(&window, &output, output_format),
        Commands::Roles { window, role, json } => cmd_roles(&window, role, json),
        Commands::Channels {
            window,
            output_format,
        } => cmd_channels(&window, output_format),
        Commands::Validate { input, json } => cmd_validate(&input, json),
        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn cmd_analyze(window: &WindowArgs, output: &Path, output_format: OutputFormat) -> Result<(), PulseCliError> {
    let report = load_processor(window)?.report(&window.request())?;

    let output_data = match output_format {
        OutputFormat::Ndjson | OutputFormat::Json => serde_json::to_string(&report)? + "\n",
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&report)? + "\n",
    };

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_roles(window: &WindowArgs, role: Orbit, json: bool) -> Result<(), PulseCliError> {
    let metrics = load_processor(window)?.analyze(&window.request())?;
    let users = metrics.orbits.users_in_role(role);

    if json {
        println!("{}", serde_json::to_string_pretty(&users)?);
        return Ok(());
    }

    println!("{} ({} of {} members)", role, users.len(), metrics.orbits.orbit_trends.total());
    println!("{}", "=".repeat(40));
    for user in &users {
        let last_active = user
            .last_active
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "  {:<24} {:>6} messages  last active {}",
            user.username, user.message_count, last_active
        );
    }

    Ok(())
}

fn cmd_channels(window: &WindowArgs, output_format: OutputFormat) -> Result<(), PulseCliError> {
    let metrics = load_processor(window)?.analyze(&window.request())?;
    let series = &metrics.channel_activity_series;

    match output_format {
        OutputFormat::Ndjson => {
            for point in series {
                println!("{}", serde_json::to_string(point)?);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(series)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(series)?),
    }

    Ok(())
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), PulseCliError> {
    let input_data = read_input(input)?;
    let bundle = RecordAdapter::parse_bundle(&input_data)?;
    let issues = RecordAdapter::validate(&bundle);

    let report = ValidationReport {
        total_records: bundle.messages.len() + bundle.members.len() + bundle.voice_activity.len(),
        messages: bundle.messages.len(),
        members: bundle.members.len(),
        voice_sessions: bundle.voice_activity.len(),
        issues,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:  {}", report.total_records);
        println!("Messages:       {}", report.messages);
        println!("Members:        {}", report.members);
        println!("Voice sessions: {}", report.voice_sessions);
        println!("Issues:         {}", report.issues.len());

        if !report.issues.is_empty() {
            println!("\nIssues:");
            for issue in &report.issues {
                println!("  - {}", issue);
            }
        }
    }

    if report.issues.is_empty() {
        Ok(())
    } else {
        Err(PulseCliError::ValidationFailed(report.issues.len()))
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), PulseCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "pulse_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Pulse version {}", PULSE_VERSION),
    });

    // Check configuration file if provided
    match config {
        Some(path) if path.exists() => {
            let check = match fs::read_to_string(path) {
                Ok(content) => match AnalyticsConfig::from_json(&content) {
                    Ok(parsed) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Configuration valid (window cap {} days, sentiment {} / {})",
                            parsed.max_window_days, parsed.sentiment.negative, parsed.sentiment.positive
                        ),
                    },
                    Err(e) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: e.to_string(),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read configuration file: {}", e),
                },
            };
            checks.push(check);
        }
        Some(_) => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "Configuration file does not exist".to_string(),
        }),
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using default configuration".to_string(),
        }),
    }

    // Check stdin is available (for piped bundles)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (ready to read a bundle with -i -)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: PULSE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pulse Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PulseCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), PulseCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", input_json_schema());
            } else {
                println!("Input Schema: record bundle");
                println!();
                println!("A JSON object with three optional arrays:");
                println!();
                println!("1. messages - chat messages");
                println!("   - user_id (or author.id), timestamp, content, channel_id, channel_name");
                println!();
                println!("2. members - member store entries");
                println!("   - user_id, username, joined_at, left_at, last_active, is_active");
                println!();
                println!("3. voice_activity - voice channel sessions");
                println!("   - user_id, channel_name, joined_at, left_at");
                println!();
                println!("Ids may be numbers or strings. Timestamps may be epoch milliseconds,");
                println!("RFC 3339, 'yyyy-mm-dd hh:mm:ss[+hh]' or bare dates.");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", output_json_schema());
            } else {
                println!("Output Schema: pulse report");
                println!();
                println!("- report_version: Envelope version (1.0.0)");
                println!("- producer: {{ name, version, instance_id }}");
                println!("- evaluated_at: The evaluation instant of the request");
                println!("- metrics:");
                println!("  - window: {{ start, end, requested_end, clamped, channel, ... }}");
                println!("  - activity: {{ total_members, active_members, engagement_rate, ... }}");
                println!("  - growth: {{ net_growth, retention_rate, growth_series, ... }}");
                println!("  - sentiment: {{ average_score, sentiment_status, ... }}");
                println!("  - orbits: {{ user_activity, orbit_trends, top_ambassadors }}");
                println!("  - channel_activity_series: [{{ date, <channel>: cumulative count }}]");
                println!("  - channels, voice, diagnostics");
            }
        }
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, PulseCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalyticsConfig, PulseCliError> {
    match path {
        Some(path) => Ok(AnalyticsConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(AnalyticsConfig::default()),
    }
}

fn load_processor(window: &WindowArgs) -> Result<PulseProcessor, PulseCliError> {
    let config = load_config(window.config.as_deref())?;
    let mut processor = PulseProcessor::with_config(config)?;
    processor.load_records(&read_input(&window.input)?)?;
    Ok(processor)
}

fn input_json_schema() -> String {
    let timestamp = serde_json::json!({ "type": ["string", "integer", "number"] });
    let id = serde_json::json!({ "type": ["string", "integer"] });

    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "community-pulse.records",
        "description": "Community Pulse record bundle",
        "type": "object",
        "properties": {
            "messages": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": id,
                        "user_id": id,
                        "author": { "type": "object", "properties": { "id": id } },
                        "timestamp": timestamp,
                        "content": {},
                        "channel_id": id,
                        "channel_name": { "type": "string" }
                    }
                }
            },
            "members": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["user_id"],
                    "properties": {
                        "user_id": id,
                        "username": { "type": "string" },
                        "joined_at": timestamp,
                        "left_at": timestamp,
                        "last_active": timestamp,
                        "is_active": { "type": "boolean" }
                    }
                }
            },
            "voice_activity": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["user_id", "joined_at"],
                    "properties": {
                        "user_id": id,
                        "channel_name": { "type": "string" },
                        "joined_at": timestamp,
                        "left_at": timestamp
                    }
                }
            }
        }
    })
    .to_string()
}

fn output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "community-pulse.report",
        "description": "Community Pulse report",
        "type": "object",
        "required": ["report_version", "producer", "evaluated_at", "metrics"],
        "properties": {
            "report_version": { "type": "string" },
            "producer": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "version": { "type": "string" },
                    "instance_id": { "type": "string" }
                }
            },
            "evaluated_at": { "type": "string", "format": "date-time" },
            "metrics": {
                "type": "object",
                "required": [
                    "window", "activity", "growth", "sentiment", "orbits",
                    "channel_activity_series", "channels", "voice", "diagnostics"
                ],
                "properties": {
                    "sentiment": {
                        "type": "object",
                        "properties": {
                            "average_score": { "type": "number", "minimum": -1, "maximum": 1 },
                            "sentiment_status": { "enum": ["Positive", "Neutral", "Negative"] }
                        }
                    },
                    "orbits": {
                        "type": "object",
                        "properties": {
                            "orbit_trends": {
                                "type": "object",
                                "required": ["Ambassador", "Contributor", "Member", "Visitor"]
                            }
                        }
                    },
                    "channel_activity_series": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["date"],
                            "additionalProperties": { "type": "integer", "minimum": 0 }
                        }
                    }
                }
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum PulseCliError {
    Io(io::Error),
    Analytics(AnalyticsError),
    Json(serde_json::Error),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for PulseCliError {
    fn from(e: io::Error) -> Self {
        PulseCliError::Io(e)
    }
}

impl From<AnalyticsError> for PulseCliError {
    fn from(e: AnalyticsError) -> Self {
        PulseCliError::Analytics(e)
    }
}

impl From<serde_json::Error> for PulseCliError {
    fn from(e: serde_json::Error) -> Self {
        PulseCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PulseCliError> for CliError {
    fn from(e: PulseCliError) -> Self {
        match e {
            PulseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PulseCliError::Analytics(e) => {
                let (code, hint) = match &e {
                    AnalyticsError::InvalidRange(_) => {
                        ("INVALID_RANGE", "Ensure --end is not before --start")
                    }
                    AnalyticsError::InvalidConfig(_) => {
                        ("INVALID_CONFIG", "Run 'pulse doctor --config <path>'")
                    }
                    AnalyticsError::ParseError(_) | AnalyticsError::JsonError(_) => {
                        ("PARSE_ERROR", "Ensure input matches 'pulse schema input'")
                    }
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            PulseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PulseCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} record issues found", count),
                hint: Some("Fix the listed records and retry".to_string()),
            },
            PulseCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    messages: usize,
    members: usize,
    voice_sessions: usize,
    issues: Vec<RecordIssue>,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
