//! Raw record schema
//!
//! This module defines the loosely-typed input records handed over by the
//! retrieval collaborators and the adapter that turns them into canonical
//! community records.

mod adapter;
mod raw_record;
mod timestamp;

pub use adapter::*;
pub use raw_record::*;
pub use timestamp::*;
