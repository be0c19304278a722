//! Error types for the ingestion and labeling pipeline.

use thiserror::Error;

/// Pipeline errors. I/O and JSON parse failures surface through the
/// caller's `anyhow` chain; the core itself only rejects bad tables.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("duplicate calendarDate rows in {table} table: {count}")]
    DuplicateDates { table: String, count: usize },
}

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
