//! Core pipeline for wellness-tracker exports: record extraction, field
//! normalization, day-keyed table assembly, merging, sanitization, and
//! day-quality scoring.

pub mod cell;
pub mod error;
pub mod extract;
pub mod merge;
pub mod normalize;
pub mod quality;
pub mod rank;
pub mod sanitize;
pub mod table;

pub use cell::Cell;
pub use error::{PipelineError, PipelineResult};
pub use merge::merge_daily;
pub use quality::{QualityConfig, apply_quality_labels};
pub use rank::{artifact_first, sparsest_first};
pub use sanitize::{SanitizeOptions, SanitizeReport, sanitize_table};
pub use table::{Column, ColumnType, DATE_COLUMN, Table};
