// ⚠️ Error Taxonomy - failure kinds shared by loader, schema view and actions
// Actions wrap these in anyhow::Error; callers downcast when they need the kind

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("unsupported file format: {} (expected .csv or .xlsx)", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("file has no data: {}", path.display())]
    EmptyData { path: PathBuf },

    #[error("failed to load {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("column not found: {column}")]
    MissingColumn { column: String },

    #[error("lookup failed for {key}: {reason}")]
    RemoteLookup { key: String, reason: String },

    #[error("output directory does not exist: {}", path.display())]
    InvalidOutputDir { path: PathBuf },
}

impl RecordError {
    /// Short code for summaries and log lines
    pub fn code(&self) -> &str {
        match self {
            RecordError::UnsupportedFormat { .. } => "unsupported_format",
            RecordError::EmptyData { .. } => "empty_data",
            RecordError::Load { .. } => "load",
            RecordError::MissingColumn { .. } => "missing_column",
            RecordError::RemoteLookup { .. } => "remote_lookup",
            RecordError::InvalidOutputDir { .. } => "invalid_output_dir",
        }
    }
}
