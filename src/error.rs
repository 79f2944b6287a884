//! Error types for the TSP solver.
//!
//! Loading errors are fatal: a model is either fully built or not returned at
//! all. Once a model exists, the search itself has no failure paths.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for solver operations.
pub type TspResult<T> = Result<T, TspError>;

#[derive(Debug, Error)]
pub enum TspError {
    /// The instance file could not be opened or read.
    #[error("cannot read instance {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A header, section, row or numeric field of the instance is missing or invalid.
    #[error("malformed instance{}: {reason}", line_suffix(.line))]
    MalformedInstance {
        /// 1-based line in the source text, when a specific line is at fault.
        line: Option<usize>,
        reason: String,
    },

    /// No city survived loading and filtering.
    #[error("instance contains no cities")]
    EmptyInstance,

    /// A search or batch parameter is out of range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|l| format!(" (line {})", l)).unwrap_or_default()
}

impl TspError {
    pub(crate) fn malformed(line: Option<usize>, reason: impl Into<String>) -> Self {
        TspError::MalformedInstance {
            line,
            reason: reason.into(),
        }
    }

    /// True for every error that means the instance itself could not be used.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            TspError::Unreadable { .. } | TspError::MalformedInstance { .. }
        )
    }
}
