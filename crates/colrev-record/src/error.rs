//! Record-level errors

use colrev_state::StateError;
use std::path::PathBuf;

/// Errors raised by record operations, identity and the quality model
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The identifier could not be computed
    #[error("not enough data to identify record: missing {}", .missing.join(", "))]
    NotEnoughDataToIdentify {
        /// Fields that were absent, UNKNOWN or otherwise insufficient
        missing: Vec<String>,
    },

    /// The record has no table-of-contents key
    #[error("record not toc-identifiable: {0}")]
    NotTocIdentifiable(String),

    /// A colrev_id with an unsupported version prefix
    #[error("unsupported colrev_id version: '{0}'")]
    UnsupportedIdVersion(String),

    /// The PDF could not be read or parsed
    #[error("invalid pdf: {}", .path.display())]
    InvalidPdf {
        /// Offending file
        path: PathBuf,
    },

    /// The PDF was readable but produced no usable hash
    #[error("pdf hash error: {}", .path.display())]
    PdfHashError {
        /// Offending file
        path: PathBuf,
    },

    /// No quality rule exists for the entry type
    #[error("missing record quality rule specification: {0}")]
    MissingRecordQualityRuleSpecification(String),

    /// Illegal status change
    #[error(transparent)]
    State(#[from] StateError),

    /// IO error while reading a file
    #[error("io error reading {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl RecordError {
    /// Create a not-enough-data error
    pub fn not_enough_data<I, S>(missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::NotEnoughDataToIdentify {
            missing: missing.into_iter().map(Into::into).collect(),
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for record operations
pub type Result<T> = std::result::Result<T, RecordError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_enough_data_lists_fields() {
        let err = RecordError::not_enough_data(["author", "year"]);
        assert_eq!(
            err.to_string(),
            "not enough data to identify record: missing author, year"
        );
    }
}
