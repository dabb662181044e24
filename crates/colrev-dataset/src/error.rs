//! Error types for the dataset layer
//!
//! Split by direction the way the records file is handled:
//! - Parse operations (file → records)
//! - Serialize operations (records → file)
//! - History, settings and feed operations

use colrev_ids::IdError;
use colrev_record::{HashError, RecordError};
use std::path::PathBuf;

/// Errors while reading records from BibTeX or another format
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// No parser registered for file extension
    #[error("no parser registered for extension: '{0}'")]
    NoParserForExtension(String),

    /// Malformed entry
    #[error("syntax error at line {line}: {message}")]
    SyntaxError {
        /// 1-based line of the offending entry
        line: usize,
        /// What went wrong
        message: String,
    },

    /// A `colrev_status` value that names no state
    #[error("invalid status '{value}' in record {id}")]
    InvalidStatus {
        /// Record id
        id: String,
        /// Value found in the file
        value: String,
    },

    /// Malformed provenance entry
    #[error("invalid provenance item '{item}' in record {id}")]
    InvalidProvenance {
        /// Record id
        id: String,
        /// Offending `key:source;note;` item
        item: String,
    },

    /// IO error during file read
    #[error("io error reading {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl ParseError {
    /// Create syntax error at `line`
    pub fn syntax_error(line: usize, message: impl Into<String>) -> Self {
        Self::SyntaxError {
            line,
            message: message.into(),
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

/// Errors while writing records
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    /// Two records share an id (case-insensitive)
    #[error("duplicate record ids: {}", .0.join(", "))]
    DuplicateIds(Vec<String>),

    /// The key of the records map differs from the record id
    #[error("record stored under '{key}' has id '{id}'")]
    KeyMismatch {
        /// Map key
        key: String,
        /// Record id
        id: String,
    },

    /// IO error during file write
    #[error("io error writing {path}: {source}")]
    Io {
        /// File that was written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl SerializeError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors of the version history
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// Git failure
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// The repository has no commit touching the path
    #[error("no commit contains {}", .0.display())]
    NotInHistory(PathBuf),

    /// A revision that does not resolve
    #[error("unknown revision: {0}")]
    UnknownRevision(String),

    /// Committed content that is not UTF-8
    #[error("non-utf8 content in {}", .0.display())]
    NonUtf8(PathBuf),

    /// IO error while staging files
    #[error("io error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Errors while loading or validating settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Invalid JSON in settings.json
    #[error("invalid settings in {path}: {source}")]
    Json {
        /// Settings file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Status report could not be serialized
    #[error("status report error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Two sources write to the same feed file
    #[error("duplicate source filename: {0}")]
    DuplicateSourceFilename(String),

    /// A defect code in a `defects_to_ignore` list that no checker emits
    #[error("unknown defect code: {0}")]
    UnknownDefectCode(String),

    /// IO error on the settings file
    #[error("io error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl SettingsError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors of a search feed
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The retrieved record lacks the feed's identifier field
    #[error("record not identifiable in feed: missing '{source_identifier}'")]
    NotFeedIdentifiable {
        /// Field the feed keys records by
        source_identifier: String,
    },

    /// The feed file could not be read
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The feed file could not be written
    #[error(transparent)]
    Serialize(#[from] SerializeError),
}

/// Combined dataset error
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// Reading records failed
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Writing records failed
    #[error("serialize error: {0}")]
    Serialize(#[from] SerializeError),

    /// History access failed
    #[error("history error: {0}")]
    History(#[from] HistoryError),

    /// Settings could not be loaded or saved
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Feed failure
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    /// Record-level failure
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Id assignment failed
    #[error(transparent)]
    Id(#[from] IdError),

    /// A record could not be hashed
    #[error("hash error: {0}")]
    Hash(#[from] HashError),
}

/// Result type alias for dataset operations
pub type Result<T> = std::result::Result<T, DatasetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display() {
        let err = ParseError::syntax_error(12, "unterminated entry");
        assert_eq!(err.to_string(), "syntax error at line 12: unterminated entry");
    }

    #[test]
    fn feed_error_display() {
        let err = FeedError::NotFeedIdentifiable {
            source_identifier: "doi".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "record not identifiable in feed: missing 'doi'"
        );
    }

    #[test]
    fn error_conversions() {
        let err: DatasetError = SerializeError::DuplicateIds(vec!["a".into()]).into();
        assert!(matches!(err, DatasetError::Serialize(_)));
    }
}
