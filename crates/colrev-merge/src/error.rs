//! Merge errors

use colrev_record::RecordError;

/// Errors raised while merging records
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// The records look alike but describe different works
    #[error("invalid merge of {id_a} and {id_b}: {reason}")]
    InvalidMerge {
        /// Main record
        id_a: String,
        /// Merging record
        id_b: String,
        /// Why the merge was refused
        reason: String,
    },

    /// Record update failed
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl MergeError {
    /// Create invalid-merge error
    pub fn invalid_merge(id_a: &str, id_b: &str, reason: impl Into<String>) -> Self {
        Self::InvalidMerge {
            id_a: id_a.to_string(),
            id_b: id_b.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for merge operations
pub type Result<T> = std::result::Result<T, MergeError>;
