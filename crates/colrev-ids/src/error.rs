//! ID setter errors

use colrev_record::RecordError;

/// Errors raised while assigning record ids
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// The ids were already propagated to PDFs, screens or data files
    #[error("ids already propagated, cannot be changed: {}", .ids.join(", "))]
    PropagatedIdChange {
        /// Ids that were selected for a change
        ids: Vec<String>,
    },

    /// The local index has no entry for the record
    #[error("record not in local index: {0}")]
    RecordNotInIndex(String),

    /// Identity could not be derived for the index lookup
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl IdError {
    /// Whether the error only means "no curated id available"
    #[must_use]
    pub fn is_index_miss(&self) -> bool {
        matches!(
            self,
            Self::RecordNotInIndex(_) | Self::Record(RecordError::NotEnoughDataToIdentify { .. })
        )
    }
}

/// Result type for id operations
pub type Result<T> = std::result::Result<T, IdError>;
