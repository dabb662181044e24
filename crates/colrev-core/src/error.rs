//! Error types for the review manager
//!
//! Every crate of the workspace has its own error enum. [`ColrevError`]
//! folds them into one taxonomy so callers can classify a failure
//! without matching nested variants:
//! - record-level errors ([`ColrevError::is_record_level`]) are logged and
//!   the operation continues with the next record
//! - invariant violations ([`ColrevError::aborts_operation`]) stop the
//!   operation before anything is committed

use colrev_dataset::{
    CheckReport, DatasetError, FeedError, HistoryError, ParseError, SerializeError, SettingsError,
};
use colrev_ids::IdError;
use colrev_merge::MergeError;
use colrev_record::RecordError;
use colrev_state::{Operation, RecordState, StateError};
use std::path::PathBuf;

/// Main error type of the review manager
#[derive(Debug, thiserror::Error)]
pub enum ColrevError {
    /// Identity fields are absent or UNKNOWN
    #[error("not enough data to identify record: missing {}", .missing.join(", "))]
    NotEnoughDataToIdentify {
        /// Fields that were absent or insufficient
        missing: Vec<String>,
    },

    /// A retrieved record lacks the feed identifier
    #[error("record not identifiable in feed: missing '{source_identifier}'")]
    NotFeedIdentifiable {
        /// Field the feed keys records by
        source_identifier: String,
    },

    /// A status change outside the transition table
    #[error("invalid state transition for {record_id}: {source_state} -> {dest_state}")]
    InvalidStateTransition {
        /// Record concerned
        record_id: String,
        /// State before the change
        source_state: RecordState,
        /// Requested state
        dest_state: RecordState,
    },

    /// No curated id in the local index
    #[error("record not in local index: {0}")]
    RecordNotInIndex(String),

    /// The table of contents does not list the record
    #[error("record {id} not in table of contents {toc_key}")]
    RecordNotInToc {
        /// Record concerned
        id: String,
        /// Table of contents that was searched
        toc_key: String,
    },

    /// The record type has no table of contents
    #[error("record not toc-identifiable: {0}")]
    NotTocIdentifiable(String),

    /// The PDF produced no usable fingerprint
    #[error("pdf hash error: {}", .path.display())]
    PdfHashError {
        /// Offending file
        path: PathBuf,
    },

    /// The PDF could not be parsed
    #[error("invalid pdf: {}", .path.display())]
    InvalidPdf {
        /// Offending file
        path: PathBuf,
    },

    /// Ids of processed records changed or were selected for a change
    #[error("propagated id change: {}", .notifications.join("; "))]
    PropagatedIdChange {
        /// One line per changed id or file still naming it
        notifications: Vec<String>,
    },

    /// The repository cannot receive corrections
    #[error("correction precondition not met: {0}")]
    CorrectionPrecondition(String),

    /// Records remain in states that precede the operation
    #[error("{operation} requires all records to be at least {required_state}, found: {}", format_states(.violating))]
    ProcessOrderViolation {
        /// Operation that was started
        operation: Operation,
        /// Earliest state the operation accepts
        required_state: RecordState,
        /// Offending states
        violating: Vec<RecordState>,
    },

    /// The operation needs records but none were imported
    #[error("no records imported yet")]
    NoRecords,

    /// Origins are missing, broken or shared
    #[error("origin error: {}", .0.join("; "))]
    OriginError(Vec<String>),

    /// Two records share an id
    #[error("duplicate record ids: {}", .0.join(", "))]
    DuplicateIds(Vec<String>),

    /// Records describing different works were to be merged
    #[error("invalid merge of {id_a} and {id_b}: {reason}")]
    InvalidMerge {
        /// Main record
        id_a: String,
        /// Merging record
        id_b: String,
        /// Why the merge was refused
        reason: String,
    },

    /// No quality rules for the entry type
    #[error("missing record quality rule specification: {0}")]
    MissingRecordQualityRuleSpecification(String),

    /// A merge conflict outside the status field
    #[error("non-status conflict in {id}: field '{field}'")]
    NonStatusConflict {
        /// Record concerned
        id: String,
        /// Conflicting field
        field: String,
    },

    /// A screening decision names unknown criteria or values
    #[error("invalid screening criteria for {id}: '{value}'")]
    InvalidScreeningCriteria {
        /// Record concerned
        id: String,
        /// Criteria string as given
        value: String,
    },

    /// The pre-commit checks failed for other reasons
    #[error("checks failed: {}", .0.join("; "))]
    CheckFailed(Vec<String>),

    /// A package failed
    #[error("package {endpoint} failed: {message}")]
    Package {
        /// Package endpoint
        endpoint: String,
        /// Failure description
        message: String,
    },

    /// The worker pool could not be built
    #[error("worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// Other record failures
    #[error(transparent)]
    Record(RecordError),

    /// Other dataset failures (parsing, writing, history, settings)
    #[error(transparent)]
    Dataset(DatasetError),

    /// Other state machine failures
    #[error(transparent)]
    State(StateError),

    /// IO error outside the dataset layer
    #[error("io error at {}: {source}", .path.display())]
    Io {
        /// Path concerned
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl ColrevError {
    /// Whether the error concerns a single record
    ///
    /// Operations log these with the record id and continue.
    #[inline]
    #[must_use]
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            Self::NotEnoughDataToIdentify { .. }
                | Self::NotFeedIdentifiable { .. }
                | Self::RecordNotInIndex(_)
                | Self::RecordNotInToc { .. }
                | Self::NotTocIdentifiable(_)
                | Self::PdfHashError { .. }
                | Self::InvalidPdf { .. }
                | Self::InvalidMerge { .. }
                | Self::MissingRecordQualityRuleSpecification(_)
                | Self::InvalidScreeningCriteria { .. }
                | Self::Package { .. }
        )
    }

    /// Whether the error is an invariant violation that must stop the
    /// operation before any commit
    #[inline]
    #[must_use]
    pub fn aborts_operation(&self) -> bool {
        matches!(
            self,
            Self::InvalidStateTransition { .. }
                | Self::PropagatedIdChange { .. }
                | Self::CorrectionPrecondition(_)
                | Self::ProcessOrderViolation { .. }
                | Self::NoRecords
                | Self::OriginError(_)
                | Self::DuplicateIds(_)
                | Self::NonStatusConflict { .. }
                | Self::CheckFailed(_)
        )
    }

    /// Create a package error
    pub fn package(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Package {
            endpoint: endpoint.into(),
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

    /// The most specific error for a failed check report
    ///
    /// Returns `None` when the report passed.
    #[must_use]
    pub fn from_report(report: &CheckReport) -> Option<Self> {
        if report.is_ok() {
            return None;
        }
        if let Some(transition) = report.invalid_transitions.first() {
            return Some(Self::InvalidStateTransition {
                record_id: transition.id.clone(),
                source_state: transition.from,
                dest_state: transition.to,
            });
        }
        if !report.propagated_id_changes.is_empty() {
            return Some(Self::PropagatedIdChange {
                notifications: report
                    .propagated_id_changes
                    .iter()
                    .flat_map(|c| c.notifications.iter().cloned())
                    .collect(),
            });
        }
        let origin_problems = !report.entries_without_origin.is_empty()
            || !report.broken_origins.is_empty()
            || !report.non_unique_origins.is_empty()
            || !report.removed_origins.is_empty();
        if origin_problems {
            return Some(Self::OriginError(report.messages()));
        }
        Some(Self::CheckFailed(report.messages()))
    }
}

impl From<RecordError> for ColrevError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotEnoughDataToIdentify { missing } => Self::NotEnoughDataToIdentify { missing },
            RecordError::NotTocIdentifiable(id) => Self::NotTocIdentifiable(id),
            RecordError::InvalidPdf { path } => Self::InvalidPdf { path },
            RecordError::PdfHashError { path } => Self::PdfHashError { path },
            RecordError::MissingRecordQualityRuleSpecification(msg) => {
                Self::MissingRecordQualityRuleSpecification(msg)
            }
            RecordError::State(err) => err.into(),
            other => Self::Record(other),
        }
    }
}

impl From<StateError> for ColrevError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::InvalidStateTransition {
                record_id,
                source_state,
                dest_state,
            } => Self::InvalidStateTransition {
                record_id,
                source_state,
                dest_state,
            },
            StateError::ProcessOrderViolation {
                operation,
                required_state,
                violating,
            } => Self::ProcessOrderViolation {
                operation,
                required_state,
                violating,
            },
            StateError::NoRecords => Self::NoRecords,
            other => Self::State(other),
        }
    }
}

impl From<IdError> for ColrevError {
    fn from(err: IdError) -> Self {
        match err {
            IdError::PropagatedIdChange { ids } => Self::PropagatedIdChange {
                notifications: ids
                    .into_iter()
                    .map(|id| format!("ID of processed record cannot be changed: {id}"))
                    .collect(),
            },
            IdError::RecordNotInIndex(id) => Self::RecordNotInIndex(id),
            IdError::Record(err) => err.into(),
        }
    }
}

impl From<MergeError> for ColrevError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::InvalidMerge { id_a, id_b, reason } => Self::InvalidMerge { id_a, id_b, reason },
            MergeError::Record(err) => err.into(),
        }
    }
}

impl From<FeedError> for ColrevError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::NotFeedIdentifiable { source_identifier } => {
                Self::NotFeedIdentifiable { source_identifier }
            }
            other => Self::Dataset(other.into()),
        }
    }
}

impl From<SerializeError> for ColrevError {
    fn from(err: SerializeError) -> Self {
        match err {
            SerializeError::DuplicateIds(ids) => Self::DuplicateIds(ids),
            other => Self::Dataset(other.into()),
        }
    }
}

impl From<DatasetError> for ColrevError {
    fn from(err: DatasetError) -> Self {
        match err {
            DatasetError::Serialize(err) => err.into(),
            DatasetError::Feed(err) => err.into(),
            DatasetError::Record(err) => err.into(),
            DatasetError::Id(err) => err.into(),
            other => Self::Dataset(other),
        }
    }
}

impl From<HistoryError> for ColrevError {
    fn from(err: HistoryError) -> Self {
        Self::Dataset(err.into())
    }
}

impl From<ParseError> for ColrevError {
    fn from(err: ParseError) -> Self {
        Self::Dataset(err.into())
    }
}

impl From<SettingsError> for ColrevError {
    fn from(err: SettingsError) -> Self {
        Self::Dataset(err.into())
    }
}

fn format_states(states: &[RecordState]) -> String {
    states
        .iter()
        .map(RecordState::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for review operations
pub type Result<T> = std::result::Result<T, ColrevError>;

#[cfg(test)]
mod tests {
    use super::*;
    use colrev_dataset::{InvalidTransition, PropagatedIdChange};

    #[test]
    fn record_errors_are_classified() {
        let err: ColrevError = RecordError::not_enough_data(["author"]).into();
        assert!(matches!(err, ColrevError::NotEnoughDataToIdentify { .. }));
        assert!(err.is_record_level());
        assert!(!err.aborts_operation());
    }

    #[test]
    fn nested_state_errors_are_flattened() {
        let state = StateError::invalid_transition("a", RecordState::MdImported, RecordState::RevIncluded);
        let err: ColrevError = DatasetError::Record(RecordError::State(state)).into();
        assert!(matches!(err, ColrevError::InvalidStateTransition { .. }));
        assert!(err.aborts_operation());
        assert_eq!(
            err.to_string(),
            "invalid state transition for a: md_imported -> rev_included"
        );
    }

    #[test]
    fn duplicate_ids_abort() {
        let err: ColrevError = DatasetError::Serialize(SerializeError::DuplicateIds(vec!["a".into()])).into();
        assert!(matches!(err, ColrevError::DuplicateIds(_)));
        assert!(err.aborts_operation());
    }

    #[test]
    fn propagated_ids_map_to_notifications() {
        let err: ColrevError = IdError::PropagatedIdChange { ids: vec!["Smith2020".into()] }.into();
        match err {
            ColrevError::PropagatedIdChange { notifications } => {
                assert_eq!(notifications, vec!["ID of processed record cannot be changed: Smith2020"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn report_maps_to_most_specific_error() {
        assert!(ColrevError::from_report(&CheckReport::default()).is_none());

        let mut report = CheckReport::default();
        report.invalid_transitions.push(InvalidTransition {
            id: "a".into(),
            from: RecordState::MdRetrieved,
            to: RecordState::RevIncluded,
        });
        assert!(matches!(
            ColrevError::from_report(&report),
            Some(ColrevError::InvalidStateTransition { .. })
        ));

        let mut report = CheckReport::default();
        report.propagated_id_changes.push(PropagatedIdChange {
            old: "a".into(),
            new: vec!["b".into()],
            notifications: vec!["ID of processed record changed from a to b".into()],
        });
        assert!(matches!(
            ColrevError::from_report(&report),
            Some(ColrevError::PropagatedIdChange { .. })
        ));

        let mut report = CheckReport::default();
        report.entries_without_origin.push("a".into());
        assert!(matches!(ColrevError::from_report(&report), Some(ColrevError::OriginError(_))));
    }
}
