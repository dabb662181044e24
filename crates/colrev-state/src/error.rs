//! State machine errors

use crate::{Operation, RecordState};

/// Errors raised by the lifecycle state machine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// A record state that no legal operation sequence reaches
    #[error("invalid state transition for {record_id}: {source_state} -> {dest_state}")]
    InvalidStateTransition {
        /// Record the transition was attempted on
        record_id: String,
        /// State before the transition
        source_state: RecordState,
        /// Requested state
        dest_state: RecordState,
    },

    /// Unknown state name in serialized data
    #[error("unknown record state: '{0}'")]
    UnknownState(String),

    /// Unknown operation name
    #[error("unknown operation: '{0}'")]
    UnknownOperation(String),

    /// Records in states preceding the operation's source states remain
    #[error("{operation} requires all records to be at least {required_state}, found: {}", format_states(.violating))]
    ProcessOrderViolation {
        /// Operation that was started
        operation: Operation,
        /// Earliest state the operation accepts
        required_state: RecordState,
        /// Offending states present in the dataset
        violating: Vec<RecordState>,
    },

    /// The operation needs records but none were imported
    #[error("no records imported yet")]
    NoRecords,
}

impl StateError {
    /// Create an invalid-transition error
    pub fn invalid_transition(
        record_id: impl Into<String>,
        source: RecordState,
        dest: RecordState,
    ) -> Self {
        Self::InvalidStateTransition {
            record_id: record_id.into(),
            source_state: source,
            dest_state: dest,
        }
    }
}

fn format_states(states: &[RecordState]) -> String {
    states
        .iter()
        .map(RecordState::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result alias for state machine operations
pub type StateResult<T> = Result<T, StateError>;
