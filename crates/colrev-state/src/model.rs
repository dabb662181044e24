//! Transition table and operation preconditions

use crate::error::{StateError, StateResult};
use crate::operation::Operation;
use crate::state::RecordState;
use std::collections::BTreeSet;

/// A legal `(trigger, source, dest)` transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transition {
    /// Operation that performs the transition
    pub trigger: Operation,
    /// State before
    pub source: RecordState,
    /// State after
    pub dest: RecordState,
}

const fn t(trigger: Operation, source: RecordState, dest: RecordState) -> Transition {
    Transition {
        trigger,
        source,
        dest,
    }
}

/// All legal transitions of the non-pseudo operations
pub const TRANSITIONS: &[Transition] = {
    use Operation as O;
    use RecordState as S;
    &[
        t(O::Load, S::MdRetrieved, S::MdImported),
        t(O::Prep, S::MdImported, S::MdNeedsManualPreparation),
        t(O::Prep, S::MdImported, S::MdPrepared),
        t(O::PrepMan, S::MdNeedsManualPreparation, S::MdPrepared),
        t(O::Dedupe, S::MdPrepared, S::MdProcessed),
        t(O::Prescreen, S::MdProcessed, S::RevPrescreenExcluded),
        t(O::Prescreen, S::MdProcessed, S::RevPrescreenIncluded),
        t(O::PdfGet, S::RevPrescreenIncluded, S::PdfImported),
        t(O::PdfGet, S::RevPrescreenIncluded, S::PdfNeedsManualRetrieval),
        t(O::PdfGetMan, S::PdfNeedsManualRetrieval, S::PdfNotAvailable),
        t(O::PdfGetMan, S::PdfNeedsManualRetrieval, S::PdfImported),
        t(O::PdfPrep, S::PdfImported, S::PdfNeedsManualPreparation),
        t(O::PdfPrep, S::PdfImported, S::PdfPrepared),
        t(O::PdfPrepMan, S::PdfNeedsManualPreparation, S::PdfPrepared),
        t(O::Screen, S::PdfPrepared, S::RevExcluded),
        t(O::Screen, S::PdfPrepared, S::RevIncluded),
        t(O::Data, S::RevIncluded, S::RevSynthesized),
    ]
};

/// Queries over the transition table
///
/// Stateless: every method reads [`TRANSITIONS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StateModel;

impl StateModel {
    /// States reachable from `from` in a single transition
    #[must_use]
    pub fn allowed_transitions(from: RecordState) -> Vec<RecordState> {
        TRANSITIONS
            .iter()
            .filter(|t| t.source == from)
            .map(|t| t.dest)
            .collect()
    }

    /// Operation that moves `from` to `to` in one step, if any
    #[must_use]
    pub fn trigger_for(from: RecordState, to: RecordState) -> Option<Operation> {
        TRANSITIONS
            .iter()
            .find(|t| t.source == from && t.dest == to)
            .map(|t| t.trigger)
    }

    /// Validate a single-step transition regardless of operation
    ///
    /// Staying in the same state is always valid.
    pub fn validate_transition(record_id: &str, from: RecordState, to: RecordState) -> StateResult<()> {
        if from == to || Self::trigger_for(from, to).is_some() {
            Ok(())
        } else {
            Err(StateError::invalid_transition(record_id, from, to))
        }
    }

    /// Source states of an operation (all states for pseudo-operations)
    #[must_use]
    pub fn source_states(op: Operation) -> Vec<RecordState> {
        if op.is_pseudo() {
            return RecordState::ALL.to_vec();
        }
        let mut states: Vec<RecordState> = Vec::new();
        for t in TRANSITIONS.iter().filter(|t| t.trigger == op) {
            if !states.contains(&t.source) {
                states.push(t.source);
            }
        }
        states
    }

    /// Destination states of an operation (all states for pseudo-operations)
    #[must_use]
    pub fn dest_states(op: Operation) -> Vec<RecordState> {
        if op.is_pseudo() {
            return RecordState::ALL.to_vec();
        }
        let mut states: Vec<RecordState> = Vec::new();
        for t in TRANSITIONS.iter().filter(|t| t.trigger == op) {
            if !states.contains(&t.dest) {
                states.push(t.dest);
            }
        }
        states
    }

    /// Validate that `op` may move a record from `current` to `target`
    ///
    /// Returns the target state. Pseudo-operations only accept `target == current`.
    pub fn validate(
        record_id: &str,
        current: RecordState,
        target: RecordState,
        op: Operation,
    ) -> StateResult<RecordState> {
        let legal = if op.is_pseudo() {
            current == target
        } else {
            TRANSITIONS
                .iter()
                .any(|t| t.trigger == op && t.source == current && t.dest == target)
        };
        if legal {
            Ok(target)
        } else {
            Err(StateError::invalid_transition(record_id, current, target))
        }
    }

    /// Every state from which `state` can be reached (transitive closure, excluding `state`)
    #[must_use]
    pub fn preceding_states(state: RecordState) -> BTreeSet<RecordState> {
        let mut preceding = BTreeSet::new();
        loop {
            let before = preceding.len();
            for t in TRANSITIONS {
                if t.dest == state || preceding.contains(&t.dest) {
                    preceding.insert(t.source);
                }
            }
            if preceding.len() == before {
                break;
            }
        }
        preceding
    }

    /// Non-pseudo operations that accept `state` as a source
    #[must_use]
    pub fn valid_operations(state: RecordState) -> Vec<Operation> {
        let mut ops: Vec<Operation> = Vec::new();
        for t in TRANSITIONS.iter().filter(|t| t.source == state) {
            if !ops.contains(&t.trigger) {
                ops.push(t.trigger);
            }
        }
        ops
    }

    /// Check that no record still sits in a state preceding `op`'s start state
    ///
    /// `states` are the current states of all records in the dataset.
    pub fn check_operation_precondition<I>(op: Operation, states: I) -> StateResult<()>
    where
        I: IntoIterator<Item = RecordState>,
    {
        let current: BTreeSet<RecordState> = states.into_iter().collect();
        if current.is_empty() {
            return if op.requires_records() {
                Err(StateError::NoRecords)
            } else {
                Ok(())
            };
        }
        if op.is_pseudo() {
            return Ok(());
        }
        let Some(start) = Self::source_states(op).first().copied() else {
            return Ok(());
        };
        let preceding = Self::preceding_states(start);
        let violating: Vec<RecordState> = current.intersection(&preceding).copied().collect();
        if violating.is_empty() {
            Ok(())
        } else {
            Err(StateError::ProcessOrderViolation {
                operation: op,
                required_state: start,
                violating,
            })
        }
    }
}
