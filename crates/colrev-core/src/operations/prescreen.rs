//! Prescreen: include or exclude processed records on title and abstract

use super::{ids_in_state, transition};
use crate::commit::CommitMessage;
use crate::error::Result;
use crate::ReviewManager;
use colrev_record::{fields, RecordsDict};
use colrev_state::{Operation, RecordState};
use tracing::{info, warn};

/// Prescreen decision for one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrescreenDecision {
    /// Record id
    pub id: String,
    /// Keep the record for full-text screening
    pub include: bool,
    /// Exclusion reason written to `prescreen_exclusion`
    pub reason: Option<String>,
}

impl PrescreenDecision {
    /// Include `id`
    #[must_use]
    pub fn include(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            include: true,
            reason: None,
        }
    }

    /// Exclude `id`
    #[must_use]
    pub fn exclude(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            include: false,
            reason: None,
        }
    }

    /// Builder: exclusion reason
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Prescreen operation
#[derive(Debug)]
pub struct Prescreen<'a> {
    review_manager: &'a ReviewManager,
}

impl<'a> Prescreen<'a> {
    /// Prescreen operation on `review_manager`
    #[must_use]
    pub fn new(review_manager: &'a ReviewManager) -> Self {
        Self { review_manager }
    }

    /// Ids waiting for a prescreen decision
    ///
    /// # Errors
    /// Returns [`ColrevError`] when the records cannot be read.
    ///
    /// [`ColrevError`]: crate::ColrevError
    pub fn queue(&self) -> Result<Vec<String>> {
        let records = self.review_manager.dataset().load_records_dict(true)?;
        Ok(ids_in_state(records.values(), RecordState::MdProcessed))
    }

    /// Include every record waiting for prescreen
    ///
    /// # Errors
    /// See [`Prescreen::main`].
    pub fn include_all(&self) -> Result<CommitMessage> {
        let decisions: Vec<PrescreenDecision> = self
            .queue()?
            .into_iter()
            .map(PrescreenDecision::include)
            .collect();
        self.main(&decisions)
    }

    /// Apply `decisions` to records in `md_processed`
    ///
    /// Decisions for records in other states are skipped with a warning.
    ///
    /// # Errors
    /// Returns [`ColrevError`] when the precondition fails or the commit
    /// checks fail.
    ///
    /// [`ColrevError`]: crate::ColrevError
    pub fn main(&self, decisions: &[PrescreenDecision]) -> Result<CommitMessage> {
        let rm = self.review_manager;
        rm.notify(Operation::Prescreen)?;
        let mut records = rm.dataset().load_records_dict(false)?;
        let mut message = CommitMessage::new(Operation::Prescreen);

        for decision in decisions {
            if apply(&mut records, decision)? {
                message.add_stat(if decision.include { "included" } else { "excluded" }, 1);
            }
        }
        info!(
            included = message.stat("included"),
            excluded = message.stat("excluded"),
            "prescreen"
        );

        rm.dataset().save_records_dict(&mut records, false)?;
        rm.create_commit(&message)?;
        Ok(message)
    }
}

fn apply(records: &mut RecordsDict, decision: &PrescreenDecision) -> Result<bool> {
    let Some(record) = records.get_mut(&decision.id) else {
        warn!(id = %decision.id, "record not found");
        return Ok(false);
    };
    if record.status() != RecordState::MdProcessed {
        warn!(id = %record.id, status = %record.status(), "record not waiting for prescreen");
        return Ok(false);
    }
    if decision.include {
        transition(record, RecordState::RevPrescreenIncluded, Operation::Prescreen)?;
    } else {
        transition(record, RecordState::RevPrescreenExcluded, Operation::Prescreen)?;
        if let Some(reason) = &decision.reason {
            record.insert_raw(fields::PRESCREEN_EXCLUSION, reason.as_str());
        }
    }
    Ok(true)
}
