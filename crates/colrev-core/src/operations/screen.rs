//! Screen: full-text decisions against the configured screening criteria
//!
//! Decisions are written to `screening_criteria` as `c1=in;c2=out`. A
//! record violating any criterion (`out`) is excluded; a record meeting all
//! of them is included. Records with open (`TODO`) criteria stay in
//! `pdf_prepared`.

use super::{ids_in_state, transition};
use crate::commit::CommitMessage;
use crate::error::{ColrevError, Result};
use crate::ReviewManager;
use colrev_record::{fields, Record, RecordsDict};
use colrev_state::{Operation, RecordState};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Criterion is met
pub const MET: &str = "in";
/// Criterion is violated
pub const VIOLATED: &str = "out";
/// Criterion not yet decided
pub const OPEN: &str = "TODO";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Verdict {
    Include,
    Exclude,
    Criteria(String),
}

/// Screening decision for one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenDecision {
    id: String,
    verdict: Verdict,
}

impl ScreenDecision {
    /// Include `id`; every configured criterion is met
    #[must_use]
    pub fn include(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            verdict: Verdict::Include,
        }
    }

    /// Exclude `id`; only valid for projects without criteria
    #[must_use]
    pub fn exclude(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            verdict: Verdict::Exclude,
        }
    }

    /// Decide through a criteria string (`c1=in;c2=out`)
    #[must_use]
    pub fn with_criteria(id: impl Into<String>, criteria: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            verdict: Verdict::Criteria(criteria.into()),
        }
    }

    /// Record id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Outcome of a decision for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Included,
    Excluded,
    Open,
}

/// Screen operation
#[derive(Debug)]
pub struct Screen<'a> {
    review_manager: &'a ReviewManager,
}

impl<'a> Screen<'a> {
    /// Screen operation on `review_manager`
    #[must_use]
    pub fn new(review_manager: &'a ReviewManager) -> Self {
        Self { review_manager }
    }

    /// Ids waiting for a screening decision
    ///
    /// # Errors
    /// Returns [`ColrevError`] when the records cannot be read.
    pub fn queue(&self) -> Result<Vec<String>> {
        let records = self.review_manager.dataset().load_records_dict(true)?;
        Ok(ids_in_state(records.values(), RecordState::PdfPrepared))
    }

    /// Include every record waiting for a decision
    ///
    /// # Errors
    /// See [`Screen::main`].
    pub fn include_all(&self) -> Result<CommitMessage> {
        let decisions: Vec<ScreenDecision> = self.queue()?.into_iter().map(ScreenDecision::include).collect();
        self.main(&decisions)
    }

    /// Apply `decisions` to records in `pdf_prepared`
    ///
    /// Invalid criteria strings are logged and leave the record unchanged.
    ///
    /// # Errors
    /// Returns [`ColrevError`] when the precondition fails or the commit
    /// checks fail.
    pub fn main(&self, decisions: &[ScreenDecision]) -> Result<CommitMessage> {
        let rm = self.review_manager;
        rm.notify(Operation::Screen)?;
        let mut records = rm.dataset().load_records_dict(false)?;
        let mut message = CommitMessage::new(Operation::Screen);

        for decision in decisions {
            match self.apply(&mut records, decision) {
                Ok(Some(Outcome::Included)) => message.add_stat("included", 1),
                Ok(Some(Outcome::Excluded)) => message.add_stat("excluded", 1),
                Ok(Some(Outcome::Open)) => {
                    warn!(id = decision.id(), "screening criteria not completed");
                }
                Ok(None) => {}
                Err(e) if e.is_record_level() => warn!(id = decision.id(), error = %e, "decision skipped"),
                Err(e) => return Err(e),
            }
        }
        info!(
            included = message.stat("included"),
            excluded = message.stat("excluded"),
            "screen"
        );

        rm.dataset().save_records_dict(&mut records, false)?;
        rm.create_commit(&message)?;
        Ok(message)
    }

    fn apply(&self, records: &mut RecordsDict, decision: &ScreenDecision) -> Result<Option<Outcome>> {
        let Some(record) = records.get_mut(decision.id()) else {
            warn!(id = decision.id(), "record not found");
            return Ok(None);
        };
        if record.status() != RecordState::PdfPrepared {
            warn!(id = %record.id, status = %record.status(), "record not waiting for screen");
            return Ok(None);
        }

        let criteria: Vec<&str> = self
            .review_manager
            .settings()
            .screen
            .criteria
            .keys()
            .map(String::as_str)
            .collect();
        let outcome = if criteria.is_empty() {
            match &decision.verdict {
                Verdict::Include => Outcome::Included,
                Verdict::Exclude => Outcome::Excluded,
                Verdict::Criteria(value) => return Err(invalid(record, value)),
            }
        } else {
            let decided = match &decision.verdict {
                Verdict::Include => criteria.iter().map(|c| ((*c).to_string(), MET.to_string())).collect(),
                Verdict::Exclude => return Err(invalid(record, VIOLATED)),
                Verdict::Criteria(value) => parse_criteria(value, &criteria).ok_or_else(|| invalid(record, value))?,
            };
            let outcome = outcome_of(&decided);
            if outcome != Outcome::Open {
                record.insert_raw(fields::SCREENING_CRITERIA, format_criteria(&decided));
            }
            outcome
        };

        match outcome {
            Outcome::Included => transition(record, RecordState::RevIncluded, Operation::Screen)?,
            Outcome::Excluded => transition(record, RecordState::RevExcluded, Operation::Screen)?,
            Outcome::Open => {}
        }
        Ok(Some(outcome))
    }
}

fn invalid(record: &Record, value: &str) -> ColrevError {
    ColrevError::InvalidScreeningCriteria {
        id: record.id.clone(),
        value: value.to_string(),
    }
}

/// Parse `c1=in;c2=out`; every configured criterion must appear exactly once
fn parse_criteria(value: &str, criteria: &[&str]) -> Option<BTreeMap<String, String>> {
    let mut decided = BTreeMap::new();
    for item in value.split(';').map(str::trim).filter(|i| !i.is_empty()) {
        let (name, decision) = item.split_once('=')?;
        let (name, decision) = (name.trim(), decision.trim());
        if !criteria.contains(&name) || !matches!(decision, MET | VIOLATED | OPEN) {
            return None;
        }
        if decided.insert(name.to_string(), decision.to_string()).is_some() {
            return None;
        }
    }
    (decided.len() == criteria.len()).then_some(decided)
}

fn outcome_of(decided: &BTreeMap<String, String>) -> Outcome {
    if decided.values().any(|d| d == VIOLATED) {
        Outcome::Excluded
    } else if decided.values().any(|d| d == OPEN) {
        Outcome::Open
    } else {
        Outcome::Included
    }
}

fn format_criteria(decided: &BTreeMap<String, String>) -> String {
    decided
        .iter()
        .map(|(name, decision)| format!("{name}={decision}"))
        .collect::<Vec<_>>()
        .join(";")
}
