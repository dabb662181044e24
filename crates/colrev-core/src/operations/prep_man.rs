//! Manual preparation of records the quality model did not accept

use super::validate_status;
use crate::commit::CommitMessage;
use crate::error::Result;
use crate::ReviewManager;
use colrev_record::{EditOptions, EntryType, RecordsDict};
use colrev_state::{Operation, RecordState};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Provenance source of manual edits
pub const MANUAL_SOURCE: &str = "manual";

/// One manual correction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualEdit {
    /// Set a field value
    SetField {
        /// Record id
        id: String,
        /// Field name
        key: String,
        /// New value
        value: String,
    },
    /// Remove a field; it is marked as missing on purpose
    RemoveField {
        /// Record id
        id: String,
        /// Field name
        key: String,
    },
    /// Change the entry type
    ChangeEntryType {
        /// Record id
        id: String,
        /// New entry type
        entry_type: EntryType,
    },
    /// Accept a defect of a field
    IgnoreDefect {
        /// Record id
        id: String,
        /// Field name
        key: String,
        /// Defect code
        defect: String,
    },
}

impl ManualEdit {
    /// Record the edit applies to
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::SetField { id, .. }
            | Self::RemoveField { id, .. }
            | Self::ChangeEntryType { id, .. }
            | Self::IgnoreDefect { id, .. } => id,
        }
    }
}

/// Prep-man operation
#[derive(Debug)]
pub struct PrepMan<'a> {
    review_manager: &'a ReviewManager,
}

impl<'a> PrepMan<'a> {
    /// Prep-man operation on `review_manager`
    #[must_use]
    pub fn new(review_manager: &'a ReviewManager) -> Self {
        Self { review_manager }
    }

    /// Records waiting for manual preparation per defect code
    ///
    /// # Errors
    /// Returns [`ColrevError`] when the records cannot be read.
    ///
    /// [`ColrevError`]: crate::ColrevError
    pub fn stats(&self) -> Result<BTreeMap<String, usize>> {
        let records = self.review_manager.dataset().load_records_dict(false)?;
        let mut stats = BTreeMap::new();
        for record in records
            .values()
            .filter(|r| r.status() == RecordState::MdNeedsManualPreparation)
        {
            let mut codes: Vec<String> = record
                .md_prov()
                .keys()
                .flat_map(|key| record.defects(key))
                .collect();
            codes.sort();
            codes.dedup();
            for code in codes {
                *stats.entry(code).or_insert(0) += 1;
            }
        }
        Ok(stats)
    }

    /// Apply `edits` and re-run the quality model on the edited records
    ///
    /// Edits of records outside `md_needs_manual_preparation` are skipped
    /// with a warning.
    ///
    /// # Errors
    /// Returns [`ColrevError`] when the records cannot be read or written,
    /// or the commit checks fail. Entry types without quality rules are
    /// logged and leave the record unchanged.
    ///
    /// [`ColrevError`]: crate::ColrevError
    pub fn main(&self, edits: &[ManualEdit]) -> Result<CommitMessage> {
        let rm = self.review_manager;
        rm.notify(Operation::PrepMan)?;
        let dataset = rm.dataset();
        let mut records = dataset.load_records_dict(false)?;
        let mut message = CommitMessage::new(Operation::PrepMan);

        let mut edited = Vec::new();
        for edit in edits {
            match self.apply(&mut records, edit) {
                Ok(true) => {
                    if !edited.iter().any(|id| id == edit.id()) {
                        edited.push(edit.id().to_string());
                    }
                }
                Ok(false) => {}
                Err(e) if e.is_record_level() => warn!(id = edit.id(), error = %e, "edit failed"),
                Err(e) => return Err(e),
            }
        }

        for id in &edited {
            let Some(record) = records.get_mut(id) else {
                continue;
            };
            let from = record.status();
            record.run_quality_model(rm.quality_model(), true);
            validate_status(record, from, Operation::PrepMan)?;
            if record.status() == RecordState::MdPrepared {
                message.add_stat("prepared", 1);
            } else {
                message.add_stat("still needs manual preparation", 1);
            }
        }
        info!(edited = edited.len(), prepared = message.stat("prepared"), "manual preparation");

        dataset.save_records_dict(&mut records, false)?;
        rm.create_commit(&message)?;
        Ok(message)
    }

    fn apply(&self, records: &mut RecordsDict, edit: &ManualEdit) -> Result<bool> {
        let Some(record) = records.get_mut(edit.id()) else {
            warn!(id = edit.id(), "record not found");
            return Ok(false);
        };
        if record.status() != RecordState::MdNeedsManualPreparation {
            warn!(id = %record.id, status = %record.status(), "record does not need manual preparation");
            return Ok(false);
        }
        match edit {
            ManualEdit::SetField { key, value, .. } => {
                record.update_field_with(key, value.clone(), MANUAL_SOURCE, "", EditOptions::default().replace_source());
            }
            ManualEdit::RemoveField { key, .. } => {
                record.remove_field_not_missing(key, Some(MANUAL_SOURCE));
            }
            ManualEdit::ChangeEntryType { entry_type, .. } => {
                record.change_entrytype(entry_type.clone(), self.review_manager.quality_model())?;
            }
            ManualEdit::IgnoreDefect { key, defect, .. } => {
                record.ignore_defect(key, defect);
            }
        }
        Ok(true)
    }
}
