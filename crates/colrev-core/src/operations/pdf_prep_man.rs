//! Manual PDF preparation

use super::pdf_get::link_pdf;
use super::{file_field, ids_in_state, record_file, transition};
use crate::commit::CommitMessage;
use crate::error::{ColrevError, Result};
use crate::ReviewManager;
use colrev_dataset::PdfPathType;
use colrev_record::constants::defects;
use colrev_record::{colrev_pdf_id, fields, RecordsDict};
use colrev_state::{Operation, RecordState};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Provenance source of manual PDF edits
const MANUAL_SOURCE: &str = "manual";

/// Manual decision on a PDF that failed preparation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfPrepManDecision {
    /// The PDF is fine as it is; its defects are acknowledged
    Accept(String),
    /// Replace the PDF by a corrected file
    Replace {
        /// Record id
        id: String,
        /// Corrected file
        path: PathBuf,
    },
}

impl PdfPrepManDecision {
    /// Record the decision applies to
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Accept(id) | Self::Replace { id, .. } => id,
        }
    }
}

/// PDF-prep-man operation
#[derive(Debug)]
pub struct PdfPrepMan<'a> {
    review_manager: &'a ReviewManager,
}

impl<'a> PdfPrepMan<'a> {
    /// PDF-prep-man operation on `review_manager`
    #[must_use]
    pub fn new(review_manager: &'a ReviewManager) -> Self {
        Self { review_manager }
    }

    /// Ids whose PDF needs manual preparation
    ///
    /// # Errors
    /// Returns [`ColrevError`] when the records cannot be read.
    pub fn queue(&self) -> Result<Vec<String>> {
        let records = self.review_manager.dataset().load_records_dict(true)?;
        Ok(ids_in_state(records.values(), RecordState::PdfNeedsManualPreparation))
    }

    /// Apply `decisions` to records in `pdf_needs_manual_preparation`
    ///
    /// Replaced PDFs are fingerprinted and checked again; records whose
    /// new file still has defects stay in place.
    ///
    /// # Errors
    /// Returns [`ColrevError`] when a file cannot be replaced or the commit
    /// checks fail.
    pub fn main(&self, decisions: &[PdfPrepManDecision]) -> Result<CommitMessage> {
        let rm = self.review_manager;
        rm.notify(Operation::PdfPrepMan)?;
        let mut records = rm.dataset().load_records_dict(false)?;
        let mut message = CommitMessage::new(Operation::PdfPrepMan);

        for decision in decisions {
            match self.apply(&mut records, decision) {
                Ok(true) => message.add_stat("prepared", 1),
                Ok(false) => {}
                Err(e) if e.is_record_level() => warn!(id = decision.id(), error = %e, "decision skipped"),
                Err(e) => return Err(e),
            }
        }
        info!(prepared = message.stat("prepared"), "pdf_prep_man");

        rm.dataset().save_records_dict(&mut records, false)?;
        rm.create_commit(&message)?;
        Ok(message)
    }

    fn apply(&self, records: &mut RecordsDict, decision: &PdfPrepManDecision) -> Result<bool> {
        let rm = self.review_manager;
        let Some(record) = records.get_mut(decision.id()) else {
            warn!(id = decision.id(), "record not found");
            return Ok(false);
        };
        if record.status() != RecordState::PdfNeedsManualPreparation {
            warn!(id = %record.id, status = %record.status(), "PDF does not need manual preparation");
            return Ok(false);
        }

        match decision {
            PdfPrepManDecision::Accept(_) => {
                let codes = record.defects(fields::FILE);
                for defect in codes.iter().filter(|d| !d.starts_with(defects::IGNORE_PREFIX)) {
                    record.ignore_defect(fields::FILE, defect);
                }
                if !record.contains(fields::PDF_ID) {
                    if let Some(path) = record_file(rm.paths().root(), record).filter(|p| p.is_file()) {
                        record.update_field(fields::PDF_ID, colrev_pdf_id(&path)?, MANUAL_SOURCE);
                    }
                }
            }
            PdfPrepManDecision::Replace { path, .. } => {
                if !path.is_file() {
                    warn!(id = %record.id, path = %path.display(), "file not found");
                    return Ok(false);
                }
                let pdf_id = colrev_pdf_id(path)?;
                let target = rm.paths().pdfs().join(format!("{}.pdf", record.id));
                if target.exists() {
                    fs::remove_file(&target).map_err(|e| ColrevError::io_error(&target, e))?;
                }
                link_pdf(path, &target, PdfPathType::Copy)?;
                record.update_field(fields::FILE, file_field(rm.paths().root(), &target), MANUAL_SOURCE);
                record.update_field(fields::PDF_ID, pdf_id, MANUAL_SOURCE);
                record.reset_pdf_provenance_notes();
                record.run_pdf_quality_model(rm.pdf_quality_model(), false);
                if record.has_pdf_defects() {
                    warn!(id = %record.id, "replaced PDF still has defects");
                    return Ok(false);
                }
            }
        }
        transition(record, RecordState::PdfPrepared, Operation::PdfPrepMan)?;
        Ok(true)
    }
}
