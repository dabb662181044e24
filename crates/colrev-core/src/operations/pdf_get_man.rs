//! Manual PDF retrieval

use super::pdf_get::link_pdf;
use super::{file_field, ids_in_state, transition};
use crate::commit::CommitMessage;
use crate::error::Result;
use crate::ReviewManager;
use colrev_record::{fields, RecordsDict};
use colrev_state::{Operation, RecordState};
use std::path::PathBuf;
use tracing::{info, warn};

/// Provenance source of manually linked PDFs
const MANUAL_SOURCE: &str = "manual";

/// Outcome of a manual retrieval attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfGetManDecision {
    /// No PDF can be obtained
    NotAvailable(String),
    /// Use the file at `path`
    Link {
        /// Record id
        id: String,
        /// Obtained file
        path: PathBuf,
    },
}

impl PdfGetManDecision {
    /// Record the decision applies to
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::NotAvailable(id) | Self::Link { id, .. } => id,
        }
    }
}

/// PDF-get-man operation
#[derive(Debug)]
pub struct PdfGetMan<'a> {
    review_manager: &'a ReviewManager,
}

impl<'a> PdfGetMan<'a> {
    /// PDF-get-man operation on `review_manager`
    #[must_use]
    pub fn new(review_manager: &'a ReviewManager) -> Self {
        Self { review_manager }
    }

    /// Ids whose PDF must be obtained by hand
    ///
    /// # Errors
    /// Returns [`ColrevError`] when the records cannot be read.
    ///
    /// [`ColrevError`]: crate::ColrevError
    pub fn queue(&self) -> Result<Vec<String>> {
        let records = self.review_manager.dataset().load_records_dict(true)?;
        Ok(ids_in_state(records.values(), RecordState::PdfNeedsManualRetrieval))
    }

    /// Apply `decisions` to records in `pdf_needs_manual_retrieval`
    ///
    /// # Errors
    /// Returns [`ColrevError`] when a file cannot be placed or the commit
    /// checks fail.
    ///
    /// [`ColrevError`]: crate::ColrevError
    pub fn main(&self, decisions: &[PdfGetManDecision]) -> Result<CommitMessage> {
        let rm = self.review_manager;
        rm.notify(Operation::PdfGetMan)?;
        let mut records = rm.dataset().load_records_dict(false)?;
        let mut message = CommitMessage::new(Operation::PdfGetMan);

        for decision in decisions {
            match self.apply(&mut records, decision)? {
                Some(RecordState::PdfImported) => message.add_stat("linked", 1),
                Some(RecordState::PdfNotAvailable) => message.add_stat("not available", 1),
                _ => {}
            }
        }
        info!(
            linked = message.stat("linked"),
            not_available = message.stat("not available"),
            "pdf_get_man"
        );

        rm.dataset().save_records_dict(&mut records, false)?;
        rm.create_commit(&message)?;
        Ok(message)
    }

    fn apply(&self, records: &mut RecordsDict, decision: &PdfGetManDecision) -> Result<Option<RecordState>> {
        let rm = self.review_manager;
        let Some(record) = records.get_mut(decision.id()) else {
            warn!(id = decision.id(), "record not found");
            return Ok(None);
        };
        if record.status() != RecordState::PdfNeedsManualRetrieval {
            warn!(id = %record.id, status = %record.status(), "record does not need manual retrieval");
            return Ok(None);
        }

        match decision {
            PdfGetManDecision::NotAvailable(_) => {
                transition(record, RecordState::PdfNotAvailable, Operation::PdfGetMan)?;
            }
            PdfGetManDecision::Link { path, .. } => {
                if !path.is_file() {
                    warn!(id = %record.id, path = %path.display(), "file not found");
                    return Ok(None);
                }
                let target = rm.paths().pdfs().join(format!("{}.pdf", record.id));
                link_pdf(path, &target, rm.settings().pdf_get.pdf_path_type)?;
                record.update_field(fields::FILE, file_field(rm.paths().root(), &target), MANUAL_SOURCE);
                transition(record, RecordState::PdfImported, Operation::PdfGetMan)?;
            }
        }
        Ok(Some(record.status()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::WorkerPool;
    use colrev_dataset::{Dataset, MemoryHistory, PdfPathType, ProjectPaths, Settings};
    use colrev_record::Record;
    use colrev_test_utils::{prepared_article, records_dict, write_pdf};
    use std::path::Path;

    fn manager(root: &Path) -> ReviewManager {
        let settings = Settings::default().with_pdf_path_type(PdfPathType::Copy);
        let dataset = Dataset::new(ProjectPaths::new(root), Box::new(MemoryHistory::new(root)));
        ReviewManager::new(settings, dataset)
            .unwrap()
            .with_pool(WorkerPool::sequential().unwrap())
    }

    fn missing_pdf(id: &str, origin: &str) -> Record {
        prepared_article(id, origin, "Rai, Arun", "Digital platforms", "2020")
            .with_status(RecordState::PdfNeedsManualRetrieval)
    }

    #[test]
    fn link_or_give_up() {
        let dir = tempfile::tempdir().unwrap();
        let rm = manager(dir.path());
        let mut records = records_dict([missing_pdf("A", "x.bib/1"), missing_pdf("B", "x.bib/2")]);
        rm.dataset().save_records_dict(&mut records, false).unwrap();
        let download = dir.path().join("download.pdf");
        write_pdf(&download, &["page"]);

        let get_man = PdfGetMan::new(&rm);
        assert_eq!(get_man.queue().unwrap(), vec!["A", "B"]);
        let message = get_man
            .main(&[
                PdfGetManDecision::Link {
                    id: "A".into(),
                    path: download,
                },
                PdfGetManDecision::NotAvailable("B".into()),
            ])
            .unwrap();
        assert_eq!(message.to_string(), "Pdf get man\n\n - linked: 1\n - not available: 1");

        let records = rm.dataset().load_records_dict(false).unwrap();
        assert_eq!(records["A"].status(), RecordState::PdfImported);
        assert_eq!(records["A"].get(fields::FILE), Some("data/pdfs/A.pdf"));
        assert_eq!(records["B"].status(), RecordState::PdfNotAvailable);
    }
}
