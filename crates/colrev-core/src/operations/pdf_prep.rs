//! PDF preparation: fingerprint imported PDFs and run the PDF quality model

use super::{file_field, record_file, validate_status};
use crate::commit::CommitMessage;
use crate::error::{ColrevError, Result};
use crate::ReviewManager;
use colrev_record::{colrev_pdf_id, fields, Record};
use colrev_state::{Operation, RecordState};
use std::fs;
use tracing::{debug, info, warn};

/// Provenance source of PDF preparation edits
const PDF_PREP_SOURCE: &str = "pdf_prep";

/// PDF-prep operation
#[derive(Debug)]
pub struct PdfPrep<'a> {
    review_manager: &'a ReviewManager,
}

impl<'a> PdfPrep<'a> {
    /// PDF-prep operation on `review_manager`
    #[must_use]
    pub fn new(review_manager: &'a ReviewManager) -> Self {
        Self { review_manager }
    }

    /// Prepare every record in `pdf_imported`
    ///
    /// Missing or unreadable PDFs send the record to
    /// `pdf_needs_manual_preparation`.
    ///
    /// # Errors
    /// Returns [`ColrevError`] when a PDF cannot be renamed or the commit
    /// checks fail.
    pub fn main(&self) -> Result<CommitMessage> {
        let rm = self.review_manager;
        rm.notify(Operation::PdfPrep)?;
        let mut records = rm.dataset().load_records_dict(false)?;

        let mut batch: Vec<Record> = records
            .values()
            .filter(|r| r.status() == RecordState::PdfImported)
            .cloned()
            .collect();
        info!("Prepare {} PDFs", batch.len());
        for result in rm.pool().map(&mut batch, |record| self.prepare_pdf(record)) {
            result?;
        }

        let mut message = CommitMessage::new(Operation::PdfPrep);
        for record in batch {
            match record.status() {
                RecordState::PdfPrepared => message.add_stat("prepared", 1),
                RecordState::PdfNeedsManualPreparation => message.add_stat("needs manual preparation", 1),
                _ => {}
            }
            records.insert(record.id.clone(), record);
        }

        rm.dataset().save_records_dict(&mut records, false)?;
        rm.create_commit(&message)?;
        Ok(message)
    }

    fn prepare_pdf(&self, record: &mut Record) -> Result<()> {
        let rm = self.review_manager;
        let from = record.status();
        record.reset_pdf_provenance_notes();

        if rm.settings().pdf_prep.rename_pdfs {
            self.rename(record)?;
        }

        let Some(path) = record_file(rm.paths().root(), record).filter(|p| p.is_file()) else {
            warn!(id = %record.id, "PDF file not found");
            record.set_status(RecordState::PdfNeedsManualPreparation, true)?;
            return validate_status(record, from, Operation::PdfPrep);
        };

        match colrev_pdf_id(&path).map_err(ColrevError::from) {
            Ok(pdf_id) => {
                record.update_field(fields::PDF_ID, pdf_id, PDF_PREP_SOURCE);
                record.run_pdf_quality_model(rm.pdf_quality_model(), true);
            }
            Err(e) if e.is_record_level() => {
                warn!(id = %record.id, error = %e, "PDF needs manual preparation");
                record.set_status(RecordState::PdfNeedsManualPreparation, true)?;
            }
            Err(e) => return Err(e),
        }
        debug!(id = %record.id, status = %record.status(), "pdf prepared");
        validate_status(record, from, Operation::PdfPrep)
    }

    /// Move the file to `<ID>.pdf` next to its current location
    fn rename(&self, record: &mut Record) -> Result<()> {
        let root = self.review_manager.paths().root();
        let Some(current) = record_file(root, record) else {
            return Ok(());
        };
        let target = current.with_file_name(format!("{}.pdf", record.id));
        if current == target || !current.exists() {
            return Ok(());
        }
        fs::rename(&current, &target).map_err(|e| ColrevError::io_error(&current, e))?;
        record.update_field(fields::FILE, file_field(root, &target), PDF_PREP_SOURCE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::WorkerPool;
    use colrev_dataset::{Dataset, MemoryHistory, ProjectPaths, Settings};
    use colrev_record::CPID_PREFIX;
    use colrev_test_utils::{prepared_article, records_dict, write_pdf};
    use std::path::Path;

    fn manager(root: &Path, rename: bool) -> ReviewManager {
        let mut settings = Settings::default();
        settings.pdf_prep.rename_pdfs = rename;
        let dataset = Dataset::new(ProjectPaths::new(root), Box::new(MemoryHistory::new(root)));
        ReviewManager::new(settings, dataset)
            .unwrap()
            .with_pool(WorkerPool::new(2).unwrap())
    }

    fn imported(id: &str, origin: &str, file: &str, pages: &str) -> Record {
        let mut record = prepared_article(id, origin, "Rai, Arun", "Digital platforms", "2020")
            .with_status(RecordState::PdfImported);
        record.update_field(fields::PAGES, pages, origin);
        record.update_field(fields::FILE, file, "test");
        record
    }

    #[test]
    fn fingerprints_and_checks_pdfs() {
        let dir = tempfile::tempdir().unwrap();
        let rm = manager(dir.path(), false);
        let pdfs = rm.paths().pdfs();
        fs::create_dir_all(&pdfs).unwrap();
        write_pdf(&pdfs.join("A.pdf"), &["one", "two"]);
        write_pdf(&pdfs.join("B.pdf"), &["one"]);
        fs::write(pdfs.join("C.pdf"), b"").unwrap();

        let mut records = records_dict([
            imported("A", "x.bib/1", "data/pdfs/A.pdf", "1--2"),
            imported("B", "x.bib/2", "data/pdfs/B.pdf", "1--10"),
            imported("C", "x.bib/3", "data/pdfs/C.pdf", "1--2"),
        ]);
        rm.dataset().save_records_dict(&mut records, false).unwrap();

        let message = PdfPrep::new(&rm).main().unwrap();
        assert_eq!(message.stat("prepared"), 1);
        assert_eq!(message.stat("needs manual preparation"), 2);

        let records = rm.dataset().load_records_dict(false).unwrap();
        assert_eq!(records["A"].status(), RecordState::PdfPrepared);
        assert!(records["A"].get(fields::PDF_ID).unwrap().starts_with(CPID_PREFIX));
        assert_eq!(records["B"].status(), RecordState::PdfNeedsManualPreparation);
        assert_eq!(records["C"].status(), RecordState::PdfNeedsManualPreparation);
        assert!(!records["C"].contains(fields::PDF_ID));
    }

    #[test]
    fn renames_to_record_id() {
        let dir = tempfile::tempdir().unwrap();
        let rm = manager(dir.path(), true);
        let pdfs = rm.paths().pdfs();
        fs::create_dir_all(&pdfs).unwrap();
        write_pdf(&pdfs.join("download.pdf"), &["one"]);

        let mut records = records_dict([imported("A", "x.bib/1", "data/pdfs/download.pdf", "1")]);
        rm.dataset().save_records_dict(&mut records, false).unwrap();
        PdfPrep::new(&rm).main().unwrap();

        let records = rm.dataset().load_records_dict(false).unwrap();
        assert_eq!(records["A"].get(fields::FILE), Some("data/pdfs/A.pdf"));
        assert!(pdfs.join("A.pdf").is_file());
        assert!(!pdfs.join("download.pdf").exists());
    }
}
