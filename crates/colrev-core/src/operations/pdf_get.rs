//! PDF retrieval for prescreen-included records
//!
//! Retrievers are tried in order until one finds a file. Found files are
//! placed at `data/pdfs/<ID>.pdf` (symlinked or copied per settings) and
//! referenced by the `file` field.

use super::{file_field, transition};
use crate::commit::CommitMessage;
use crate::error::{ColrevError, Result};
use crate::ReviewManager;
use colrev_dataset::PdfPathType;
use colrev_record::{fields, Record};
use colrev_state::{Operation, RecordState};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Endpoint of [`DirectoryRetriever`]
pub const DIRECTORY_RETRIEVER: &str = "colrev.pdfs_dir";

/// Source of PDF files
pub trait PdfRetriever: Send + Sync {
    /// Endpoint name used in the settings
    fn endpoint(&self) -> &str;

    /// Path of a PDF for `record`, if this retriever has one
    ///
    /// # Errors
    /// Record-level errors are logged and the next retriever runs.
    fn retrieve(&self, record: &Record) -> Result<Option<PathBuf>>;
}

/// Looks for `<ID>.pdf` in a directory
#[derive(Debug, Clone)]
pub struct DirectoryRetriever {
    dir: PathBuf,
}

impl DirectoryRetriever {
    /// Retriever over `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PdfRetriever for DirectoryRetriever {
    fn endpoint(&self) -> &str {
        DIRECTORY_RETRIEVER
    }

    fn retrieve(&self, record: &Record) -> Result<Option<PathBuf>> {
        let candidate = self.dir.join(format!("{}.pdf", record.id));
        Ok(candidate.is_file().then_some(candidate))
    }
}

/// Place `source` at `target`
///
/// Symlinks fall back to copies where links cannot be created.
pub(crate) fn link_pdf(source: &Path, target: &Path, path_type: PdfPathType) -> Result<()> {
    if source == target || target.exists() {
        return Ok(());
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| ColrevError::io_error(parent, e))?;
    }
    if path_type == PdfPathType::Symlink {
        #[cfg(unix)]
        {
            match std::os::unix::fs::symlink(source, target) {
                Ok(()) => return Ok(()),
                Err(e) => debug!(error = %e, "symlink failed, copying"),
            }
        }
    }
    fs::copy(source, target).map_err(|e| ColrevError::io_error(target, e))?;
    Ok(())
}

/// PDF-get operation
pub struct PdfGet<'a> {
    review_manager: &'a ReviewManager,
    retrievers: Vec<Box<dyn PdfRetriever>>,
}

impl std::fmt::Debug for PdfGet<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfGet")
            .field("retrievers", &self.retrievers.iter().map(|r| r.endpoint()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<'a> PdfGet<'a> {
    /// PDF-get operation with the configured retrievers
    ///
    /// The project's PDF directory is always searched first. Configured
    /// `colrev.pdfs_dir` packages add directories through their `path`
    /// parameter.
    #[must_use]
    pub fn new(review_manager: &'a ReviewManager) -> Self {
        let root = review_manager.paths().root();
        let mut retrievers: Vec<Box<dyn PdfRetriever>> =
            vec![Box::new(DirectoryRetriever::new(review_manager.paths().pdfs()))];
        for package in &review_manager.settings().pdf_get.packages {
            match (package.endpoint.as_str(), package.parameters.get("path").and_then(|p| p.as_str())) {
                (DIRECTORY_RETRIEVER, Some(path)) => retrievers.push(Box::new(DirectoryRetriever::new(root.join(path)))),
                (other, _) => warn!(endpoint = other, "pdf_get package not available"),
            }
        }
        Self {
            review_manager,
            retrievers,
        }
    }

    /// Builder: append a retriever
    #[must_use]
    pub fn with_retriever(mut self, retriever: impl PdfRetriever + 'static) -> Self {
        self.retrievers.push(Box::new(retriever));
        self
    }

    /// Retrieve PDFs for every record in `rev_prescreen_included`
    ///
    /// # Errors
    /// Returns [`ColrevError`] when a file cannot be placed or the commit
    /// checks fail.
    pub fn main(&self) -> Result<CommitMessage> {
        let rm = self.review_manager;
        rm.notify(Operation::PdfGet)?;
        let mut records = rm.dataset().load_records_dict(false)?;

        let mut batch: Vec<Record> = records
            .values()
            .filter(|r| r.status() == RecordState::RevPrescreenIncluded)
            .cloned()
            .collect();
        info!("Retrieve {} PDFs", batch.len());
        for result in rm.pool().map(&mut batch, |record| self.get_pdf(record)) {
            result?;
        }

        let mut message = CommitMessage::new(Operation::PdfGet);
        for record in batch {
            match record.status() {
                RecordState::PdfImported => message.add_stat("retrieved", 1),
                RecordState::PdfNeedsManualRetrieval => message.add_stat("not retrieved", 1),
                _ => {}
            }
            records.insert(record.id.clone(), record);
        }
        info!(
            retrieved = message.stat("retrieved"),
            missing = message.stat("not retrieved"),
            "pdf_get completed"
        );

        rm.dataset().save_records_dict(&mut records, false)?;
        rm.create_commit(&message)?;
        Ok(message)
    }

    fn get_pdf(&self, record: &mut Record) -> Result<()> {
        let rm = self.review_manager;
        let mut found = None;
        for retriever in &self.retrievers {
            match retriever.retrieve(record) {
                Ok(Some(path)) => {
                    debug!(id = %record.id, retriever = retriever.endpoint(), "PDF found");
                    found = Some(path);
                    break;
                }
                Ok(None) => {}
                Err(e) if e.is_record_level() => {
                    warn!(id = %record.id, retriever = retriever.endpoint(), error = %e, "retrieval failed");
                }
                Err(e) => return Err(e),
            }
        }

        let Some(source) = found else {
            return transition(record, RecordState::PdfNeedsManualRetrieval, Operation::PdfGet);
        };
        let target = rm.paths().pdfs().join(format!("{}.pdf", record.id));
        link_pdf(&source, &target, rm.settings().pdf_get.pdf_path_type)?;
        record.update_field(fields::FILE, file_field(rm.paths().root(), &target), DIRECTORY_RETRIEVER);
        transition(record, RecordState::PdfImported, Operation::PdfGet)
    }
}
