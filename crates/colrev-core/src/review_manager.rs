//! Review manager
//!
//! Owns everything an operation needs: settings, the dataset with its
//! history, the quality models, the merger, the registered search sources
//! and the worker pool. Operations borrow the manager, check their
//! precondition with [`ReviewManager::notify`], edit the records and end
//! with [`ReviewManager::create_commit`].

use crate::commit::CommitMessage;
use crate::error::{ColrevError, Result};
use crate::pool::WorkerPool;
use colrev_dataset::{CheckReport, Dataset, ProjectPaths, Settings, SourceRegistry, StatusReport};
use colrev_ids::LocalIndex;
use colrev_merge::Merger;
use colrev_record::{default_quality_model, pdf_quality_model, QualityModel, Record};
use colrev_state::{Operation, StateModel};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Entry point of all operations on one project
pub struct ReviewManager {
    settings: Settings,
    dataset: Dataset,
    quality_model: QualityModel,
    pdf_quality_model: QualityModel,
    merger: Merger,
    sources: SourceRegistry,
    pool: WorkerPool,
}

impl fmt::Debug for ReviewManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewManager")
            .field("root", &self.dataset.paths().root())
            .field("sources", &self.settings.sources.len())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl ReviewManager {
    /// Manager for the Git repository at `root`
    ///
    /// A missing `settings.json` means default settings.
    ///
    /// # Errors
    /// Returns [`ColrevError`] when `root` is not a repository or the
    /// settings are invalid.
    pub fn open(root: &Path) -> Result<Self> {
        let dataset = Dataset::open(root)?;
        let settings_file = dataset.paths().settings();
        let settings = if settings_file.is_file() {
            Settings::load(&settings_file)?
        } else {
            Settings::default()
        };
        Self::new(settings, dataset)
    }

    /// Manager over an existing dataset
    ///
    /// The pool gets one worker per available core.
    ///
    /// # Errors
    /// Returns [`ColrevError::Pool`] when the workers cannot be spawned.
    pub fn new(settings: Settings, dataset: Dataset) -> Result<Self> {
        let threads = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        let quality_model =
            default_quality_model().with_defects_to_ignore(settings.prep.defects_to_ignore.iter().cloned());
        let pdf_quality_model = pdf_quality_model(dataset.paths().root())
            .with_defects_to_ignore(settings.pdf_get.defects_to_ignore.iter().cloned());
        let merger = Merger::new().with_preferred_prefixes(curated_prefixes(&settings));
        Ok(Self {
            settings,
            dataset,
            quality_model,
            pdf_quality_model,
            merger,
            sources: SourceRegistry::with_defaults(),
            pool: WorkerPool::new(threads)?,
        })
    }

    /// Builder: replace the search source registry
    #[must_use]
    pub fn with_sources(mut self, sources: SourceRegistry) -> Self {
        self.sources = sources;
        self
    }

    /// Builder: replace the worker pool
    #[must_use]
    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = pool;
        self
    }

    /// Builder: take curated ids from a local index when loading records
    #[must_use]
    pub fn with_local_index(mut self, index: Arc<dyn LocalIndex>) -> Self {
        self.dataset = self.dataset.with_local_index(index);
        self
    }

    /// Builder: replace the merger
    #[must_use]
    pub fn with_merger(mut self, merger: Merger) -> Self {
        self.merger = merger;
        self
    }

    /// Project settings
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Mutable settings; persist with [`ReviewManager::save_settings`]
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Records file, feeds and history
    #[must_use]
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Project paths
    #[must_use]
    pub fn paths(&self) -> &ProjectPaths {
        self.dataset.paths()
    }

    /// Masterdata quality model
    #[must_use]
    pub fn quality_model(&self) -> &QualityModel {
        &self.quality_model
    }

    /// PDF quality model
    #[must_use]
    pub fn pdf_quality_model(&self) -> &QualityModel {
        &self.pdf_quality_model
    }

    /// Record merger
    #[must_use]
    pub fn merger(&self) -> &Merger {
        &self.merger
    }

    /// Registered search sources
    #[must_use]
    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    /// Worker pool
    #[must_use]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Validate and write `settings.json`, then stage it
    ///
    /// # Errors
    /// Returns [`ColrevError`] when validation or the write fails.
    pub fn save_settings(&self) -> Result<()> {
        self.settings.validate()?;
        let path = self.paths().settings();
        self.settings.save(&path)?;
        self.dataset.add_changes(&path)?;
        Ok(())
    }

    /// Announce an operation and check its precondition
    ///
    /// # Errors
    /// Returns [`ColrevError::NoRecords`] when the operation needs records
    /// and none exist, and [`ColrevError::ProcessOrderViolation`] when
    /// records still wait for earlier operations.
    pub fn notify(&self, operation: Operation) -> Result<()> {
        let records = self.dataset.load_records_dict(true)?;
        StateModel::check_operation_precondition(operation, records.values().map(Record::status))?;
        info!(operation = %operation, records = records.len(), "start");
        Ok(())
    }

    /// Cross-record checks of the working copy
    ///
    /// # Errors
    /// Returns [`ColrevError`] when the records cannot be read.
    pub fn check(&self) -> Result<CheckReport> {
        Ok(self.dataset.check(&self.settings)?)
    }

    /// Per-state counts, also written to `status.yaml`
    ///
    /// # Errors
    /// Returns [`ColrevError`] when the records cannot be read or the file
    /// cannot be written.
    pub fn status(&self) -> Result<StatusReport> {
        Ok(self.dataset.update_status_yaml()?)
    }

    /// Format, check and commit
    ///
    /// The records file is brought into canonical form and `status.yaml`
    /// is refreshed. A failing check aborts before the commit and leaves
    /// the working copy as it is. Committed messages are appended to
    /// `.report.log`.
    ///
    /// # Errors
    /// Returns the most specific [`ColrevError`] for a failing check, or
    /// the error of the failed step.
    pub fn create_commit(&self, message: &CommitMessage) -> Result<String> {
        self.dataset.format_records_file(&self.quality_model)?;
        self.status()?;
        let settings_file = self.paths().settings();
        if settings_file.is_file() {
            self.dataset.add_changes(&settings_file)?;
        }

        let report = self.check()?;
        if let Some(err) = ColrevError::from_report(&report) {
            for line in report.messages() {
                error!("{line}");
            }
            return Err(err);
        }

        let report_log = self.paths().report_log();
        message
            .append_to_report(&report_log)
            .map_err(|e| ColrevError::io_error(&report_log, e))?;
        self.dataset.add_changes(&report_log)?;
        Ok(self.dataset.create_commit(&message.to_string(), &[])?)
    }
}

/// Feeds of curated sources win identifying fields during merges
fn curated_prefixes(settings: &Settings) -> Vec<String> {
    settings
        .sources
        .iter()
        .filter(|s| s.is_curated())
        .map(colrev_dataset::SearchSourceSettings::origin_prefix)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use colrev_dataset::MemoryHistory;
    use colrev_record::{EntryType, RecordsDict};
    use colrev_state::RecordState;
    use colrev_test_utils::{prepared_article, records_dict};

    fn manager(root: &Path) -> ReviewManager {
        let dataset = Dataset::new(ProjectPaths::new(root), Box::new(MemoryHistory::new(root)));
        ReviewManager::new(Settings::default(), dataset)
            .unwrap()
            .with_pool(WorkerPool::sequential().unwrap())
    }

    fn save(manager: &ReviewManager, mut records: RecordsDict) {
        manager.dataset().save_records_dict(&mut records, false).unwrap();
    }

    #[test]
    fn notify_requires_records() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        assert!(manager.notify(Operation::Load).is_ok());
        assert!(matches!(manager.notify(Operation::Prescreen), Err(ColrevError::NoRecords)));
    }

    #[test]
    fn notify_enforces_process_order() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let imported = Record::new("a", EntryType::Article)
            .with_origin("x.bib/1")
            .with_status(RecordState::MdImported);
        save(&manager, records_dict([imported]));
        match manager.notify(Operation::Prescreen) {
            Err(ColrevError::ProcessOrderViolation {
                required_state,
                violating,
                ..
            }) => {
                assert_eq!(required_state, RecordState::MdProcessed);
                assert_eq!(violating, vec![RecordState::MdImported]);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(manager.notify(Operation::Prep).is_ok());
    }

    #[test]
    fn commit_writes_status_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        save(&manager, records_dict([prepared_article("a", "x.bib/1", "A, B", "First", "2020")]));
        manager.create_commit(&CommitMessage::new(Operation::Prep)).unwrap();
        assert!(manager.paths().status().is_file());
        let commits = manager.dataset().history().iter_commits(Path::new("data/records.bib")).unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].summary, "Prep");
    }

    #[test]
    fn failing_check_aborts_commit() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let orphan = Record::new("a", EntryType::Article).with_status(RecordState::MdImported);
        save(&manager, records_dict([orphan]));
        let err = manager
            .create_commit(&CommitMessage::new(Operation::Load))
            .unwrap_err();
        assert!(matches!(err, ColrevError::OriginError(_)));
        assert!(err.aborts_operation());
        assert!(manager.dataset().committed_records().unwrap().is_none());
    }
}
