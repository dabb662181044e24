//! Dataset façade
//!
//! The only component that reads and writes the records file. Operations
//! load the records, edit them in memory and hand them back for one save;
//! the save aligns provenance, refuses duplicate ids and stages the file.

use crate::bibtex;
use crate::checks::{check_records, CheckContext, CheckReport};
use crate::error::{DatasetError, HistoryError, ParseError, Result};
use crate::feed::{write_atomic, FeedSummary, SearchFeed};
use crate::history::{CommitInfo, GitHistory, History};
use crate::parsers::{default_parsers, ParserRegistry};
use crate::paths::{ProjectPaths, RECORDS_FILE};
use crate::settings::{SearchSourceSettings, Settings};
use crate::status::StatusReport;
use colrev_ids::{IdChange, IdPattern, IdSetter, LocalIndex};
use colrev_record::{fields, ContentHash, QualityModel, Record, RecordsDict};
use colrev_state::RecordState;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Fields kept by a header-only load
const HEADER_FIELDS: [&str; 2] = [fields::FILE, fields::SCREENING_CRITERIA];

/// Result of [`Dataset::format_records_file`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatOutcome {
    /// The file already had canonical form
    Unchanged,
    /// The file was rewritten and staged
    Formatted,
}

/// Records file, feeds and history of one project
pub struct Dataset {
    paths: ProjectPaths,
    history: Box<dyn History>,
    parsers: ParserRegistry,
    local_index: Option<Arc<dyn LocalIndex>>,
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("root", &self.paths.root())
            .field("parsers", &self.parsers)
            .field("local_index", &self.local_index.is_some())
            .finish_non_exhaustive()
    }
}

impl Dataset {
    /// Dataset over `paths` with the given history
    #[must_use]
    pub fn new(paths: ProjectPaths, history: Box<dyn History>) -> Self {
        Self {
            paths,
            history,
            parsers: default_parsers(),
            local_index: None,
        }
    }

    /// Dataset of the Git repository at `root`
    ///
    /// # Errors
    /// Returns [`DatasetError::History`] when `root` is not a repository.
    pub fn open(root: &Path) -> Result<Self> {
        let history = GitHistory::open(root)?;
        Ok(Self::new(ProjectPaths::new(root), Box::new(history)))
    }

    /// Builder: replace the parser registry
    #[must_use]
    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = parsers;
        self
    }

    /// Builder: take curated ids from a local index when setting ids
    #[must_use]
    pub fn with_local_index(mut self, index: Arc<dyn LocalIndex>) -> Self {
        self.local_index = Some(index);
        self
    }

    /// Local index consulted by [`Dataset::set_ids`]
    #[must_use]
    pub fn local_index(&self) -> Option<&Arc<dyn LocalIndex>> {
        self.local_index.as_ref()
    }

    /// Project layout
    #[must_use]
    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    /// Version history
    #[must_use]
    pub fn history(&self) -> &dyn History {
        self.history.as_ref()
    }

    /// Parsers for search result files
    #[must_use]
    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    fn records_rel() -> PathBuf {
        PathBuf::from(RECORDS_FILE)
    }

    // ------------------------------------------------------------------
    // Records file
    // ------------------------------------------------------------------

    /// Load the records file
    ///
    /// A missing file yields no records. With `header_only`, records keep
    /// only id, type, origin, status, masterdata provenance, file and
    /// screening criteria.
    ///
    /// # Errors
    /// Returns [`DatasetError::Parse`] when the file cannot be read or parsed.
    pub fn load_records_dict(&self, header_only: bool) -> Result<RecordsDict> {
        let path = self.paths.records();
        if !path.is_file() {
            return Ok(RecordsDict::new());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| ParseError::io_error(&path, e))?;
        let records = bibtex::parse_str(&content)?;
        if !header_only {
            return Ok(records);
        }
        Ok(records
            .into_iter()
            .map(|(id, record)| (id, header(&record)))
            .collect())
    }

    /// Write the records file and stage it
    ///
    /// Provenance of every record is aligned first. A `partial` save
    /// replaces the given records in place and appends new ones, leaving
    /// all other records of the file untouched.
    ///
    /// # Errors
    /// Returns [`SerializeError::DuplicateIds`] (nothing written) when ids
    /// collide, or an IO/history error.
    ///
    /// [`SerializeError::DuplicateIds`]: crate::error::SerializeError::DuplicateIds
    pub fn save_records_dict(&self, records: &mut RecordsDict, partial: bool) -> Result<()> {
        for record in records.values_mut() {
            record.align_provenance();
        }
        let content = if partial {
            let mut all = self.load_records_dict(false)?;
            for (id, record) in records.iter() {
                all.insert(id.clone(), record.clone());
            }
            bibtex::to_string(&all)?
        } else {
            bibtex::to_string(records)?
        };
        self.write_records_file(&content)?;
        debug!(count = records.len(), partial, "saved records");
        Ok(())
    }

    fn write_records_file(&self, content: &str) -> Result<()> {
        let path = self.paths.records();
        write_atomic(&path, content)?;
        self.history.add_changes(&Self::records_rel())?;
        Ok(())
    }

    /// Rewrite the records file in canonical form
    ///
    /// Records waiting for manual preparation get the quality model re-run,
    /// and prepared PDFs have their notes reset.
    ///
    /// # Errors
    /// Returns [`DatasetError`] when the file cannot be read or written.
    pub fn format_records_file(&self, qm: &QualityModel) -> Result<FormatOutcome> {
        let path = self.paths.records();
        if !path.is_file() {
            return Ok(FormatOutcome::Unchanged);
        }
        let before = std::fs::read_to_string(&path).map_err(|e| ParseError::io_error(&path, e))?;
        let mut records = bibtex::parse_str(&before)?;
        for record in records.values_mut() {
            match record.status() {
                RecordState::MdNeedsManualPreparation => record.run_quality_model(qm, true),
                RecordState::PdfPrepared => record.reset_pdf_provenance_notes(),
                _ => {}
            }
            record.align_provenance();
        }
        let after = bibtex::to_string(&records)?;
        if after == before {
            return Ok(FormatOutcome::Unchanged);
        }
        self.write_records_file(&after)?;
        info!("Formatted {}", RECORDS_FILE);
        Ok(FormatOutcome::Formatted)
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Records file of the last commit, if any
    ///
    /// # Errors
    /// Returns [`DatasetError`] when the committed file does not parse.
    pub fn committed_records(&self) -> Result<Option<RecordsDict>> {
        match self.history.records_at("HEAD", &Self::records_rel()) {
            Err(DatasetError::History(HistoryError::UnknownRevision(_))) => Ok(None),
            other => other,
        }
    }

    /// Current state of every origin
    ///
    /// # Errors
    /// Returns [`DatasetError::Parse`] when the records file is invalid.
    pub fn get_origin_state_dict(&self) -> Result<BTreeMap<String, RecordState>> {
        Ok(origin_states(&self.load_records_dict(true)?))
    }

    /// State of every origin at the last commit
    ///
    /// # Errors
    /// Returns [`DatasetError`] when the committed file does not parse.
    pub fn get_committed_origin_state_dict(&self) -> Result<BTreeMap<String, RecordState>> {
        Ok(self
            .committed_records()?
            .map(|records| origin_states(&records))
            .unwrap_or_default())
    }

    /// Committed versions of the records file, newest first
    ///
    /// With `start`, versions newer than that commit are skipped.
    ///
    /// # Errors
    /// Returns [`DatasetError`] when the history cannot be walked or a
    /// version does not parse.
    pub fn load_records_from_history(&self, start: Option<&str>) -> Result<Vec<(CommitInfo, RecordsDict)>> {
        let path = Self::records_rel();
        let commits = self.history.iter_commits(&path)?;
        let skip = match start {
            Some(start) => commits
                .iter()
                .position(|c| c.id.starts_with(start))
                .ok_or_else(|| HistoryError::UnknownRevision(start.to_string()))?,
            None => 0,
        };
        let mut versions = Vec::new();
        for commit in commits.into_iter().skip(skip) {
            if let Some(records) = self.history.records_at(&commit.id, &path)? {
                versions.push((commit, records));
            }
        }
        Ok(versions)
    }

    /// Whether any commit contains `path` (relative to the root)
    ///
    /// # Errors
    /// Returns [`DatasetError::History`] when the history cannot be walked.
    pub fn file_in_history(&self, path: &Path) -> Result<bool> {
        Ok(self.history.file_in_history(self.paths.relative(path))?)
    }

    /// Whether any record differs from its committed version
    ///
    /// Records are compared by content hash, so layout-only edits of the
    /// file do not count. A missing file and a missing commit both mean no
    /// records.
    ///
    /// # Errors
    /// Returns [`DatasetError`] when either version cannot be read.
    pub fn records_changed(&self) -> Result<bool> {
        let current = content_hashes(&self.load_records_dict(false)?)?;
        let committed = match self.committed_records()? {
            Some(records) => content_hashes(&records)?,
            None => Vec::new(),
        };
        let changed = current != committed;
        if changed {
            debug!(current = current.len(), committed = committed.len(), "records changed");
        }
        Ok(changed)
    }

    /// Stage `path` (relative to the root)
    ///
    /// # Errors
    /// Returns [`DatasetError::History`] when staging fails.
    pub fn add_changes(&self, path: &Path) -> Result<()> {
        Ok(self.history.add_changes(self.paths.relative(path))?)
    }

    /// Commit the staged changes and `paths`
    ///
    /// # Errors
    /// Returns [`DatasetError::History`] when the commit fails.
    pub fn create_commit(&self, message: &str, paths: &[PathBuf]) -> Result<String> {
        let paths: Vec<PathBuf> = paths
            .iter()
            .map(|p| self.paths.relative(p).to_path_buf())
            .collect();
        let id = self.history.commit(message, &paths)?;
        info!(commit = %id, "{}", message.lines().next().unwrap_or_default());
        Ok(id)
    }

    /// Whether `id` was committed for a record past `md_processed`
    ///
    /// Such ids may appear in PDFs, screens and data files.
    ///
    /// # Errors
    /// Returns [`DatasetError`] when the committed file does not parse.
    pub fn propagated_id(&self, id: &str) -> Result<bool> {
        Ok(self.committed_records()?.is_some_and(|records| {
            records
                .get(id)
                .is_some_and(|r| r.status().is_post(RecordState::MdProcessed))
        }))
    }

    // ------------------------------------------------------------------
    // Ids
    // ------------------------------------------------------------------

    /// Assign ids following `pattern`
    ///
    /// With a local index, records it knows get their curated id instead.
    /// See [`IdSetter::set_ids`] for which records change.
    ///
    /// # Errors
    /// Returns [`DatasetError::Id`] when a selected id was already propagated.
    pub fn set_ids(
        &self,
        records: &mut RecordsDict,
        pattern: IdPattern,
        selected: Option<&[String]>,
    ) -> Result<Vec<IdChange>> {
        let mut setter = IdSetter::new(pattern);
        if let Some(index) = &self.local_index {
            setter = setter.with_local_index(Arc::clone(index));
        }
        let changes = setter.set_ids(records, selected)?;
        for change in &changes {
            debug!("set id {} -> {}", change.old, change.new);
        }
        Ok(changes)
    }

    // ------------------------------------------------------------------
    // Checks and status
    // ------------------------------------------------------------------

    /// Cross-record checks against the last commit
    ///
    /// # Errors
    /// Returns [`DatasetError`] when the current or committed records file
    /// cannot be parsed.
    pub fn check(&self, settings: &Settings) -> Result<CheckReport> {
        let records = self.load_records_dict(false)?;
        let prior = self.committed_records()?;
        let context = CheckContext {
            root: Some(self.paths.root().to_path_buf()),
            search_dir: Some(self.paths.search()),
            screening_criteria: settings.screen.criteria.keys().cloned().collect(),
        };
        Ok(check_records(&context, prior.as_ref(), &records))
    }

    /// Write `status.yaml` and stage it
    ///
    /// # Errors
    /// Returns [`DatasetError`] when the records cannot be read or the file
    /// cannot be written.
    pub fn update_status_yaml(&self) -> Result<StatusReport> {
        let records = self.load_records_dict(true)?;
        let report = StatusReport::from_records(records.values());
        let path = self.paths.status();
        report.save(&path)?;
        self.add_changes(&path)?;
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Feeds
    // ------------------------------------------------------------------

    /// Feed file of a configured source
    #[must_use]
    pub fn feed_path(&self, source: &SearchSourceSettings) -> PathBuf {
        if source.filename.is_absolute() {
            source.filename.clone()
        } else if source.filename.components().count() == 1 {
            self.paths.feed_file(&source.origin_prefix())
        } else {
            self.paths.root().join(&source.filename)
        }
    }

    /// Open the feed of `source`
    ///
    /// Outside prep mode the feed carries the main records so retrieved
    /// records can update them.
    ///
    /// # Errors
    /// Returns [`DatasetError`] when the feed or records file is invalid.
    pub fn search_feed(
        &self,
        source: &SearchSourceSettings,
        source_identifier: &str,
        update_only: bool,
        prep_mode: bool,
    ) -> Result<SearchFeed> {
        let feed = SearchFeed::new(source_identifier, self.feed_path(source), update_only, prep_mode)?;
        if prep_mode {
            return Ok(feed);
        }
        Ok(feed.with_records(self.load_records_dict(false)?))
    }

    /// Save a feed, and the main records when the feed changed them
    ///
    /// # Errors
    /// Returns [`DatasetError`] when a file cannot be written.
    pub fn save_feed(&self, feed: SearchFeed) -> Result<FeedSummary> {
        let summary = feed.save()?;
        if feed.feed_file().is_file() {
            self.add_changes(feed.feed_file())?;
        }
        if !feed.prep_mode() && summary.updated > 0 {
            let mut records = feed.into_records();
            self.save_records_dict(&mut records, false)?;
        }
        Ok(summary)
    }
}

fn header(record: &Record) -> Record {
    let mut header = Record::new(record.id.clone(), record.entry_type.clone());
    for origin in record.origins() {
        header.add_origin(origin.clone());
    }
    if let Some(status) = record.stored_status() {
        header = header.with_status(status);
    }
    header.replace_md_prov(record.md_prov().clone());
    for key in HEADER_FIELDS {
        if let Some(value) = record.get(key) {
            header.insert_raw(key, value);
        }
    }
    header
}

fn content_hashes(records: &RecordsDict) -> Result<Vec<(String, ContentHash)>> {
    records
        .iter()
        .map(|(id, record)| Ok((id.clone(), record.content_hash()?)))
        .collect()
}

fn origin_states(records: &RecordsDict) -> BTreeMap<String, RecordState> {
    records
        .values()
        .flat_map(|r| r.origins().iter().map(move |o| (o.clone(), r.status())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SerializeError;
    use crate::history::MemoryHistory;
    use colrev_record::EntryType;
    use colrev_test_utils::{prepared_article, records_dict};
    use pretty_assertions::assert_eq;

    fn dataset(dir: &Path) -> Dataset {
        Dataset::new(ProjectPaths::new(dir), Box::new(MemoryHistory::new(dir)))
    }

    fn sample() -> RecordsDict {
        records_dict([
            prepared_article("Rai2020", "crossref.bib/000001", "Rai, Arun", "Editorial", "2020")
                .with_field(fields::FILE, "data/pdfs/Rai2020.pdf"),
            prepared_article("Webster2002", "dblp.bib/000002", "Webster, Jane", "Analyzing the past", "2002"),
        ])
    }

    #[test]
    fn missing_records_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(dataset(dir.path()).load_records_dict(false).unwrap().is_empty());
    }

    #[test]
    fn save_and_load_records() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dataset(dir.path());
        let mut records = sample();
        dataset.save_records_dict(&mut records, false).unwrap();

        let loaded = dataset.load_records_dict(false).unwrap();
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["Rai2020", "Webster2002"]);
        assert_eq!(loaded["Rai2020"].get(fields::TITLE), Some("Editorial"));

        let headers = dataset.load_records_dict(true).unwrap();
        assert_eq!(headers["Rai2020"].get(fields::TITLE), None);
        assert_eq!(headers["Rai2020"].get(fields::FILE), Some("data/pdfs/Rai2020.pdf"));
        assert_eq!(headers["Rai2020"].status(), RecordState::MdPrepared);
    }

    #[test]
    fn duplicate_ids_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dataset(dir.path());
        let mut records = records_dict([
            Record::new("Rai2020", EntryType::Misc).with_status(RecordState::MdImported),
            Record::new("rai2020", EntryType::Misc).with_status(RecordState::MdImported),
        ]);
        let err = dataset.save_records_dict(&mut records, false).unwrap_err();
        assert!(matches!(err, DatasetError::Serialize(SerializeError::DuplicateIds(_))));
        assert!(!dataset.paths().records().exists());
    }

    #[test]
    fn committed_state_follows_history() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dataset(dir.path());
        assert!(dataset.get_committed_origin_state_dict().unwrap().is_empty());
        assert!(!dataset.records_changed().unwrap());

        let mut records = sample();
        dataset.save_records_dict(&mut records, false).unwrap();
        assert!(dataset.records_changed().unwrap());
        dataset.create_commit("Load records", &[]).unwrap();
        assert!(!dataset.records_changed().unwrap());

        records["Rai2020"].set_status(RecordState::MdProcessed, false).unwrap();
        dataset.save_records_dict(&mut records, false).unwrap();
        dataset.create_commit("Dedupe records", &[]).unwrap();

        let committed = dataset.get_committed_origin_state_dict().unwrap();
        assert_eq!(committed["crossref.bib/000001"], RecordState::MdProcessed);
        assert!(dataset.propagated_id("Rai2020").unwrap());
        assert!(!dataset.propagated_id("Webster2002").unwrap());
        assert!(dataset.file_in_history(&dataset.paths().records()).unwrap());

        let versions = dataset.load_records_from_history(None).unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].0.summary, "Dedupe records");
        let older = dataset
            .load_records_from_history(Some(&versions[1].0.id))
            .unwrap();
        assert_eq!(older.len(), 1);
        assert_eq!(older[0].1["Rai2020"].status(), RecordState::MdPrepared);
    }

    #[test]
    fn format_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dataset(dir.path());
        let path = dataset.paths().records();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "@article{a, title = {X}, colrev_status = {md_imported}, colrev_origin = {x.bib/1;}}\n",
        )
        .unwrap();
        let qm = colrev_record::default_quality_model();
        assert_eq!(dataset.format_records_file(&qm).unwrap(), FormatOutcome::Formatted);
        assert_eq!(dataset.format_records_file(&qm).unwrap(), FormatOutcome::Unchanged);
    }

    #[test]
    fn status_yaml_counts_states() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dataset(dir.path());
        let mut records = sample();
        dataset.save_records_dict(&mut records, false).unwrap();
        let report = dataset.update_status_yaml().unwrap();
        assert_eq!(report.count(RecordState::MdPrepared), 2);
        assert!(dataset.paths().status().is_file());
    }

    #[test]
    fn failed_write_keeps_the_records_file() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dataset(dir.path());
        let mut records = sample();
        dataset.save_records_dict(&mut records, false).unwrap();
        let path = dataset.paths().records();
        let before = std::fs::read_to_string(&path).unwrap();

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        std::fs::create_dir(&tmp).unwrap();
        records["Rai2020"].insert_raw(fields::PAGES, "1--10");
        let err = dataset.save_records_dict(&mut records, false).unwrap_err();
        assert!(matches!(err, DatasetError::Serialize(SerializeError::Io { .. })));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);

        std::fs::remove_dir(&tmp).unwrap();
        dataset.save_records_dict(&mut records, false).unwrap();
        assert!(!Path::new(&tmp).exists());
        assert_eq!(dataset.load_records_dict(false).unwrap()["Rai2020"].get(fields::PAGES), Some("1--10"));
    }

    #[test]
    fn layout_edits_are_not_record_changes() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dataset(dir.path());
        let mut records = sample();
        dataset.save_records_dict(&mut records, false).unwrap();
        dataset.create_commit("Load records", &[]).unwrap();

        let path = dataset.paths().records();
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, format!("\n{content}\n\n")).unwrap();
        assert!(!dataset.records_changed().unwrap());

        records["Webster2002"].insert_raw(fields::VOLUME, "26");
        dataset.save_records_dict(&mut records, false).unwrap();
        assert!(dataset.records_changed().unwrap());
    }

    struct CuratedIds;

    impl LocalIndex for CuratedIds {
        fn get_id_for(&self, record: &Record) -> colrev_ids::Result<String> {
            match record.get(fields::AUTHOR) {
                Some("Webster, Jane") => Ok("WebsterWatson2002".to_string()),
                _ => Err(colrev_ids::IdError::RecordNotInIndex(record.id.clone())),
            }
        }
    }

    #[test]
    fn set_ids_prefers_local_index_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut records = records_dict([
            Record::new("dblp.bib/1", EntryType::Article)
                .with_field(fields::AUTHOR, "Webster, Jane")
                .with_field(fields::YEAR, "2002")
                .with_status(RecordState::MdImported),
            Record::new("dblp.bib/2", EntryType::Article)
                .with_field(fields::AUTHOR, "Rai, Arun")
                .with_field(fields::YEAR, "2020")
                .with_status(RecordState::MdImported),
        ]);

        let plain = dataset(dir.path());
        assert!(plain.local_index().is_none());
        let mut without = records.clone();
        plain.set_ids(&mut without, IdPattern::FirstAuthorYear, None).unwrap();
        assert!(without.contains_key("Webster2002"));

        let indexed = dataset(dir.path()).with_local_index(Arc::new(CuratedIds));
        let changes = indexed.set_ids(&mut records, IdPattern::FirstAuthorYear, None).unwrap();
        assert_eq!(changes.len(), 2);
        let ids: Vec<&str> = records.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["WebsterWatson2002", "Rai2020"]);
    }

    #[test]
    fn feed_path_resolves_bare_filenames() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dataset(dir.path());
        let bare = SearchSourceSettings::new("x", "crossref.bib", crate::settings::SearchType::Db);
        assert_eq!(dataset.feed_path(&bare), dataset.paths().feed_file("crossref.bib"));
        let nested = SearchSourceSettings::new("x", "data/search/dblp.bib", crate::settings::SearchType::Db);
        assert_eq!(dataset.feed_path(&nested), dir.path().join("data/search/dblp.bib"));
    }
}
