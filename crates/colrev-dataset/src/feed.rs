//! Search feeds
//!
//! A feed is the only path by which records of an external source enter a
//! project. It owns one file under `data/search/` and maps the source's
//! identifier (a DOI, an accession number, ...) to a local id: a
//! zero-padded counter that only grows. Records retrieved again update the
//! feed and, through the origin `<feed file>/<local id>`, the main record
//! built from them.
//!
//! The feed state sits behind one lock so workers of a retrieval pool can
//! add records concurrently.

use crate::bibtex;
use crate::error::{FeedError, SerializeError};
use colrev_record::constants::{defects, is_identifying, DEFAULT_TIME_VARIANT_FIELDS, PROVENANCE_KEYS};
use colrev_record::{
    fields, get_record_similarity, ratio, values, EditOptions, FieldChange, Record, RecordsDict,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Similarity above which an update is reported as a routine refresh
const SIMILARITY_THRESHOLD: f64 = 0.98;
/// Title ratio below which an update is reported as a substantial change
const TITLE_CHANGE_THRESHOLD: f64 = 0.9;
/// Feed of the curated masterdata repository
const CURATED_FEED: &str = "md_curated.bib";
/// Width of local ids
const ID_WIDTH: usize = 6;

/// Counts reported by [`SearchFeed::save`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedSummary {
    /// Records new to the feed
    pub added: usize,
    /// Main records changed by the feed
    pub updated: usize,
}

#[derive(Debug, Default)]
struct FeedState {
    feed_records: RecordsDict,
    available_ids: HashMap<String, String>,
    next_id: u64,
    records: RecordsDict,
    nr_added: usize,
    nr_changed: usize,
}

/// Per-source store of retrieved records
#[derive(Debug)]
pub struct SearchFeed {
    source_identifier: String,
    feed_file: PathBuf,
    origin_prefix: String,
    update_only: bool,
    update_time_variant_fields: bool,
    prep_mode: bool,
    time_variant_fields: Vec<String>,
    state: Mutex<FeedState>,
}

impl SearchFeed {
    /// Open the feed stored in `feed_file`
    ///
    /// A missing file yields an empty feed whose first id is `000001`.
    /// `update_only` corresponds to a rerun of the search.
    ///
    /// # Errors
    /// Returns [`FeedError::Parse`] when the existing feed file is invalid.
    pub fn new(
        source_identifier: impl Into<String>,
        feed_file: impl Into<PathBuf>,
        update_only: bool,
        prep_mode: bool,
    ) -> Result<Self, FeedError> {
        let source_identifier = source_identifier.into();
        let feed_file = feed_file.into();
        let origin_prefix = feed_file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let feed_records = if feed_file.is_file() {
            let content = std::fs::read_to_string(&feed_file)
                .map_err(|e| crate::error::ParseError::io_error(&feed_file, e))?;
            bibtex::parse_str(&content)?
        } else {
            RecordsDict::new()
        };

        let available_ids = feed_records
            .values()
            .filter_map(|r| {
                normalize_identifier(&source_identifier, r.get(&source_identifier))
                    .map(|identifier| (identifier, r.id.clone()))
            })
            .collect();
        let next_id = feed_records
            .keys()
            .filter_map(|id| id.parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1);

        debug!(
            feed = %origin_prefix,
            records = feed_records.len(),
            next_id,
            "opened feed"
        );

        Ok(Self {
            source_identifier,
            feed_file,
            origin_prefix,
            update_only,
            update_time_variant_fields: !update_only,
            prep_mode,
            time_variant_fields: DEFAULT_TIME_VARIANT_FIELDS
                .iter()
                .map(ToString::to_string)
                .collect(),
            state: Mutex::new(FeedState {
                feed_records,
                available_ids,
                next_id,
                ..FeedState::default()
            }),
        })
    }

    /// Builder: main records updated by this feed
    #[must_use]
    pub fn with_records(self, records: RecordsDict) -> Self {
        self.state.lock().records = records;
        self
    }

    /// Builder: replace the time-variant field list
    #[must_use]
    pub fn with_time_variant_fields<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.time_variant_fields = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: whether time-variant fields reach the main records
    #[must_use]
    pub fn with_update_time_variant_fields(mut self, update: bool) -> Self {
        self.update_time_variant_fields = update;
        self
    }

    /// Feed file
    #[must_use]
    pub fn feed_file(&self) -> &Path {
        &self.feed_file
    }

    /// Prefix of the origins this feed creates
    #[must_use]
    pub fn origin_prefix(&self) -> &str {
        &self.origin_prefix
    }

    /// Whether the feed only annotates records for prep
    #[must_use]
    pub fn prep_mode(&self) -> bool {
        self.prep_mode
    }

    /// Next local id
    #[must_use]
    pub fn next_id(&self) -> String {
        format_id(self.state.lock().next_id)
    }

    /// Identifier to local id
    #[must_use]
    pub fn available_ids(&self) -> HashMap<String, String> {
        self.state.lock().available_ids.clone()
    }

    /// Records stored in the feed
    #[must_use]
    pub fn feed_records(&self) -> RecordsDict {
        self.state.lock().feed_records.clone()
    }

    /// Main records, including the updates applied so far
    #[must_use]
    pub fn records(&self) -> RecordsDict {
        self.state.lock().records.clone()
    }

    /// Number of main records changed so far
    #[must_use]
    pub fn changed_records(&self) -> usize {
        self.state.lock().nr_changed
    }

    /// Consume the feed and return the main records
    #[must_use]
    pub fn into_records(self) -> RecordsDict {
        self.state.into_inner().records
    }

    fn identifier(&self, record: &Record) -> Result<String, FeedError> {
        normalize_identifier(&self.source_identifier, record.get(&self.source_identifier)).ok_or_else(
            || FeedError::NotFeedIdentifiable {
                source_identifier: self.source_identifier.clone(),
            },
        )
    }

    /// Previous feed version of a record, looked up by its identifier
    ///
    /// # Errors
    /// Returns [`FeedError::NotFeedIdentifiable`] when the record lacks the
    /// identifier field.
    pub fn get_prev_feed_record(&self, record: &Record) -> Result<Option<Record>, FeedError> {
        let identifier = self.identifier(record)?;
        let state = self.state.lock();
        Ok(state
            .available_ids
            .get(&identifier)
            .and_then(|id| state.feed_records.get(id))
            .cloned())
    }

    /// Add a retrieved record to the feed and update its main record
    ///
    /// The record leaves with its local id, the origin
    /// `<feed file>/<local id>` and provenance pointing at that origin.
    /// Returns whether the record was new to the feed.
    ///
    /// # Errors
    /// Returns [`FeedError::NotFeedIdentifiable`] when the record lacks the
    /// identifier field.
    pub fn add_update_record(&self, record: &mut Record) -> Result<bool, FeedError> {
        let identifier = self.identifier(record)?;
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let (local_id, added) = match state.available_ids.get(&identifier) {
            Some(id) => (id.clone(), false),
            None => {
                let id = format_id(state.next_id);
                state.next_id += 1;
                state.nr_added += 1;
                state.available_ids.insert(identifier, id.clone());
                (id, true)
            }
        };
        record.id.clone_from(&local_id);
        let prev = state.feed_records.get(&local_id).cloned();

        let mut feed_record = record.clone();
        feed_record.clear_provenance_keys();
        feed_record.remove_field(fields::PDF_ID);
        if self.update_only {
            for key in &self.time_variant_fields {
                match prev.as_ref().and_then(|p| p.get(key)) {
                    Some(value) => feed_record.insert_raw(key.clone(), value),
                    None => feed_record.remove_field(key),
                }
            }
        }
        state.feed_records.insert(local_id.clone(), feed_record);

        let origin = format!("{}/{local_id}", self.origin_prefix);
        record.clear_provenance_keys();
        record.add_origin(origin.clone());
        record.add_provenance_all(&origin);

        if !self.prep_mode {
            self.update_existing_record(state, record, prev.as_ref(), &origin);
        }
        Ok(added)
    }

    fn update_existing_record(
        &self,
        state: &mut FeedState,
        retrieved: &Record,
        prev: Option<&Record>,
        origin: &str,
    ) -> bool {
        let Some(main) = state
            .records
            .values_mut()
            .find(|r| r.origins().contains(origin))
        else {
            debug!("Could not update {}", retrieved.id);
            return false;
        };
        let before = main.clone();

        let mut changed = false;
        let mut checked = retrieved.clone();
        if checked.is_retracted() {
            info!("Found paper retract: {}", main.id);
            main.prescreen_exclude(values::RETRACTED);
            main.remove_field(fields::WARNING);
            changed = true;
        }
        let retrieved = &checked;

        let curated_lock = main.masterdata_is_curated() && self.origin_prefix != CURATED_FEED;
        let forthcoming_published = !curated_lock
            && main.get(fields::YEAR) == Some(values::FORTHCOMING)
            && retrieved
                .get(fields::YEAR)
                .is_some_and(|year| year != values::FORTHCOMING);
        if forthcoming_published {
            info!("update published forthcoming paper: {}", main.id);
            for key in [fields::YEAR, fields::VOLUME, fields::NUMBER] {
                if let Some(value) = retrieved.get(key) {
                    main.update_field_with(key, value, origin, "", EditOptions::default().replace_source());
                }
            }
        }

        let reference = prev.unwrap_or(&before);
        let similarity = get_record_similarity(retrieved, reference);
        let diff = retrieved.get_diff(reference, false);

        for (key, value) in retrieved.fields() {
            if !self.update_time_variant_fields && self.time_variant_fields.contains(key) {
                continue;
            }
            if PROVENANCE_KEYS.contains(&key.as_str()) || key == fields::ID {
                continue;
            }
            if curated_lock && is_identifying(key) {
                continue;
            }
            if forthcoming_published && matches!(key.as_str(), fields::YEAR | fields::VOLUME | fields::NUMBER) {
                continue;
            }
            let options = EditOptions::default().replace_source().keep_if_equal();
            match main.get(key).map(ToString::to_string) {
                None => {
                    if main.ignored_defect(key, defects::MISSING) {
                        continue;
                    }
                    main.update_field_with(key, value.clone(), origin, "", options);
                }
                Some(current) => {
                    if self.origin_prefix != CURATED_FEED
                        && prev.and_then(|p| p.get(key)) != Some(current.as_str())
                    {
                        continue;
                    }
                    if value.replace(" - ", ": ") == current.replace(" - ", ": ") {
                        continue;
                    }
                    if key == fields::URL && value.contains("dblp.org") {
                        continue;
                    }
                    main.update_field_with(key, value.clone(), origin, "", options);
                }
            }
        }

        let retrieved_changed = prev.is_some_and(|p| have_changed(retrieved, p));
        changed |= *main != before || retrieved_changed;
        if !changed {
            return false;
        }
        state.nr_changed += 1;

        let title_ratio = ratio(
            &retrieved.get_or(fields::TITLE, "").to_lowercase(),
            &reference.get_or(fields::TITLE, "").to_lowercase(),
        );
        if forthcoming_published {
            info!("forthcoming paper published: {}", main.id);
        } else if title_ratio < TITLE_CHANGE_THRESHOLD {
            warn!(
                "check/update {origin} leads to substantial changes ({similarity}) in {}",
                main.id
            );
            for change in diff.iter().filter(|c| matches!(c, FieldChange::Change { .. })) {
                warn!("{change:?}");
            }
        } else if similarity > SIMILARITY_THRESHOLD {
            info!("check/update {origin}");
        } else {
            info!("check/update {origin} ({similarity}) in {}", main.id);
        }
        true
    }

    /// Write the feed file
    ///
    /// The file is written to a sibling temp file and renamed into place.
    /// Main records are left to the caller ([`SearchFeed::into_records`]).
    ///
    /// # Errors
    /// Returns [`FeedError::Serialize`] when the feed cannot be written.
    pub fn save(&self) -> Result<FeedSummary, FeedError> {
        let state = self.state.lock();
        if state.nr_added > 0 {
            info!("Retrieved {} records", state.nr_added);
        } else {
            info!("No additional records retrieved");
        }
        if !self.prep_mode {
            if state.nr_changed > 0 {
                info!("Updated {} records", state.nr_changed);
            } else if !state.records.is_empty() {
                info!("Records (data/records.bib) up-to-date");
            }
        }

        if !state.feed_records.is_empty() {
            let content = bibtex::to_string(&state.feed_records)?;
            write_atomic(&self.feed_file, &content)?;
        }
        Ok(FeedSummary {
            added: state.nr_added,
            updated: state.nr_changed,
        })
    }
}

fn format_id(id: u64) -> String {
    format!("{id:0width$}", width = ID_WIDTH)
}

fn normalize_identifier(source_identifier: &str, value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    if source_identifier == fields::DOI {
        Some(value.to_uppercase())
    } else {
        Some(value.to_string())
    }
}

/// Whether `a` lacks or differs in any field of `b`
fn have_changed(a: &Record, b: &Record) -> bool {
    if a.entry_type != b.entry_type {
        return true;
    }
    b.fields()
        .iter()
        .filter(|(k, _)| !PROVENANCE_KEYS.contains(&k.as_str()))
        .any(|(k, v)| a.get(k) != Some(v.as_str()))
}

pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<(), SerializeError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SerializeError::io_error(parent, e))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, content).map_err(|e| SerializeError::io_error(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| SerializeError::io_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use colrev_record::EntryType;
    use colrev_state::RecordState;
    use colrev_test_utils::{prepared_article, records_dict, scenario_forthcoming};
    use pretty_assertions::assert_eq;

    fn retrieved(doi: &str, title: &str) -> Record {
        Record::new("x", EntryType::Article)
            .with_field(fields::DOI, doi)
            .with_field(fields::TITLE, title)
            .with_field(fields::AUTHOR, "Rai, Arun")
            .with_field(fields::YEAR, "2020")
            .with_field(fields::JOURNAL, "MIS Quarterly")
    }

    fn empty_feed(dir: &Path) -> SearchFeed {
        SearchFeed::new(fields::DOI, dir.join("data/search/crossref.bib"), false, false).unwrap()
    }

    #[test]
    fn requires_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let feed = empty_feed(dir.path());
        let mut record = Record::new("x", EntryType::Article).with_field(fields::TITLE, "T");
        assert!(matches!(
            feed.add_update_record(&mut record),
            Err(FeedError::NotFeedIdentifiable { .. })
        ));
        assert_eq!(feed.next_id(), "000001");
    }

    #[test]
    fn assigns_incremental_ids_and_origins() {
        let dir = tempfile::tempdir().unwrap();
        let feed = empty_feed(dir.path());

        let mut first = retrieved("10.1/a", "First");
        let mut second = retrieved("10.1/b", "Second");
        let mut again = retrieved("10.1/A", "First");
        assert!(feed.add_update_record(&mut first).unwrap());
        assert!(feed.add_update_record(&mut second).unwrap());
        assert!(!feed.add_update_record(&mut again).unwrap());

        assert_eq!(first.id, "000001");
        assert_eq!(second.id, "000002");
        assert_eq!(again.id, "000001");
        let origins: Vec<&str> = second.origins().iter().map(String::as_str).collect();
        assert_eq!(origins, vec!["crossref.bib/000002"]);
        assert_eq!(second.md_prov()[fields::TITLE].source, "crossref.bib/000002");
        assert!(feed.feed_records()["000001"].origins().is_empty());
    }

    #[test]
    fn reopened_feed_continues_numbering() {
        let dir = tempfile::tempdir().unwrap();
        let feed = empty_feed(dir.path());
        for doi in ["10.1/a", "10.1/b", "10.1/c"] {
            feed.add_update_record(&mut retrieved(doi, "T")).unwrap();
        }
        let summary = feed.save().unwrap();
        assert_eq!(summary.added, 3);

        let reopened = empty_feed(dir.path());
        assert_eq!(reopened.next_id(), "000004");
        assert_eq!(reopened.available_ids()["10.1/B"], "000002");
        let prev = reopened
            .get_prev_feed_record(&retrieved("10.1/c", "T"))
            .unwrap()
            .unwrap();
        assert_eq!(prev.id, "000003");
    }

    #[test]
    fn forthcoming_paper_is_published() {
        let dir = tempfile::tempdir().unwrap();
        let (main, mut incoming) = scenario_forthcoming();
        let feed = empty_feed(dir.path()).with_records(records_dict([main]));

        feed.add_update_record(&mut incoming).unwrap();
        let records = feed.into_records();
        let main = &records["Rai2022"];

        assert_eq!(main.get(fields::YEAR), Some("2022"));
        assert_eq!(main.get(fields::VOLUME), Some("12"));
        assert_eq!(main.get(fields::NUMBER), Some("2"));
        assert!(!main.ignored_defect(fields::VOLUME, defects::MISSING));
        assert!(!main.ignored_defect(fields::NUMBER, defects::MISSING));
        assert_eq!(main.md_prov()[fields::VOLUME].source, "crossref.bib/000001");
    }

    #[test]
    fn ignored_missing_fields_stay_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut main = prepared_article("Rai2020", "crossref.bib/000001", "Rai, Arun", "Platforms", "2020");
        main.remove_field_not_missing(fields::NUMBER, Some("manual"));
        let feed = empty_feed(dir.path()).with_records(records_dict([main]));

        let mut incoming = retrieved("10.1/a", "Platforms").with_field(fields::NUMBER, "3");
        feed.add_update_record(&mut incoming).unwrap();
        let records = feed.into_records();
        assert_eq!(records["Rai2020"].get(fields::NUMBER), None);
        assert_eq!(records["Rai2020"].get(fields::DOI), Some("10.1/a"));
    }

    #[test]
    fn curated_main_keeps_identifying_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut main = prepared_article("Rai2020", "crossref.bib/000001", "RAI, ARUN", "Platforms", "2020");
        main.set_masterdata_curated("https://github.com/curated");
        let feed = empty_feed(dir.path()).with_records(records_dict([main]));

        let mut incoming = retrieved("10.1/a", "Platforms revisited").with_field(fields::ABSTRACT, "A");
        feed.add_update_record(&mut incoming).unwrap();
        let records = feed.into_records();
        assert_eq!(records["Rai2020"].get(fields::TITLE), Some("Platforms"));
        assert_eq!(records["Rai2020"].get(fields::AUTHOR), Some("RAI, ARUN"));
        assert_eq!(records["Rai2020"].get(fields::ABSTRACT), Some("A"));
    }

    #[test]
    fn retraction_excludes_main_record() {
        let dir = tempfile::tempdir().unwrap();
        let main = prepared_article("Rai2020", "crossref.bib/000001", "Rai, Arun", "Platforms", "2020");
        let feed = empty_feed(dir.path()).with_records(records_dict([main]));

        let mut incoming = retrieved("10.1/a", "Platforms").with_field(fields::WARNING, "Withdrawn: fraud");
        feed.add_update_record(&mut incoming).unwrap();
        assert_eq!(feed.changed_records(), 1);
        let records = feed.into_records();
        assert_eq!(records["Rai2020"].status(), RecordState::RevPrescreenExcluded);
        assert_eq!(records["Rai2020"].get(fields::PRESCREEN_EXCLUSION), Some(values::RETRACTED));
    }

    #[test]
    fn time_variant_fields_wait_for_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let feed = empty_feed(dir.path());
        feed.add_update_record(&mut retrieved("10.1/a", "T").with_field(fields::CITED_BY, "3"))
            .unwrap();
        feed.save().unwrap();

        let mut main = prepared_article("Rai2020", "crossref.bib/000001", "Rai, Arun", "T", "2020");
        main.update_field(fields::CITED_BY, "3", "crossref.bib/000001");
        let rerun = SearchFeed::new(fields::DOI, dir.path().join("data/search/crossref.bib"), true, false)
            .unwrap()
            .with_records(records_dict([main]));
        rerun
            .add_update_record(&mut retrieved("10.1/a", "T").with_field(fields::CITED_BY, "9"))
            .unwrap();
        assert_eq!(rerun.feed_records()["000001"].get(fields::CITED_BY), Some("3"));
        assert_eq!(rerun.into_records()["Rai2020"].get(fields::CITED_BY), Some("3"));
    }
}
