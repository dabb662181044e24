//! Search sources
//!
//! A search source knows how to recognize its exports, how to fill its feed
//! and how to normalize the records it delivers. Sources are registered
//! explicitly in a [`SourceRegistry`] keyed by endpoint.

use crate::error::{DatasetError, ParseError};
use crate::feed::SearchFeed;
use crate::parsers::{LoadOptions, ParserRegistry};
use crate::settings::{SearchSourceSettings, SearchType};
use async_trait::async_trait;
use colrev_record::prep::Case;
use colrev_record::{fields, values, EditOptions, EntryType, Record, RecordsDict};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Endpoint of the fallback source
pub const UNKNOWN_SOURCE: &str = "colrev.unknown_source";
/// Endpoint of the PDF directory source
pub const PDFS_DIR_SOURCE: &str = "colrev.pdfs_dir";

/// Confidence of the fallback source
const FALLBACK_CONFIDENCE: f64 = 0.1;
/// Provenance source of the fallback preparation
const UNKNOWN_PREP: &str = "unknown_source_prep";

static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<.*?>").expect("static regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));
static NICKNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").expect("static regex"));
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").expect("static regex"));
static ORDINAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}|\d{1,2}(th|nd|rd|st)|\([A-Z]{3,6}\)").expect("static regex")
});

/// A source of bibliographic records
#[async_trait]
pub trait SearchSource: Send + Sync {
    /// Registry key (`colrev.unknown_source`, ...)
    fn endpoint(&self) -> &str;

    /// Field that identifies records within this source's feed
    fn source_identifier(&self) -> &str;

    /// Confidence in `0..=1` that `content` was exported from this source
    fn heuristic(&self, filename: &Path, content: &str) -> f64;

    /// Settings for a new search of this source
    ///
    /// # Errors
    /// Returns [`DatasetError`] when the parameters are not usable.
    fn add_endpoint(
        &self,
        filename: &Path,
        parameters: BTreeMap<String, serde_json::Value>,
    ) -> Result<SearchSourceSettings, DatasetError> {
        let mut settings = SearchSourceSettings::new(self.endpoint(), filename, SearchType::Db);
        settings.search_parameters = parameters;
        Ok(settings)
    }

    /// Fill `feed`; a rerun refreshes records already in the feed
    ///
    /// # Errors
    /// Returns [`DatasetError`] when the source cannot be read or a record
    /// is not identifiable.
    async fn search(
        &self,
        settings: &SearchSourceSettings,
        feed: &SearchFeed,
        rerun: bool,
    ) -> Result<(), DatasetError>;

    /// Load sub-steps for this source's files
    fn load_options(&self) -> LoadOptions {
        LoadOptions::default()
    }

    /// Parse a search result file into records
    ///
    /// # Errors
    /// Returns [`DatasetError::Parse`] when no parser fits or the file is malformed.
    fn load(&self, path: &Path, parsers: &ParserRegistry) -> Result<RecordsDict, DatasetError> {
        if !path.is_file() {
            return Ok(RecordsDict::new());
        }
        Ok(parsers.load(path, &self.load_options())?)
    }

    /// Source-specific normalization
    fn prepare(&self, _record: &mut Record, _settings: &SearchSourceSettings) {}
}

// ============================================================================
// Unknown source
// ============================================================================

/// Fallback for exports of databases without a dedicated source
///
/// Searches are files placed in `data/search/` by the operator.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnknownSource;

#[async_trait]
impl SearchSource for UnknownSource {
    fn endpoint(&self) -> &str {
        UNKNOWN_SOURCE
    }

    fn source_identifier(&self) -> &str {
        fields::ID
    }

    fn heuristic(&self, _filename: &Path, _content: &str) -> f64 {
        FALLBACK_CONFIDENCE
    }

    async fn search(
        &self,
        settings: &SearchSourceSettings,
        _feed: &SearchFeed,
        _rerun: bool,
    ) -> Result<(), DatasetError> {
        if settings.search_type != SearchType::Db {
            return Ok(());
        }
        tokio::fs::metadata(&settings.filename)
            .await
            .map_err(|e| ParseError::io_error(&settings.filename, e))?;
        debug!(file = %settings.filename.display(), "database export in place");
        Ok(())
    }

    fn prepare(&self, record: &mut Record, settings: &SearchSourceSettings) {
        if !record.has_quality_defects(None) || record.masterdata_is_curated() {
            return;
        }
        fix_entrytypes(record, settings);
        impute_missing_fields(record);
        format_fields(record);
        remove_redundant_fields(record);
        unify_special_characters(record);
    }
}

fn fix_entrytypes(record: &mut Record, settings: &SearchSourceSettings) {
    if record.entry_type == EntryType::Article && !record.contains(fields::JOURNAL) {
        for container in [fields::BOOKTITLE, fields::SERIES] {
            if let Some(value) = record.get(container).map(str::to_string) {
                record.update_field(fields::JOURNAL, value, UNKNOWN_PREP);
                record.remove_field(container);
                break;
            }
        }
    }

    let is_md = settings
        .filename
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("md"));
    if is_md && record.entry_type == EntryType::Misc && record.contains(fields::PUBLISHER) {
        record.entry_type = EntryType::Book;
    }

    let thesis_hint = [fields::URL, fields::ABSTRACT].iter().any(|key| {
        record
            .get(key)
            .is_some_and(|v| v.to_lowercase().contains("thesis") || v.to_lowercase().contains("dissertation"))
    });
    if thesis_hint && record.entry_type != EntryType::Phdthesis {
        info!(id = %record.id, "Set from {} to phdthesis", record.entry_type);
        record.entry_type = EntryType::Phdthesis;
    }
}

fn impute_missing_fields(record: &mut Record) {
    if record.contains(fields::YEAR) {
        return;
    }
    let year = record
        .get("date")
        .and_then(|date| YEAR_RE.find(date))
        .map(|m| m.as_str().to_string());
    if let Some(year) = year {
        record.update_field_with(fields::YEAR, year, UNKNOWN_PREP, "", EditOptions::default().keep_if_equal());
    }
}

fn format_fields(record: &mut Record) {
    match record.entry_type {
        EntryType::Inproceedings => {
            if let Some(booktitle) = record.get(fields::BOOKTITLE).filter(|b| *b != values::UNKNOWN) {
                let stripped = ORDINAL_RE
                    .replace_all(booktitle, "")
                    .replace("Proceedings of the", "")
                    .replace("Proceedings", "")
                    .trim()
                    .to_string();
                record.update_field_with(
                    fields::BOOKTITLE,
                    stripped,
                    UNKNOWN_PREP,
                    "",
                    EditOptions::default().keep_if_equal(),
                );
                record.format_if_mostly_upper(fields::BOOKTITLE, Case::Title);
            }
        }
        EntryType::Article => {
            if record.get(fields::JOURNAL).is_some_and(|j| j.len() > 10) {
                record.format_if_mostly_upper(fields::JOURNAL, Case::Title);
            }
            if let Some(volume) = record.get(fields::VOLUME).filter(|v| v.starts_with("Volume ")) {
                let volume = volume.replace("Volume ", "");
                record.update_field_with(fields::VOLUME, volume, UNKNOWN_PREP, "", EditOptions::default().keep_if_equal());
            }
        }
        _ => {}
    }

    if let Some(author) = record.get(fields::AUTHOR).filter(|a| *a != values::UNKNOWN) {
        let mut author = if author.contains(", ") {
            author.to_string()
        } else {
            colrev_record::prep::format_author_field(author)
        };
        author = NICKNAME_RE.replace_all(&author, "").replace("  ", " ").trim_end().to_string();
        record.update_field_with(fields::AUTHOR, author, UNKNOWN_PREP, "", EditOptions::default().keep_if_equal());
    }
    if record.get(fields::TITLE).is_some_and(|t| t != values::UNKNOWN) {
        record.format_if_mostly_upper(fields::TITLE, Case::Sentence);
    }
    record.unify_pages_field();
}

fn remove_redundant_fields(record: &mut Record) {
    if let (Some(journal), Some(booktitle)) = (record.get(fields::JOURNAL), record.get(fields::BOOKTITLE)) {
        let similar = colrev_record::ratio(&journal.to_lowercase(), &booktitle.to_lowercase()) > 0.9;
        match record.entry_type {
            EntryType::Article if similar => record.remove_field(fields::BOOKTITLE),
            EntryType::Inproceedings if similar => record.remove_field(fields::JOURNAL),
            _ => {}
        }
    }
    if record.get(fields::PUBLISHER) == Some("researchgate.net") {
        record.remove_field(fields::PUBLISHER);
    }
}

fn unify_special_characters(record: &mut Record) {
    for key in [fields::AUTHOR, fields::TITLE, fields::JOURNAL] {
        let Some(value) = record.get(key) else {
            continue;
        };
        let cleaned = HTML_TAG_RE
            .replace_all(&WHITESPACE_RE.replace_all(value, " "), "")
            .into_owned();
        if cleaned != value {
            record.insert_raw(key, cleaned);
        }
    }
}

// ============================================================================
// PDF directory
// ============================================================================

/// PDFs dropped into a directory of the project
///
/// Each file becomes one feed record keyed by its path. The directory is
/// taken from the `path` search parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfsDirSource;

impl PdfsDirSource {
    fn scan_dir(settings: &SearchSourceSettings) -> Option<PathBuf> {
        settings
            .search_parameters
            .get("path")
            .and_then(serde_json::Value::as_str)
            .map(PathBuf::from)
    }
}

#[async_trait]
impl SearchSource for PdfsDirSource {
    fn endpoint(&self) -> &str {
        PDFS_DIR_SOURCE
    }

    fn source_identifier(&self) -> &str {
        fields::FILE
    }

    fn heuristic(&self, _filename: &Path, _content: &str) -> f64 {
        0.0
    }

    fn add_endpoint(
        &self,
        filename: &Path,
        parameters: BTreeMap<String, serde_json::Value>,
    ) -> Result<SearchSourceSettings, DatasetError> {
        let mut settings = SearchSourceSettings::new(self.endpoint(), filename, SearchType::Files);
        settings.search_parameters = parameters;
        if Self::scan_dir(&settings).is_none() {
            settings
                .search_parameters
                .insert("path".into(), serde_json::Value::from(crate::paths::PDF_DIR));
        }
        Ok(settings)
    }

    async fn search(
        &self,
        settings: &SearchSourceSettings,
        feed: &SearchFeed,
        _rerun: bool,
    ) -> Result<(), DatasetError> {
        let Some(root) = Self::scan_dir(settings) else {
            return Ok(());
        };
        let mut pending = vec![root];
        let mut files = Vec::new();
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(ParseError::io_error(&dir, e).into()),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| ParseError::io_error(&dir, e))?
            {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("pdf")) {
                    files.push(path);
                }
            }
        }
        files.sort();

        for path in files {
            let title = path
                .file_stem()
                .map(|s| s.to_string_lossy().replace(['_', '-'], " "))
                .unwrap_or_default();
            let mut record = Record::new("", EntryType::Misc)
                .with_field(fields::FILE, path.to_string_lossy())
                .with_field(fields::TITLE, title);
            feed.add_update_record(&mut record)?;
        }
        Ok(())
    }

    fn load(&self, _path: &Path, _parsers: &ParserRegistry) -> Result<RecordsDict, DatasetError> {
        Ok(RecordsDict::new())
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Search sources keyed by endpoint
#[derive(Default, Clone)]
pub struct SourceRegistry {
    sources: BTreeMap<String, Arc<dyn SearchSource>>,
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("endpoints", &self.sources.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SourceRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in sources
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(UnknownSource);
        registry.register(PdfsDirSource);
        registry
    }

    /// Add or replace a source
    pub fn register<S: SearchSource + 'static>(&mut self, source: S) {
        self.sources.insert(source.endpoint().to_string(), Arc::new(source));
    }

    /// Source by endpoint
    #[must_use]
    pub fn get(&self, endpoint: &str) -> Option<Arc<dyn SearchSource>> {
        self.sources.get(endpoint).cloned()
    }

    /// Source for configured settings, falling back to the unknown source
    #[must_use]
    pub fn for_settings(&self, settings: &SearchSourceSettings) -> Arc<dyn SearchSource> {
        self.get(&settings.endpoint)
            .unwrap_or_else(|| Arc::new(UnknownSource))
    }

    /// Sources ranked by confidence for a new search result file
    ///
    /// Sources with zero confidence are left out.
    #[must_use]
    pub fn detect(&self, filename: &Path, content: &str) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .sources
            .iter()
            .map(|(endpoint, source)| (endpoint.clone(), source.heuristic(filename, content)))
            .filter(|(_, confidence)| *confidence > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    /// Endpoints of the registered sources
    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }
}
