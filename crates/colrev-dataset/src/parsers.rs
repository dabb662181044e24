//! Record parsers for search result files
//!
//! Search exports arrive in different formats. A [`RecordParser`] turns one
//! format into records; the [`ParserRegistry`] picks a parser by file
//! extension. [`LoadOptions`] carry the source-specific sub-steps that run
//! after parsing:
//! - entrytype setter (per record)
//! - field mapper (per record)
//! - id labeler (per record, with its position)

use crate::bibtex;
use crate::error::ParseError;
use colrev_ids::IdIndex;
use colrev_record::{fields, EntryType, Record, RecordsDict};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Parser trait for converting file content into records
///
/// Implement this trait to add support for new export formats.
pub trait RecordParser: Send + Sync + 'static {
    /// Parser name (for logs)
    fn name(&self) -> &'static str;

    /// Parse content string into records
    ///
    /// # Errors
    /// Returns [`ParseError`] for malformed content.
    fn parse(&self, content: &str) -> Result<RecordsDict, ParseError>;

    /// Check if this parser can handle the given path
    fn can_parse(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions().contains(&ext.to_lowercase().as_str()))
    }

    /// Supported file extensions (without dot, lowercase)
    fn extensions(&self) -> &[&str];

    /// Parser priority (higher = tried first when multiple parsers match)
    fn priority(&self) -> i32 {
        0
    }
}

/// Sets the entry type from source-specific fields
pub type EntrytypeSetter = Arc<dyn Fn(&mut Record) + Send + Sync>;
/// Renames or drops source-specific fields
pub type FieldMapper = Arc<dyn Fn(&mut Record) + Send + Sync>;
/// Assigns the id of the record at the given position
pub type IdLabeler = Arc<dyn Fn(&mut Record, usize) + Send + Sync>;

/// Source-specific steps applied after parsing
#[derive(Clone, Default)]
pub struct LoadOptions {
    entrytype_setter: Option<EntrytypeSetter>,
    field_mapper: Option<FieldMapper>,
    id_labeler: Option<IdLabeler>,
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("entrytype_setter", &self.entrytype_setter.is_some())
            .field("field_mapper", &self.field_mapper.is_some())
            .field("id_labeler", &self.id_labeler.is_some())
            .finish()
    }
}

impl LoadOptions {
    /// Builder: set the entrytype setter
    #[must_use]
    pub fn with_entrytype_setter(mut self, f: impl Fn(&mut Record) + Send + Sync + 'static) -> Self {
        self.entrytype_setter = Some(Arc::new(f));
        self
    }

    /// Builder: set the field mapper
    #[must_use]
    pub fn with_field_mapper(mut self, f: impl Fn(&mut Record) + Send + Sync + 'static) -> Self {
        self.field_mapper = Some(Arc::new(f));
        self
    }

    /// Builder: set the id labeler
    #[must_use]
    pub fn with_id_labeler(mut self, f: impl Fn(&mut Record, usize) + Send + Sync + 'static) -> Self {
        self.id_labeler = Some(Arc::new(f));
        self
    }

    /// Builder: label records `000001`, `000002`, ... in file order
    #[must_use]
    pub fn with_incremental_ids(self) -> Self {
        self.with_id_labeler(|record, position| record.id = format!("{:06}", position + 1))
    }

    /// Run the sub-steps on parsed records
    ///
    /// Labeled ids that collide receive letter suffixes.
    #[must_use]
    pub fn apply(&self, records: RecordsDict) -> RecordsDict {
        let index = IdIndex::new();
        let mut out = RecordsDict::with_capacity(records.len());
        for (position, (_, mut record)) in records.into_iter().enumerate() {
            if let Some(setter) = &self.entrytype_setter {
                setter(&mut record);
            }
            if let Some(mapper) = &self.field_mapper {
                mapper(&mut record);
            }
            if let Some(labeler) = &self.id_labeler {
                labeler(&mut record, position);
            }
            if !index.insert(&record.id) {
                let unique = index.next_unique_id(&record.id);
                index.insert(&unique);
                record.id = unique;
            }
            out.insert(record.id.clone(), record);
        }
        out
    }
}

/// BibTeX parser
#[derive(Debug, Clone, Copy, Default)]
pub struct BibParser;

impl RecordParser for BibParser {
    fn name(&self) -> &'static str {
        "bib"
    }

    fn parse(&self, content: &str) -> Result<RecordsDict, ParseError> {
        bibtex::parse_str(content)
    }

    fn extensions(&self) -> &[&str] {
        &["bib"]
    }

    fn priority(&self) -> i32 {
        10
    }
}

/// RIS parser (`TY  - JOUR` ... `ER  - `)
#[derive(Debug, Clone, Copy, Default)]
pub struct RisParser;

fn ris_entry_type(tag: &str) -> EntryType {
    match tag {
        "JOUR" | "JFULL" | "MGZN" => EntryType::Article,
        "CONF" | "CPAPER" => EntryType::Inproceedings,
        "BOOK" | "EBOOK" => EntryType::Book,
        "CHAP" | "ECHAP" => EntryType::Incollection,
        "THES" => EntryType::Phdthesis,
        "RPRT" => EntryType::Techreport,
        "UNPB" => EntryType::Unpublished,
        _ => EntryType::Misc,
    }
}

#[derive(Default)]
struct RisEntry {
    entry_type: Option<EntryType>,
    id: Option<String>,
    authors: Vec<String>,
    keywords: Vec<String>,
    start_page: Option<String>,
    end_page: Option<String>,
    container: Option<String>,
    values: Vec<(&'static str, String)>,
}

impl RisEntry {
    fn into_record(self, position: usize) -> Record {
        let entry_type = self.entry_type.unwrap_or(EntryType::Misc);
        let id = self.id.unwrap_or_else(|| format!("{:06}", position + 1));
        let mut record = Record::new(id, entry_type.clone());
        for (key, value) in self.values {
            record.insert_raw(key, value);
        }
        if !self.authors.is_empty() {
            record.insert_raw(fields::AUTHOR, self.authors.join(" and "));
        }
        if !self.keywords.is_empty() {
            record.insert_raw(fields::KEYWORDS, self.keywords.join(", "));
        }
        if let Some(container) = self.container {
            let key = match entry_type {
                EntryType::Inproceedings | EntryType::Incollection => fields::BOOKTITLE,
                _ => fields::JOURNAL,
            };
            record.insert_raw(key, container);
        }
        match (self.start_page, self.end_page) {
            (Some(start), Some(end)) => record.insert_raw(fields::PAGES, format!("{start}--{end}")),
            (Some(start), None) => record.insert_raw(fields::PAGES, start),
            _ => {}
        }
        record
    }
}

impl RecordParser for RisParser {
    fn name(&self) -> &'static str {
        "ris"
    }

    fn parse(&self, content: &str) -> Result<RecordsDict, ParseError> {
        let mut records = Vec::new();
        let mut current: Option<RisEntry> = None;

        for (number, line) in content.lines().enumerate() {
            let line = line.trim_end();
            if line.trim().is_empty() {
                continue;
            }
            let Some((tag, value)) = line.split_once("  -") else {
                return Err(ParseError::syntax_error(number + 1, format!("not a RIS line: {line}")));
            };
            let tag = tag.trim();
            let value = value.trim().to_string();

            if tag == "TY" {
                current = Some(RisEntry {
                    entry_type: Some(ris_entry_type(&value)),
                    ..RisEntry::default()
                });
                continue;
            }
            if tag == "ER" {
                if let Some(entry) = current.take() {
                    records.push(entry.into_record(records.len()));
                }
                continue;
            }
            let Some(entry) = current.as_mut() else {
                return Err(ParseError::syntax_error(number + 1, "tag outside of a TY/ER block"));
            };
            match tag {
                "ID" => entry.id = Some(value),
                "AU" | "A1" => entry.authors.push(value),
                "KW" => entry.keywords.push(value),
                "SP" => entry.start_page = Some(value),
                "EP" => entry.end_page = Some(value),
                "JO" | "JF" | "T2" => {
                    entry.container.get_or_insert(value);
                }
                "TI" | "T1" => entry.values.push((fields::TITLE, value)),
                "PY" | "Y1" => entry
                    .values
                    .push((fields::YEAR, value.chars().take(4).collect())),
                "VL" => entry.values.push((fields::VOLUME, value)),
                "IS" => entry.values.push((fields::NUMBER, value)),
                "DO" => entry.values.push((fields::DOI, value.to_uppercase())),
                "UR" => entry.values.push((fields::URL, value)),
                "AB" => entry.values.push((fields::ABSTRACT, value)),
                "SN" => entry.values.push((fields::ISSN, value)),
                "PB" => entry.values.push((fields::PUBLISHER, value)),
                "LA" => entry.values.push((fields::LANGUAGE, value)),
                other => debug!(tag = other, "skipping RIS tag"),
            }
        }
        if current.is_some() {
            return Err(ParseError::syntax_error(content.lines().count(), "missing ER tag"));
        }
        Ok(records.into_iter().map(|r| (r.id.clone(), r)).collect())
    }

    fn extensions(&self) -> &[&str] {
        &["ris"]
    }
}

/// Parser registration for dynamic parser management
pub struct ParserRegistry {
    parsers: Vec<Box<dyn RecordParser>>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        default_parsers()
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("parser_count", &self.parsers.len())
            .field("extensions", &self.all_extensions())
            .finish()
    }
}

impl ParserRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Register a parser
    pub fn register<P: RecordParser>(&mut self, parser: P) {
        self.parsers.push(Box::new(parser));
        self.parsers.sort_by_key(|p| std::cmp::Reverse(p.priority()));
    }

    /// Find parser for path
    #[must_use]
    pub fn find_for_path(&self, path: &Path) -> Option<&dyn RecordParser> {
        self.parsers.iter().find(|p| p.can_parse(path)).map(|p| &**p)
    }

    /// Get all registered extensions
    #[must_use]
    pub fn all_extensions(&self) -> Vec<&str> {
        self.parsers
            .iter()
            .flat_map(|p| p.extensions())
            .copied()
            .collect()
    }

    /// Parse `content` as if it were read from `path`
    ///
    /// # Errors
    /// Returns [`ParseError::NoParserForExtension`] when no parser matches.
    pub fn parse(&self, path: &Path, content: &str, options: &LoadOptions) -> Result<RecordsDict, ParseError> {
        let parser = self.find_for_path(path).ok_or_else(|| {
            ParseError::NoParserForExtension(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or_default()
                    .to_string(),
            )
        })?;
        let records = parser.parse(content)?;
        debug!(parser = parser.name(), path = %path.display(), count = records.len(), "parsed records");
        Ok(options.apply(records))
    }

    /// Read and parse a file
    ///
    /// # Errors
    /// Returns [`ParseError::Io`] when the file cannot be read.
    pub fn load(&self, path: &Path, options: &LoadOptions) -> Result<RecordsDict, ParseError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParseError::io_error(path, e))?;
        self.parse(path, &content, options)
    }
}

/// Create default parser registry with built-in parsers
#[must_use]
pub fn default_parsers() -> ParserRegistry {
    let mut registry = ParserRegistry::new();
    registry.register(BibParser);
    registry.register(RisParser);
    registry
}
