//! BibTeX codec
//!
//! Reads and writes the records file and the feed files. The writer is
//! deterministic so that Git diffs stay minimal:
//!
//! - header fields first (origin, status, provenance, ids, screening, file, doi)
//! - identifying fields in canonical order
//! - every other field in insertion order
//! - list fields (origin, provenance) one `;`-terminated item per line
//!
//! The reader repairs what the pipeline itself may have produced: duplicate
//! ids get letter suffixes and whitespace in ids and field names becomes `_`.

use crate::error::{ParseError, SerializeError};
use colrev_ids::IdIndex;
use colrev_record::{
    fields, EntryType, FieldProvenance, ProvenanceMap, Record, RecordsDict, IDENTIFYING_FIELDS,
};
use colrev_state::RecordState;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Column width reserved for field names
const FIELD_PAD: usize = 28;

/// Indent of continuation lines in list fields (`   ` + padded name + `= {`)
const LIST_INDENT: usize = 3 + FIELD_PAD + 2 + 3;

/// Fields written before the masterdata, in this order
const LEADING_FIELDS: [&str; 6] = [
    fields::COLREV_ID,
    fields::PDF_ID,
    fields::SCREENING_CRITERIA,
    fields::FILE,
    fields::PRESCREEN_EXCLUSION,
    fields::DOI,
];

/// One `@type{key, ...}` block as read from the file
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawEntry {
    entry_type: String,
    key: String,
    fields: Vec<(String, String)>,
    line: usize,
}

struct Scanner<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.bump() {
            if c == '\n' {
                break;
            }
        }
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&keep) {
            self.bump();
        }
        &self.text[start..self.pos]
    }

    fn expect(&mut self, expected: char, line: usize) -> Result<(), ParseError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(ParseError::syntax_error(
                line,
                format!("expected '{expected}', found '{c}'"),
            )),
            None => Err(ParseError::syntax_error(line, "unterminated entry")),
        }
    }

    /// Content of a `{...}` group; the opening brace is consumed already
    fn braced(&mut self, line: usize) -> Result<&'a str, ParseError> {
        let start = self.pos;
        let mut depth = 1usize;
        loop {
            let end = self.pos;
            match self.bump() {
                Some('{') => depth += 1,
                Some('}') => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(&self.text[start..end]);
                    }
                }
                Some(_) => {}
                None => return Err(ParseError::syntax_error(line, "unbalanced braces")),
            }
        }
    }

    /// Content of a `"..."` value; the opening quote is consumed already
    fn quoted(&mut self, line: usize) -> Result<&'a str, ParseError> {
        let start = self.pos;
        let mut depth = 0usize;
        let mut escaped = false;
        loop {
            let end = self.pos;
            match self.bump() {
                Some('{') => depth += 1,
                Some('}') => depth = depth.saturating_sub(1),
                Some('"') if depth == 0 && !escaped => return Ok(&self.text[start..end]),
                Some(_) => {}
                None => return Err(ParseError::syntax_error(line, "unterminated quote")),
            }
            escaped = self.text[..self.pos].ends_with('\\');
        }
    }

    /// A field value, including `#` concatenations
    fn value(&mut self, line: usize) -> Result<String, ParseError> {
        let mut out = String::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some('{') => {
                    self.bump();
                    out.push_str(self.braced(line)?);
                }
                Some('"') => {
                    self.bump();
                    out.push_str(self.quoted(line)?);
                }
                Some(c) if c.is_alphanumeric() => {
                    out.push_str(self.take_while(|c| {
                        c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '/')
                    }));
                }
                _ => return Err(ParseError::syntax_error(line, "expected field value")),
            }
            self.skip_ws();
            if self.peek() == Some('#') {
                self.bump();
                continue;
            }
            return Ok(out);
        }
    }

    fn entry(&mut self) -> Result<Option<RawEntry>, ParseError> {
        let line = self.line;
        let entry_type = self
            .take_while(|c| c.is_alphanumeric() || c == '_')
            .to_lowercase();
        self.skip_ws();
        let close = match self.bump() {
            Some('{') => '}',
            Some('(') => ')',
            _ => return Err(ParseError::syntax_error(line, "expected '{' after entry type")),
        };

        if matches!(entry_type.as_str(), "comment" | "preamble" | "string") {
            self.braced(line)?;
            return Ok(None);
        }

        let key = self
            .take_while(|c| c != ',' && c != close)
            .trim()
            .to_string();
        let mut entry = RawEntry {
            entry_type,
            key,
            fields: Vec::new(),
            line,
        };
        match self.bump() {
            Some(',') => {}
            Some(_) => return Ok(Some(entry)),
            None => return Err(ParseError::syntax_error(line, "unterminated entry")),
        }

        loop {
            self.skip_ws();
            match self.peek() {
                Some(c) if c == close => {
                    self.bump();
                    return Ok(Some(entry));
                }
                Some(',') => {
                    self.bump();
                    continue;
                }
                Some(_) => {}
                None => return Err(ParseError::syntax_error(line, "unterminated entry")),
            }
            let name = self
                .take_while(|c| c != '=' && c != ',' && c != close)
                .trim()
                .to_string();
            if name.is_empty() {
                return Err(ParseError::syntax_error(self.line, "empty field name"));
            }
            self.expect('=', self.line)?;
            let value = self.value(self.line)?;
            entry.fields.push((name, value));
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(c) if c == close => {}
                Some(c) => {
                    return Err(ParseError::syntax_error(
                        self.line,
                        format!("unexpected '{c}' after field value"),
                    ))
                }
                None => return Err(ParseError::syntax_error(line, "unterminated entry")),
            }
        }
    }

    fn entries(mut self) -> Result<Vec<RawEntry>, ParseError> {
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Ok(entries),
                Some('@') => {
                    self.bump();
                    if let Some(entry) = self.entry()? {
                        entries.push(entry);
                    }
                }
                // comments and text between entries
                Some(_) => self.skip_line(),
            }
        }
    }
}

fn replace_whitespace(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_whitespace() || c == ';' { '_' } else { c })
        .collect()
}

/// Items of a `;`-separated list field
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `key:source;note;` items of a provenance field
///
/// Items may be separated by newlines or by a space.
///
/// # Errors
/// Returns [`ParseError::InvalidProvenance`] for an item without `:`.
pub fn parse_provenance(id: &str, value: &str) -> Result<ProvenanceMap, ParseError> {
    let mut pieces: Vec<&str> = value.split(';').map(str::trim).collect();
    if pieces.last().is_some_and(|p| p.is_empty()) {
        pieces.pop();
    }
    let mut map = ProvenanceMap::new();
    for pair in pieces.chunks(2) {
        let head = pair[0];
        if head.is_empty() {
            continue;
        }
        let note = pair.get(1).copied().unwrap_or_default();
        let Some((key, source)) = head.split_once(':') else {
            return Err(ParseError::InvalidProvenance {
                id: id.to_string(),
                item: head.to_string(),
            });
        };
        map.insert(key.trim().to_string(), FieldProvenance::with_note(source, note));
    }
    Ok(map)
}

fn into_record(entry: RawEntry) -> Result<Record, ParseError> {
    let id = entry.key;
    let mut status = None;
    let mut md_prov = ProvenanceMap::new();
    let mut d_prov = ProvenanceMap::new();
    let mut origins = Vec::new();
    let mut values = Vec::new();

    for (key, value) in entry.fields {
        let key = if key.chars().any(char::is_whitespace) {
            let fixed = replace_whitespace(&key);
            debug!(id = %id, "Fix whitespace in field name: {key} >> {fixed}");
            fixed
        } else {
            key
        };
        match key.as_str() {
            fields::ORIGIN => origins = split_list(&value),
            fields::STATUS => {
                let parsed: RecordState =
                    value.trim().parse().map_err(|_| ParseError::InvalidStatus {
                        id: id.clone(),
                        value: value.clone(),
                    })?;
                status = Some(parsed);
            }
            fields::MD_PROV => md_prov = parse_provenance(&id, &value)?,
            fields::D_PROV => d_prov = parse_provenance(&id, &value)?,
            fields::DOI => values.push((key, value.to_uppercase())),
            _ => values.push((key, value)),
        }
    }

    let mut record = Record::new(id, EntryType::parse(&entry.entry_type));
    if let Some(status) = status {
        record = record.with_status(status);
    }
    for (key, prov) in d_prov {
        record = record.with_d_prov(key, prov);
    }
    record.replace_md_prov(md_prov);
    for origin in origins {
        record.add_origin(origin);
    }
    for (key, value) in values {
        record.insert_raw(key, value);
    }
    Ok(record)
}

/// Parse BibTeX text into records keyed by id
///
/// # Errors
/// Returns [`ParseError`] for malformed entries, unknown status values and
/// malformed provenance items.
pub fn parse_str(text: &str) -> Result<RecordsDict, ParseError> {
    let entries = Scanner::new(text).entries()?;
    let index = IdIndex::new();
    let mut records = RecordsDict::with_capacity(entries.len());

    for mut entry in entries {
        if entry.key.chars().any(|c| c.is_whitespace() || c == ';') {
            let fixed = replace_whitespace(&entry.key);
            debug!("Fix invalid ID: {} >> {fixed}", entry.key);
            entry.key = fixed;
        }
        if entry.key.is_empty() {
            return Err(ParseError::syntax_error(entry.line, "entry without id"));
        }
        if !index.insert(&entry.key) {
            let fixed = index.next_unique_id(&entry.key);
            index.insert(&fixed);
            warn!("Fix duplicate ID: {} >> {fixed}", entry.key);
            entry.key = fixed;
        }
        let record = into_record(entry)?;
        records.insert(record.id.clone(), record);
    }
    Ok(records)
}

fn push_field(out: &mut String, key: &str, value: &str) {
    let pad = " ".repeat(2 + FIELD_PAD.saturating_sub(key.len()));
    out.push_str(",\n   ");
    out.push_str(key);
    out.push_str(&pad);
    out.push_str("= {");
    out.push_str(value);
    out.push('}');
}

fn join_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let separator = format!("\n{}", " ".repeat(LIST_INDENT));
    items
        .into_iter()
        .map(|item| {
            let item = item.as_ref().trim_end();
            if item.ends_with(';') {
                item.to_string()
            } else {
                format!("{item};")
            }
        })
        .collect::<Vec<_>>()
        .join(&separator)
}

fn provenance_items(map: &ProvenanceMap, sort_notes: bool) -> Vec<String> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|key| {
            let prov = &map[key];
            format!("{key}:{};{};", prov.source, prov.notes.to_note_string(sort_notes))
        })
        .collect()
}

/// Serialize one record
#[must_use]
pub fn record_to_string(record: &Record) -> String {
    let mut out = format!("@{}{{{}", record.entry_type, record.id);

    if !record.origins().is_empty() {
        push_field(&mut out, fields::ORIGIN, &join_list(record.origins()));
    }
    if let Some(status) = record.stored_status() {
        push_field(&mut out, fields::STATUS, status.as_str());
    }
    if !record.md_prov().is_empty() {
        push_field(
            &mut out,
            fields::MD_PROV,
            &join_list(provenance_items(record.md_prov(), true)),
        );
    }
    if !record.d_prov().is_empty() {
        push_field(
            &mut out,
            fields::D_PROV,
            &join_list(provenance_items(record.d_prov(), false)),
        );
    }

    let ordered = LEADING_FIELDS.iter().chain(IDENTIFYING_FIELDS.iter());
    for key in ordered.clone() {
        if let Some(value) = record.get(key) {
            push_field(&mut out, key, value);
        }
    }
    let written: HashSet<&str> = ordered.copied().collect();
    for (key, value) in record.fields() {
        if !written.contains(key.as_str()) {
            push_field(&mut out, key, value);
        }
    }
    out.push_str("\n}\n");
    out
}

/// Check that ids are unique (case-insensitive) and match their keys
///
/// # Errors
/// Returns [`SerializeError::KeyMismatch`] or [`SerializeError::DuplicateIds`].
pub fn check_ids(records: &RecordsDict) -> Result<(), SerializeError> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for (key, record) in records {
        if key != &record.id {
            return Err(SerializeError::KeyMismatch {
                key: key.clone(),
                id: record.id.clone(),
            });
        }
        if !seen.insert(key.to_lowercase()) {
            duplicates.push(key.clone());
        }
    }
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(SerializeError::DuplicateIds(duplicates))
    }
}

/// Serialize records in map order, one blank line between entries
///
/// # Errors
/// Returns [`SerializeError`] when ids are not unique.
pub fn to_string(records: &RecordsDict) -> Result<String, SerializeError> {
    check_ids(records)?;
    Ok(records
        .values()
        .map(record_to_string)
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Entry keys from the `@type{key,` lines, without a full parse
#[must_use]
pub fn entry_ids(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| line.chars().take(5).any(|c| c == '@'))
        .filter_map(|line| {
            let start = line.find('{')? + 1;
            let end = line.rfind(',').unwrap_or(line.len());
            (start <= end).then(|| line[start..end].trim().to_string())
        })
        .filter(|id| !id.is_empty())
        .collect()
}
