//! Record identity: `colrev_id` and table-of-contents keys
//!
//! A `colrev_id` is a canonical fingerprint of a record's identifying fields:
//!
//! ```text
//! colrev_id1:|a|mis-quarterly|44|1|2020|smith webster|a-study-of-reviews
//! ```
//!
//! Two records with the same identifying fields always produce the same id,
//! independent of their other fields.

use crate::constants::{fields, values, IDENTIFYING_FIELDS};
use crate::entry_type::EntryType;
use crate::error::{RecordError, Result};
use crate::prep::remove_accents;
use crate::record::Record;
use colrev_state::RecordState;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Version prefix of the identifiers produced by this crate
pub const COLREV_ID_PREFIX: &str = "colrev_id1:";

/// Title fragments that never identify a record
const NON_DISTINCT_TITLES: &[&str] = &["|minitrack-introduction"];

static NON_ALNUM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9a-zA-Z -]+").expect("static regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));
static DASHES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").expect("static regex"));
static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^colrev_id\d+:").expect("static regex"));

/// A parsed `colrev_id`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColrevId(String);

impl ColrevId {
    /// Parse an identifier, refusing versions other than `colrev_id1:`
    ///
    /// # Errors
    /// Returns [`RecordError::UnsupportedIdVersion`] for unknown prefixes.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.starts_with(COLREV_ID_PREFIX) {
            return Ok(Self(s.to_string()));
        }
        let version = VERSION_RE
            .find(s)
            .map_or_else(|| s.to_string(), |m| m.as_str().to_string());
        Err(RecordError::UnsupportedIdVersion(version))
    }

    /// Identifier string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ColrevId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ColrevId {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ColrevId {
    type Error = RecordError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ColrevId> for String {
    fn from(id: ColrevId) -> Self {
        id.0
    }
}

/// Normalize one token and append it with a `|` separator
fn robust_append(out: &mut String, token: &str) {
    let token = token
        .replace(['\n', '/'], " ")
        .trim()
        .replace('\u{2013}', " ")
        .replace("emph{", "")
        .replace("&amp;", "and")
        .replace(" & ", " and ");
    let token = remove_accents(&token);
    let token = NON_ALNUM_RE.replace_all(&token, "");
    let token = WHITESPACE_RE.replace_all(&token, "-");
    let token = DASHES_RE.replace_all(&token, "-").to_lowercase();
    let token = if token.len() > 1 {
        token.trim_end_matches('-')
    } else {
        token.as_str()
    };
    out.push('|');
    out.push_str(token);
}

/// Family names of an author field, in order
///
/// Handles `Last, First`, `First Last` and last-name-only (`Webster,`) forms.
#[must_use]
pub fn family_names(author: &str) -> Vec<String> {
    let author = author.replace('\n', " ").replace('\'', "");
    author
        .replace("; ", " and ")
        .split(" and ")
        .filter_map(|name| {
            let name = name.trim();
            let family = match name.split_once(',') {
                Some((last, _)) => last.trim(),
                None => name.split_whitespace().last().unwrap_or(""),
            };
            (family.chars().count() > 1).then(|| family.to_string())
        })
        .collect()
}

fn required<'a>(record: &'a Record, key: &str) -> Result<&'a str> {
    record
        .get(key)
        .ok_or_else(|| RecordError::not_enough_data([key]))
}

fn container_title(record: &Record) -> Result<&str> {
    match record.entry_type {
        EntryType::Phdthesis | EntryType::Mastersthesis => required(record, fields::SCHOOL),
        EntryType::Techreport => required(record, fields::INSTITUTION),
        EntryType::Inproceedings => required(record, fields::BOOKTITLE),
        EntryType::Article => required(record, fields::JOURNAL),
        _ => record
            .get(fields::SERIES)
            .or_else(|| record.get(fields::URL))
            .ok_or_else(|| RecordError::not_enough_data([fields::SERIES])),
    }
}

fn check_preconditions(record: &Record, assume_complete: bool) -> Result<()> {
    if assume_complete {
        return Ok(());
    }
    if record.status() < RecordState::MdPrepared {
        return Err(RecordError::not_enough_data([
            "colrev_status/field_requirements",
        ]));
    }
    if let Some(key) = IDENTIFYING_FIELDS
        .iter()
        .find(|k| record.get(k) == Some(values::UNKNOWN))
    {
        return Err(RecordError::not_enough_data([*key]));
    }
    Ok(())
}

fn build_colrev_id(record: &Record) -> Result<String> {
    let mut id = String::from(COLREV_ID_PREFIX);
    let type_token = match record.entry_type {
        EntryType::Article => "a".to_string(),
        EntryType::Inproceedings => "p".to_string(),
        ref other => other.as_str().to_lowercase(),
    };
    robust_append(&mut id, &type_token);
    robust_append(&mut id, container_title(record)?);

    if record.entry_type == EntryType::Article {
        robust_append(&mut id, record.get_or(fields::VOLUME, "-"));
        robust_append(&mut id, record.get_or(fields::NUMBER, "-"));
    }
    robust_append(&mut id, required(record, fields::YEAR)?);

    let authors = family_names(required(record, fields::AUTHOR)?).join(" ");
    if authors.replace('-', "").is_empty() {
        return Err(RecordError::not_enough_data([fields::AUTHOR]));
    }
    robust_append(&mut id, &authors);
    robust_append(&mut id, required(record, fields::TITLE)?);

    Ok(id.replace(';', ""))
}

fn toc_normalize(value: &str) -> String {
    value
        .replace(' ', "-")
        .replace('\\', "")
        .replace('&', "and")
        .to_lowercase()
}

impl Record {
    /// Canonical identifier of the record
    ///
    /// Without `assume_complete`, records before `md_prepared` and records
    /// with `UNKNOWN` identifying fields are refused.
    ///
    /// # Errors
    /// Returns [`RecordError::NotEnoughDataToIdentify`] listing the fields
    /// that prevent identification.
    pub fn colrev_id(&self, assume_complete: bool) -> Result<ColrevId> {
        check_preconditions(self, assume_complete)?;
        let id = build_colrev_id(self)?;
        if NON_DISTINCT_TITLES.iter().any(|t| id.contains(t)) {
            return Err(RecordError::not_enough_data([fields::TITLE]));
        }
        Ok(ColrevId(id))
    }

    /// Table-of-contents key (`journal|volume|number` or `booktitle|year`)
    ///
    /// # Errors
    /// Returns [`RecordError::NotTocIdentifiable`] for other entry types or
    /// when the container is missing.
    pub fn toc_key(&self) -> Result<String> {
        let missing = |key: &str| RecordError::NotTocIdentifiable(format!("missing key {key}"));
        let part = |key: &str| match self.get(key) {
            Some(v) if v != values::UNKNOWN => v.to_string(),
            _ => "-".to_string(),
        };
        match self.entry_type {
            EntryType::Article => {
                let journal = self.get(fields::JOURNAL).ok_or_else(|| missing(fields::JOURNAL))?;
                Ok(format!(
                    "{}|{}|{}",
                    toc_normalize(journal),
                    part(fields::VOLUME),
                    part(fields::NUMBER)
                ))
            }
            EntryType::Inproceedings => {
                let booktitle = self
                    .get(fields::BOOKTITLE)
                    .ok_or_else(|| missing(fields::BOOKTITLE))?;
                Ok(format!(
                    "{}|{}",
                    toc_normalize(booktitle),
                    self.get_or(fields::YEAR, "")
                ))
            }
            ref other => Err(RecordError::NotTocIdentifiable(format!(
                "ENTRYTYPE {other} ({}) not toc-identifiable",
                self.id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn article() -> Record {
        Record::new("Smith2020", EntryType::Article)
            .with_field(fields::TITLE, "A Study of Reviews: Müller & Co")
            .with_field(fields::AUTHOR, "Smith, John and Webster, Jane")
            .with_field(fields::YEAR, "2020")
            .with_field(fields::JOURNAL, "MIS Quarterly")
            .with_field(fields::VOLUME, "44")
            .with_field(fields::NUMBER, "1")
            .with_status(RecordState::MdPrepared)
    }

    #[test]
    fn article_id() {
        let id = article().colrev_id(false).unwrap();
        assert_eq!(
            id.as_str(),
            "colrev_id1:|a|mis-quarterly|44|1|2020|smith-webster|a-study-of-reviews-muller-and-co"
        );
    }

    #[test]
    fn inproceedings_uses_booktitle_without_volume() {
        let r = Record::new("x", EntryType::Inproceedings)
            .with_field(fields::TITLE, "Design")
            .with_field(fields::AUTHOR, "Jane Doe")
            .with_field(fields::YEAR, "2019")
            .with_field(fields::BOOKTITLE, "ICIS");
        assert_eq!(
            r.colrev_id(true).unwrap().as_str(),
            "colrev_id1:|p|icis|2019|doe|design"
        );
    }

    #[test]
    fn missing_volume_becomes_dash() {
        let mut r = article();
        r.remove_field(fields::VOLUME);
        assert!(r.colrev_id(false).unwrap().as_str().contains("|-|1|"));
    }

    #[test]
    fn refuses_before_md_prepared() {
        let r = article().with_status(RecordState::MdImported);
        let err = r.colrev_id(false).unwrap_err();
        assert!(matches!(
            err,
            RecordError::NotEnoughDataToIdentify { ref missing } if missing == &["colrev_status/field_requirements"]
        ));
        assert!(r.colrev_id(true).is_ok());
    }

    #[test]
    fn refuses_unknown_identifying_field() {
        let r = article().with_field(fields::PAGES, values::UNKNOWN);
        assert!(matches!(
            r.colrev_id(false),
            Err(RecordError::NotEnoughDataToIdentify { missing }) if missing == ["pages"]
        ));
    }

    #[test]
    fn refuses_non_distinct_titles() {
        let r = article().with_field(fields::TITLE, "Minitrack Introduction");
        assert!(r.colrev_id(false).is_err());
    }

    #[test]
    fn missing_container_is_reported() {
        let mut r = article();
        r.remove_field(fields::JOURNAL);
        assert!(matches!(
            r.colrev_id(true),
            Err(RecordError::NotEnoughDataToIdentify { missing }) if missing == ["journal"]
        ));
    }

    #[test]
    fn id_ignores_non_identifying_fields() {
        let a = article();
        let b = article().with_field(fields::DOI, "10.1/x").with_field(fields::ABSTRACT, "text");
        assert_eq!(a.colrev_id(false).unwrap(), b.colrev_id(false).unwrap());
    }

    #[test]
    fn parse_refuses_other_versions() {
        assert!(ColrevId::parse("colrev_id1:|a|x").is_ok());
        assert!(matches!(
            ColrevId::parse("colrev_id2:|a|x"),
            Err(RecordError::UnsupportedIdVersion(v)) if v == "colrev_id2:"
        ));
    }

    #[test]
    fn family_names_handle_both_orders() {
        assert_eq!(
            family_names("Smith, John and Jane Webster and Watson,"),
            vec!["Smith", "Webster", "Watson"]
        );
    }

    #[test]
    fn toc_keys() {
        assert_eq!(article().toc_key().unwrap(), "mis-quarterly|44|1");
        let r = article().with_field(fields::NUMBER, values::UNKNOWN);
        assert_eq!(r.toc_key().unwrap(), "mis-quarterly|44|-");
        let r = Record::new("x", EntryType::Inproceedings)
            .with_field(fields::BOOKTITLE, "ICIS & More")
            .with_field(fields::YEAR, "2019");
        assert_eq!(r.toc_key().unwrap(), "icis-and-more|2019");
        let r = Record::new("x", EntryType::Book);
        assert!(matches!(r.toc_key(), Err(RecordError::NotTocIdentifiable(_))));
    }
}
