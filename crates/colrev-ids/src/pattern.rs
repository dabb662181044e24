//! Id patterns

use colrev_record::prep::{format_author_field, remove_accents};
use colrev_record::{fields, Record};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

static PARENTHESIZED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*\)").expect("static regex"));
static NON_ALNUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9a-zA-Z]+").expect("static regex"));

const ANONYMOUS: &str = "Anonymous";
const NO_YEAR: &str = "NoYear";
const ET_AL: &str = "EtAl";

/// How record ids are built from the masterdata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdPattern {
    /// `Webster2002`
    #[default]
    FirstAuthorYear,
    /// `WebsterWatson2002`, `ABCEtAl2002` with more than three authors
    ThreeAuthorsYear,
}

impl Display for IdPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FirstAuthorYear => "first_author_year",
            Self::ThreeAuthorsYear => "three_authors_year",
        })
    }
}

fn family_name(author: &str) -> String {
    author
        .split_once(',')
        .map_or(author, |(last, _)| last)
        .replace(' ', "")
}

impl IdPattern {
    /// Id candidate for a record, before collision handling
    #[must_use]
    pub fn generate(self, record: &Record) -> String {
        let names = record
            .get(fields::AUTHOR)
            .filter(|a| !a.is_empty())
            .or_else(|| record.get(fields::EDITOR).filter(|e| !e.is_empty()));
        let authors: Vec<String> = match names {
            Some(names) => format_author_field(names)
                .split(" and ")
                .map(family_name)
                .collect(),
            None => vec![ANONYMOUS.to_string()],
        };
        let year = record.get_or(fields::YEAR, NO_YEAR);

        let mut id = match self {
            Self::FirstAuthorYear => {
                format!("{}{year}", authors.first().map_or(ANONYMOUS, String::as_str))
            }
            Self::ThreeAuthorsYear => {
                let mut id: String = authors.iter().take(3).map(String::as_str).collect();
                if authors.len() > 3 {
                    id.push_str(ET_AL);
                }
                id.push_str(year);
                id
            }
        };

        let has_lower = id.chars().any(char::is_lowercase);
        if id.chars().any(char::is_uppercase) && !has_lower {
            id = capitalize(&id);
        }
        let id = remove_accents(&id);
        let id = PARENTHESIZED_RE.replace_all(&id, "");
        NON_ALNUM_RE.replace_all(&id, "").into_owned()
    }
}

fn capitalize(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colrev_record::EntryType;
    use pretty_assertions::assert_eq;

    fn record(author: &str, year: &str) -> Record {
        Record::new("x", EntryType::Article)
            .with_field(fields::AUTHOR, author)
            .with_field(fields::YEAR, year)
    }

    #[test]
    fn first_author_year() {
        let r = record("Webster, Jane and Watson, Richard T.", "2002");
        assert_eq!(IdPattern::FirstAuthorYear.generate(&r), "Webster2002");
    }

    #[test]
    fn three_authors_year_with_et_al() {
        let r = record("Aa, A. and Bb, B. and Cc, C. and Dd, D.", "2010");
        assert_eq!(IdPattern::ThreeAuthorsYear.generate(&r), "AaBbCcEtAl2010");
        let r = record("Aa, A. and Bb, B.", "2010");
        assert_eq!(IdPattern::ThreeAuthorsYear.generate(&r), "AaBb2010");
    }

    #[test]
    fn defaults_and_cleanup() {
        let r = Record::new("x", EntryType::Misc);
        assert_eq!(IdPattern::FirstAuthorYear.generate(&r), "AnonymousNoYear");

        let r = record("Müller-Lüdenscheidt, K.", "2020");
        assert_eq!(IdPattern::FirstAuthorYear.generate(&r), "MullerLudenscheidt2020");

        let r = record("van der Aalst, Wil", "2016");
        assert_eq!(IdPattern::FirstAuthorYear.generate(&r), "vanderAalst2016");
    }

    #[test]
    fn editors_stand_in_for_authors() {
        let r = Record::new("x", EntryType::Proceedings)
            .with_field(fields::EDITOR, "Rai, Arun")
            .with_field(fields::YEAR, "2020");
        assert_eq!(IdPattern::FirstAuthorYear.generate(&r), "Rai2020");
    }

    #[test]
    fn pattern_names() {
        assert_eq!(IdPattern::ThreeAuthorsYear.to_string(), "three_authors_year");
        assert_eq!(IdPattern::default(), IdPattern::FirstAuthorYear);
    }
}
