//! Bibliographic entry types

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Entry type of a record (`@article`, `@inproceedings`, ...)
///
/// Unrecognized types are kept verbatim in [`EntryType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntryType {
    /// Journal article
    Article,
    /// Conference paper
    Inproceedings,
    /// Chapter in an edited volume
    Incollection,
    /// Part of a book
    Inbook,
    /// Conference proceedings
    Proceedings,
    /// Book
    Book,
    /// Doctoral thesis
    Phdthesis,
    /// Master's thesis
    Mastersthesis,
    /// Bachelor's thesis
    Bachelorthesis,
    /// Thesis of unspecified level
    Thesis,
    /// Technical report
    Techreport,
    /// Unpublished manuscript
    Unpublished,
    /// Miscellaneous
    #[default]
    Misc,
    /// Software
    Software,
    /// Online resource
    Online,
    /// Conference (legacy alias of inproceedings)
    Conference,
    /// Any other type
    Other(String),
}

impl EntryType {
    /// Canonical lowercase name
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Article => "article",
            Self::Inproceedings => "inproceedings",
            Self::Incollection => "incollection",
            Self::Inbook => "inbook",
            Self::Proceedings => "proceedings",
            Self::Book => "book",
            Self::Phdthesis => "phdthesis",
            Self::Mastersthesis => "mastersthesis",
            Self::Bachelorthesis => "bachelorthesis",
            Self::Thesis => "thesis",
            Self::Techreport => "techreport",
            Self::Unpublished => "unpublished",
            Self::Misc => "misc",
            Self::Software => "software",
            Self::Online => "online",
            Self::Conference => "conference",
            Self::Other(s) => s,
        }
    }

    /// Parse a type name (case-insensitive)
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "article" => Self::Article,
            "inproceedings" => Self::Inproceedings,
            "incollection" => Self::Incollection,
            "inbook" => Self::Inbook,
            "proceedings" => Self::Proceedings,
            "book" => Self::Book,
            "phdthesis" => Self::Phdthesis,
            "mastersthesis" | "masterthesis" => Self::Mastersthesis,
            "bachelorthesis" => Self::Bachelorthesis,
            "thesis" => Self::Thesis,
            "techreport" => Self::Techreport,
            "unpublished" => Self::Unpublished,
            "misc" => Self::Misc,
            "software" => Self::Software,
            "online" => Self::Online,
            "conference" => Self::Conference,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether the type has a quality-rule specification
    #[inline]
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Thesis types (single author expected)
    #[inline]
    #[must_use]
    pub fn is_thesis(&self) -> bool {
        matches!(
            self,
            Self::Phdthesis | Self::Mastersthesis | Self::Bachelorthesis | Self::Thesis
        )
    }
}

impl Display for EntryType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for EntryType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<&str> for EntryType {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<EntryType> for String {
    fn from(t: EntryType) -> Self {
        t.as_str().to_string()
    }
}
