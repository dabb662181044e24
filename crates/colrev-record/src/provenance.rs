//! Provenance side-tables
//!
//! Every field value is accompanied by a [`FieldProvenance`]: the source that
//! supplied the value and the set of defect codes attached to it. Identifying
//! fields live in the masterdata table, all others in the data table.

use crate::constants::defects::{self, IGNORE_PREFIX};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered, duplicate-free set of defect codes for one field
///
/// A code may be acknowledged as `IGNORE:<code>`; an acknowledged code is never
/// re-added as an active defect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteSet(Vec<String>);

impl NoteSet {
    /// Empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse a comma-separated note string
    #[must_use]
    pub fn parse(note: &str) -> Self {
        let mut set = Self::new();
        for code in note.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            if !set.0.iter().any(|c| c == code) {
                set.0.push(code.to_string());
            }
        }
        set
    }

    /// Add a code, returning whether the set changed
    ///
    /// No-op when the code is already present or acknowledged.
    pub fn insert(&mut self, code: &str) -> bool {
        let code = code.trim();
        if code.is_empty() || self.contains(code) {
            return false;
        }
        if !code.starts_with(IGNORE_PREFIX) && self.is_ignored(code) {
            return false;
        }
        self.0.push(code.to_string());
        true
    }

    /// Remove a code together with its `IGNORE:` form
    pub fn remove(&mut self, code: &str) -> bool {
        let ignore = defects::ignore(code);
        let before = self.0.len();
        self.0.retain(|c| c != code && *c != ignore);
        self.0.len() != before
    }

    /// Remove only the active form of a code
    pub fn remove_active(&mut self, code: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|c| c != code);
        self.0.len() != before
    }

    /// Replace any active form by `IGNORE:<code>`
    pub fn ignore(&mut self, code: &str) {
        self.remove_active(code);
        let ignore = defects::ignore(code);
        if !self.contains(&ignore) {
            self.0.push(ignore);
        }
    }

    /// Whether the exact code (active or `IGNORE:` form) is present
    #[inline]
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.0.iter().any(|c| c == code)
    }

    /// Whether `IGNORE:<code>` is present
    #[must_use]
    pub fn is_ignored(&self, code: &str) -> bool {
        self.0
            .iter()
            .any(|c| c.strip_prefix(IGNORE_PREFIX) == Some(code))
    }

    /// Whether `code` is present as an active defect
    #[inline]
    #[must_use]
    pub fn has_active(&self, code: &str) -> bool {
        self.contains(code) && !code.starts_with(IGNORE_PREFIX)
    }

    /// Active (non-ignored) codes
    pub fn active(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .map(String::as_str)
            .filter(|c| !c.starts_with(IGNORE_PREFIX))
    }

    /// Whether any active code is present
    #[inline]
    #[must_use]
    pub fn has_any_active(&self) -> bool {
        self.active().next().is_some()
    }

    /// All codes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of codes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Remove all codes
    #[inline]
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Comma-separated form; `sorted` orders codes lexicographically
    #[must_use]
    pub fn to_note_string(&self, sorted: bool) -> String {
        let mut codes: Vec<&str> = self.iter().collect();
        if sorted {
            codes.sort_unstable();
        }
        codes.join(",")
    }
}

impl<'a> FromIterator<&'a str> for NoteSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = Self::new();
        for code in iter {
            set.insert(code);
        }
        set
    }
}

/// Source and defect notes of one field
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldProvenance {
    /// Origin of the value, `|`-separated edit history
    pub source: String,
    /// Defect codes
    #[serde(default)]
    pub notes: NoteSet,
}

impl FieldProvenance {
    /// Entry with a source and no notes
    #[inline]
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            notes: NoteSet::new(),
        }
    }

    /// Entry with a source and a comma-separated note string
    #[must_use]
    pub fn with_note(source: impl Into<String>, note: &str) -> Self {
        Self {
            source: source.into(),
            notes: NoteSet::parse(note),
        }
    }
}

/// Field name to provenance, in insertion order
pub type ProvenanceMap = IndexMap<String, FieldProvenance>;
