//! Invalid-merge prevention
//!
//! Duplicates detected by similarity can still be distinct works: the parts
//! of a multi-part paper, or an article and the erratum that corrects it.

use crate::error::{MergeError, Result};
use colrev_record::{fields, Record};
use once_cell::sync::Lazy;
use regex::Regex;

static PART_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"part [A-Za-z0-9]+$").expect("static regex"));

/// Title terms that must appear on both sides or on neither
const TERMS_REQUIRED_TO_MATCH: [&str; 6] = [
    "erratum",
    "correction",
    "corrigendum",
    "comment",
    "commentary",
    "response",
];

fn part_marker(title: &str) -> Option<&str> {
    PART_RE.find(title).map(|m| m.as_str())
}

fn required_terms(title: &str) -> Vec<&'static str> {
    TERMS_REQUIRED_TO_MATCH
        .into_iter()
        .filter(|t| title.contains(t))
        .collect()
}

/// Refuse merges of records that describe different works
///
/// # Errors
/// Returns [`MergeError::InvalidMerge`] when the titles end in different
/// `part N` markers or when the erratum/comment terms differ.
pub fn prevent_invalid_merges(main: &Record, incoming: &Record) -> Result<()> {
    let title_a = main.get_or(fields::TITLE, "").to_lowercase();
    let title_b = incoming.get_or(fields::TITLE, "").to_lowercase();

    if part_marker(&title_a) != part_marker(&title_b) {
        return Err(MergeError::invalid_merge(
            &main.id,
            &incoming.id,
            "different parts of a multi-part work",
        ));
    }
    if required_terms(&title_a) != required_terms(&title_b) {
        return Err(MergeError::invalid_merge(
            &main.id,
            &incoming.id,
            "erratum, correction or comment on one side only",
        ));
    }
    Ok(())
}
