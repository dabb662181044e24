//! Similarity between records
//!
//! String ratios are normalized Levenshtein similarities in `[0, 1]`.

use crate::constants::{fields, values};
use crate::entry_type::EntryType;
use crate::record::Record;
use strsim::normalized_levenshtein;

/// Titles shared by many distinct papers; other fields carry more weight
const NON_DISTINCT_TITLES: &[&str] = &[
    "editorial",
    "editorial introduction",
    "editorial notes",
    "editor's comments",
    "book reviews",
    "editorial note",
    "reviewer ackowledgment",
];

const JOURNAL_WEIGHTS: [f64; 6] = [0.2, 0.25, 0.13, 0.2, 0.12, 0.1];
const NON_DISTINCT_WEIGHTS: [f64; 6] = [0.175, 0.0, 0.175, 0.175, 0.275, 0.2];
const OTHER_WEIGHTS: [f64; 4] = [0.15, 0.75, 0.05, 0.05];

/// String similarity in `[0, 1]`
#[inline]
#[must_use]
pub fn ratio(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b)
}

fn change_string(record: &Record) -> String {
    format!(
        "{} ({}) {}. {}{}, {} ({})",
        record.get_or(fields::AUTHOR, ""),
        record.get_or(fields::YEAR, ""),
        record.get_or(fields::TITLE, ""),
        record.get_or(fields::JOURNAL, ""),
        record.get_or(fields::BOOKTITLE, ""),
        record.get_or(fields::VOLUME, ""),
        record.get_or(fields::NUMBER, ""),
    )
    .to_lowercase()
}

/// How much a record changed: `0.0` for identical citations
#[must_use]
pub fn get_record_change_score(a: &Record, b: &Record) -> f64 {
    1.0 - ratio(&change_string(a), &change_string(b))
}

/// Field value with `UNKNOWN` treated as empty
fn known<'a>(record: &'a Record, key: &str) -> &'a str {
    match record.get(key) {
        Some(v) if v != values::UNKNOWN => v,
        _ => "",
    }
}

fn container(record: &Record) -> String {
    [fields::JOURNAL, fields::BOOKTITLE, fields::SERIES]
        .iter()
        .map(|k| known(record, k))
        .collect()
}

fn normalized_title(record: &Record) -> String {
    known(record, fields::TITLE)
        .to_lowercase()
        .replace([':', '-'], "")
}

/// Weighted masterdata similarity, rounded to 4 decimals
#[must_use]
pub fn get_record_similarity(a: &Record, b: &Record) -> f64 {
    let author = ratio(known(a, fields::AUTHOR), known(b, fields::AUTHOR));
    let title_a = normalized_title(a);
    let title_b = normalized_title(b);
    let title = ratio(&title_a, &title_b);
    let year = ratio(known(a, fields::YEAR), known(b, fields::YEAR));

    let (container_a, container_b) = (container(a), container(b));
    let outlet = if container_a.is_empty() || container_b.is_empty() {
        0.0
    } else {
        ratio(&container_a, &container_b)
    };

    let journal_like = a.entry_type == EntryType::Article || !known(a, fields::JOURNAL).is_empty();
    let score: f64 = if journal_like {
        let same = |key: &str| f64::from(u8::from(known(a, key) == known(b, key)));
        let similarities = [author, title, year, outlet, same(fields::VOLUME), same(fields::NUMBER)];
        let non_distinct = title_a == title_b && NON_DISTINCT_TITLES.contains(&title_a.as_str());
        let weights = if non_distinct {
            NON_DISTINCT_WEIGHTS
        } else {
            JOURNAL_WEIGHTS
        };
        similarities.iter().zip(weights).map(|(s, w)| s * w).sum()
    } else {
        [author, title, year, outlet]
            .iter()
            .zip(OTHER_WEIGHTS)
            .map(|(s, w)| s * w)
            .sum()
    };
    (score * 10_000.0).round() / 10_000.0
}

impl Record {
    /// See [`get_record_change_score`]
    #[must_use]
    pub fn change_score(&self, other: &Record) -> f64 {
        get_record_change_score(self, other)
    }

    /// See [`get_record_similarity`]
    #[must_use]
    pub fn similarity(&self, other: &Record) -> f64 {
        get_record_similarity(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str) -> Record {
        Record::new("a", EntryType::Article)
            .with_field(fields::TITLE, title)
            .with_field(fields::AUTHOR, "Smith, John")
            .with_field(fields::YEAR, "2020")
            .with_field(fields::JOURNAL, "MIS Quarterly")
            .with_field(fields::VOLUME, "44")
            .with_field(fields::NUMBER, "1")
    }

    #[test]
    fn identical_records_score_one() {
        let a = article("A study");
        assert!((get_record_similarity(&a, &a) - 1.0).abs() < 1e-9);
        assert!(get_record_change_score(&a, &a).abs() < 1e-9);
    }

    #[test]
    fn change_score_is_case_insensitive() {
        let a = article("A study");
        let b = article("A STUDY");
        assert!(get_record_change_score(&a, &b).abs() < 1e-9);
    }

    #[test]
    fn non_distinct_titles_shift_weight() {
        let a = article("Editorial");
        let b = article("Editorial").with_field(fields::VOLUME, "45");
        // title weight is zero, volume mismatch costs 0.275
        assert!((get_record_similarity(&a, &b) - 0.725).abs() < 1e-9);
    }

    #[test]
    fn other_types_use_title_heavy_weights() {
        let a = Record::new("a", EntryType::Book)
            .with_field(fields::TITLE, "Design science")
            .with_field(fields::YEAR, "2010");
        let b = a.clone().with_field(fields::YEAR, "2011");
        let score = get_record_similarity(&a, &b);
        // author 1.0 (both empty), title 1.0, year 0.75, no container
        assert!((score - 0.9375).abs() < 1e-9);
    }
}
