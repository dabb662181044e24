use crate::constants::{defects, fields, values};
use crate::qm::{Finding, QualityChecker};
use crate::record::Record;
use once_cell::sync::Lazy;
use regex::Regex;

static HTML_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)&#\d+;|</?(i|b|em|strong|sup|sub|p|span)(\s[^>]*)?>|&lt;|&gt;")
        .expect("static regex")
});
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").expect("static regex"));
static DOI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^10\.\d{4,9}/\S+$").expect("static regex"));
static LANGUAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]{3}$").expect("static regex"));
static PAGE_RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)--(\d+)$").expect("static regex"));

const HTML_FIELDS: [&str; 4] = [
    fields::TITLE,
    fields::JOURNAL,
    fields::BOOKTITLE,
    fields::AUTHOR,
];

const ERRONEOUS_SYMBOLS: [char; 3] = ['™', '®', '\u{FFFD}'];

/// Report `code` on `key` when its value (other than `UNKNOWN`) fails `is_defect`
fn check_field(
    record: &Record,
    key: &str,
    code: &'static str,
    is_defect: impl Fn(&str) -> bool,
) -> Finding {
    let defective = record
        .get(key)
        .is_some_and(|v| v != values::UNKNOWN && is_defect(v));
    Finding::check(key, code, defective)
}

/// HTML tags and entities left over from web sources
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlTagsChecker;

impl QualityChecker for HtmlTagsChecker {
    fn name(&self) -> &'static str {
        "html-tags"
    }

    fn codes(&self) -> &'static [&'static str] {
        &[defects::HTML_TAGS]
    }

    fn run(&self, record: &Record) -> Vec<Finding> {
        HTML_FIELDS
            .iter()
            .map(|key| check_field(record, key, defects::HTML_TAGS, |v| HTML_RE.is_match(v)))
            .collect()
    }
}

/// Year that is not four digits
#[derive(Debug, Clone, Copy, Default)]
pub struct YearFormatChecker;

impl QualityChecker for YearFormatChecker {
    fn name(&self) -> &'static str {
        "year-format"
    }

    fn codes(&self) -> &'static [&'static str] {
        &[defects::YEAR_FORMAT]
    }

    fn run(&self, record: &Record) -> Vec<Finding> {
        vec![check_field(record, fields::YEAR, defects::YEAR_FORMAT, |v| {
            v != values::FORTHCOMING && !YEAR_RE.is_match(v)
        })]
    }
}

/// DOI that does not look like `10.<registrant>/<suffix>`
#[derive(Debug, Clone, Copy, Default)]
pub struct DoiPatternChecker;

impl QualityChecker for DoiPatternChecker {
    fn name(&self) -> &'static str {
        "doi-not-matching-pattern"
    }

    fn codes(&self) -> &'static [&'static str] {
        &[defects::DOI_NOT_MATCHING_PATTERN]
    }

    fn run(&self, record: &Record) -> Vec<Finding> {
        vec![check_field(
            record,
            fields::DOI,
            defects::DOI_NOT_MATCHING_PATTERN,
            |v| !DOI_RE.is_match(v),
        )]
    }
}

/// ISBN-10 or ISBN-13, separated by `;` when there are several
fn valid_isbn(value: &str) -> bool {
    value.split(';').all(|isbn| {
        let compact: Vec<char> = isbn.chars().filter(|c| *c != '-' && *c != ' ').collect();
        let Some((last, body)) = compact.split_last() else {
            return false;
        };
        matches!(compact.len(), 10 | 13)
            && body.iter().all(char::is_ascii_digit)
            && (last.is_ascii_digit() || (compact.len() == 10 && matches!(last, 'X' | 'x')))
    })
}

/// ISBN with a wrong number of digits or stray characters
#[derive(Debug, Clone, Copy, Default)]
pub struct IsbnPatternChecker;

impl QualityChecker for IsbnPatternChecker {
    fn name(&self) -> &'static str {
        "isbn-not-matching-pattern"
    }

    fn codes(&self) -> &'static [&'static str] {
        &[defects::ISBN_NOT_MATCHING_PATTERN]
    }

    fn run(&self, record: &Record) -> Vec<Finding> {
        vec![check_field(
            record,
            fields::ISBN,
            defects::ISBN_NOT_MATCHING_PATTERN,
            |v| !valid_isbn(v),
        )]
    }
}

/// Page range whose first page is after its last page
#[derive(Debug, Clone, Copy, Default)]
pub struct PageRangeChecker;

impl QualityChecker for PageRangeChecker {
    fn name(&self) -> &'static str {
        "page-range"
    }

    fn codes(&self) -> &'static [&'static str] {
        &[defects::PAGE_RANGE]
    }

    fn run(&self, record: &Record) -> Vec<Finding> {
        vec![check_field(record, fields::PAGES, defects::PAGE_RANGE, |v| {
            PAGE_RANGE_RE.captures(v).is_some_and(|caps| {
                let from = caps[1].parse::<u64>().unwrap_or(0);
                let to = caps[2].parse::<u64>().unwrap_or(u64::MAX);
                from > to
            })
        })]
    }
}

/// Language that is not an ISO 639-3 code
#[derive(Debug, Clone, Copy, Default)]
pub struct LanguageFormatChecker;

impl QualityChecker for LanguageFormatChecker {
    fn name(&self) -> &'static str {
        "language-format-error"
    }

    fn codes(&self) -> &'static [&'static str] {
        &[defects::LANGUAGE_FORMAT_ERROR]
    }

    fn run(&self, record: &Record) -> Vec<Finding> {
        vec![check_field(
            record,
            fields::LANGUAGE,
            defects::LANGUAGE_FORMAT_ERROR,
            |v| !LANGUAGE_RE.is_match(v),
        )]
    }
}

/// Trademark signs and replacement characters
#[derive(Debug, Clone, Copy, Default)]
pub struct ErroneousSymbolChecker;

impl QualityChecker for ErroneousSymbolChecker {
    fn name(&self) -> &'static str {
        "erroneous-symbol-in-field"
    }

    fn codes(&self) -> &'static [&'static str] {
        &[defects::ERRONEOUS_SYMBOL_IN_FIELD]
    }

    fn run(&self, record: &Record) -> Vec<Finding> {
        HTML_FIELDS
            .iter()
            .map(|key| {
                check_field(record, key, defects::ERRONEOUS_SYMBOL_IN_FIELD, |v| {
                    v.contains(ERRONEOUS_SYMBOLS)
                })
            })
            .collect()
    }
}
