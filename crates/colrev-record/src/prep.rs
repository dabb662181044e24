//! Field preparation utilities
//!
//! Pure string transformations used by prep packages, the merger and the
//! identifier functions.

use crate::constants::{fields, values};
use crate::record::Record;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

const NO_CAPS: [&str; 4] = ["of", "for", "the", "and"];
const ALL_CAPS: [&str; 7] = ["IEEE", "ACM", "M&A", "B2B", "B2C", "C2C", "I"];

static ALL_CAPS_RE: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    ALL_CAPS
        .iter()
        .filter_map(|term| {
            Regex::new(&format!(r"(?i)\b{}\b", regex::escape(term)))
                .ok()
                .map(|re| (re, *term))
        })
        .collect()
});

static NO_CAPS_RE: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    NO_CAPS
        .iter()
        .filter_map(|term| {
            Regex::new(&format!(r"(?i)\b{term}\b"))
                .ok()
                .map(|re| (re, *term))
        })
        .collect()
});

static US_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bu\.s\.").expect("static regex"));
static IT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bit-(\w)").expect("static regex"));
static IS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bis-(\w)").expect("static regex"));
static DBLP_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{4}").expect("static regex"));
static PAGE_RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)--(\d+)$").expect("static regex"));

/// Target case for [`format_if_mostly_upper`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Case {
    /// First letter upper, rest lower
    #[default]
    Sentence,
    /// First letter of every word upper
    Title,
}

/// Share of upper-case characters, ignoring spaces and hyphens
#[must_use]
pub fn percent_upper_chars(input: &str) -> f64 {
    let chars: Vec<char> = input.chars().filter(|c| *c != ' ' && *c != '-').collect();
    if chars.is_empty() {
        return 0.0;
    }
    let upper = chars.iter().filter(|c| c.is_uppercase()).count();
    upper as f64 / chars.len() as f64
}

/// Strip diacritics (`Müller` -> `Muller`)
#[must_use]
pub fn remove_accents(input: &str) -> String {
    input.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

fn sentence_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    if let Some(first) = chars.next() {
        out.extend(first.to_uppercase());
        for c in chars {
            out.extend(c.to_lowercase());
        }
    }
    out
}

fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_alpha = false;
    for c in input.chars() {
        if prev_alpha {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}

/// Restore the case of entities (IEEE, ACM, ...) and lower-case particles
#[must_use]
pub fn capitalize_entities(input: &str) -> String {
    let mut out = input.to_string();
    for (re, term) in ALL_CAPS_RE.iter() {
        out = re.replace_all(&out, *term).into_owned();
    }
    out = US_RE.replace_all(&out, "U.S.").into_owned();

    for (re, term) in NO_CAPS_RE.iter() {
        if out.to_lowercase().starts_with(term) {
            continue;
        }
        out = re.replace_all(&out, *term).into_owned();
    }

    out = out.replace(" i'", " I'").replace("'S ", "'s ");
    out = IT_RE.replace_all(&out, "IT-$1").into_owned();
    IS_RE.replace_all(&out, "IS-$1").into_owned()
}

/// Re-case a value when at least 60% of its characters are upper case
///
/// Returns `None` when the value does not need re-casing.
#[must_use]
pub fn format_if_mostly_upper(value: &str, case: Case) -> Option<String> {
    if value == values::UNKNOWN || percent_upper_chars(value) < 0.6 {
        return None;
    }
    let value = value.replace('\n', " ");
    let recased = match case {
        Case::Sentence => sentence_case(&value),
        Case::Title => title_case(&value),
    };
    Some(capitalize_entities(&recased))
}

fn mostly_upper_words(input: &str) -> bool {
    let cleaned = input.replace(['.', ','], "");
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    if words.is_empty() {
        return false;
    }
    let upper = words
        .iter()
        .filter(|w| w.chars().any(char::is_alphabetic) && !w.chars().any(char::is_lowercase))
        .count();
    upper as f64 / words.len() as f64 > 0.8
}

fn format_name(name: &str, recase: bool) -> String {
    let name = name.trim();
    let name = if recase { title_case(name) } else { name.to_string() };

    if let Some((last, first)) = name.split_once(',') {
        let last = last.trim();
        let first = first.split_whitespace().collect::<Vec<_>>().join(" ");
        if first.is_empty() {
            return last.to_string();
        }
        return format!("{last}, {first}");
    }

    let tokens: Vec<&str> = name.split_whitespace().collect();
    match tokens.as_slice() {
        [] => String::new(),
        [single] => (*single).to_string(),
        [rest @ .., last] => {
            let first = rest.join(" ");
            // "Smith JR" style: initials after the family name
            let last_is_initials =
                last.chars().count() <= 3 && last.chars().all(|c| c.is_uppercase() || c == '.');
            if last_is_initials && first.chars().count() > 3 && !mostly_upper_words(&first) {
                format!("{first}, {last}")
            } else {
                format!("{last}, {first}")
            }
        }
    }
}

/// Normalize an author list to `Last, First and Last, First`
#[must_use]
pub fn format_author_field(input: &str) -> String {
    let input = input.replace('\n', " ");
    let input = DBLP_SUFFIX_RE.replace_all(&input, "").into_owned();

    let names: Vec<&str> = if input.contains(" and ") {
        input.split(" and ").collect()
    } else if input.matches(';').count() > 1 {
        input.split(';').collect()
    } else {
        vec![input.as_str()]
    };

    let recase = mostly_upper_words(&input.replace(" and ", " "));
    names
        .into_iter()
        .map(|n| format_name(n, recase))
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Normalize page ranges to `from--to`
#[must_use]
pub fn unify_pages_field(pages: &str) -> String {
    let mut pages = pages.to_string();
    if pages.matches('-').count() == 1 {
        pages = pages.replace('-', "--");
    }
    pages = pages
        .replace('\u{2013}', "--")
        .replace('\u{2014}', "--")
        .replace("----", "--")
        .replace(" -- ", "--");
    let mut pages = pages.trim().trim_end_matches('.').to_string();

    if let Some(caps) = PAGE_RANGE_RE.captures(&pages) {
        let from = caps[1].to_string();
        let to = caps[2].to_string();
        // 1234--56 -> 1234--1256
        if from.len() > to.len() {
            pages = format!("{from}--{}{to}", &from[..from.len() - to.len()]);
        }
    }
    pages
}

impl Record {
    /// Re-case a field in place when it is mostly upper case
    pub fn format_if_mostly_upper(&mut self, key: &str, case: Case) {
        let Some(value) = self.get(key) else {
            return;
        };
        if let Some(formatted) = format_if_mostly_upper(value, case) {
            self.update_field(key, formatted, "format_if_mostly_upper");
        }
    }

    /// Normalize the pages field in place
    pub fn unify_pages_field(&mut self) {
        if let Some(pages) = self.get(fields::PAGES) {
            let unified = unify_pages_field(pages);
            if unified != pages {
                self.update_field(fields::PAGES, unified, "unify_pages_field");
            }
        }
    }
}
