use crate::constants::{defects, fields, values};
use crate::qm::{Finding, QualityChecker, NAME_FIELDS};
use crate::record::Record;

/// Author lists cut short with "et al." or "and others"
#[derive(Debug, Clone, Copy, Default)]
pub struct NameAbbreviatedChecker;

impl NameAbbreviatedChecker {
    fn is_abbreviated(value: &str) -> bool {
        let lower = value.to_lowercase();
        lower.contains("et al") || lower.trim_end().ends_with("and others")
    }
}

impl QualityChecker for NameAbbreviatedChecker {
    fn name(&self) -> &'static str {
        "name-abbreviated"
    }

    fn codes(&self) -> &'static [&'static str] {
        &[defects::NAME_ABBREVIATED]
    }

    fn run(&self, record: &Record) -> Vec<Finding> {
        NAME_FIELDS
            .iter()
            .map(|key| {
                let defective = record.get(key).is_some_and(Self::is_abbreviated);
                Finding::check(key, defects::NAME_ABBREVIATED, defective)
            })
            .collect()
    }
}

/// Theses are written by a single author
#[derive(Debug, Clone, Copy, Default)]
pub struct ThesisWithMultipleAuthorsChecker;

impl QualityChecker for ThesisWithMultipleAuthorsChecker {
    fn name(&self) -> &'static str {
        "thesis-with-multiple-authors"
    }

    fn codes(&self) -> &'static [&'static str] {
        &[defects::THESIS_WITH_MULTIPLE_AUTHORS]
    }

    fn run(&self, record: &Record) -> Vec<Finding> {
        let defective = record.entry_type.is_thesis()
            && record
                .get(fields::AUTHOR)
                .is_some_and(|a| a != values::UNKNOWN && a.contains(" and "));
        vec![Finding::check(
            fields::AUTHOR,
            defects::THESIS_WITH_MULTIPLE_AUTHORS,
            defective,
        )]
    }
}
