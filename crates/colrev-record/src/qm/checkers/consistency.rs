use crate::constants::{defects, fields};
use crate::entry_type::EntryType;
use crate::qm::{is_blank, Finding, QualityChecker};
use crate::record::Record;

/// Every field that some entry type forbids
const CHECKED_FIELDS: [&str; 6] = [
    fields::BOOKTITLE,
    fields::ISBN,
    fields::ISSN,
    fields::JOURNAL,
    fields::NUMBER,
    fields::VOLUME,
];

fn forbidden_fields(entry_type: &EntryType) -> &'static [&'static str] {
    use fields::{BOOKTITLE, ISBN, ISSN, JOURNAL, NUMBER, VOLUME};
    match entry_type {
        EntryType::Article => &[BOOKTITLE, ISBN],
        EntryType::Inproceedings => &[ISSN, JOURNAL, NUMBER],
        EntryType::Inbook => &[JOURNAL],
        EntryType::Book | EntryType::Phdthesis | EntryType::Techreport => {
            &[VOLUME, NUMBER, JOURNAL, BOOKTITLE]
        }
        _ => &[],
    }
}

/// Fields that do not belong to the record's entry type
#[derive(Debug, Clone, Copy, Default)]
pub struct InconsistentWithEntrytypeChecker;

impl QualityChecker for InconsistentWithEntrytypeChecker {
    fn name(&self) -> &'static str {
        "inconsistent-with-entrytype"
    }

    fn codes(&self) -> &'static [&'static str] {
        &[defects::INCONSISTENT_WITH_ENTRYTYPE]
    }

    fn run(&self, record: &Record) -> Vec<Finding> {
        let forbidden = forbidden_fields(&record.entry_type);
        CHECKED_FIELDS
            .iter()
            .map(|key| {
                let defective = forbidden.contains(key) && !is_blank(record, key);
                Finding::check(key, defects::INCONSISTENT_WITH_ENTRYTYPE, defective)
            })
            .collect()
    }
}

fn normalize_title(value: &str) -> String {
    let lower = value.trim().to_lowercase();
    lower.strip_prefix("the ").unwrap_or(&lower).to_string()
}

/// Title that repeats the journal or booktitle
#[derive(Debug, Clone, Copy, Default)]
pub struct IdenticalTitleContainerChecker;

impl QualityChecker for IdenticalTitleContainerChecker {
    fn name(&self) -> &'static str {
        "identical-values-between-title-and-container"
    }

    fn codes(&self) -> &'static [&'static str] {
        &[defects::IDENTICAL_VALUES_BETWEEN_TITLE_AND_CONTAINER]
    }

    fn run(&self, record: &Record) -> Vec<Finding> {
        let defective = !is_blank(record, fields::TITLE) && {
            let title = normalize_title(record.get_or(fields::TITLE, ""));
            [fields::JOURNAL, fields::BOOKTITLE]
                .iter()
                .filter(|key| !is_blank(record, key))
                .any(|key| normalize_title(record.get_or(key, "")) == title)
        };
        vec![Finding::check(
            fields::TITLE,
            defects::IDENTICAL_VALUES_BETWEEN_TITLE_AND_CONTAINER,
            defective,
        )]
    }
}
