use crate::constants::{defects, fields, values, IDENTIFYING_FIELDS};
use crate::entry_type::EntryType;
use crate::qm::{is_blank, Finding, QualityChecker};
use crate::record::Record;

/// Fields every record of the given type must have
#[must_use]
pub fn required_fields(entry_type: &EntryType) -> &'static [&'static str] {
    use fields::{
        AUTHOR, BOOKTITLE, CHAPTER, EDITOR, INSTITUTION, JOURNAL, NUMBER, PUBLISHER, SCHOOL,
        TITLE, URL, VOLUME, YEAR,
    };
    match entry_type {
        EntryType::Article => &[AUTHOR, TITLE, JOURNAL, YEAR, VOLUME, NUMBER],
        EntryType::Inproceedings => &[AUTHOR, TITLE, BOOKTITLE, YEAR],
        EntryType::Incollection => &[AUTHOR, TITLE, BOOKTITLE, PUBLISHER, YEAR],
        EntryType::Inbook => &[AUTHOR, TITLE, CHAPTER, PUBLISHER, YEAR],
        EntryType::Proceedings => &[BOOKTITLE, EDITOR, YEAR],
        EntryType::Conference => &[BOOKTITLE, AUTHOR, TITLE, YEAR],
        EntryType::Book => &[AUTHOR, TITLE, PUBLISHER, YEAR],
        EntryType::Phdthesis
        | EntryType::Mastersthesis
        | EntryType::Bachelorthesis
        | EntryType::Thesis => &[AUTHOR, TITLE, SCHOOL, YEAR],
        EntryType::Techreport => &[AUTHOR, TITLE, INSTITUTION, YEAR],
        EntryType::Unpublished => &[TITLE, AUTHOR, YEAR],
        EntryType::Online | EntryType::Software => &[AUTHOR, TITLE, URL],
        EntryType::Misc | EntryType::Other(_) => &[AUTHOR, TITLE, YEAR],
    }
}

/// Required fields that are absent or `UNKNOWN`
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingFieldChecker;

impl QualityChecker for MissingFieldChecker {
    fn name(&self) -> &'static str {
        "missing-field"
    }

    fn codes(&self) -> &'static [&'static str] {
        &[defects::MISSING]
    }

    fn run(&self, record: &Record) -> Vec<Finding> {
        let required = required_fields(&record.entry_type);
        let forthcoming = record.get(fields::YEAR) == Some(values::FORTHCOMING);

        let mut findings: Vec<Finding> = required
            .iter()
            .map(|key| {
                let exempt = forthcoming && matches!(*key, fields::VOLUME | fields::NUMBER);
                Finding::check(key, defects::MISSING, !exempt && is_blank(record, key))
            })
            .collect();

        findings.extend(
            IDENTIFYING_FIELDS
                .iter()
                .chain([&fields::SCHOOL, &fields::URL])
                .filter(|key| !required.contains(*key))
                .map(|key| Finding::check(key, defects::MISSING, false)),
        );
        findings
    }
}
