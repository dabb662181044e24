use crate::constants::{defects, fields, values};
use crate::entry_type::EntryType;
use crate::prep::percent_upper_chars;
use crate::qm::{Finding, QualityChecker};
use crate::record::Record;

const CAPS_FIELDS: [&str; 5] = [
    fields::TITLE,
    fields::AUTHOR,
    fields::EDITOR,
    fields::JOURNAL,
    fields::BOOKTITLE,
];

/// Journals whose canonical name is upper case
const UPPER_CASE_JOURNALS: [&str; 4] = ["PLOS ONE", "BMJ", "JAMA", "PNAS"];

const CAPS_THRESHOLD: f64 = 0.8;

/// Values that are (almost) entirely upper case
#[derive(Debug, Clone, Copy, Default)]
pub struct MostlyAllCapsChecker;

impl MostlyAllCapsChecker {
    fn is_defect(record: &Record, key: &str, value: &str) -> bool {
        if value == values::UNKNOWN || !value.contains(char::is_whitespace) {
            return false;
        }
        if key == fields::JOURNAL && UPPER_CASE_JOURNALS.contains(&value) {
            return false;
        }
        if key == fields::TITLE
            && record.entry_type == EntryType::Online
            && value.split_whitespace().count() < 3
        {
            return false;
        }
        percent_upper_chars(value) > CAPS_THRESHOLD
    }
}

impl QualityChecker for MostlyAllCapsChecker {
    fn name(&self) -> &'static str {
        "mostly-all-caps"
    }

    fn codes(&self) -> &'static [&'static str] {
        &[defects::MOSTLY_ALL_CAPS]
    }

    fn run(&self, record: &Record) -> Vec<Finding> {
        CAPS_FIELDS
            .iter()
            .map(|key| {
                let defective = record
                    .get(key)
                    .is_some_and(|v| Self::is_defect(record, key, v));
                Finding::check(key, defects::MOSTLY_ALL_CAPS, defective)
            })
            .collect()
    }
}

/// Journal or booktitle given as an abbreviation
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerTitleAbbreviatedChecker;

impl ContainerTitleAbbreviatedChecker {
    fn is_abbreviated(value: &str) -> bool {
        if value == values::UNKNOWN {
            return false;
        }
        let len = value.chars().count();
        let all_caps = value.chars().any(char::is_alphabetic)
            && !value.chars().any(char::is_lowercase);
        (all_caps && len < 6) || (len <= 5 && value.ends_with('.'))
    }
}

impl QualityChecker for ContainerTitleAbbreviatedChecker {
    fn name(&self) -> &'static str {
        "container-title-abbreviated"
    }

    fn codes(&self) -> &'static [&'static str] {
        &[defects::CONTAINER_TITLE_ABBREVIATED]
    }

    fn run(&self, record: &Record) -> Vec<Finding> {
        [fields::JOURNAL, fields::BOOKTITLE]
            .iter()
            .map(|key| {
                let defective = record.get(key).is_some_and(Self::is_abbreviated);
                Finding::check(key, defects::CONTAINER_TITLE_ABBREVIATED, defective)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flagged(checker: &dyn QualityChecker, record: &Record, key: &str) -> bool {
        checker
            .run(record)
            .iter()
            .any(|f| matches!(f, Finding::Defect { field, .. } if field == key))
    }

    #[test]
    fn all_caps_title_is_flagged() {
        let r = Record::new("a", EntryType::Article).with_field(fields::TITLE, "A U-ARCHIT URBAN");
        assert!(flagged(&MostlyAllCapsChecker, &r, fields::TITLE));

        let r = r.with_field(fields::TITLE, "A study of IT");
        assert!(!flagged(&MostlyAllCapsChecker, &r, fields::TITLE));
    }

    #[test]
    fn caps_exceptions() {
        let r = Record::new("a", EntryType::Article)
            .with_field(fields::JOURNAL, "PLOS ONE")
            .with_field(fields::TITLE, "SHORT");
        assert!(!flagged(&MostlyAllCapsChecker, &r, fields::JOURNAL));
        assert!(!flagged(&MostlyAllCapsChecker, &r, fields::TITLE));

        let online = Record::new("a", EntryType::Online).with_field(fields::TITLE, "AIS EDUCATOR");
        assert!(!flagged(&MostlyAllCapsChecker, &online, fields::TITLE));
    }

    #[test]
    fn abbreviated_containers() {
        for journal in ["JAMA", "SOS", "SAMJ", "JAMS", "Proc."] {
            let r = Record::new("a", EntryType::Article).with_field(fields::JOURNAL, journal);
            assert!(flagged(&ContainerTitleAbbreviatedChecker, &r, fields::JOURNAL), "{journal}");
        }
        for journal in ["MIS Quarterly", "Nature", values::UNKNOWN] {
            let r = Record::new("a", EntryType::Article).with_field(fields::JOURNAL, journal);
            assert!(!flagged(&ContainerTitleAbbreviatedChecker, &r, fields::JOURNAL), "{journal}");
        }
    }
}
