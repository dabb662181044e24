//! Cross-record checks
//!
//! Checks that need the whole dataset (and its last committed version)
//! rather than one record:
//! - every record has an origin and a status
//! - origins point at existing feed entries and belong to one record
//! - status changes since the last commit are legal transitions
//! - ids of processed records, possibly used in other project files, are
//!   unchanged
//!
//! Every violation is collected into a [`CheckReport`]; nothing is mutated.

use crate::bibtex;
use colrev_record::{fields, RecordsDict};
use colrev_state::{RecordState, StateModel};
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Paths never scanned for propagated ids
const IGNORED_PATHS: [&str; 5] = [
    ".git",
    ".report.log",
    ".pre-commit-config.yaml",
    "data/search",
    "records.bib",
];
/// Extensions of files scanned for propagated ids
const TEXT_FORMATS: [&str; 5] = ["txt", "csv", "md", "bib", "yaml"];
/// Origins of curated masterdata feeds may be shared
const SHARED_ORIGIN_PREFIX: &str = "md_";

/// A status change that no operation performs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    /// Record id
    pub id: String,
    /// Committed status
    pub from: RecordState,
    /// Current status
    pub to: RecordState,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} → {}", self.id, self.from, self.to)
    }
}

/// A processed record whose id changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagatedIdChange {
    /// Committed id
    pub old: String,
    /// Ids now carrying the origin
    pub new: Vec<String>,
    /// Places where the old id still appears
    pub notifications: Vec<String>,
}

/// Violations found by [`check_records`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    /// Records without `colrev_origin`
    pub entries_without_origin: Vec<String>,
    /// Records without `colrev_status`
    pub missing_status: Vec<String>,
    /// Origins whose feed file lacks the local id
    pub broken_origins: Vec<String>,
    /// Origins shared by several records
    pub non_unique_origins: BTreeMap<String, Vec<String>>,
    /// Illegal status changes since the last commit
    pub invalid_transitions: Vec<InvalidTransition>,
    /// Origins of processed records that disappeared
    pub removed_origins: Vec<String>,
    /// Changed ids of processed records
    pub propagated_id_changes: Vec<PropagatedIdChange>,
    /// Screening criteria inconsistent with the status
    pub screening_errors: Vec<String>,
}

impl CheckReport {
    /// No violation found
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.entries_without_origin.is_empty()
            && self.missing_status.is_empty()
            && self.broken_origins.is_empty()
            && self.non_unique_origins.is_empty()
            && self.invalid_transitions.is_empty()
            && self.removed_origins.is_empty()
            && self.propagated_id_changes.is_empty()
            && self.screening_errors.is_empty()
    }

    /// One line per violation
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        let mut messages = Vec::new();
        if !self.entries_without_origin.is_empty() {
            messages.push(format!(
                "Entries without origin: {}",
                self.entries_without_origin.join(", ")
            ));
        }
        if !self.missing_status.is_empty() {
            messages.push(format!(
                "Entries without status: {}",
                self.missing_status.join(", ")
            ));
        }
        if !self.broken_origins.is_empty() {
            messages.push(format!("Broken origins: {}", self.broken_origins.join(", ")));
        }
        for (origin, ids) in &self.non_unique_origins {
            messages.push(format!("Non-unique origin: {origin} - {}", ids.join(",")));
        }
        for transition in &self.invalid_transitions {
            messages.push(format!("Invalid state transition: {transition}"));
        }
        for origin in &self.removed_origins {
            messages.push(format!("Origin removed: {origin}"));
        }
        for change in &self.propagated_id_changes {
            messages.extend(change.notifications.iter().cloned());
        }
        messages.extend(self.screening_errors.iter().cloned());
        messages
    }
}

/// Project context of the checks
#[derive(Debug, Clone, Default)]
pub struct CheckContext {
    /// Project root scanned for propagated ids
    pub root: Option<PathBuf>,
    /// Directory of the feed files
    pub search_dir: Option<PathBuf>,
    /// Screening criteria names
    pub screening_criteria: Vec<String>,
}

/// Run every cross-record check
///
/// `prior` is the last committed version of the records, if any.
#[must_use]
pub fn check_records(context: &CheckContext, prior: Option<&RecordsDict>, records: &RecordsDict) -> CheckReport {
    let mut report = CheckReport::default();
    check_origins(records, context.search_dir.as_deref(), &mut report);
    check_status_fields(records, &mut report);
    check_screening_criteria(records, &context.screening_criteria, &mut report);
    if let Some(prior) = prior {
        check_status_transitions(prior, records, &mut report);
        check_propagated_ids(prior, records, context.root.as_deref(), &mut report);
    }
    debug!(ok = report.is_ok(), "checked {} records", records.len());
    report
}

fn origin_id_list(records: &RecordsDict) -> HashMap<&str, Vec<&str>> {
    let mut map: HashMap<&str, Vec<&str>> = HashMap::new();
    for record in records.values() {
        for origin in record.origins() {
            map.entry(origin.as_str()).or_default().push(record.id.as_str());
        }
    }
    map
}

/// Records without origin, broken and non-unique origins
pub fn check_origins(records: &RecordsDict, search_dir: Option<&Path>, report: &mut CheckReport) {
    let mut feed_ids: HashMap<String, Option<HashSet<String>>> = HashMap::new();

    for record in records.values() {
        if record.origins().is_empty() {
            report.entries_without_origin.push(record.id.clone());
            continue;
        }
        let Some(search_dir) = search_dir else {
            continue;
        };
        for origin in record.origins() {
            let Some((file, local_id)) = origin.rsplit_once('/') else {
                continue;
            };
            let ids = feed_ids.entry(file.to_string()).or_insert_with(|| {
                std::fs::read_to_string(search_dir.join(file))
                    .ok()
                    .map(|content| bibtex::entry_ids(&content).into_iter().collect())
            });
            if ids.as_ref().is_some_and(|ids| !ids.contains(local_id)) {
                report.broken_origins.push(origin.clone());
            }
        }
    }

    for (origin, ids) in origin_id_list(records) {
        if ids.len() > 1 && !origin.starts_with(SHARED_ORIGIN_PREFIX) {
            report
                .non_unique_origins
                .insert(origin.to_string(), ids.iter().map(ToString::to_string).collect());
        }
    }
}

/// Records without a stored status
pub fn check_status_fields(records: &RecordsDict, report: &mut CheckReport) {
    report.missing_status.extend(
        records
            .values()
            .filter(|r| r.stored_status().is_none())
            .map(|r| r.id.clone()),
    );
}

/// Status changes since `prior` that no single operation performs
pub fn check_status_transitions(prior: &RecordsDict, records: &RecordsDict, report: &mut CheckReport) {
    let prior_status: HashMap<&str, RecordState> = prior
        .values()
        .flat_map(|r| r.origins().iter().map(move |o| (o.as_str(), r.status())))
        .collect();

    for record in records.values() {
        // merged records continue from their most advanced prior version
        let Some(from) = record
            .origins()
            .iter()
            .filter_map(|o| prior_status.get(o.as_str()).copied())
            .reduce(RecordState::later)
        else {
            continue;
        };
        let to = record.status();
        // retracted papers are excluded from any state
        if to == RecordState::RevPrescreenExcluded && record.contains(fields::RETRACTED) {
            continue;
        }
        if StateModel::validate_transition(&record.id, from, to).is_err() {
            report.invalid_transitions.push(InvalidTransition {
                id: record.id.clone(),
                from,
                to,
            });
        }
    }
}

/// Removed origins and changed ids of processed records
///
/// With a `root`, the project is scanned for files still naming the old id.
pub fn check_propagated_ids(
    prior: &RecordsDict,
    records: &RecordsDict,
    root: Option<&Path>,
    report: &mut CheckReport,
) {
    let current = origin_id_list(records);
    let mut reported = HashSet::new();

    for prior_record in prior.values() {
        if !prior_record.status().is_post(RecordState::MdProcessed) {
            continue;
        }
        for origin in prior_record.origins() {
            let Some(new_ids) = current.get(origin.as_str()) else {
                report.removed_origins.push(origin.clone());
                continue;
            };
            if new_ids.contains(&prior_record.id.as_str()) || !reported.insert(prior_record.id.clone()) {
                continue;
            }
            let new = new_ids.join(",");
            let mut notifications = root
                .map(|root| find_propagated_id(root, &prior_record.id, &new))
                .unwrap_or_default();
            notifications.push(format!(
                "ID of processed record changed from {} to {new}",
                prior_record.id
            ));
            report.propagated_id_changes.push(PropagatedIdChange {
                old: prior_record.id.clone(),
                new: new_ids.iter().map(ToString::to_string).collect(),
                notifications,
            });
        }
    }
}

/// Screening criteria consistent with the status
///
/// Records before screening carry no criteria; screened records carry
/// `name=in|out` for every criterion.
pub fn check_screening_criteria(records: &RecordsDict, criteria: &[String], report: &mut CheckReport) {
    for record in records.values() {
        let Some(value) = record.get(fields::SCREENING_CRITERIA) else {
            continue;
        };
        let status = record.status();
        if !status.is_post(RecordState::RevExcluded) {
            if value != "NA" {
                report
                    .screening_errors
                    .push(format!("{}: screening criteria before screen ({value})", record.id));
            }
            continue;
        }
        if criteria.is_empty() {
            continue;
        }
        let decisions: HashMap<&str, &str> = value
            .split(';')
            .filter_map(|item| item.split_once('='))
            .collect();
        if criteria
            .iter()
            .any(|c| !matches!(decisions.get(c.as_str()), Some(&("in" | "out" | "TODO"))))
        {
            report.screening_errors.push(format!(
                "{}: screening criteria not matching {criteria:?} ({value})",
                record.id
            ));
            continue;
        }
        let violated = decisions.values().any(|d| *d == "out");
        match status {
            RecordState::RevIncluded | RecordState::RevSynthesized if violated => {
                report.screening_errors.push(format!(
                    "{}: included record with violated screening criterion ({value})",
                    record.id
                ));
            }
            RecordState::RevExcluded if !violated => {
                report.screening_errors.push(format!(
                    "{}: excluded record without violated screening criterion ({value})",
                    record.id
                ));
            }
            _ => {}
        }
    }
}

fn is_ignored(relative: &Path) -> bool {
    let relative = relative.to_string_lossy();
    IGNORED_PATHS.iter().any(|p| relative.contains(p))
}

/// Project files and directories that still name `prior_id`
#[must_use]
pub fn find_propagated_id(root: &Path, prior_id: &str, new_id: &str) -> Vec<String> {
    let Ok(word) = Regex::new(&format!(r"\b{}\b", regex::escape(prior_id))) else {
        return Vec::new();
    };
    let mut notifications = Vec::new();
    let mut notify = |message: String| {
        if !notifications.contains(&message) {
            notifications.push(message);
        }
    };

    let walker = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !is_ignored(e.path().strip_prefix(root).unwrap_or(e.path())));
    for entry in walker.filter_map(Result::ok) {
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let name = entry.file_name().to_string_lossy();
        if word.is_match(&name) {
            notify(format!(
                "Old ID ({prior_id}, changed to {new_id} in the records file) found in filepath: {}",
                relative.display()
            ));
        }
        if !entry.file_type().is_file() {
            continue;
        }
        let extension = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if !TEXT_FORMATS.contains(&extension) {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        let found = if extension == "bib" {
            bibtex::entry_ids(&content).iter().any(|id| id == prior_id)
        } else {
            content.lines().any(|line| word.is_match(line))
        };
        if found {
            notify(format!(
                "Old ID ({prior_id}, changed to {new_id} in the records file) found in file: {}",
                relative.display()
            ));
        }
    }
    notifications
}

#[cfg(test)]
mod tests {
    use super::*;
    use colrev_record::{EntryType, Record};
    use colrev_test_utils::records_dict;
    use pretty_assertions::assert_eq;

    fn record(id: &str, origin: &str, status: RecordState) -> Record {
        Record::new(id, EntryType::Article)
            .with_origin(origin)
            .with_status(status)
    }

    #[test]
    fn reports_missing_and_shared_origins() {
        let records = records_dict([
            Record::new("a", EntryType::Article).with_status(RecordState::MdImported),
            record("b", "x.bib/1", RecordState::MdImported),
            record("c", "x.bib/1", RecordState::MdImported),
            record("d", "md_curated.bib/1", RecordState::MdImported),
            record("e", "md_curated.bib/1", RecordState::MdImported),
        ]);
        let report = check_records(&CheckContext::default(), None, &records);
        assert_eq!(report.entries_without_origin, vec!["a"]);
        assert_eq!(report.non_unique_origins.len(), 1);
        assert_eq!(report.non_unique_origins["x.bib/1"], vec!["b", "c"]);
        assert!(!report.is_ok());
    }

    #[test]
    fn reports_broken_origins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.bib"), "@article{000001,\n}\n").unwrap();
        let records = records_dict([
            record("a", "x.bib/000001", RecordState::MdImported),
            record("b", "x.bib/000002", RecordState::MdImported),
            record("c", "gone.bib/000001", RecordState::MdImported),
        ]);
        let mut report = CheckReport::default();
        check_origins(&records, Some(dir.path()), &mut report);
        assert_eq!(report.broken_origins, vec!["x.bib/000002"]);
    }

    #[test]
    fn reports_invalid_transition() {
        let prior = records_dict([record("a", "x.bib/1", RecordState::MdRetrieved)]);
        let records = records_dict([record("a", "x.bib/1", RecordState::RevIncluded)]);
        let report = check_records(&CheckContext::default(), Some(&prior), &records);
        assert_eq!(report.invalid_transitions.len(), 1);
        assert_eq!(
            report.invalid_transitions[0].to_string(),
            "a: md_retrieved → rev_included"
        );
    }

    #[test]
    fn accepts_single_step_transitions() {
        let prior = records_dict([record("a", "x.bib/1", RecordState::MdPrepared)]);
        let records = records_dict([
            record("a", "x.bib/1", RecordState::MdProcessed),
            record("new", "x.bib/2", RecordState::MdImported),
        ]);
        assert!(check_records(&CheckContext::default(), Some(&prior), &records).is_ok());
    }

    #[test]
    fn retraction_may_skip_states() {
        let prior = records_dict([record("a", "x.bib/1", RecordState::MdImported)]);
        let mut retracted = record("a", "x.bib/1", RecordState::MdImported);
        retracted.prescreen_exclude("retracted");
        let records = records_dict([retracted]);
        assert!(check_records(&CheckContext::default(), Some(&prior), &records).is_ok());
    }

    #[test]
    fn reports_removed_origin() {
        let prior = records_dict([record("a", "x.bib/1", RecordState::MdProcessed)]);
        let records = records_dict([record("a", "x.bib/2", RecordState::MdProcessed)]);
        let mut report = CheckReport::default();
        check_propagated_ids(&prior, &records, None, &mut report);
        assert_eq!(report.removed_origins, vec!["x.bib/1"]);
    }

    #[test]
    fn ignores_ids_changed_before_processing() {
        let prior = records_dict([record("Smith2020", "x.bib/1", RecordState::MdPrepared)]);
        let records = records_dict([record("Smith2020a", "x.bib/1", RecordState::MdPrepared)]);
        let mut report = CheckReport::default();
        check_propagated_ids(&prior, &records, None, &mut report);
        assert!(report.propagated_id_changes.is_empty());
    }

    #[test]
    fn scan_matches_whole_ids() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("data/search")).unwrap();
        std::fs::create_dir_all(root.join("data/pdfs")).unwrap();
        std::fs::write(root.join("data/paper.md"), "As shown by [@Smith2020], ...\n").unwrap();
        std::fs::write(root.join("data/other.md"), "See [@Smith2020a].\n").unwrap();
        std::fs::write(root.join("data/search/x.bib"), "@article{Smith2020,\n}\n").unwrap();
        std::fs::write(root.join("data/pdfs/Smith2020.pdf"), b"%PDF").unwrap();
        std::fs::write(root.join("data/extraction.bib"), "@article{Smith2020,\n}\n").unwrap();

        let mut found = find_propagated_id(root, "Smith2020", "Smith2020a");
        found.sort();
        assert_eq!(found.len(), 3);
        assert!(found.iter().any(|n| n.ends_with("found in file: data/paper.md")));
        assert!(found.iter().any(|n| n.ends_with("found in file: data/extraction.bib")));
        assert!(found.iter().any(|n| n.ends_with("found in filepath: data/pdfs/Smith2020.pdf")));
    }

    #[test]
    fn screening_criteria_follow_status() {
        let criteria = vec!["c1".to_string(), "c2".to_string()];
        let records = records_dict([
            record("a", "x.bib/1", RecordState::RevIncluded).with_field(fields::SCREENING_CRITERIA, "c1=in;c2=in"),
            record("b", "x.bib/2", RecordState::RevIncluded).with_field(fields::SCREENING_CRITERIA, "c1=in;c2=out"),
            record("c", "x.bib/3", RecordState::RevExcluded).with_field(fields::SCREENING_CRITERIA, "c1=in;c2=in"),
            record("d", "x.bib/4", RecordState::MdProcessed).with_field(fields::SCREENING_CRITERIA, "c1=in"),
            record("e", "x.bib/5", RecordState::RevExcluded).with_field(fields::SCREENING_CRITERIA, "c1=in"),
        ]);
        let mut report = CheckReport::default();
        check_screening_criteria(&records, &criteria, &mut report);
        let ids: Vec<&str> = report
            .screening_errors
            .iter()
            .map(|e| e.split(':').next().unwrap())
            .collect();
        assert_eq!(ids, vec!["b", "c", "d", "e"]);
    }
}
