//! Dataset scenarios on real files and Git repositories

use colrev_dataset::{bibtex, Dataset, GitHistory, MemoryHistory, ProjectPaths, SearchFeed, Settings};
use colrev_record::{fields, EntryType, Record, RecordsDict};
use colrev_state::RecordState;
use colrev_test_utils::{prepared_article, records_dict};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::HashMap;
use std::path::Path;

fn git_dataset(root: &Path) -> Dataset {
    let history = GitHistory::init(root).unwrap();
    Dataset::new(ProjectPaths::new(root), Box::new(history))
}

fn processed(id: &str, origin: &str) -> Record {
    let mut record = prepared_article(id, origin, "Smith, John", "A study of reviews", "2020");
    record.set_status(RecordState::MdProcessed, false).unwrap();
    record
}

#[test]
fn propagated_id_change_lists_files() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = git_dataset(dir.path());

    let mut records = records_dict([processed("Smith2020", "x.bib/1")]);
    dataset.save_records_dict(&mut records, false).unwrap();
    std::fs::write(dir.path().join("data/paper.md"), "As argued by @Smith2020, reviews matter.\n").unwrap();
    dataset.create_commit("Dedupe", &[]).unwrap();

    let mut record = records.shift_remove("Smith2020").unwrap();
    record.id = "Smith2020a".to_string();
    let mut renamed = records_dict([record]);
    dataset.save_records_dict(&mut renamed, false).unwrap();

    let report = dataset.check(&Settings::default()).unwrap();
    assert!(!report.is_ok());
    assert_eq!(report.propagated_id_changes.len(), 1);
    let change = &report.propagated_id_changes[0];
    assert_eq!(change.old, "Smith2020");
    assert_eq!(change.new, vec!["Smith2020a"]);
    assert_eq!(
        change.notifications,
        vec![
            "Old ID (Smith2020, changed to Smith2020a in the records file) found in file: data/paper.md"
                .to_string(),
            "ID of processed record changed from Smith2020 to Smith2020a".to_string(),
        ]
    );
}

#[test]
fn skipped_states_are_invalid_transitions() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = git_dataset(dir.path());

    let retrieved = Record::new("Smith2020", EntryType::Article)
        .with_field(fields::TITLE, "A study")
        .with_origin("x.bib/1")
        .with_status(RecordState::MdRetrieved);
    let mut records = records_dict([retrieved.clone()]);
    dataset.save_records_dict(&mut records, false).unwrap();
    dataset.create_commit("Search", &[]).unwrap();

    let mut included = records_dict([retrieved.with_status(RecordState::RevIncluded)]);
    dataset.save_records_dict(&mut included, false).unwrap();

    let report = dataset.check(&Settings::default()).unwrap();
    assert_eq!(report.invalid_transitions.len(), 1);
    assert_eq!(report.messages(), vec!["Invalid state transition: Smith2020: md_retrieved → rev_included"]);
}

#[test]
fn clean_history_passes_checks() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = git_dataset(dir.path());
    let mut records = records_dict([processed("Smith2020", "x.bib/1")]);
    dataset.save_records_dict(&mut records, false).unwrap();
    dataset.create_commit("Dedupe", &[]).unwrap();
    assert!(!dataset.history().is_dirty().unwrap());
    assert!(dataset.check(&Settings::default()).unwrap().is_ok());
}

#[test]
fn partial_save_keeps_other_records() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = Dataset::new(
        ProjectPaths::new(dir.path()),
        Box::new(MemoryHistory::new(dir.path())),
    );
    let mut records = records_dict([
        prepared_article("A2020", "x.bib/1", "A, B", "First", "2020"),
        prepared_article("B2020", "x.bib/2", "B, C", "Second", "2020"),
        prepared_article("C2020", "x.bib/3", "C, D", "Third", "2020"),
    ]);
    dataset.save_records_dict(&mut records, false).unwrap();

    let mut changed = records["B2020"].clone();
    changed.update_field(fields::TITLE, "Second, revised", "manual");
    let mut subset = records_dict([
        changed,
        prepared_article("D2020", "x.bib/4", "D, E", "Fourth", "2020"),
    ]);
    dataset.save_records_dict(&mut subset, true).unwrap();

    let loaded = dataset.load_records_dict(false).unwrap();
    assert_eq!(
        loaded.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["A2020", "B2020", "C2020", "D2020"]
    );
    assert_eq!(loaded["B2020"].get(fields::TITLE), Some("Second, revised"));
    assert_eq!(loaded["A2020"], records["A2020"]);
}

// ============================================================================
// Properties
// ============================================================================

fn value() -> impl Strategy<Value = String> {
    prop::collection::vec("[A-Za-z0-9.:-]{1,8}", 1..5).prop_map(|words| words.join(" "))
}

fn state() -> impl Strategy<Value = RecordState> {
    prop_oneof![
        Just(RecordState::MdImported),
        Just(RecordState::MdPrepared),
        Just(RecordState::MdProcessed),
        Just(RecordState::RevPrescreenIncluded),
        Just(RecordState::RevIncluded),
    ]
}

fn entry_type() -> impl Strategy<Value = EntryType> {
    prop_oneof![
        Just(EntryType::Article),
        Just(EntryType::Inproceedings),
        Just(EntryType::Book),
        Just(EntryType::Misc),
    ]
}

fn records() -> impl Strategy<Value = RecordsDict> {
    prop::collection::vec((entry_type(), state(), value(), value(), value()), 1..8).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (entry_type, state, title, author, abstract_))| {
                let id = format!("R{i}");
                let origin = format!("search.bib/{:06}", i + 1);
                let mut record = Record::new(id.clone(), entry_type)
                    .with_field(fields::TITLE, title)
                    .with_field(fields::AUTHOR, author)
                    .with_field(fields::YEAR, "2020")
                    .with_field(fields::ABSTRACT, abstract_)
                    .with_origin(origin.clone())
                    .with_status(state);
                record.add_provenance_all(&origin);
                (id, record)
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn bibtex_round_trip(records in records()) {
        let text = bibtex::to_string(&records).unwrap();
        let parsed = bibtex::parse_str(&text).unwrap();
        prop_assert_eq!(&parsed, &records);
        prop_assert_eq!(bibtex::to_string(&parsed).unwrap(), text);
    }

    #[test]
    fn feed_ids_only_grow(dois in prop::collection::vec(0u8..12, 1..40)) {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("crossref.bib");
        let feed = SearchFeed::new(fields::DOI, &file, false, true).unwrap();

        let mut assigned: HashMap<u8, String> = HashMap::new();
        let mut last_new = 0u64;
        for doi in &dois {
            let mut record = Record::new("", EntryType::Article)
                .with_field(fields::DOI, format!("10.1/{doi}"));
            let added = feed.add_update_record(&mut record).unwrap();
            let local: u64 = record.id.parse().unwrap();
            match assigned.get(doi) {
                Some(id) => {
                    prop_assert!(!added);
                    prop_assert_eq!(id, &record.id);
                }
                None => {
                    prop_assert!(added);
                    prop_assert!(local > last_new);
                    last_new = local;
                    assigned.insert(*doi, record.id.clone());
                }
            }
        }
        feed.save().unwrap();

        let reopened = SearchFeed::new(fields::DOI, &file, true, true).unwrap();
        let next: u64 = reopened.next_id().parse().unwrap();
        prop_assert_eq!(next, last_new + 1);
    }
}
