//! Id assignment properties

use colrev_ids::{IdIndex, IdPattern, IdSetter};
use colrev_record::{fields, EntryType, Record, RecordsDict};
use colrev_state::RecordState;
use proptest::prelude::*;
use std::collections::HashSet;

fn author() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("Smith, John"),
        Just("SMITH, JOHN"),
        Just("Smith, Jane and Doe, Ann"),
        Just("Müller, Karl"),
        Just("Muller, Karl"),
        Just(""),
    ]
}

fn state() -> impl Strategy<Value = RecordState> {
    prop_oneof![
        Just(RecordState::MdImported),
        Just(RecordState::MdPrepared),
        Just(RecordState::MdNeedsManualPreparation),
        Just(RecordState::MdProcessed),
        Just(RecordState::RevIncluded),
    ]
}

fn records() -> impl Strategy<Value = RecordsDict> {
    prop::collection::vec((author(), prop_oneof![Just("2020"), Just("2021")], state()), 1..25)
        .prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (author, year, state))| {
                    let id = format!("{:06}", i + 1);
                    let mut r = Record::new(id.clone(), EntryType::Article)
                        .with_field(fields::YEAR, year)
                        .with_status(state);
                    if !author.is_empty() {
                        r = r.with_field(fields::AUTHOR, author);
                    }
                    (id, r)
                })
                .collect()
        })
}

proptest! {
    #[test]
    fn ids_are_unique_ignoring_case(mut records in records()) {
        let before = records.len();
        IdSetter::new(IdPattern::FirstAuthorYear).set_ids(&mut records, None).unwrap();

        prop_assert_eq!(records.len(), before);
        let lowered: HashSet<String> = records.keys().map(|id| id.to_lowercase()).collect();
        prop_assert_eq!(lowered.len(), before);
        for (id, record) in &records {
            prop_assert_eq!(id, &record.id);
        }
    }

    #[test]
    fn processed_records_never_change(mut records in records()) {
        let frozen: Vec<String> = records
            .iter()
            .filter(|(_, r)| r.status().is_post(RecordState::MdProcessed))
            .map(|(id, _)| id.clone())
            .collect();
        IdSetter::new(IdPattern::ThreeAuthorsYear).set_ids(&mut records, None).unwrap();
        for id in frozen {
            prop_assert!(records.contains_key(&id));
        }
    }

    #[test]
    fn next_unique_id_is_free(existing in prop::collection::vec("[A-Za-z]{1,6}20(20|21)[a-c]?", 0..20)) {
        let index = IdIndex::from_ids(&existing);
        let id = index.next_unique_id("Smith2020");
        prop_assert!(!index.contains(&id));
        prop_assert!(id.starts_with("Smith2020"));
    }
}

#[test]
fn order_is_preserved() {
    let mut records: RecordsDict = ["b", "a", "c"]
        .into_iter()
        .map(|id| {
            let r = Record::new(id, EntryType::Article)
                .with_field(fields::AUTHOR, format!("{}, X.", id.to_uppercase()))
                .with_field(fields::YEAR, "2020")
                .with_status(RecordState::MdImported);
            (id.to_string(), r)
        })
        .collect();
    IdSetter::new(IdPattern::FirstAuthorYear).set_ids(&mut records, None).unwrap();
    let ids: Vec<&str> = records.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["B2020", "A2020", "C2020"]);
}
