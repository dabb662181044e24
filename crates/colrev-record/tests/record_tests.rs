use colrev_record::constants::{defects, is_identifying};
use colrev_record::{default_quality_model, fields, values, EntryType, Record};
use colrev_state::RecordState;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn base_article() -> Record {
    let mut r = Record::new("Smith2020", EntryType::Article)
        .with_field(fields::TITLE, "A study of reviews")
        .with_field(fields::AUTHOR, "Smith, John and Müller, Anna")
        .with_field(fields::YEAR, "2020")
        .with_field(fields::JOURNAL, "MIS Quarterly")
        .with_field(fields::VOLUME, "44")
        .with_field(fields::NUMBER, "1")
        .with_field(fields::DOI, "10.25300/MISQ/2020/1")
        .with_origin("crossref.bib/000001")
        .with_status(RecordState::MdImported);
    r.add_provenance_all("crossref.bib/000001");
    r
}

#[derive(Debug, Clone)]
enum Edit {
    Update(&'static str, String),
    Remove(&'static str),
    RemoveNotMissing(&'static str),
    Rename(&'static str, &'static str),
    Ignore(&'static str, &'static str),
}

fn any_key() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just(fields::TITLE),
        Just(fields::AUTHOR),
        Just(fields::YEAR),
        Just(fields::JOURNAL),
        Just(fields::BOOKTITLE),
        Just(fields::VOLUME),
        Just(fields::NUMBER),
        Just(fields::PAGES),
        Just(fields::DOI),
        Just(fields::URL),
        Just(fields::ABSTRACT),
    ]
}

fn any_code() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just(defects::MISSING),
        Just(defects::MOSTLY_ALL_CAPS),
        Just(defects::PAGE_RANGE),
        Just(defects::HTML_TAGS),
    ]
}

fn any_edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (any_key(), "[A-Za-z0-9 ]{1,20}").prop_map(|(k, v)| Edit::Update(k, v)),
        any_key().prop_map(Edit::Remove),
        any_key().prop_map(Edit::RemoveNotMissing),
        (any_key(), any_key()).prop_map(|(a, b)| Edit::Rename(a, b)),
        (any_key(), any_code()).prop_map(|(k, c)| Edit::Ignore(k, c)),
    ]
}

fn apply(record: &mut Record, edit: &Edit) {
    match edit {
        Edit::Update(k, v) => record.update_field(k, v.clone(), "prop"),
        Edit::Remove(k) => record.remove_field(k),
        Edit::RemoveNotMissing(k) => record.remove_field_not_missing(k, Some("prop")),
        Edit::Rename(a, b) => record.rename_field(a, b),
        Edit::Ignore(k, c) => record.ignore_defect(k, c),
    }
}

#[test]
fn test_quality_model_marks_prepared_records() {
    let mut r = base_article();
    r.run_quality_model(&default_quality_model(), true);
    assert_eq!(r.status(), RecordState::MdPrepared);
    assert!(r.is_prepared());
}

#[test]
fn test_change_entrytype_to_inproceedings() {
    let qm = default_quality_model();
    let mut r = base_article();
    r.run_quality_model(&qm, true);
    r.change_entrytype(EntryType::Inproceedings, &qm).unwrap();

    assert_eq!(r.entry_type, EntryType::Inproceedings);
    assert_eq!(r.get(fields::BOOKTITLE), Some("MIS Quarterly"));
    assert!(!r.contains(fields::JOURNAL));
    // volume and number do not belong to inproceedings
    assert!(r.has_quality_defects(Some(fields::NUMBER)));
    assert_eq!(r.status(), RecordState::MdNeedsManualPreparation);
}

#[test]
fn test_change_entrytype_refuses_unknown_types() {
    let qm = default_quality_model();
    let mut r = base_article();
    let before = r.clone();
    assert!(r.change_entrytype(EntryType::parse("patent"), &qm).is_err());
    assert_eq!(r, before);
}

#[test]
fn test_retracted_records_are_excluded() {
    let mut r = base_article().with_field(fields::CROSSMARK, "True");
    r.run_quality_model(&default_quality_model(), true);
    assert_eq!(r.status(), RecordState::RevPrescreenExcluded);
    assert_eq!(r.get(fields::RETRACTED), Some(values::RETRACTED));
    assert!(!r.contains(fields::CROSSMARK));
}

#[test]
fn test_colrev_id_requires_prepared_status() {
    let r = base_article();
    assert!(r.colrev_id(false).is_err());
    assert!(r.colrev_id(true).is_ok());
}

proptest! {
    #[test]
    fn prop_provenance_stays_aligned(edits in prop::collection::vec(any_edit(), 0..12)) {
        let mut r = base_article();
        for edit in &edits {
            apply(&mut r, edit);
        }
        r.align_provenance();

        for key in r.fields().keys() {
            if key == fields::ID || key == fields::ENTRYTYPE {
                continue;
            }
            let table = if is_identifying(key) { r.md_prov() } else { r.d_prov() };
            prop_assert!(table.contains_key(key.as_str()), "{key} has no provenance");
        }
        for (key, prov) in r.md_prov().iter().chain(r.d_prov().iter()) {
            prop_assert!(
                r.contains(key) || prov.notes.is_ignored(defects::MISSING),
                "dangling provenance for {key}"
            );
        }
    }

    #[test]
    fn prop_quality_model_is_idempotent(edits in prop::collection::vec(any_edit(), 0..8)) {
        let qm = default_quality_model();
        let mut r = base_article();
        for edit in &edits {
            apply(&mut r, edit);
        }
        qm.run(&mut r);
        let once = r.clone();
        qm.run(&mut r);
        prop_assert_eq!(once, r);
    }

    #[test]
    fn prop_colrev_id_is_pure(edits in prop::collection::vec(any_edit(), 0..6)) {
        let mut r = base_article();
        for edit in &edits {
            apply(&mut r, edit);
        }
        let first = r.colrev_id(true);
        let second = r.colrev_id(true);
        prop_assert_eq!(first.is_ok(), second.is_ok());
        if let (Ok(a), Ok(b)) = (first, second) {
            prop_assert_eq!(a, b);
        }
    }
}
