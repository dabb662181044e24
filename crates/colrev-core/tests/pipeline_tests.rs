//! Operations on complete projects

use colrev_core::prelude::*;
use colrev_core::{reconcile, DuplicatePair, LaterStatus, ManualEdit, PdfGetManDecision, ScreenDecision};
use colrev_dataset::{Dataset, GitHistory, MemoryHistory, ProjectPaths, SearchSourceSettings, SearchType, Settings};
use colrev_record::{fields, RecordsDict};
use colrev_test_utils::{prepared_article, records_dict};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::path::Path;

const DBLP: &str = "@article{1,
   author = {Webster, Jane and Watson, Richard T.},
   title = {Analyzing the past to prepare for the future: Writing a literature review},
   journal = {MIS Quarterly},
   volume = {26},
   number = {2},
   year = {2002}
}

@article{2,
   author = {Doe, Jane},
   title = {Platform ecosystems},
   journal = {MIS Quarterly},
   volume = {40},
   number = {3},
   year = {2016}
}
";

const CROSSREF: &str = "@article{1,
   author = {Webster, Jane and Watson, Richard T.},
   title = {Analyzing the past to prepare for the future: Writing a literature review},
   journal = {MIS Quarterly},
   volume = {26},
   number = {2},
   year = {2002},
   doi = {10.2307/4132319}
}
";

fn dblp() -> SearchSourceSettings {
    SearchSourceSettings::new("colrev.unknown_source", "dblp.bib", SearchType::Db)
}

fn settings() -> Settings {
    Settings::default().with_source(dblp()).with_source(SearchSourceSettings::new(
        "colrev.unknown_source",
        "crossref.bib",
        SearchType::Db,
    ))
}

fn git_manager(root: &Path) -> ReviewManager {
    let history = GitHistory::init(root).unwrap();
    let dataset = Dataset::new(ProjectPaths::new(root), Box::new(history));
    ReviewManager::new(settings(), dataset)
        .unwrap()
        .with_pool(WorkerPool::sequential().unwrap())
}

fn memory_manager(root: &Path, settings: Settings) -> ReviewManager {
    let dataset = Dataset::new(ProjectPaths::new(root), Box::new(MemoryHistory::new(root)));
    ReviewManager::new(settings, dataset)
        .unwrap()
        .with_pool(WorkerPool::new(2).unwrap())
}

fn write_feeds(manager: &ReviewManager) {
    std::fs::create_dir_all(manager.paths().search()).unwrap();
    std::fs::write(manager.paths().feed_file("dblp.bib"), DBLP).unwrap();
    std::fs::write(manager.paths().feed_file("crossref.bib"), CROSSREF).unwrap();
}

#[test]
fn duplicates_from_two_feeds_are_merged() {
    let dir = tempfile::tempdir().unwrap();
    let rm = git_manager(dir.path());
    write_feeds(&rm);

    let loaded = Load::new(&rm).main().unwrap();
    assert_eq!(loaded.stat("imported"), 3);
    Prep::new(&rm).main().unwrap();
    let deduped = Dedupe::new(&rm).main().unwrap();
    assert_eq!(deduped.stat("removed duplicates"), 1);

    let records = rm.dataset().load_records_dict(false).unwrap();
    assert_eq!(records.len(), 2);
    let webster = &records["Webster2002"];
    assert_eq!(webster.status(), RecordState::MdProcessed);
    let origins: Vec<&str> = webster.origins().iter().map(String::as_str).collect();
    assert_eq!(origins, vec!["crossref.bib/1", "dblp.bib/1"]);
    assert_eq!(webster.get(fields::DOI), Some("10.2307/4132319"));
    assert!(!webster.contains(fields::MOVED_DUPE_ID));

    let commits = rm.dataset().history().iter_commits(Path::new("data/records.bib")).unwrap();
    let summaries: Vec<&str> = commits.iter().map(|c| c.summary.as_str()).collect();
    assert_eq!(summaries, vec!["Dedupe", "Prep", "Load"]);
}

#[test]
fn operations_wait_for_earlier_ones() {
    let dir = tempfile::tempdir().unwrap();
    let rm = memory_manager(dir.path(), settings());
    write_feeds(&rm);
    Load::new(&rm).main().unwrap();

    let err = Prescreen::new(&rm).include_all().unwrap_err();
    assert!(err.aborts_operation());
    assert!(matches!(
        err,
        ColrevError::ProcessOrderViolation {
            operation: Operation::Prescreen,
            ..
        }
    ));
    let records = rm.dataset().load_records_dict(false).unwrap();
    assert!(records.values().all(|r| r.status() == RecordState::MdImported));
}

#[test]
fn manual_work_unblocks_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let rm = memory_manager(dir.path(), Settings::default().with_source(dblp()));
    std::fs::create_dir_all(rm.paths().search()).unwrap();
    std::fs::write(
        rm.paths().feed_file("dblp.bib"),
        "@article{1,
   title = {Platform ecosystems},
   journal = {MIS Quarterly},
   volume = {40},
   number = {3},
   year = {2016}
}
",
    )
    .unwrap();

    Load::new(&rm).main().unwrap();
    let prepared = Prep::new(&rm).main().unwrap();
    assert_eq!(prepared.stat("needs manual preparation"), 1);
    assert!(Dedupe::new(&rm).main().is_err());

    let id = rm.dataset().load_records_dict(true).unwrap().keys().next().cloned().unwrap();
    PrepMan::new(&rm)
        .main(&[ManualEdit::SetField {
            id: id.clone(),
            key: fields::AUTHOR.to_string(),
            value: "Doe, Jane".to_string(),
        }])
        .unwrap();
    Dedupe::new(&rm).main().unwrap();
    Prescreen::new(&rm).include_all().unwrap();
    PdfGet::new(&rm).main().unwrap();
    let get_man = PdfGetMan::new(&rm);
    assert_eq!(get_man.queue().unwrap(), vec![id.clone()]);
    get_man.main(&[PdfGetManDecision::NotAvailable(id.clone())]).unwrap();

    let records = rm.dataset().load_records_dict(false).unwrap();
    assert_eq!(records[&id].status(), RecordState::PdfNotAvailable);
    let screened = Screen::new(&rm).main(&[ScreenDecision::include(id)]).unwrap();
    assert_eq!(screened.stat("included"), 0);
}

#[test]
fn manual_merge_decisions() {
    let dir = tempfile::tempdir().unwrap();
    let rm = memory_manager(dir.path(), Settings::default());
    let mut records = records_dict([
        prepared_article("Rai2020", "dblp.bib/1", "Rai, Arun", "Digital platforms", "2020"),
        prepared_article("Rai2020a", "crossref.bib/1", "Rai, A.", "Digital platforms", "2020"),
    ]);
    rm.dataset().save_records_dict(&mut records, false).unwrap();

    Dedupe::new(&rm)
        .merge_decisions(&[DuplicatePair::new("Rai2020", "Rai2020a")], &[])
        .unwrap();
    let records = rm.dataset().load_records_dict(false).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records["Rai2020"].origins().len(), 2);
}

fn record_at(state: RecordState) -> RecordsDict {
    records_dict([
        prepared_article("Rai2020", "dblp.bib/1", "Rai, Arun", "Digital platforms", "2020").with_status(state)
    ])
}

proptest! {
    #[test]
    fn reconciled_status_is_never_behind(ours in 0usize..15, theirs in 0usize..15) {
        let (ours, theirs) = (RecordState::ALL[ours], RecordState::ALL[theirs]);
        let merged = reconcile(&record_at(ours), &record_at(theirs), &LaterStatus).unwrap();
        let status = merged["Rai2020"].status();
        prop_assert!(status >= ours && status >= theirs);
        prop_assert!(status == ours || status == theirs);
    }

    #[test]
    fn reconcile_with_itself_changes_nothing(state in 0usize..15) {
        let records = record_at(RecordState::ALL[state]);
        let merged = reconcile(&records, &records, &LaterStatus).unwrap();
        prop_assert_eq!(merged, records);
    }
}
