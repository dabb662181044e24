//! CoLRev dataset layer
//!
//! Everything that touches the project files:
//!
//! - the records file (`data/records.bib`) through the [`Dataset`] façade
//! - search feeds under `data/search/` ([`SearchFeed`])
//! - settings (`settings.json`) and the status report (`status.yaml`)
//! - the version history ([`History`], backed by Git)
//! - cross-record checks run before every commit ([`check_records`])
//!
//! # Architecture
//!
//! ```text
//! search result file → ParserRegistry → SearchSource::load ─┐
//!                                                           ↓
//! SearchSource::search → SearchFeed (data/search/*.bib) → main records
//!                                                           ↓
//!                      Dataset::save_records_dict → data/records.bib → History::commit
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use colrev_dataset::{Dataset, Settings};
//!
//! let dataset = Dataset::open(root)?;
//! let mut records = dataset.load_records_dict(false)?;
//! // ... edit records ...
//! dataset.save_records_dict(&mut records, false)?;
//! let report = dataset.check(&Settings::load(&dataset.paths().settings())?)?;
//! assert!(report.is_ok());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod bibtex;
pub mod checks;
mod dataset;
pub mod error;
mod feed;
mod history;
pub mod parsers;
pub mod paths;
pub mod settings;
pub mod source;
mod status;

pub use checks::{check_records, CheckContext, CheckReport, InvalidTransition, PropagatedIdChange};
pub use dataset::{Dataset, FormatOutcome};
pub use error::{
    DatasetError, FeedError, HistoryError, ParseError, Result, SerializeError, SettingsError,
};
pub use feed::{FeedSummary, SearchFeed};
pub use history::{CommitInfo, GitHistory, History, MemoryHistory};
pub use parsers::{default_parsers, LoadOptions, ParserRegistry, RecordParser};
pub use paths::ProjectPaths;
pub use settings::{CriterionType, PdfPathType, ScreenCriterion, SearchSourceSettings, SearchType, Settings};
pub use source::{SearchSource, SourceRegistry};
pub use status::StatusReport;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use colrev_record::fields;
    use colrev_state::RecordState;
    use colrev_test_utils::{records_dict, scenario_forthcoming};
    use pretty_assertions::assert_eq;

    #[test]
    fn feed_update_reaches_records_file() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::new(
            ProjectPaths::new(dir.path()),
            Box::new(MemoryHistory::new(dir.path())),
        );
        let (main, mut incoming) = scenario_forthcoming();
        let mut records = records_dict([main]);
        dataset.save_records_dict(&mut records, false).unwrap();

        let source = SearchSourceSettings::new("colrev.crossref", "crossref.bib", SearchType::Api);
        let feed = dataset.search_feed(&source, fields::DOI, false, false).unwrap();
        feed.add_update_record(&mut incoming).unwrap();
        let summary = dataset.save_feed(feed).unwrap();
        assert_eq!(summary, FeedSummary { added: 1, updated: 1 });

        let records = dataset.load_records_dict(false).unwrap();
        let record = &records["Rai2022"];
        assert_eq!(record.get(fields::YEAR), Some("2022"));
        assert_eq!(record.get(fields::VOLUME), Some("12"));
        assert!(dataset.paths().feed_file("crossref.bib").is_file());
    }

    #[test]
    fn registry_loads_ris_exports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scopus.ris");
        std::fs::write(
            &path,
            "TY  - JOUR\nAU  - Rai, Arun\nTI  - Editorial\nPY  - 2020\nJO  - MIS Quarterly\nER  - \n",
        )
        .unwrap();
        let registry = source::SourceRegistry::with_defaults();
        let source = registry.get(source::UNKNOWN_SOURCE).unwrap();
        let records = source.load(&path, &default_parsers()).unwrap();
        assert_eq!(records.len(), 1);
        let record = records.values().next().unwrap();
        assert_eq!(record.get(fields::JOURNAL), Some("MIS Quarterly"));
        assert_eq!(record.status(), RecordState::MdRetrieved);
    }
}
