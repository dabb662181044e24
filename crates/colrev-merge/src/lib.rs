//! Record merging
//!
//! Fuses duplicate records while respecting curation authority.
//!
//! # Core Concepts
//!
//! - [`Merger`]: origin union, status alignment, curation gate, field fusion
//! - [`FieldFuser`]: per-field conflict resolution
//! - [`FuserRegistry`]: field name to fuser
//! - [`prevent_invalid_merges`]: refuses multi-part and erratum look-alikes
//!
//! # Example
//!
//! ```rust,ignore
//! use colrev_merge::Merger;
//!
//! let merger = Merger::new().with_preferred_prefixes(["md_crossref"]);
//! merger.merge(&mut main, &mut duplicate, "dedupe")?;
//! ```

#![warn(unreachable_pub)]

mod error;
mod fuser;
mod guard;
mod merger;
mod registry;

pub use error::{MergeError, Result};
pub use fuser::{
    AuthorFuser, ContainerTitleFuser, FieldFuser, FileFuser, Fusion, PagesFuser, TitleFuser,
    UrlFuser,
};
pub use guard::prevent_invalid_merges;
pub use merger::{Merger, RecordMergeExt};
pub use registry::FuserRegistry;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use colrev_record::{fields, EntryType, Record};
    use colrev_state::RecordState;
    use pretty_assertions::assert_eq;

    #[test]
    fn merge_through_record_method() {
        let mut main = Record::new("a", EntryType::Inproceedings)
            .with_field(fields::TITLE, "Digital platforms")
            .with_field(fields::AUTHOR, "Rai, Arun")
            .with_field(fields::YEAR, "2020")
            .with_field(fields::BOOKTITLE, "Proc. ICIS")
            .with_origin("dblp.bib/000001")
            .with_status(RecordState::MdPrepared);
        let mut other = Record::new("b", EntryType::Inproceedings)
            .with_field(fields::TITLE, "Digital platforms")
            .with_field(fields::AUTHOR, "Rai, Arun")
            .with_field(fields::YEAR, "2020")
            .with_field(fields::BOOKTITLE, "International Conference on Information Systems")
            .with_origin("crossref.bib/000007")
            .with_status(RecordState::MdPrepared);

        main.merge(&mut other, "dedupe", &[]).unwrap();
        assert_eq!(
            main.get(fields::BOOKTITLE),
            Some("International Conference on Information Systems")
        );
        let origins: Vec<&str> = main.origins().iter().map(String::as_str).collect();
        assert_eq!(origins, vec!["crossref.bib/000007", "dblp.bib/000001"]);
    }
}
