//! Record ids
//!
//! Records are keyed by short, human-readable ids such as `Webster2002`.
//! An [`IdPattern`] derives the base id from the masterdata; the
//! [`IdIndex`] (a radix trie over lowercase ids) finds the next free letter
//! suffix so ids stay unique even on case-insensitive filesystems.
//!
//! # Example
//!
//! ```rust,ignore
//! use colrev_ids::{IdPattern, IdSetter};
//!
//! let changes = IdSetter::new(IdPattern::FirstAuthorYear).set_ids(&mut records, None)?;
//! for change in changes {
//!     println!("{} -> {}", change.old, change.new);
//! }
//! ```

#![warn(unreachable_pub)]

mod error;
mod index;
mod pattern;
mod setter;

pub use error::{IdError, Result};
pub use index::IdIndex;
pub use pattern::IdPattern;
pub use setter::{IdChange, IdSetter, LocalIndex};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use colrev_record::{fields, EntryType, Record, RecordsDict};
    use colrev_state::RecordState;
    use pretty_assertions::assert_eq;

    #[test]
    fn ids_follow_masterdata_and_stay_unique() {
        let mut records: RecordsDict = [
            ("000001", "Webster, Jane and Watson, Richard T.", "2002"),
            ("000002", "WEBSTER, JANE", "2002"),
            ("000003", "Rai, Arun", "2017"),
        ]
        .into_iter()
        .map(|(id, author, year)| {
            let r = Record::new(id, EntryType::Article)
                .with_field(fields::AUTHOR, author)
                .with_field(fields::YEAR, year)
                .with_status(RecordState::MdPrepared);
            (id.to_string(), r)
        })
        .collect();

        let setter = IdSetter::new(IdPattern::ThreeAuthorsYear);
        setter.set_ids(&mut records, None).unwrap();
        let ids: Vec<&str> = records.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["WebsterWatson2002", "Webster2002", "Rai2017"]);

        // a second pass is a no-op
        let changes = setter.set_ids(&mut records, None).unwrap();
        assert!(changes.is_empty());
    }
}
