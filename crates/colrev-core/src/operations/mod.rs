//! Review operations
//!
//! One module per operation of the record lifecycle:
//!
//! ```text
//! search → load → prep → prep_man → dedupe → prescreen → pdf_get → pdf_get_man
//!        → pdf_prep → pdf_prep_man → screen → data
//! ```
//!
//! Each operation borrows the [`ReviewManager`], checks its precondition,
//! changes record states only along the transition table and ends with a
//! single commit.
//!
//! [`ReviewManager`]: crate::ReviewManager

pub mod data;
pub mod dedupe;
pub mod load;
pub mod pdf_get;
pub mod pdf_get_man;
pub mod pdf_prep;
pub mod pdf_prep_man;
pub mod prep;
pub mod prep_man;
pub mod prescreen;
pub mod screen;
pub mod search;

use crate::error::Result;
use colrev_record::{fields, Record};
use colrev_state::{Operation, RecordState, StateModel};
use std::path::{Path, PathBuf};

pub use data::{Data, DataPackage, PaperMarkdown};
pub use dedupe::{Dedupe, DuplicatePair, SameSourceMerges};
pub use load::Load;
pub use pdf_get::{DirectoryRetriever, PdfGet, PdfRetriever};
pub use pdf_get_man::{PdfGetMan, PdfGetManDecision};
pub use pdf_prep::PdfPrep;
pub use pdf_prep_man::{PdfPrepMan, PdfPrepManDecision};
pub use prep::{FieldFormatPrep, Prep, PrepPackage, SourceSpecificPrep};
pub use prep_man::{ManualEdit, PrepMan};
pub use prescreen::{Prescreen, PrescreenDecision};
pub use screen::{Screen, ScreenDecision};
pub use search::Search;

/// Move `record` to `target` through `operation`
///
/// # Errors
/// Returns [`ColrevError::InvalidStateTransition`] when the transition
/// table has no such step for the operation.
///
/// [`ColrevError::InvalidStateTransition`]: crate::ColrevError::InvalidStateTransition
pub(crate) fn transition(record: &mut Record, target: RecordState, operation: Operation) -> Result<()> {
    let current = record.status();
    StateModel::validate(&record.id, current, target, operation)?;
    record.set_status(target, true)?;
    Ok(())
}

/// Validate a status the record set on its own (quality models, retraction)
///
/// Staying in `from` is accepted. Retracted records may leave any state
/// for prescreen exclusion.
///
/// # Errors
/// Returns [`ColrevError::InvalidStateTransition`] for other changes
/// outside the transition table.
///
/// [`ColrevError::InvalidStateTransition`]: crate::ColrevError::InvalidStateTransition
pub(crate) fn validate_status(record: &Record, from: RecordState, operation: Operation) -> Result<()> {
    let to = record.status();
    if to == from || is_retraction(record) {
        return Ok(());
    }
    StateModel::validate(&record.id, from, to, operation)?;
    Ok(())
}

fn is_retraction(record: &Record) -> bool {
    record.status() == RecordState::RevPrescreenExcluded && record.contains(fields::RETRACTED)
}

/// Ids of the records in `state`, in file order
pub(crate) fn ids_in_state<'a, I>(records: I, state: RecordState) -> Vec<String>
where
    I: IntoIterator<Item = &'a Record>,
{
    records
        .into_iter()
        .filter(|r| r.status() == state)
        .map(|r| r.id.clone())
        .collect()
}

/// `file` field value for a PDF stored under the project root
pub(crate) fn file_field(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Absolute path of a record's `file` field
pub(crate) fn record_file(root: &Path, record: &Record) -> Option<PathBuf> {
    record.get(fields::FILE).map(|file| {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use colrev_record::EntryType;

    #[test]
    fn transition_follows_table() {
        let mut record = Record::new("a", EntryType::Article).with_status(RecordState::MdProcessed);
        transition(&mut record, RecordState::RevPrescreenIncluded, Operation::Prescreen).unwrap();
        assert_eq!(record.status(), RecordState::RevPrescreenIncluded);

        let err = transition(&mut record, RecordState::RevIncluded, Operation::Screen).unwrap_err();
        assert!(err.aborts_operation());
        assert_eq!(record.status(), RecordState::RevPrescreenIncluded);
    }

    #[test]
    fn retraction_passes_validation() {
        let mut record = Record::new("a", EntryType::Article).with_status(RecordState::MdImported);
        record.prescreen_exclude("retracted");
        assert!(validate_status(&record, RecordState::MdImported, Operation::Prep).is_ok());
    }

    #[test]
    fn file_field_is_relative() {
        let root = Path::new("/project");
        assert_eq!(file_field(root, Path::new("/project/data/pdfs/a.pdf")), "data/pdfs/a.pdf");
        let record = Record::new("a", EntryType::Article).with_field(fields::FILE, "data/pdfs/a.pdf");
        assert_eq!(record_file(root, &record), Some(PathBuf::from("/project/data/pdfs/a.pdf")));
    }
}
