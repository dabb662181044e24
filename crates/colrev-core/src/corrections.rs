//! Corrections of curated records
//!
//! Curated records are owned by another repository. When a review edits
//! their masterdata, the edits are collected as [`Correction`]s and sent
//! back to the curating repository, which must be clean and up to date
//! before it can receive them.

use crate::error::{ColrevError, Result};
use colrev_dataset::History;
use colrev_record::{fields, FieldChange, Record, RecordsDict};
use serde::Serialize;
use tracing::{debug, info};

/// Fields whose edits are reported to the curating repository
pub const ESSENTIAL_FIELDS: &[&str] = &[
    fields::TITLE,
    fields::AUTHOR,
    fields::JOURNAL,
    fields::BOOKTITLE,
    fields::YEAR,
    fields::VOLUME,
    fields::NUMBER,
    fields::PAGES,
    fields::DOI,
];

/// Edits of one curated record since the last commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Correction {
    /// Record id in the review
    pub id: String,
    /// Origins linking the record to its curated source
    pub origins: Vec<String>,
    /// Field edits
    pub changes: Vec<FieldChange>,
}

/// Check that `history` can receive corrections
///
/// # Errors
/// Returns [`ColrevError::CorrectionPrecondition`] when the repository
/// has uncommitted changes or lags behind its remote.
pub fn check_correction_precondition(history: &dyn History) -> Result<()> {
    if history.is_dirty()? {
        return Err(ColrevError::CorrectionPrecondition(
            "repository not clean: commit or stash before updating records".to_string(),
        ));
    }
    if history.behind_remote()? {
        return Err(ColrevError::CorrectionPrecondition(
            "repository behind remote: pull first to avoid conflicts".to_string(),
        ));
    }
    debug!("correction precondition met");
    Ok(())
}

/// Curated records whose essential fields changed between `prior` and
/// `current`
///
/// Records are matched through shared origins, so merged and renamed
/// records are still found.
#[must_use]
pub fn curated_corrections(prior: &RecordsDict, current: &RecordsDict) -> Vec<Correction> {
    let mut corrections = Vec::new();
    for record in current.values().filter(|r| r.masterdata_is_curated()) {
        let Some(before) = prior
            .values()
            .filter(|r| r.masterdata_is_curated())
            .find(|r| shares_origin(r, record))
        else {
            continue;
        };
        let changes: Vec<FieldChange> = before
            .get_diff(record, true)
            .into_iter()
            .filter(|c| ESSENTIAL_FIELDS.contains(&c.key()))
            .collect();
        if changes.is_empty() {
            continue;
        }
        info!(id = %record.id, changes = changes.len(), "correction of curated record");
        corrections.push(Correction {
            id: record.id.clone(),
            origins: record.origins().iter().cloned().collect(),
            changes,
        });
    }
    corrections
}

fn shares_origin(a: &Record, b: &Record) -> bool {
    a.origins().iter().any(|o| b.origins().contains(o))
}

#[cfg(test)]
mod tests {
    use super::*;
    use colrev_dataset::MemoryHistory;
    use colrev_test_utils::{records_dict, scenario_curated_merge};
    use std::path::PathBuf;

    #[test]
    fn clean_repository_accepts_corrections() {
        let dir = tempfile::tempdir().unwrap();
        let history = MemoryHistory::new(dir.path());
        std::fs::write(dir.path().join("a.txt"), "one").unwrap();
        history.commit("init", &[PathBuf::from("a.txt")]).unwrap();
        assert!(check_correction_precondition(&history).is_ok());

        std::fs::write(dir.path().join("a.txt"), "two").unwrap();
        let err = check_correction_precondition(&history).unwrap_err();
        assert!(matches!(err, ColrevError::CorrectionPrecondition(_)));
        assert!(err.aborts_operation());
    }

    #[test]
    fn behind_remote_blocks_corrections() {
        let dir = tempfile::tempdir().unwrap();
        let history = MemoryHistory::new(dir.path()).with_behind_remote(true);
        assert!(matches!(
            check_correction_precondition(&history),
            Err(ColrevError::CorrectionPrecondition(msg)) if msg.contains("behind remote")
        ));
    }

    #[test]
    fn edits_of_curated_masterdata_are_collected() {
        let (curated, _) = scenario_curated_merge();
        assert!(curated.masterdata_is_curated());
        let prior = records_dict([curated.clone()]);

        let mut edited = curated;
        edited.insert_raw(fields::TITLE, "A corrected title");
        edited.insert_raw(fields::ABSTRACT, "Not essential");
        let current = records_dict([edited]);

        let corrections = curated_corrections(&prior, &current);
        assert_eq!(corrections.len(), 1);
        assert_eq!(corrections[0].changes.len(), 1);
        assert_eq!(corrections[0].changes[0].key(), fields::TITLE);
        assert!(curated_corrections(&prior, &prior).is_empty());
    }
}
