//! Reconciliation of diverging records files
//!
//! Two branches may move the same record through the lifecycle on their
//! own. Merging them is total on the status: a [`StatusResolver`] picks
//! the status to keep. Any other disagreement must be resolved in the
//! working tree first and is reported as
//! [`ColrevError::NonStatusConflict`].

use crate::error::{ColrevError, Result};
use colrev_record::{fields, Record, RecordsDict};
use colrev_state::RecordState;
use tracing::{debug, info};

/// Chooses the status of a record both branches changed
pub trait StatusResolver {
    /// Status to keep for `id`
    fn resolve(&self, id: &str, ours: RecordState, theirs: RecordState) -> RecordState;
}

impl<F> StatusResolver for F
where
    F: Fn(&str, RecordState, RecordState) -> RecordState,
{
    fn resolve(&self, id: &str, ours: RecordState, theirs: RecordState) -> RecordState {
        self(id, ours, theirs)
    }
}

/// Keeps the more advanced status
#[derive(Debug, Clone, Copy, Default)]
pub struct LaterStatus;

impl StatusResolver for LaterStatus {
    fn resolve(&self, _id: &str, ours: RecordState, theirs: RecordState) -> RecordState {
        ours.later(theirs)
    }
}

/// Merge `theirs` into `ours`
///
/// Records present on one side only are kept. Records present on both
/// sides must agree on everything except the status.
///
/// # Errors
/// Returns [`ColrevError::NonStatusConflict`] for the first record whose
/// fields, origins or provenance differ.
pub fn reconcile(ours: &RecordsDict, theirs: &RecordsDict, resolver: &dyn StatusResolver) -> Result<RecordsDict> {
    let mut merged = ours.clone();
    let mut resolved = 0usize;

    for (id, their_record) in theirs {
        let Some(our_record) = merged.get_mut(id) else {
            debug!(id = %id, "record only on their side");
            merged.insert(id.clone(), their_record.clone());
            continue;
        };

        let (our_status, their_status) = (our_record.status(), their_record.status());
        let mut aligned = their_record.clone();
        aligned.set_status(our_status, true)?;
        if aligned != *our_record {
            return Err(ColrevError::NonStatusConflict {
                id: id.clone(),
                field: conflicting_field(our_record, their_record),
            });
        }

        if our_status != their_status {
            let status = resolver.resolve(id, our_status, their_status);
            debug!(id = %id, ours = %our_status, theirs = %their_status, kept = %status, "status conflict");
            our_record.set_status(status, true)?;
            resolved += 1;
        }
    }

    info!(resolved, records = merged.len(), "reconciled");
    Ok(merged)
}

/// Name of the first field the two versions disagree on
fn conflicting_field(ours: &Record, theirs: &Record) -> String {
    if let Some(change) = ours.get_diff(theirs, false).first() {
        return change.key().to_string();
    }
    if ours.origins() != theirs.origins() {
        return fields::ORIGIN.to_string();
    }
    if ours.md_prov() != theirs.md_prov() {
        return fields::MD_PROV.to_string();
    }
    fields::D_PROV.to_string()
}
