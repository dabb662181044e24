//! Dedupe: merge records that describe the same work
//!
//! Records in `md_prepared` are clustered by their `colrev_id`. Records
//! that already passed `md_processed` act as anchors: prepared records
//! sharing an anchor's id are merged into it, and anchors are never merged
//! with each other. Every merged duplicate leaves the records file; its
//! origins live on in the surviving record. Prepared records that stay
//! unmerged become `md_processed`.

use super::transition;
use crate::commit::CommitMessage;
use crate::error::Result;
use crate::ReviewManager;
use colrev_record::{fields, EntryType, Record, RecordsDict};
use colrev_state::{Operation, RecordState};
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Default provenance source of merged fields without provenance
pub const MERGED_SOURCE: &str = "merged";

/// Whether duplicates from the same feed may be merged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SameSourceMerges {
    /// Skip the pair with a warning
    #[default]
    Prevent,
    /// Merge anyway
    Apply,
}

/// Two records judged to be duplicates
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicatePair {
    /// First record
    pub id1: String,
    /// Second record
    pub id2: String,
    /// Classifier confidence, `None` for manual and identity-based decisions
    pub score: Option<f64>,
}

impl DuplicatePair {
    /// Pair without a score
    #[must_use]
    pub fn new(id1: impl Into<String>, id2: impl Into<String>) -> Self {
        Self {
            id1: id1.into(),
            id2: id2.into(),
            score: None,
        }
    }

    /// Builder: attach a confidence score
    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

/// Dedupe operation
#[derive(Debug)]
pub struct Dedupe<'a> {
    review_manager: &'a ReviewManager,
    same_source_merges: SameSourceMerges,
}

impl<'a> Dedupe<'a> {
    /// Dedupe operation on `review_manager`
    #[must_use]
    pub fn new(review_manager: &'a ReviewManager) -> Self {
        Self {
            review_manager,
            same_source_merges: SameSourceMerges::default(),
        }
    }

    /// Builder: policy for duplicates within one feed
    #[must_use]
    pub fn with_same_source_merges(mut self, policy: SameSourceMerges) -> Self {
        self.same_source_merges = policy;
        self
    }

    /// Pairs of records sharing a `colrev_id`
    ///
    /// Each pair joins a prepared record to the first member of its
    /// cluster, or to the anchor when the cluster has one. Records whose id
    /// cannot be derived are left alone.
    #[must_use]
    pub fn find_duplicates(&self, records: &RecordsDict) -> Vec<DuplicatePair> {
        let mut clusters: IndexMap<String, Vec<&Record>> = IndexMap::new();
        for record in records.values() {
            let status = record.status();
            if status != RecordState::MdPrepared && !status.is_post(RecordState::MdProcessed) {
                continue;
            }
            match record.colrev_id(status.is_post(RecordState::MdProcessed)) {
                Ok(id) => clusters.entry(id.as_str().to_string()).or_default().push(record),
                Err(e) => debug!(id = %record.id, error = %e, "no colrev_id"),
            }
        }

        let mut pairs = Vec::new();
        for members in clusters.values().filter(|m| m.len() > 1) {
            let target = members
                .iter()
                .find(|r| r.status() != RecordState::MdPrepared)
                .unwrap_or(&members[0]);
            pairs.extend(
                members
                    .iter()
                    .filter(|r| r.id != target.id && r.status() == RecordState::MdPrepared)
                    .map(|r| DuplicatePair::new(target.id.clone(), r.id.clone())),
            );
        }
        pairs
    }

    /// Merge every pair whose records still exist
    ///
    /// Pairs pointing at an already merged record follow `MOVED_DUPE_ID` to
    /// the survivor. Returns the number of removed duplicates.
    ///
    /// # Errors
    /// Returns [`ColrevError`] when a merge fails for other reasons than
    /// describing different works.
    ///
    /// [`ColrevError`]: crate::ColrevError
    pub fn apply_merges(&self, records: &mut RecordsDict, pairs: &[DuplicatePair]) -> Result<usize> {
        let mut moved: BTreeMap<String, Record> = BTreeMap::new();
        for pair in pairs {
            let (Some(id1), Some(id2)) = (resolve(records, &moved, &pair.id1), resolve(records, &moved, &pair.id2))
            else {
                warn!(id1 = %pair.id1, id2 = %pair.id2, "record of duplicate pair not found");
                continue;
            };
            if id1 == id2 {
                continue;
            }
            let (main_id, dupe_id) = primary(&records[&id1], &records[&id2]);
            match self.merge_pair(records, &main_id, &dupe_id) {
                Ok(Some(dupe)) => {
                    let conf = pair.score.map(|s| format!(" (confidence: {s:.3})")).unwrap_or_default();
                    info!("Removed duplicate{conf}: {main_id} <- {dupe_id}");
                    moved.insert(dupe_id, dupe);
                }
                Ok(None) => {}
                Err(e) if e.is_record_level() => warn!(error = %e, "merge refused"),
                Err(e) => return Err(e),
            }
        }
        Ok(moved.len())
    }

    /// Merge `dupe_id` into `main_id` and take the duplicate out of `records`
    fn merge_pair(&self, records: &mut RecordsDict, main_id: &str, dupe_id: &str) -> Result<Option<Record>> {
        let mut main = records[main_id].clone();
        let mut dupe = records[dupe_id].clone();

        if is_cross_level(&main, &dupe) {
            warn!(main = main_id, dupe = dupe_id, "Skipped merge of proceedings and contained paper");
            return Ok(None);
        }
        if self.same_source_merges == SameSourceMerges::Prevent && same_source(&main, &dupe) {
            warn!(main = main_id, dupe = dupe_id, "Prevented same-source merge");
            return Ok(None);
        }

        self.review_manager.merger().merge(&mut main, &mut dupe, MERGED_SOURCE)?;
        records.insert(main_id.to_string(), main);
        records.shift_remove(dupe_id);
        dupe.insert_raw(fields::MOVED_DUPE_ID, main_id);
        Ok(Some(dupe))
    }

    /// Detect and merge duplicates, then mark the rest as processed
    ///
    /// # Errors
    /// Returns [`ColrevError`] when the precondition fails, a merge breaks
    /// the transition table or the commit checks fail.
    ///
    /// [`ColrevError`]: crate::ColrevError
    pub fn main(&self) -> Result<CommitMessage> {
        let rm = self.review_manager;
        rm.notify(Operation::Dedupe)?;
        let mut records = rm.dataset().load_records_dict(false)?;

        let pairs = self.find_duplicates(&records);
        info!(candidates = pairs.len(), "duplicate pairs");
        let removed = self.apply_merges(&mut records, &pairs)?;

        let mut message = CommitMessage::new(Operation::Dedupe);
        message.add_stat("removed duplicates", removed);
        message.add_stat("processed", self.finish(&mut records)?);
        self.save_and_commit(&mut records, &message)?;
        Ok(message)
    }

    /// Apply decisions made outside the automatic clustering
    ///
    /// Records listed as non-duplicates become `md_processed`.
    ///
    /// # Errors
    /// Returns [`ColrevError`] when the precondition fails, a merge breaks
    /// the transition table or the commit checks fail.
    ///
    /// [`ColrevError`]: crate::ColrevError
    pub fn merge_decisions(&self, duplicates: &[DuplicatePair], non_duplicates: &[String]) -> Result<CommitMessage> {
        let rm = self.review_manager;
        rm.notify(Operation::Dedupe)?;
        let mut records = rm.dataset().load_records_dict(false)?;
        let removed = self.apply_merges(&mut records, duplicates)?;

        let mut processed = 0;
        for id in non_duplicates {
            if let Some(record) = records.get_mut(id).filter(|r| r.status() == RecordState::MdPrepared) {
                transition(record, RecordState::MdProcessed, Operation::Dedupe)?;
                processed += 1;
            }
        }

        let mut message = CommitMessage::new(Operation::Dedupe);
        message.add_stat("removed duplicates", removed);
        message.add_stat("processed", processed);
        self.save_and_commit(&mut records, &message)?;
        Ok(message)
    }

    /// Move every remaining prepared record to `md_processed`
    fn finish(&self, records: &mut RecordsDict) -> Result<usize> {
        let mut processed = 0;
        for record in records.values_mut() {
            record.remove_field(fields::MOVED_DUPE_ID);
            if record.status() == RecordState::MdPrepared {
                transition(record, RecordState::MdProcessed, Operation::Dedupe)?;
                processed += 1;
            }
        }
        Ok(processed)
    }

    fn save_and_commit(&self, records: &mut RecordsDict, message: &CommitMessage) -> Result<()> {
        let rm = self.review_manager;
        rm.dataset().save_records_dict(records, false)?;
        rm.create_commit(message)?;
        Ok(())
    }
}

/// Follow `MOVED_DUPE_ID` from `id` to a record still in `records`
fn resolve(records: &RecordsDict, moved: &BTreeMap<String, Record>, id: &str) -> Option<String> {
    let mut current = id.to_string();
    for _ in 0..=moved.len() {
        if records.contains_key(&current) {
            return Some(current);
        }
        current = moved.get(&current)?.get(fields::MOVED_DUPE_ID)?.to_string();
    }
    None
}

/// `(main, duplicate)` of a pair
///
/// Curated records and records past `md_prepared` survive. Otherwise the
/// first record survives unless only the second has an id without a
/// disambiguation letter.
fn primary(r1: &Record, r2: &Record) -> (String, String) {
    let swap = match (r1.masterdata_is_curated(), r2.masterdata_is_curated()) {
        (false, true) => true,
        (true, false) => false,
        _ => match (r1.status() == RecordState::MdPrepared, r2.status() == RecordState::MdPrepared) {
            (true, false) => true,
            (false, true) => false,
            _ => !ends_with_digit(&r1.id) && ends_with_digit(&r2.id),
        },
    };
    if swap {
        (r2.id.clone(), r1.id.clone())
    } else {
        (r1.id.clone(), r2.id.clone())
    }
}

fn ends_with_digit(id: &str) -> bool {
    id.chars().last().is_some_and(|c| c.is_ascii_digit())
}

/// A proceedings volume and a paper it contains share title and year
fn is_cross_level(a: &Record, b: &Record) -> bool {
    (a.entry_type == EntryType::Proceedings) != (b.entry_type == EntryType::Proceedings)
}

fn source_prefixes(record: &Record) -> BTreeSet<&str> {
    record
        .origins()
        .iter()
        .filter_map(|o| o.split_once('/').map(|(prefix, _)| prefix))
        .collect()
}

fn same_source(a: &Record, b: &Record) -> bool {
    let a = source_prefixes(a);
    source_prefixes(b).iter().any(|p| a.contains(p))
}
