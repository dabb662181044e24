//! Record id assignment

use crate::error::{IdError, Result};
use crate::index::IdIndex;
use crate::pattern::IdPattern;
use colrev_record::{Record, RecordsDict};
use colrev_state::RecordState;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lookup of curated ids shared across projects
pub trait LocalIndex: Send + Sync {
    /// Id the record carries in the local index
    ///
    /// # Errors
    /// Returns [`IdError::RecordNotInIndex`] when the record is unknown.
    fn get_id_for(&self, record: &Record) -> Result<String>;
}

/// One id change made by [`IdSetter::set_ids`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdChange {
    /// Previous id
    pub old: String,
    /// Assigned id
    pub new: String,
}

/// Assigns ids from a pattern, avoiding collisions
pub struct IdSetter {
    pattern: IdPattern,
    local_index: Option<Arc<dyn LocalIndex>>,
}

impl fmt::Debug for IdSetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdSetter")
            .field("pattern", &self.pattern)
            .field("local_index", &self.local_index.is_some())
            .finish()
    }
}

impl IdSetter {
    /// Setter using `pattern`
    #[must_use]
    pub fn new(pattern: IdPattern) -> Self {
        Self {
            pattern,
            local_index: None,
        }
    }

    /// Builder: consult a local index for curated ids
    #[must_use]
    pub fn with_local_index(mut self, index: Arc<dyn LocalIndex>) -> Self {
        self.local_index = Some(index);
        self
    }

    /// Id pattern in use
    #[must_use]
    pub fn pattern(&self) -> IdPattern {
        self.pattern
    }

    /// Id candidate: the local-index id if available, else the pattern
    #[must_use]
    pub fn generate_temp_id(&self, record: &Record) -> String {
        if let Some(index) = &self.local_index {
            match index.get_id_for(record) {
                Ok(id) => return id,
                Err(e) if e.is_index_miss() => debug!(id = %record.id, "not in local index"),
                Err(e) => warn!(id = %record.id, error = %e, "local index lookup failed"),
            }
        }
        self.pattern.generate(record)
    }

    /// Assign ids to the records that may still change
    ///
    /// Without a selection, records in `md_imported` or `md_prepared` are
    /// renamed. With a selection, exactly the selected records are renamed.
    /// The map keeps its order; changed records are re-keyed in place.
    ///
    /// # Errors
    /// Returns [`IdError::PropagatedIdChange`] when a selected record has
    /// reached `md_processed`. Nothing is changed in that case.
    pub fn set_ids(
        &self,
        records: &mut RecordsDict,
        selected: Option<&[String]>,
    ) -> Result<Vec<IdChange>> {
        if let Some(selected) = selected {
            let propagated: Vec<String> = selected
                .iter()
                .filter(|id| {
                    records
                        .get(id.as_str())
                        .is_some_and(|r| r.status().is_post(RecordState::MdProcessed))
                })
                .cloned()
                .collect();
            if !propagated.is_empty() {
                return Err(IdError::PropagatedIdChange { ids: propagated });
            }
        }

        let index = IdIndex::from_ids(records.keys());
        let candidates: Vec<String> = records
            .iter()
            .filter(|(id, record)| match selected {
                Some(selected) => selected.contains(*id),
                None => matches!(
                    record.status(),
                    RecordState::MdImported | RecordState::MdPrepared
                ),
            })
            .map(|(id, _)| id.clone())
            .collect();

        let mut changes = Vec::new();
        for old in candidates {
            let Some(record) = records.get(&old) else {
                continue;
            };
            let temp_id = self.generate_temp_id(record);
            index.remove(&old);
            let new = index.next_unique_id(&temp_id);
            index.insert(&new);
            if new == old {
                continue;
            }

            let Some(pos) = records.get_index_of(&old) else {
                continue;
            };
            let Some((_, mut record)) = records.shift_remove_index(pos) else {
                continue;
            };
            record.id.clone_from(&new);
            let (last, _) = records.insert_full(new.clone(), record);
            records.move_index(last, pos);
            info!("set_ids({old}) to {new}");
            changes.push(IdChange { old, new });
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colrev_record::{fields, EntryType};
    use pretty_assertions::assert_eq;

    fn record(id: &str, author: &str, status: RecordState) -> Record {
        Record::new(id, EntryType::Article)
            .with_field(fields::AUTHOR, author)
            .with_field(fields::YEAR, "2020")
            .with_status(status)
    }

    fn dict(records: Vec<Record>) -> RecordsDict {
        records.into_iter().map(|r| (r.id.clone(), r)).collect()
    }

    struct FixedIndex;

    impl LocalIndex for FixedIndex {
        fn get_id_for(&self, record: &Record) -> Result<String> {
            if record.get(fields::AUTHOR) == Some("Webster, Jane") {
                Ok("WebsterWatson2002".to_string())
            } else {
                Err(IdError::RecordNotInIndex(record.id.clone()))
            }
        }
    }

    #[test]
    fn collisions_get_letter_suffixes() {
        let mut records = dict(vec![
            record("000001", "Smith, J.", RecordState::MdImported),
            record("000002", "Smith, K.", RecordState::MdImported),
            record("000003", "Smith, L.", RecordState::MdPrepared),
        ]);
        let changes = IdSetter::new(IdPattern::FirstAuthorYear)
            .set_ids(&mut records, None)
            .unwrap();
        assert_eq!(changes.len(), 3);
        let ids: Vec<&String> = records.keys().collect();
        assert_eq!(ids, vec!["Smith2020", "Smith2020a", "Smith2020b"]);
        assert!(records.values().all(|r| records.contains_key(&r.id)));
    }

    #[test]
    fn processed_records_keep_their_ids() {
        let mut records = dict(vec![
            record("Smith2020", "Smith, J.", RecordState::MdProcessed),
            record("000002", "Smith, K.", RecordState::MdImported),
            record("000003", "Doe, K.", RecordState::MdNeedsManualPreparation),
        ]);
        IdSetter::new(IdPattern::FirstAuthorYear)
            .set_ids(&mut records, None)
            .unwrap();
        let ids: Vec<&String> = records.keys().collect();
        assert_eq!(ids, vec!["Smith2020", "Smith2020a", "000003"]);
    }

    #[test]
    fn selecting_propagated_ids_fails() {
        let mut records = dict(vec![record("Smith2020", "Doe, J.", RecordState::RevIncluded)]);
        let before = records.clone();
        let err = IdSetter::new(IdPattern::FirstAuthorYear)
            .set_ids(&mut records, Some(&["Smith2020".to_string()]))
            .unwrap_err();
        assert!(matches!(err, IdError::PropagatedIdChange { ref ids } if ids == &["Smith2020"]));
        assert_eq!(records, before);
    }

    #[test]
    fn selection_overrides_state_filter() {
        let mut records = dict(vec![record(
            "x1",
            "Doe, J.",
            RecordState::MdNeedsManualPreparation,
        )]);
        IdSetter::new(IdPattern::FirstAuthorYear)
            .set_ids(&mut records, Some(&["x1".to_string()]))
            .unwrap();
        assert!(records.contains_key("Doe2020"));
    }

    #[test]
    fn local_index_ids_are_reused() {
        let mut records = dict(vec![
            record("000001", "Webster, Jane", RecordState::MdImported),
            record("000002", "Rai, Arun", RecordState::MdImported),
        ]);
        IdSetter::new(IdPattern::FirstAuthorYear)
            .with_local_index(Arc::new(FixedIndex))
            .set_ids(&mut records, None)
            .unwrap();
        let ids: Vec<&String> = records.keys().collect();
        assert_eq!(ids, vec!["WebsterWatson2002", "Rai2020"]);
    }
}
