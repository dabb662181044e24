//! Load: import feed records into the main records
//!
//! Every record of a source's feed whose origin is not yet in the records
//! file becomes a new main record in `md_imported`. New records get ids
//! from the local index when it knows them, else from the project's id
//! pattern; existing ids never change here.

use super::transition;
use crate::commit::CommitMessage;
use crate::error::Result;
use crate::ReviewManager;
use colrev_dataset::SearchSourceSettings;
use colrev_record::{Record, RecordsDict};
use colrev_state::{Operation, RecordState};
use std::collections::HashSet;
use tracing::{debug, info};

/// Load operation
#[derive(Debug)]
pub struct Load<'a> {
    review_manager: &'a ReviewManager,
}

impl<'a> Load<'a> {
    /// Load operation on `review_manager`
    #[must_use]
    pub fn new(review_manager: &'a ReviewManager) -> Self {
        Self { review_manager }
    }

    /// Import new feed records of every configured source
    ///
    /// # Errors
    /// Returns [`ColrevError`] when a feed cannot be parsed, an import
    /// breaks the transition table or the commit checks fail.
    ///
    /// [`ColrevError`]: crate::ColrevError
    pub fn main(&self) -> Result<CommitMessage> {
        let rm = self.review_manager;
        rm.notify(Operation::Load)?;
        let dataset = rm.dataset();
        let mut records = dataset.load_records_dict(false)?;
        let mut message = CommitMessage::new(Operation::Load);

        let mut imported = Vec::new();
        for source in &rm.settings().sources {
            let new = self.import_source(source, &mut records)?;
            info!(source = %source.filename.display(), "Loaded {} records", new.len());
            message.add_stat(source.origin_prefix(), new.len());
            imported.extend(new);
        }

        let changes = dataset.set_ids(&mut records, rm.settings().project.id_pattern, Some(imported.as_slice()))?;
        debug!(changed = changes.len(), "set ids of imported records");
        message.add_stat("imported", imported.len());

        dataset.save_records_dict(&mut records, false)?;
        rm.create_commit(&message)?;
        Ok(message)
    }

    /// Add the records of one feed that are not yet in `records`
    ///
    /// Returns the (temporary) ids of the new records.
    fn import_source(&self, source: &SearchSourceSettings, records: &mut RecordsDict) -> Result<Vec<String>> {
        let rm = self.review_manager;
        let dataset = rm.dataset();
        let plugin = rm.sources().for_settings(source);
        let feed_records = plugin.load(&dataset.feed_path(source), dataset.parsers())?;

        let known: HashSet<String> = records
            .values()
            .flat_map(|r| r.origins().iter().cloned())
            .collect();
        let prefix = source.origin_prefix();
        let mut imported = Vec::new();

        for (local_id, feed_record) in feed_records {
            let origin = format!("{prefix}/{local_id}");
            if known.contains(&origin) {
                continue;
            }
            let mut record = import_record(feed_record, &origin);
            if source.is_curated() {
                record.set_masterdata_curated(&origin);
            }
            plugin.prepare(&mut record, source);
            transition(&mut record, RecordState::MdImported, Operation::Load)?;

            record.id.clone_from(&origin);
            imported.push(origin.clone());
            records.insert(origin, record);
        }
        Ok(imported)
    }
}

fn import_record(mut record: Record, origin: &str) -> Record {
    record.clear_provenance_keys();
    record.add_origin(origin);
    record.add_provenance_all(origin);
    record.with_status(RecordState::MdRetrieved)
}
