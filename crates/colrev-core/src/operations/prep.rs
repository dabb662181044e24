//! Prep: normalize imported records and run the quality model
//!
//! Prep packages run per record in the order of the configured prep rounds.
//! Records are independent, so they are spread over the worker pool. After
//! the packages, the quality model decides between `md_prepared` and
//! `md_needs_manual_preparation`.

use super::validate_status;
use crate::commit::CommitMessage;
use crate::error::{ColrevError, Result};
use crate::ReviewManager;
use colrev_dataset::{SearchSource, SearchSourceSettings, Settings, SourceRegistry};
use colrev_record::prep::Case;
use colrev_record::{fields, prep, values, Record};
use colrev_state::{Operation, RecordState};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Endpoint of [`SourceSpecificPrep`]
pub const SOURCE_SPECIFIC_PREP: &str = "colrev.source_specific_prep";
/// Endpoint of [`FieldFormatPrep`]
pub const FORMAT_FIELDS_PREP: &str = "colrev.format_fields";

/// A preparation step applied to one record
pub trait PrepPackage: Send + Sync {
    /// Endpoint name used in the settings
    fn endpoint(&self) -> &str;

    /// Improve `record` in place
    ///
    /// # Errors
    /// Record-level errors are logged and the next package runs; any other
    /// error aborts the operation.
    fn prepare(&self, record: &mut Record) -> Result<()>;
}

/// Hands records to the search source they came from
pub struct SourceSpecificPrep {
    sources: BTreeMap<String, (Arc<dyn SearchSource>, SearchSourceSettings)>,
}

impl SourceSpecificPrep {
    /// Map origin prefixes of the configured sources to their plugins
    #[must_use]
    pub fn new(settings: &Settings, registry: &SourceRegistry) -> Self {
        let sources = settings
            .sources
            .iter()
            .map(|s| (s.origin_prefix(), (registry.for_settings(s), s.clone())))
            .collect();
        Self { sources }
    }
}

impl PrepPackage for SourceSpecificPrep {
    fn endpoint(&self) -> &str {
        SOURCE_SPECIFIC_PREP
    }

    fn prepare(&self, record: &mut Record) -> Result<()> {
        let prefixes: Vec<String> = record
            .origins()
            .iter()
            .filter_map(|o| o.split_once('/').map(|(prefix, _)| prefix.to_string()))
            .collect();
        for prefix in prefixes {
            if let Some((source, settings)) = self.sources.get(&prefix) {
                source.prepare(record, settings);
            }
        }
        Ok(())
    }
}

/// Re-cases shouting fields and normalizes authors and pages
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldFormatPrep;

impl PrepPackage for FieldFormatPrep {
    fn endpoint(&self) -> &str {
        FORMAT_FIELDS_PREP
    }

    fn prepare(&self, record: &mut Record) -> Result<()> {
        if record.masterdata_is_curated() {
            return Ok(());
        }
        record.format_if_mostly_upper(fields::TITLE, Case::Sentence);
        for key in [fields::JOURNAL, fields::BOOKTITLE] {
            record.format_if_mostly_upper(key, Case::Title);
        }
        if let Some(author) = record.get(fields::AUTHOR).filter(|a| *a != values::UNKNOWN) {
            let formatted = prep::format_author_field(author);
            if formatted != author && !formatted.is_empty() {
                record.update_field(fields::AUTHOR, formatted, FORMAT_FIELDS_PREP);
            }
        }
        record.unify_pages_field();
        Ok(())
    }
}

/// Prep operation
pub struct Prep<'a> {
    review_manager: &'a ReviewManager,
    packages: Vec<Box<dyn PrepPackage>>,
}

impl std::fmt::Debug for Prep<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prep")
            .field("packages", &self.packages.iter().map(|p| p.endpoint()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<'a> Prep<'a> {
    /// Prep operation with the packages of the configured prep rounds
    ///
    /// Without configured rounds, source-specific preparation and field
    /// formatting run. Unknown endpoints are skipped with a warning.
    #[must_use]
    pub fn new(review_manager: &'a ReviewManager) -> Self {
        let settings = review_manager.settings();
        let endpoints: Vec<String> = if settings.prep.prep_rounds.is_empty() {
            vec![SOURCE_SPECIFIC_PREP.to_string(), FORMAT_FIELDS_PREP.to_string()]
        } else {
            settings
                .prep
                .prep_rounds
                .iter()
                .flat_map(|round| round.packages.iter().map(|p| p.endpoint.clone()))
                .collect()
        };

        let mut packages: Vec<Box<dyn PrepPackage>> = Vec::new();
        for endpoint in endpoints {
            match endpoint.as_str() {
                SOURCE_SPECIFIC_PREP => packages.push(Box::new(SourceSpecificPrep::new(
                    settings,
                    review_manager.sources(),
                ))),
                FORMAT_FIELDS_PREP => packages.push(Box::new(FieldFormatPrep)),
                other => warn!(endpoint = other, "prep package not available"),
            }
        }
        Self {
            review_manager,
            packages,
        }
    }

    /// Builder: append a package
    #[must_use]
    pub fn with_package(mut self, package: impl PrepPackage + 'static) -> Self {
        self.packages.push(Box::new(package));
        self
    }

    /// Endpoints that will run, in order
    #[must_use]
    pub fn endpoints(&self) -> Vec<&str> {
        self.packages.iter().map(|p| p.endpoint()).collect()
    }

    /// Prepare every record in `md_imported`
    ///
    /// # Errors
    /// Returns [`ColrevError`] when a package fails with an error that is
    /// not record-level, or the commit checks fail.
    pub fn main(&self) -> Result<CommitMessage> {
        let rm = self.review_manager;
        rm.notify(Operation::Prep)?;
        let dataset = rm.dataset();
        let mut records = dataset.load_records_dict(false)?;

        let mut batch: Vec<Record> = records
            .values()
            .filter(|r| r.status() == RecordState::MdImported)
            .cloned()
            .collect();
        info!("Prepare {} records", batch.len());

        let results = rm.pool().map(&mut batch, |record| self.prepare_record(record));
        for result in results {
            result?;
        }

        let mut message = CommitMessage::new(Operation::Prep);
        for record in batch {
            match record.status() {
                RecordState::MdPrepared => message.add_stat("prepared", 1),
                RecordState::MdNeedsManualPreparation => message.add_stat("needs manual preparation", 1),
                RecordState::RevPrescreenExcluded => message.add_stat("retracted", 1),
                _ => {}
            }
            records.insert(record.id.clone(), record);
        }
        info!(
            prepared = message.stat("prepared"),
            manual = message.stat("needs manual preparation"),
            "prep completed"
        );

        dataset.save_records_dict(&mut records, false)?;
        rm.create_commit(&message)?;
        Ok(message)
    }

    fn prepare_record(&self, record: &mut Record) -> Result<()> {
        let from = record.status();
        for package in &self.packages {
            match package.prepare(record) {
                Ok(()) => {}
                Err(e) if e.is_record_level() => {
                    warn!(id = %record.id, package = package.endpoint(), error = %e, "prep package failed");
                }
                Err(e) => return Err(e),
            }
        }
        record.run_quality_model(self.review_manager.quality_model(), true);
        debug!(id = %record.id, status = %record.status(), "prepared");
        validate_status(record, from, Operation::Prep)
    }
}

/// Wrap an error as a record-level package failure
pub fn package_error(endpoint: &str, err: impl std::fmt::Display) -> ColrevError {
    ColrevError::package(endpoint, err.to_string())
}
