//! The provenance-tracked record
//!
//! A [`Record`] holds the field values of one bibliographic entry together
//! with the masterdata and data provenance side-tables, its origins and its
//! lifecycle status. Every mutating method keeps the provenance aligned with
//! the field values.

use crate::constants::{defects, fields, has_no_provenance, is_identifying, values, IDENTIFYING_FIELDS};
use crate::entry_type::EntryType;
use crate::error::{RecordError, Result};
use crate::hash::{ContentHash, HashError};
use crate::provenance::{FieldProvenance, NoteSet, ProvenanceMap};
use crate::qm::QualityModel;
use colrev_state::{RecordState, StateError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Source recorded when an edit has no prior provenance
const ORIGINAL_SOURCE: &str = "original";
/// Source used when a note is added to a field without provenance
const DEFAULT_NOTE_SOURCE: &str = "ORIGINAL";
/// Source of provenance entries created by alignment
const MANUAL_SOURCE: &str = "manual";

/// Records keyed by id, in file order
pub type RecordsDict = IndexMap<String, Record>;

/// Options for [`Record::update_field_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditOptions {
    /// Append the new source to the existing one (`old|new`)
    pub append_edit: bool,
    /// Leave the record untouched when the value does not change
    pub keep_source_if_equal: bool,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            append_edit: true,
            keep_source_if_equal: false,
        }
    }
}

impl EditOptions {
    /// Replace the source instead of appending to the edit history
    #[must_use]
    pub fn replace_source(mut self) -> Self {
        self.append_edit = false;
        self
    }

    /// Skip the edit when the value is unchanged
    #[must_use]
    pub fn keep_if_equal(mut self) -> Self {
        self.keep_source_if_equal = true;
        self
    }
}

/// A bibliographic record with provenance side-tables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Record id (`Smith2020`)
    pub id: String,
    /// Entry type
    pub entry_type: EntryType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<RecordState>,
    #[serde(default)]
    origin: BTreeSet<String>,
    #[serde(default)]
    md_prov: ProvenanceMap,
    #[serde(default)]
    d_prov: ProvenanceMap,
    #[serde(default)]
    fields: IndexMap<String, String>,
}

impl Record {
    /// Create an empty record
    #[must_use]
    pub fn new(id: impl Into<String>, entry_type: EntryType) -> Self {
        Self {
            id: id.into(),
            entry_type,
            ..Self::default()
        }
    }

    /// Builder: set a field without provenance
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert_raw(key, value);
        self
    }

    /// Builder: add an origin
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.add_origin(origin);
        self
    }

    /// Builder: set the status
    #[must_use]
    pub fn with_status(mut self, status: RecordState) -> Self {
        self.status = Some(status);
        self
    }

    /// Builder: set a masterdata provenance entry
    #[must_use]
    pub fn with_md_prov(mut self, key: impl Into<String>, prov: FieldProvenance) -> Self {
        self.md_prov.insert(key.into(), prov);
        self
    }

    /// Builder: set a data provenance entry
    #[must_use]
    pub fn with_d_prov(mut self, key: impl Into<String>, prov: FieldProvenance) -> Self {
        self.d_prov.insert(key.into(), prov);
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Current status; records without a status are `md_retrieved`
    #[inline]
    #[must_use]
    pub fn status(&self) -> RecordState {
        self.status.unwrap_or(RecordState::MdRetrieved)
    }

    /// Status as stored (feed records carry none)
    #[inline]
    #[must_use]
    pub fn stored_status(&self) -> Option<RecordState> {
        self.status
    }

    /// Origins (`<feed_file>/<local_id>`)
    #[inline]
    #[must_use]
    pub fn origins(&self) -> &BTreeSet<String> {
        &self.origin
    }

    /// Add an origin; origins are never removed
    pub fn add_origin(&mut self, origin: impl Into<String>) {
        self.origin.insert(origin.into());
    }

    /// Whether both records share at least one origin
    #[must_use]
    pub fn shares_origins(&self, other: &Record) -> bool {
        !self.origin.is_disjoint(&other.origin)
    }

    /// Field values in insertion order
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &IndexMap<String, String> {
        &self.fields
    }

    /// Masterdata provenance
    #[inline]
    #[must_use]
    pub fn md_prov(&self) -> &ProvenanceMap {
        &self.md_prov
    }

    /// Data provenance
    #[inline]
    #[must_use]
    pub fn d_prov(&self) -> &ProvenanceMap {
        &self.d_prov
    }

    /// Replace the masterdata provenance table
    pub fn replace_md_prov(&mut self, md_prov: ProvenanceMap) {
        self.md_prov = md_prov;
    }

    /// Value of a field
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Value of a field, or `default`
    #[inline]
    #[must_use]
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Whether a field is present
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Set a field value without touching provenance
    pub fn insert_raw(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Drop status, origins and provenance (used when staging feed records)
    pub fn clear_provenance_keys(&mut self) {
        self.status = None;
        self.origin.clear();
        self.md_prov.clear();
        self.d_prov.clear();
    }

    fn prov_table(&self, key: &str) -> &ProvenanceMap {
        if is_identifying(key) {
            &self.md_prov
        } else {
            &self.d_prov
        }
    }

    fn prov_table_mut(&mut self, key: &str) -> &mut ProvenanceMap {
        if is_identifying(key) {
            &mut self.md_prov
        } else {
            &mut self.d_prov
        }
    }

    /// Provenance entry of a field
    #[must_use]
    pub fn provenance(&self, key: &str) -> Option<&FieldProvenance> {
        self.prov_table(key).get(key)
    }

    // ------------------------------------------------------------------
    // Field edits
    // ------------------------------------------------------------------

    /// Set a field and append `source` to its edit history
    pub fn update_field(&mut self, key: &str, value: impl Into<String>, source: &str) {
        self.update_field_with(key, value, source, "", EditOptions::default());
    }

    /// Set a field with an explicit note and edit options
    ///
    /// Curated records never receive masterdata provenance for identifying
    /// fields.
    pub fn update_field_with(
        &mut self,
        key: &str,
        value: impl Into<String>,
        source: &str,
        note: &str,
        options: EditOptions,
    ) {
        let value = value.into();
        if options.keep_source_if_equal && self.get(key) == Some(value.as_str()) {
            return;
        }

        let identifying = is_identifying(key);
        if !(identifying && self.masterdata_is_curated()) {
            let source = if options.append_edit && self.contains(key) {
                match self.prov_table(key).get(key) {
                    Some(prov) if prov.source == source => source.to_string(),
                    Some(prov) => format!("{}|{source}", prov.source),
                    None => format!("{ORIGINAL_SOURCE}|{source}"),
                }
            } else {
                source.to_string()
            };
            self.add_field_provenance(key, &source, note);
        }
        self.fields.insert(key.to_string(), value);
    }

    /// Move a value and its provenance to `new_key`
    pub fn rename_field(&mut self, key: &str, new_key: &str) {
        if key == new_key {
            return;
        }
        let Some(value) = self.fields.get(key).cloned() else {
            return;
        };
        let prov = match self.prov_table(key).get(key) {
            Some(prov) => FieldProvenance {
                source: format!("{}|rename-from:{key}", prov.source),
                notes: prov.notes.clone(),
            },
            None => FieldProvenance::new(format!("|rename-from:{key}")),
        };
        self.fields.insert(new_key.to_string(), value);
        if !has_no_provenance(new_key) {
            self.prov_table_mut(new_key).insert(new_key.to_string(), prov);
        }
        self.remove_field(key);
    }

    /// Remove a value and its provenance
    pub fn remove_field(&mut self, key: &str) {
        self.fields.shift_remove(key);
        self.md_prov.shift_remove(key);
        self.d_prov.shift_remove(key);
    }

    /// Remove a value and mark it `IGNORE:missing`
    ///
    /// Non-identifying fields lose their provenance as in [`Record::remove_field`].
    pub fn remove_field_not_missing(&mut self, key: &str, source: Option<&str>) {
        if !is_identifying(key) {
            self.remove_field(key);
            return;
        }
        self.fields.shift_remove(key);
        let entry = self
            .md_prov
            .entry(key.to_string())
            .or_insert_with(|| FieldProvenance::new(MANUAL_SOURCE));
        entry.notes = NoteSet::parse(&defects::ignore(defects::MISSING));
        if let Some(source) = source.filter(|s| !s.is_empty()) {
            entry.source = source.to_string();
        }
    }

    fn remove_unknown_fields(&mut self) {
        let unknown: Vec<String> = self
            .fields
            .iter()
            .filter(|(_, v)| v.as_str() == values::UNKNOWN)
            .map(|(k, _)| k.clone())
            .collect();
        for key in unknown {
            self.remove_field(&key);
        }
    }

    // ------------------------------------------------------------------
    // Provenance
    // ------------------------------------------------------------------

    fn drop_dangling_provenance(&mut self) {
        let fields = &self.fields;
        let keep = |key: &String, prov: &FieldProvenance| {
            !has_no_provenance(key)
                && (fields.contains_key(key) || prov.notes.is_ignored(defects::MISSING))
        };
        self.md_prov
            .retain(|key, prov| key == values::CURATED || keep(key, prov));
        self.d_prov.retain(|key, prov| keep(key, prov));
    }

    /// Drop dangling provenance and add `manual` entries for fields without one
    pub fn align_provenance(&mut self) {
        self.drop_dangling_provenance();
        let curated = self.masterdata_is_curated();
        for key in self.fields.keys() {
            if has_no_provenance(key) {
                continue;
            }
            if is_identifying(key) {
                if !curated && !self.md_prov.contains_key(key) {
                    self.md_prov
                        .insert(key.clone(), FieldProvenance::new(MANUAL_SOURCE));
                }
            } else if !self.d_prov.contains_key(key) {
                self.d_prov
                    .insert(key.clone(), FieldProvenance::new(MANUAL_SOURCE));
            }
        }
    }

    /// Set `source` (without notes) as provenance of every field
    pub fn add_provenance_all(&mut self, source: &str) {
        let curated = self.masterdata_is_curated();
        for key in self.fields.keys() {
            if has_no_provenance(key) {
                continue;
            }
            if is_identifying(key) {
                if curated {
                    continue;
                }
                self.md_prov.insert(key.clone(), FieldProvenance::new(source));
            } else {
                self.d_prov.insert(key.clone(), FieldProvenance::new(source));
            }
        }
    }

    /// Set `source` on every field while keeping existing notes
    pub fn complete_provenance(&mut self, source: &str) {
        let curated = self.masterdata_is_curated();
        let keys: Vec<String> = self.fields.keys().cloned().collect();
        for key in keys {
            if has_no_provenance(&key) || (curated && is_identifying(&key)) {
                continue;
            }
            self.add_field_provenance(&key, source, "");
        }
    }

    /// Set the source of a field and add `note`
    ///
    /// An empty note (or an entry without notes) resets the notes. An
    /// acknowledged `IGNORE:<note>` is kept.
    pub fn add_field_provenance(&mut self, key: &str, source: &str, note: &str) {
        if has_no_provenance(key) {
            return;
        }
        let table = self.prov_table_mut(key);
        let Some(prov) = table.get_mut(key) else {
            table.insert(key.to_string(), FieldProvenance::with_note(source, note));
            return;
        };
        prov.source = source.to_string();
        if note.is_empty() || prov.notes.is_empty() {
            prov.notes = NoteSet::parse(note);
            return;
        }
        prov.notes.insert(note);
    }

    /// Add a defect code to a field's notes
    pub fn add_field_provenance_note(&mut self, key: &str, note: &str) {
        if has_no_provenance(key) {
            return;
        }
        self.prov_table_mut(key)
            .entry(key.to_string())
            .or_insert_with(|| FieldProvenance::new(DEFAULT_NOTE_SOURCE))
            .notes
            .insert(note);
    }

    /// Provenance of a field, falling back to `default_source` without notes
    #[must_use]
    pub fn get_field_provenance(&self, key: &str, default_source: &str) -> FieldProvenance {
        self.provenance(key)
            .cloned()
            .unwrap_or_else(|| FieldProvenance::new(default_source))
    }

    /// Source of a field's value
    #[must_use]
    pub fn get_field_provenance_source(&self, key: &str) -> String {
        self.get_field_provenance(key, DEFAULT_NOTE_SOURCE).source
    }

    /// Remove a code (and its `IGNORE:` form) from a field's notes
    pub fn remove_field_provenance_note(&mut self, key: &str, note: &str) {
        if let Some(prov) = self.prov_table_mut(key).get_mut(key) {
            if prov.notes.contains(note) {
                prov.notes.remove(note);
            }
        }
    }

    /// Remove the active form of a code, keeping any `IGNORE:` form
    pub fn clear_defect(&mut self, key: &str, code: &str) {
        if let Some(prov) = self.prov_table_mut(key).get_mut(key) {
            prov.notes.remove_active(code);
        }
    }

    /// All codes (active and acknowledged) attached to a field
    #[must_use]
    pub fn defects(&self, key: &str) -> Vec<String> {
        self.md_prov
            .get(key)
            .into_iter()
            .chain(self.d_prov.get(key))
            .flat_map(|p| p.notes.iter().map(str::to_string))
            .collect()
    }

    /// Whether a field (or, with `None`, any masterdata field) has an active defect
    #[must_use]
    pub fn has_quality_defects(&self, key: Option<&str>) -> bool {
        match key {
            Some(key) => self
                .md_prov
                .get(key)
                .or_else(|| self.d_prov.get(key))
                .is_some_and(|p| p.notes.has_any_active()),
            None => self.md_prov.values().any(|p| p.notes.has_any_active()),
        }
    }

    /// Defects that prevent a record from being prepared automatically
    #[must_use]
    pub fn has_fatal_quality_defects(&self) -> bool {
        let core = [fields::TITLE, fields::AUTHOR, fields::YEAR];
        if core
            .iter()
            .any(|k| self.get(k).is_none_or(|v| v == values::UNKNOWN))
        {
            return true;
        }

        let no_container = [fields::JOURNAL, fields::BOOKTITLE]
            .iter()
            .all(|k| self.get(k).is_none_or(|v| v == values::UNKNOWN));
        if no_container
            && matches!(self.entry_type, EntryType::Article | EntryType::Inproceedings)
        {
            return true;
        }

        if self.md_prov.get(fields::TITLE).is_some_and(|p| {
            p.notes
                .has_active(defects::IDENTICAL_VALUES_BETWEEN_TITLE_AND_CONTAINER)
        }) {
            return true;
        }

        let title = self.get_or(fields::TITLE, "");
        if title.to_lowercase().starts_with("doi:") {
            return true;
        }
        let digits = title.chars().filter(char::is_ascii_digit).count();
        let letters = title.chars().filter(|c| c.is_alphabetic()).count();
        digits > letters
    }

    /// Whether the file field carries an active defect
    #[must_use]
    pub fn has_pdf_defects(&self) -> bool {
        self.d_prov
            .get(fields::FILE)
            .is_some_and(|p| p.notes.has_any_active())
    }

    /// Acknowledge a defect as `IGNORE:<defect>`
    pub fn ignore_defect(&mut self, key: &str, defect: &str) {
        if has_no_provenance(key) {
            return;
        }
        self.prov_table_mut(key)
            .entry(key.to_string())
            .or_insert_with(|| FieldProvenance::new(DEFAULT_NOTE_SOURCE))
            .notes
            .ignore(defect);
    }

    /// Whether a defect has been acknowledged for a field
    #[must_use]
    pub fn ignored_defect(&self, key: &str, defect: &str) -> bool {
        self.md_prov
            .get(key)
            .or_else(|| self.d_prov.get(key))
            .is_some_and(|p| p.notes.is_ignored(defect))
    }

    // ------------------------------------------------------------------
    // Masterdata state
    // ------------------------------------------------------------------

    /// Mark the masterdata as complete
    ///
    /// Drops `UNKNOWN` values of non-core identifying fields and clears
    /// active `missing` notes. Articles without volume or number get
    /// `IGNORE:missing` entries.
    pub fn set_masterdata_complete(&mut self, source: &str, replace_source: bool) {
        if self.masterdata_is_curated() {
            return;
        }

        for key in IDENTIFYING_FIELDS {
            if matches!(key, fields::AUTHOR | fields::TITLE | fields::YEAR) {
                continue;
            }
            if self.get(key) == Some(values::UNKNOWN) {
                self.fields.shift_remove(key);
            }
            if let Some(prov) = self.md_prov.get_mut(key) {
                prov.notes.remove_active(defects::MISSING);
            }
        }

        if self.entry_type == EntryType::Article {
            for key in [fields::VOLUME, fields::NUMBER] {
                if self.contains(key) {
                    continue;
                }
                let prov = self
                    .md_prov
                    .entry(key.to_string())
                    .or_insert_with(|| FieldProvenance::new(source));
                prov.notes = NoteSet::parse(&defects::ignore(defects::MISSING));
                if replace_source {
                    prov.source = source.to_string();
                }
            }
        }
        self.drop_dangling_provenance();
    }

    /// Clear `inconsistent-with-entrytype` notes
    pub fn set_masterdata_consistent(&mut self) {
        for key in IDENTIFYING_FIELDS {
            if let Some(prov) = self.md_prov.get_mut(key) {
                prov.notes
                    .remove_active(defects::INCONSISTENT_WITH_ENTRYTYPE);
            }
        }
    }

    /// Clear the notes of the file field
    pub fn reset_pdf_provenance_notes(&mut self) {
        if !self.contains(fields::FILE) {
            return;
        }
        self.d_prov
            .entry(fields::FILE.to_string())
            .or_insert_with(|| FieldProvenance::new("NA"))
            .notes
            .clear();
    }

    /// Mark the record as curated by `source`
    pub fn set_masterdata_curated(&mut self, source: &str) {
        self.md_prov.clear();
        self.md_prov
            .insert(values::CURATED.to_string(), FieldProvenance::new(source));
    }

    /// Whether the masterdata is curated
    #[inline]
    #[must_use]
    pub fn masterdata_is_curated(&self) -> bool {
        self.md_prov.contains_key(values::CURATED)
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    pub(crate) fn put_status(&mut self, status: RecordState) {
        self.status = Some(status);
    }

    /// Set the status
    ///
    /// Without `force`, the status may only move forward and records in
    /// `rev_prescreen_excluded` or `pdf_not_available` stay there.
    /// `md_prepared` is downgraded to `md_needs_manual_preparation` when the
    /// record has fatal defects.
    ///
    /// # Errors
    /// Returns [`StateError::InvalidStateTransition`] for backward moves
    /// without `force`.
    pub fn set_status(&mut self, target: RecordState, force: bool) -> Result<()> {
        let current = self.status();
        let mut target = target;
        if target == RecordState::MdPrepared && !force && self.has_fatal_quality_defects() {
            target = RecordState::MdNeedsManualPreparation;
        }
        if !force
            && target != current
            && (target < current || current.requires_force_to_revive())
        {
            return Err(StateError::invalid_transition(&self.id, current, target).into());
        }
        self.put_status(target);
        Ok(())
    }

    /// Exclude the record at prescreen
    pub fn prescreen_exclude(&mut self, reason: &str) {
        if matches!(
            self.status(),
            RecordState::RevSynthesized | RecordState::RevIncluded
        ) {
            warn!(
                id = %self.id,
                "setting paper to prescreen_excluded, check and remove it from the synthesis"
            );
        }
        self.put_status(RecordState::RevPrescreenExcluded);

        if reason == values::RETRACTED {
            if !self
                .get_or(fields::PRESCREEN_EXCLUSION, "")
                .contains(values::RETRACTED)
            {
                warn!(id = %self.id, "paper retracted and prescreen excluded");
            }
            self.insert_raw(fields::RETRACTED, values::RETRACTED);
        }
        self.insert_raw(fields::PRESCREEN_EXCLUSION, reason);
        self.remove_unknown_fields();
    }

    /// Detect retraction signals and prescreen-exclude retracted records
    pub fn is_retracted(&mut self) -> bool {
        let crossmark = [fields::CROSSMARK, fields::CROSSREF_CROSSMARK]
            .iter()
            .any(|k| self.get(k) == Some("True"));
        if crossmark {
            self.prescreen_exclude(values::RETRACTED);
            self.remove_field(fields::CROSSMARK);
            self.remove_field(fields::CROSSREF_CROSSMARK);
        }
        if self
            .get(fields::WARNING)
            .is_some_and(|w| w.starts_with("Withdrawn"))
        {
            self.prescreen_exclude(values::RETRACTED);
            self.remove_field(fields::WARNING);
        }
        if self.contains(fields::RETRACTED) {
            self.prescreen_exclude(values::RETRACTED);
            return true;
        }
        false
    }

    /// Whether the record has no active masterdata defect and no fatal defect
    #[must_use]
    pub fn is_prepared(&self) -> bool {
        !self.has_quality_defects(None) && !self.has_fatal_quality_defects()
    }

    /// Run the quality model
    ///
    /// With `set_prepared`, records that have not progressed beyond
    /// `md_prepared` are moved to `md_prepared` or
    /// `md_needs_manual_preparation` depending on [`Record::is_prepared`].
    pub fn run_quality_model(&mut self, qm: &QualityModel, set_prepared: bool) {
        self.is_retracted();

        let in_md_phase = self.status() <= RecordState::MdPrepared;
        if self.masterdata_is_curated() && set_prepared {
            if in_md_phase {
                self.put_status(RecordState::MdPrepared);
            }
            return;
        }

        qm.run(self);

        if !set_prepared || !in_md_phase {
            return;
        }
        if self.is_prepared() {
            self.put_status(RecordState::MdPrepared);
        } else {
            debug!(id = %self.id, "record needs manual preparation");
            self.put_status(RecordState::MdNeedsManualPreparation);
        }
    }

    /// Run the PDF quality model
    pub fn run_pdf_quality_model(&mut self, qm: &QualityModel, set_prepared: bool) {
        qm.run(self);
        if self.has_pdf_defects() {
            self.put_status(RecordState::PdfNeedsManualPreparation);
        } else if set_prepared {
            self.put_status(RecordState::PdfPrepared);
        }
    }

    /// Change the entry type and re-run the quality model
    ///
    /// # Errors
    /// Returns [`RecordError::MissingRecordQualityRuleSpecification`] for
    /// entry types without quality rules.
    pub fn change_entrytype(&mut self, new_type: EntryType, qm: &QualityModel) -> Result<()> {
        if new_type == self.entry_type {
            if !self.md_prov.is_empty() {
                self.align_provenance();
            }
            return Ok(());
        }
        if let EntryType::Other(name) = &new_type {
            return Err(RecordError::MissingRecordQualityRuleSpecification(format!(
                "No ENTRYTYPE specification ({name})"
            )));
        }

        for prov in self.md_prov.values_mut() {
            if prov.notes.contains(defects::INCONSISTENT_WITH_ENTRYTYPE)
                || prov.notes.contains(defects::MISSING)
            {
                prov.notes.clear();
            }
        }
        self.remove_unknown_fields();
        self.align_provenance();

        let previous = std::mem::replace(&mut self.entry_type, new_type);
        match self.entry_type {
            EntryType::Inproceedings | EntryType::Proceedings => {
                if self.contains(fields::JOURNAL) && !self.contains(fields::BOOKTITLE) {
                    self.rename_field(fields::JOURNAL, fields::BOOKTITLE);
                }
            }
            EntryType::Article => {
                if self.contains(fields::BOOKTITLE) {
                    self.rename_field(fields::BOOKTITLE, fields::JOURNAL);
                }
            }
            EntryType::Inbook => {
                // chapter title moves to chapter, book title to title
                if self.contains(fields::BOOKTITLE) && !self.contains(fields::CHAPTER) {
                    self.rename_field(fields::TITLE, fields::CHAPTER);
                    self.rename_field(fields::BOOKTITLE, fields::TITLE);
                }
            }
            _ => {}
        }
        if previous == EntryType::Inbook
            && self.entry_type != EntryType::Inbook
            && self.contains(fields::CHAPTER)
            && !self.contains(fields::BOOKTITLE)
        {
            self.rename_field(fields::TITLE, fields::BOOKTITLE);
            self.rename_field(fields::CHAPTER, fields::TITLE);
        }

        self.run_quality_model(qm, true);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Misc
    // ------------------------------------------------------------------

    /// Container title (journal, booktitle or book title), `NA` if absent
    #[must_use]
    pub fn container_title(&self) -> &str {
        let key = match self.entry_type {
            EntryType::Article => fields::JOURNAL,
            EntryType::Inproceedings | EntryType::Proceedings | EntryType::Inbook => {
                fields::BOOKTITLE
            }
            EntryType::Book => fields::TITLE,
            _ => return "NA",
        };
        self.get_or(key, "NA")
    }

    /// Short citation used for change scores and logs
    #[must_use]
    pub fn citation_format(&self) -> String {
        format!(
            "{} ({}) {}. {}{}, ({}){}",
            self.get_or(fields::AUTHOR, ""),
            self.get_or(fields::YEAR, ""),
            self.get_or(fields::TITLE, ""),
            self.get_or(fields::JOURNAL, ""),
            self.get_or(fields::BOOKTITLE, ""),
            self.get_or(fields::VOLUME, ""),
            self.get_or(fields::NUMBER, ""),
        )
    }

    /// Hash over the canonical JSON form
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn content_hash(&self) -> std::result::Result<ContentHash, HashError> {
        ContentHash::compute_serializable(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn article() -> Record {
        Record::new("Smith2020", EntryType::Article)
            .with_field(fields::TITLE, "A study of reviews")
            .with_field(fields::AUTHOR, "Smith, John")
            .with_field(fields::YEAR, "2020")
            .with_field(fields::JOURNAL, "MIS Quarterly")
            .with_field(fields::VOLUME, "44")
            .with_field(fields::NUMBER, "1")
            .with_field(fields::DOI, "10.1000/xyz")
            .with_origin("crossref.bib/000001")
            .with_status(RecordState::MdImported)
    }

    #[test]
    fn update_field_appends_edit_history() {
        let mut r = article();
        r.add_provenance_all("crossref.bib/000001");
        r.update_field(fields::TITLE, "A Study of Reviews", "prep");
        assert_eq!(
            r.provenance(fields::TITLE).map(|p| p.source.as_str()),
            Some("crossref.bib/000001|prep")
        );
    }

    #[test]
    fn update_field_without_prior_provenance() {
        let mut r = article();
        r.update_field(fields::DOI, "10.1000/abc", "crossref");
        assert_eq!(r.d_prov()[fields::DOI].source, "original|crossref");
    }

    #[test]
    fn update_field_keep_if_equal_is_noop() {
        let mut r = article();
        r.update_field_with(
            fields::YEAR,
            "2020",
            "other",
            "",
            EditOptions::default().keep_if_equal(),
        );
        assert!(r.provenance(fields::YEAR).is_none());
    }

    #[test]
    fn curated_records_get_no_masterdata_provenance() {
        let mut r = article();
        r.set_masterdata_curated("https://github.com/x/y");
        r.update_field(fields::TITLE, "Other", "prep");
        assert!(r.provenance(fields::TITLE).is_none());
        assert!(r.masterdata_is_curated());
    }

    #[test]
    fn rename_without_provenance_marks_empty_source() {
        let mut r = article();
        r.rename_field(fields::JOURNAL, fields::BOOKTITLE);
        assert_eq!(r.get(fields::BOOKTITLE), Some("MIS Quarterly"));
        assert!(!r.contains(fields::JOURNAL));
        assert_eq!(r.md_prov()[fields::BOOKTITLE].source, "|rename-from:journal");
    }

    #[test]
    fn remove_field_not_missing_keeps_ignore_note() {
        let mut r = article();
        r.remove_field_not_missing(fields::NUMBER, None);
        let prov = &r.md_prov()[fields::NUMBER];
        assert_eq!(prov.source, "manual");
        assert!(prov.notes.is_ignored(defects::MISSING));

        r.align_provenance();
        assert!(r.md_prov().contains_key(fields::NUMBER));
    }

    #[test]
    fn align_drops_dangling_and_adds_manual() {
        let mut r = article()
            .with_md_prov(fields::PAGES, FieldProvenance::new("x"))
            .with_d_prov(fields::ID, FieldProvenance::new("x"));
        r.align_provenance();
        assert!(!r.md_prov().contains_key(fields::PAGES));
        assert!(!r.d_prov().contains_key(fields::ID));
        assert_eq!(r.md_prov()[fields::TITLE].source, "manual");
        assert_eq!(r.d_prov()[fields::DOI].source, "manual");
    }

    #[test]
    fn ignore_wins_for_missing_note() {
        let mut r = article();
        r.remove_field_not_missing(fields::PAGES, Some("s"));
        r.add_field_provenance_note(fields::PAGES, defects::MISSING);
        assert!(!r.has_quality_defects(Some(fields::PAGES)));
        assert!(r.ignored_defect(fields::PAGES, defects::MISSING));
    }

    #[test]
    fn fatal_defects() {
        assert!(!article().has_fatal_quality_defects());
        let r = article().with_field(fields::TITLE, "UNKNOWN");
        assert!(r.has_fatal_quality_defects());
        let r = article().with_field(fields::TITLE, "doi:10.1000/1");
        assert!(r.has_fatal_quality_defects());
        let r = article().with_field(fields::TITLE, "12345 ab");
        assert!(r.has_fatal_quality_defects());
        let mut r = article();
        r.remove_field(fields::JOURNAL);
        assert!(r.has_fatal_quality_defects());
    }

    #[test]
    fn status_is_monotonic_without_force() {
        let mut r = article().with_status(RecordState::MdProcessed);
        assert!(r.set_status(RecordState::MdImported, false).is_err());
        assert!(r.set_status(RecordState::MdImported, true).is_ok());
        assert_eq!(r.status(), RecordState::MdImported);
    }

    #[test]
    fn excluded_records_need_force_to_revive() {
        let mut r = article();
        r.prescreen_exclude("not relevant");
        assert!(r.set_status(RecordState::RevIncluded, false).is_err());
        assert!(r.set_status(RecordState::RevIncluded, true).is_ok());
    }

    #[test]
    fn md_prepared_downgraded_on_fatal_defects() {
        let mut r = article();
        r.remove_field(fields::AUTHOR);
        r.set_status(RecordState::MdPrepared, false).unwrap();
        assert_eq!(r.status(), RecordState::MdNeedsManualPreparation);
    }

    #[test]
    fn prescreen_exclude_retracted() {
        let mut r = article().with_field(fields::PAGES, "UNKNOWN");
        r.prescreen_exclude(values::RETRACTED);
        assert_eq!(r.status(), RecordState::RevPrescreenExcluded);
        assert_eq!(r.get(fields::RETRACTED), Some("retracted"));
        assert_eq!(r.get(fields::PRESCREEN_EXCLUSION), Some("retracted"));
        assert!(!r.contains(fields::PAGES));
    }

    #[test]
    fn withdrawn_warning_is_a_retraction() {
        let mut r = article().with_field(fields::WARNING, "Withdrawn (according to DBLP)");
        r.is_retracted();
        assert_eq!(r.status(), RecordState::RevPrescreenExcluded);
        assert!(!r.contains(fields::WARNING));
    }

    #[test]
    fn masterdata_complete_marks_missing_volume() {
        let mut r = article().with_field(fields::PAGES, "UNKNOWN");
        r.remove_field(fields::VOLUME);
        r.set_masterdata_complete("prep", true);
        assert!(!r.contains(fields::PAGES));
        assert!(r.ignored_defect(fields::VOLUME, defects::MISSING));
        assert_eq!(r.md_prov()[fields::VOLUME].source, "prep");
    }

    #[test]
    fn container_title_per_type() {
        assert_eq!(article().container_title(), "MIS Quarterly");
        let r = Record::new("x", EntryType::Misc);
        assert_eq!(r.container_title(), "NA");
    }

    #[test]
    fn shares_origins() {
        let a = article();
        let b = Record::new("b", EntryType::Article).with_origin("crossref.bib/000001");
        let c = Record::new("c", EntryType::Article).with_origin("dblp.bib/000001");
        assert!(a.shares_origins(&b));
        assert!(!a.shares_origins(&c));
    }

    #[test]
    fn content_hash_tracks_changes() {
        let a = article();
        let mut b = article();
        assert_eq!(a.content_hash().unwrap(), b.content_hash().unwrap());
        b.insert_raw(fields::PAGES, "1--10");
        assert_ne!(a.content_hash().unwrap(), b.content_hash().unwrap());
    }
}
