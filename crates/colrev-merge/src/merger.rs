//! Record merging
//!
//! [`Merger::merge`] fuses a merging record into a main record: origins are
//! united, both statuses move to the later state, curated masterdata is
//! authoritative and every other conflict is settled by a [`FieldFuser`].
//!
//! [`FieldFuser`]: crate::FieldFuser

use crate::error::Result;
use crate::fuser::Fusion;
use crate::guard::prevent_invalid_merges;
use crate::registry::FuserRegistry;
use colrev_record::constants::is_identifying;
use colrev_record::{fields, values, EditOptions, FieldProvenance, QualityModel, Record};
use tracing::debug;

/// Keys never taken from the merging record
const SKIPPED_KEYS: [&str; 7] = [
    fields::ID,
    fields::MD_PROV,
    fields::D_PROV,
    fields::COLREV_ID,
    fields::STATUS,
    fields::ORIGIN,
    fields::MOVED_DUPE_ID,
];

/// Value of `key` worth merging, if any
fn merging_value(record: &Record, key: &str) -> Option<String> {
    if SKIPPED_KEYS.contains(&key) {
        return None;
    }
    record
        .get(key)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Merges records with the registered fusers
#[derive(Debug)]
pub struct Merger {
    registry: FuserRegistry,
    reduced_qm: QualityModel,
    preferred_prefixes: Vec<String>,
}

impl Default for Merger {
    fn default() -> Self {
        Self::new()
    }
}

impl Merger {
    /// Merger with the built-in fusers and the reduced quality model
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: FuserRegistry::with_defaults(),
            reduced_qm: QualityModel::reduced(std::iter::empty::<&str>()),
            preferred_prefixes: Vec::new(),
        }
    }

    /// Builder: use a custom fuser registry
    #[must_use]
    pub fn with_registry(mut self, registry: FuserRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Builder: masterdata from origins containing one of `prefixes` overwrites
    #[must_use]
    pub fn with_preferred_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferred_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: quality model run on both records before fusion
    #[must_use]
    pub fn with_quality_model(mut self, qm: QualityModel) -> Self {
        self.reduced_qm = qm;
        self
    }

    /// Registered fusers
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &FuserRegistry {
        &self.registry
    }

    fn is_preferred(&self, record: &Record) -> bool {
        record.origins().iter().any(|origin| {
            self.preferred_prefixes
                .iter()
                .any(|prefix| origin.contains(prefix.as_str()))
        })
    }

    /// Merge `incoming` into `main`
    ///
    /// Fields of `incoming` without provenance are attributed to
    /// `default_source`.
    ///
    /// # Errors
    /// Returns [`MergeError::InvalidMerge`] when the records describe
    /// different works; neither record is modified in that case.
    ///
    /// [`MergeError::InvalidMerge`]: crate::MergeError::InvalidMerge
    pub fn merge(&self, main: &mut Record, incoming: &mut Record, default_source: &str) -> Result<()> {
        prevent_invalid_merges(main, incoming)?;
        let incoming_preferred = self.is_preferred(incoming);

        for record in [&mut *main, &mut *incoming] {
            if !record.masterdata_is_curated() {
                self.reduced_qm.run(record);
            }
        }

        for origin in incoming.origins().clone() {
            main.add_origin(origin);
        }
        if let Some(status) = incoming.stored_status() {
            let later = main.status().later(status);
            main.set_status(later, true)?;
            incoming.set_status(later, true)?;
        }

        let main_curated = main.masterdata_is_curated();
        let incoming_curated = incoming.masterdata_is_curated();
        if incoming_curated && !main_curated {
            // the curated record may carry fewer masterdata fields
            let stale: Vec<String> = main
                .fields()
                .keys()
                .filter(|k| is_identifying(k) && k.as_str() != fields::PAGES)
                .cloned()
                .collect();
            for key in stale {
                main.remove_field(&key);
            }
            main.replace_md_prov(incoming.md_prov().clone());
        }

        let keys: Vec<String> = incoming.fields().keys().cloned().collect();
        for key in keys {
            let Some(value) = merging_value(incoming, &key) else {
                continue;
            };
            let prov = incoming.get_field_provenance(&key, default_source);
            let identifying = is_identifying(&key);

            if incoming_curated {
                main.insert_raw(key.as_str(), value);
                if !identifying {
                    main.add_field_provenance(&key, &prov.source, &prov.notes.to_note_string(false));
                }
                continue;
            }

            if identifying {
                if main_curated {
                    continue;
                }
                if !self.preferred_prefixes.is_empty() {
                    if incoming_preferred {
                        main.update_field_with(
                            &key,
                            value,
                            &prov.source,
                            "",
                            EditOptions::default().replace_source(),
                        );
                    }
                    continue;
                }
            }
            self.fuse_field(main, incoming, &key, value, &prov);
        }

        debug!(main = %main.id, merged = %incoming.id, "merged records");
        Ok(())
    }

    fn fuse_field(
        &self,
        main: &mut Record,
        incoming: &Record,
        key: &str,
        value: String,
        prov: &FieldProvenance,
    ) {
        let note = if is_identifying(key) {
            String::new()
        } else {
            prov.notes.to_note_string(false)
        };
        let gap_fill = EditOptions::default().replace_source().keep_if_equal();
        match main.get(key) {
            None => {
                main.update_field_with(key, value, &prov.source, &note, gap_fill);
                return;
            }
            Some(values::UNKNOWN) => {
                if value != values::UNKNOWN {
                    main.update_field_with(key, value, &prov.source, &note, gap_fill);
                }
                return;
            }
            Some(_) => {}
        }

        let Some(fuser) = self.registry.get(key) else {
            return;
        };
        match fuser.fuse(main, incoming, key) {
            Fusion::KeepMain => {}
            Fusion::TakeIncoming => {
                if main.get(key) != Some(value.as_str()) {
                    debug!(id = %main.id, key, fuser = fuser.name(), "fused field");
                    main.update_field(key, value, &prov.source);
                }
            }
            Fusion::Combined(combined) => main.update_field(key, combined, &prov.source),
        }
    }
}

/// Merging as a record method
pub trait RecordMergeExt {
    /// Merge `other` into `self` with the default [`Merger`]
    ///
    /// # Errors
    /// Returns [`MergeError::InvalidMerge`] for records describing different works.
    ///
    /// [`MergeError::InvalidMerge`]: crate::MergeError::InvalidMerge
    fn merge(
        &mut self,
        other: &mut Record,
        default_source: &str,
        preferred_masterdata_source_prefixes: &[String],
    ) -> Result<()>;
}

impl RecordMergeExt for Record {
    fn merge(
        &mut self,
        other: &mut Record,
        default_source: &str,
        preferred_masterdata_source_prefixes: &[String],
    ) -> Result<()> {
        Merger::new()
            .with_preferred_prefixes(preferred_masterdata_source_prefixes.iter().cloned())
            .merge(self, other, default_source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colrev_record::EntryType;
    use colrev_state::RecordState;
    use pretty_assertions::assert_eq;

    fn article(id: &str, origin: &str) -> Record {
        let mut r = Record::new(id, EntryType::Article)
            .with_field(fields::TITLE, "Digital platforms")
            .with_field(fields::AUTHOR, "Rai, Arun")
            .with_field(fields::YEAR, "2020")
            .with_field(fields::JOURNAL, "MIS Quarterly")
            .with_field(fields::VOLUME, "44")
            .with_field(fields::NUMBER, "1")
            .with_origin(origin)
            .with_status(RecordState::MdPrepared);
        r.add_provenance_all(origin);
        r
    }

    #[test]
    fn statuses_move_to_the_later_state() {
        let mut main = article("a", "x.bib/1");
        let mut incoming = article("b", "y.bib/1").with_status(RecordState::MdProcessed);
        Merger::new().merge(&mut main, &mut incoming, "merge").unwrap();
        assert_eq!(main.status(), RecordState::MdProcessed);
        assert_eq!(incoming.status(), RecordState::MdProcessed);
    }

    #[test]
    fn unknown_values_are_replaced() {
        let mut main = article("a", "x.bib/1").with_field(fields::PAGES, values::UNKNOWN);
        let mut incoming = article("b", "y.bib/1").with_field(fields::PAGES, "1--10");
        incoming.add_provenance_all("y.bib/1");
        Merger::new().merge(&mut main, &mut incoming, "merge").unwrap();
        assert_eq!(main.get(fields::PAGES), Some("1--10"));
        assert_eq!(main.md_prov()[fields::PAGES].source, "y.bib/1");
    }

    #[test]
    fn existing_data_fields_are_kept() {
        let mut main = article("a", "x.bib/1").with_field(fields::DOI, "10.1/a");
        let mut incoming = article("b", "y.bib/1")
            .with_field(fields::DOI, "10.1/b")
            .with_field(fields::ABSTRACT, "Abstract");
        Merger::new().merge(&mut main, &mut incoming, "merge").unwrap();
        assert_eq!(main.get(fields::DOI), Some("10.1/a"));
        assert_eq!(main.get(fields::ABSTRACT), Some("Abstract"));
        assert_eq!(main.d_prov()[fields::ABSTRACT].source, "merge");
    }

    #[test]
    fn preferred_sources_overwrite_masterdata() {
        let mut main = article("a", "x.bib/1");
        let mut incoming = article("b", "md_crossref.bib/1").with_field(fields::TITLE, "Digital Platforms");
        let merger = Merger::new().with_preferred_prefixes(["md_crossref"]);
        merger.merge(&mut main, &mut incoming, "merge").unwrap();
        assert_eq!(main.get(fields::TITLE), Some("Digital Platforms"));
        assert_eq!(main.md_prov()[fields::TITLE].source, "md_crossref.bib/1");
    }

    #[test]
    fn curated_incoming_replaces_masterdata() {
        let mut main = article("a", "x.bib/1").with_field(fields::PAGES, "1--10");
        let mut incoming = Record::new("b", EntryType::Article)
            .with_field(fields::TITLE, "Digital Platforms")
            .with_field(fields::AUTHOR, "Rai, Arun")
            .with_field(fields::YEAR, "2020")
            .with_field(fields::JOURNAL, "MIS Quarterly")
            .with_origin("md_curated.bib/1");
        incoming.set_masterdata_curated("https://github.com/curated/misq");

        Merger::new().merge(&mut main, &mut incoming, "merge").unwrap();
        assert!(main.masterdata_is_curated());
        assert_eq!(main.get(fields::TITLE), Some("Digital Platforms"));
        assert_eq!(main.get(fields::VOLUME), None);
        assert_eq!(main.get(fields::PAGES), Some("1--10"));
    }

    #[test]
    fn invalid_merges_leave_records_untouched() {
        let mut main = article("a", "x.bib/1").with_field(fields::TITLE, "Platforms part 1");
        let mut incoming = article("b", "y.bib/1").with_field(fields::TITLE, "Platforms part 2");
        let before = (main.clone(), incoming.clone());
        assert!(Merger::new().merge(&mut main, &mut incoming, "merge").is_err());
        assert_eq!((main, incoming), before);
    }
}
