//! Provenance-tracked bibliographic records
//!
//! A [`Record`] is one bibliographic entry: field values plus masterdata and
//! data provenance, origins and a lifecycle status. The crate also derives
//! record identity ([`ColrevId`], PDF fingerprints), compares records and
//! runs the [`QualityModel`].
//!
//! # Core Concepts
//!
//! - [`Record`]: field map with provenance kept aligned on every mutation
//! - [`NoteSet`]: defect codes of one field, with acknowledged `IGNORE:` forms
//! - [`ColrevId`]: deterministic identity over the masterdata
//! - [`QualityModel`]: ordered [`qm::QualityChecker`]s writing defect notes
//!
//! # Example
//!
//! ```rust,ignore
//! use colrev_record::{default_quality_model, EntryType, Record};
//!
//! let mut record = Record::new("Smith2020", EntryType::Article)
//!     .with_field("title", "A study of reviews");
//! record.run_quality_model(&default_quality_model(), true);
//! let id = record.colrev_id(false)?;
//! ```

#![warn(unreachable_pub)]

pub mod constants;
mod diff;
mod entry_type;
mod error;
mod hash;
mod identity;
mod pdf_id;
mod pdf_render;
pub mod prep;
mod provenance;
pub mod qm;
mod record;
mod similarity;

pub use constants::{fields, values, IDENTIFYING_FIELDS};
pub use diff::FieldChange;
pub use entry_type::EntryType;
pub use error::{RecordError, Result};
pub use hash::{ContentHash, HashError};
pub use identity::{family_names, ColrevId, COLREV_ID_PREFIX};
pub use pdf_id::{colrev_pdf_id, colrev_pdf_id_from_bytes, CPID_PREFIX};
pub use provenance::{FieldProvenance, NoteSet, ProvenanceMap};
pub use qm::{default_quality_model, pdf_quality_model, QualityModel};
pub use record::{EditOptions, Record, RecordsDict};
pub use similarity::{get_record_change_score, get_record_similarity, ratio};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
