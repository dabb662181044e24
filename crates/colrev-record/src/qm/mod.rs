//! Quality model
//!
//! A [`QualityModel`] owns an ordered list of [`QualityChecker`]s. Checkers
//! inspect a record and report [`Finding`]s; the model applies them to the
//! provenance notes. Checkers never modify field values.
//!
//! # Example
//!
//! ```rust,ignore
//! use colrev_record::qm::default_quality_model;
//!
//! let qm = default_quality_model();
//! record.run_quality_model(&qm, true);
//! ```

use crate::constants::{defects, fields, values};
use crate::record::Record;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use tracing::trace;

pub mod checkers;

/// Source recorded on fields the model sets to `UNKNOWN`
pub const FIELD_REQUIREMENTS_SOURCE: &str = "generic_field_requirements";
/// Source recorded when the masterdata is marked complete
pub const MASTERDATA_COMPLETE_SOURCE: &str = "update_masterdata_provenance";

/// Codes ignored by the merger's reduced model
pub const REDUCED_MODEL_IGNORES: [&str; 4] = [
    defects::MISSING,
    defects::RECORD_NOT_IN_TOC,
    defects::INCONSISTENT_WITH_DOI_METADATA,
    defects::CONTAINER_TITLE_ABBREVIATED,
];

/// Outcome of one check on one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// The field has the defect
    Defect {
        /// Field name
        field: String,
        /// Defect code
        code: &'static str,
    },
    /// The field was checked and does not have the defect
    Clear {
        /// Field name
        field: String,
        /// Defect code
        code: &'static str,
    },
}

impl Finding {
    /// `Defect` if `defective`, `Clear` otherwise
    #[must_use]
    pub fn check(field: &str, code: &'static str, defective: bool) -> Self {
        let field = field.to_string();
        if defective {
            Self::Defect { field, code }
        } else {
            Self::Clear { field, code }
        }
    }

    /// Defect code of the finding
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Defect { code, .. } | Self::Clear { code, .. } => code,
        }
    }
}

/// A quality check over one record
///
/// Implement this trait to add a checker and install it with
/// [`QualityModel::register`].
pub trait QualityChecker: Send + Sync + fmt::Debug {
    /// Checker name
    fn name(&self) -> &'static str;

    /// Defect codes the checker reports
    fn codes(&self) -> &'static [&'static str];

    /// Inspect the record
    fn run(&self, record: &Record) -> Vec<Finding>;
}

/// Ordered set of checkers plus globally ignored defect codes
#[derive(Default)]
pub struct QualityModel {
    checkers: Vec<Box<dyn QualityChecker>>,
    defects_to_ignore: BTreeSet<String>,
}

impl fmt::Debug for QualityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QualityModel")
            .field("checkers", &self.names())
            .field("defects_to_ignore", &self.defects_to_ignore)
            .finish()
    }
}

impl QualityModel {
    /// Empty model
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a checker; checkers run in registration order
    pub fn register(&mut self, checker: Box<dyn QualityChecker>) -> &mut Self {
        self.checkers.push(checker);
        self
    }

    /// Builder: ignore defect codes globally
    #[must_use]
    pub fn with_defects_to_ignore<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.defects_to_ignore
            .extend(codes.into_iter().map(Into::into));
        self
    }

    /// Default model with additional ignored codes (used by the merger)
    #[must_use]
    pub fn reduced<I, S>(ignore: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        default_quality_model()
            .with_defects_to_ignore(REDUCED_MODEL_IGNORES)
            .with_defects_to_ignore(ignore)
    }

    /// Registered checker names
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.checkers.iter().map(|c| c.name()).collect()
    }

    /// Number of checkers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    /// Whether no checker is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }

    /// Whether a code is ignored globally
    #[inline]
    #[must_use]
    pub fn ignores(&self, code: &str) -> bool {
        self.defects_to_ignore.contains(code)
    }

    /// Run every checker and apply the findings
    ///
    /// Running the model twice yields the same notes as running it once.
    pub fn run(&self, record: &mut Record) {
        let mut ran_missing = false;
        for checker in &self.checkers {
            for finding in checker.run(record) {
                match finding {
                    Finding::Defect { field, code } if !self.ignores(code) => {
                        apply_defect(record, &field, code);
                    }
                    Finding::Defect { field, code } | Finding::Clear { field, code } => {
                        record.clear_defect(&field, code);
                    }
                }
            }
            ran_missing |=
                checker.codes().contains(&defects::MISSING) && !self.ignores(defects::MISSING);
        }

        if ran_missing && !has_active_missing(record) {
            record.set_masterdata_complete(MASTERDATA_COMPLETE_SOURCE, false);
        }
    }
}

fn apply_defect(record: &mut Record, field: &str, code: &'static str) {
    trace!(id = %record.id, field, code, "defect");
    if code == defects::MISSING {
        if record.ignored_defect(field, defects::MISSING) {
            return;
        }
        if !record.contains(field) {
            record.insert_raw(field, values::UNKNOWN);
            record.add_field_provenance(field, FIELD_REQUIREMENTS_SOURCE, defects::MISSING);
            return;
        }
    }
    record.add_field_provenance_note(field, code);
}

fn has_active_missing(record: &Record) -> bool {
    record
        .md_prov()
        .values()
        .chain(record.d_prov().values())
        .any(|p| p.notes.has_active(defects::MISSING))
}

/// Model with every built-in masterdata checker
#[must_use]
pub fn default_quality_model() -> QualityModel {
    let mut qm = QualityModel::new();
    checkers::register_defaults(&mut qm);
    qm
}

/// Model with the PDF checkers; file paths resolve against `project_root`
#[must_use]
pub fn pdf_quality_model(project_root: impl Into<PathBuf>) -> QualityModel {
    let mut qm = QualityModel::new();
    qm.register(Box::new(checkers::PdfIncompleteChecker::new(project_root)));
    qm
}

/// Whether a field value counts as absent for the quality checks
#[inline]
pub(crate) fn is_blank(record: &Record, key: &str) -> bool {
    record.get(key).is_none_or(|v| v == values::UNKNOWN)
}

/// Name fields inspected by the name checkers
pub(crate) const NAME_FIELDS: [&str; 2] = [fields::AUTHOR, fields::EDITOR];
