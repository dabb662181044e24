//! Project settings (`settings.json`)
//!
//! One settings object per project. It names the review type, the id
//! pattern, the search sources with their feed files and, per operation,
//! the packages that run. Missing sections fall back to defaults so an
//! empty `{}` is a valid settings file.

use crate::error::SettingsError;
use colrev_ids::IdPattern;
use colrev_record::constants::defects;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Free-form package parameters
pub type Parameters = BTreeMap<String, serde_json::Value>;

/// Requirement for sharing the project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareStatReq {
    /// No requirement
    #[default]
    None,
    /// All records at least md_processed
    Processed,
    /// All records screened
    Screened,
    /// All records synthesized or excluded
    Completed,
}

/// Kind of search behind a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchType {
    /// Database search
    Db,
    /// Table-of-contents retrieval
    Toc,
    /// Citations of included papers
    BackwardSearch,
    /// Papers citing included papers
    ForwardSearch,
    /// API query
    Api,
    /// Metadata source used during prep
    Md,
    /// Local PDF files
    Files,
    /// Anything else
    Other,
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Db => "DB",
            Self::Toc => "TOC",
            Self::BackwardSearch => "BACKWARD_SEARCH",
            Self::ForwardSearch => "FORWARD_SEARCH",
            Self::Api => "API",
            Self::Md => "MD",
            Self::Files => "FILES",
            Self::Other => "OTHER",
        })
    }
}

/// How retrieved PDFs are placed in `data/pdfs`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfPathType {
    /// Link to the file
    #[default]
    Symlink,
    /// Copy the file
    Copy,
}

/// General project settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Project title
    pub title: String,
    /// Review type (`literature_review`, `scoping_review`, ...)
    pub review_type: String,
    /// Id pattern for `set_ids`
    pub id_pattern: IdPattern,
    /// Sharing requirement
    pub share_stat_req: ShareStatReq,
    /// Wait before automated processing of new records
    pub delay_automated_processing: bool,
    /// The repository curates masterdata
    pub curated_masterdata: bool,
    /// Fields curated by the repository
    pub curated_fields: Vec<String>,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            title: String::new(),
            review_type: "literature_review".to_string(),
            id_pattern: IdPattern::default(),
            share_stat_req: ShareStatReq::default(),
            delay_automated_processing: false,
            curated_masterdata: false,
            curated_fields: Vec::new(),
        }
    }
}

/// One configured search source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSourceSettings {
    /// Endpoint of the source package (`colrev.crossref`)
    pub endpoint: String,
    /// Feed file (`data/search/crossref.bib`)
    pub filename: PathBuf,
    /// Kind of search
    pub search_type: SearchType,
    /// Query and other parameters
    #[serde(default)]
    pub search_parameters: Parameters,
    /// Free-text comment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl SearchSourceSettings {
    /// Source settings for `endpoint` writing to `filename`
    #[must_use]
    pub fn new(endpoint: impl Into<String>, filename: impl Into<PathBuf>, search_type: SearchType) -> Self {
        Self {
            endpoint: endpoint.into(),
            filename: filename.into(),
            search_type,
            search_parameters: Parameters::new(),
            comment: None,
        }
    }

    /// Builder: set a search parameter
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.search_parameters.insert(key.into(), value);
        self
    }

    /// Prefix of the origins this source creates (the feed file name)
    #[must_use]
    pub fn origin_prefix(&self) -> String {
        self.filename
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Whether this source is a curated masterdata feed
    #[must_use]
    pub fn is_curated(&self) -> bool {
        self.origin_prefix().starts_with("md_curated")
    }
}

/// An enabled package and its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSettings {
    /// Package endpoint
    pub endpoint: String,
    /// Free-form parameters
    #[serde(flatten)]
    pub parameters: Parameters,
}

impl PackageSettings {
    /// Package without parameters
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            parameters: Parameters::new(),
        }
    }
}

/// A named round of prep packages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepRound {
    /// Round name
    pub name: String,
    /// Packages run in this round, in order
    #[serde(default)]
    pub packages: Vec<PackageSettings>,
}

/// Search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Update forthcoming records once they are published
    pub retrieve_forthcoming: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            retrieve_forthcoming: true,
        }
    }
}

/// Prep settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepSettings {
    /// Rounds of prep packages
    pub prep_rounds: Vec<PrepRound>,
    /// Packages for manual preparation
    pub prep_man: Vec<PackageSettings>,
    /// Defect codes the quality model skips
    pub defects_to_ignore: Vec<String>,
}

/// Settings of an operation that only lists packages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationSettings {
    /// Enabled packages, in order
    pub packages: Vec<PackageSettings>,
}

/// PDF retrieval settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfGetSettings {
    /// Symlink or copy
    pub pdf_path_type: PdfPathType,
    /// Retrieval packages
    pub packages: Vec<PackageSettings>,
    /// Defect codes the PDF quality model skips
    pub defects_to_ignore: Vec<String>,
}

/// PDF preparation settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfPrepSettings {
    /// Rename PDFs to `<ID>.pdf`
    pub rename_pdfs: bool,
    /// Preparation packages
    pub packages: Vec<PackageSettings>,
}

/// A screening criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenCriterion {
    /// What the criterion checks
    pub explanation: String,
    /// Inclusion or exclusion criterion
    #[serde(default)]
    pub criterion_type: CriterionType,
}

/// Inclusion or exclusion criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionType {
    /// Records must meet it
    #[default]
    InclusionCriterion,
    /// Records meeting it are excluded
    ExclusionCriterion,
}

/// Screening settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenSettings {
    /// Criteria by name
    pub criteria: BTreeMap<String, ScreenCriterion>,
    /// Screening packages
    pub packages: Vec<PackageSettings>,
}

/// Project settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// General settings
    pub project: ProjectSettings,
    /// Configured search sources
    pub sources: Vec<SearchSourceSettings>,
    /// Search settings
    pub search: SearchSettings,
    /// Prep settings
    pub prep: PrepSettings,
    /// Dedupe packages
    pub dedupe: OperationSettings,
    /// Prescreen packages
    pub prescreen: OperationSettings,
    /// PDF retrieval
    pub pdf_get: PdfGetSettings,
    /// PDF preparation
    pub pdf_prep: PdfPrepSettings,
    /// Screening
    pub screen: ScreenSettings,
    /// Data packages
    pub data: OperationSettings,
}

impl Settings {
    /// Builder: set the id pattern
    #[must_use]
    pub fn with_id_pattern(mut self, pattern: IdPattern) -> Self {
        self.project.id_pattern = pattern;
        self
    }

    /// Builder: add a source
    #[must_use]
    pub fn with_source(mut self, source: SearchSourceSettings) -> Self {
        self.sources.push(source);
        self
    }

    /// Builder: defect codes the prep quality model skips
    #[must_use]
    pub fn with_defects_to_ignore<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prep.defects_to_ignore = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set the PDF path policy
    #[must_use]
    pub fn with_pdf_path_type(mut self, path_type: PdfPathType) -> Self {
        self.pdf_get.pdf_path_type = path_type;
        self
    }

    /// Builder: mark the repository as a curated masterdata repository
    #[must_use]
    pub fn with_curated_masterdata(mut self, curated: bool) -> Self {
        self.project.curated_masterdata = curated;
        self
    }

    /// Whether the project curates masterdata
    #[must_use]
    pub fn is_curated_masterdata_repo(&self) -> bool {
        self.project.curated_masterdata
    }

    /// Source whose feed file has the given name
    #[must_use]
    pub fn source_by_filename(&self, filename: &str) -> Option<&SearchSourceSettings> {
        self.sources.iter().find(|s| s.origin_prefix() == filename)
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    /// Returns [`SettingsError::DuplicateSourceFilename`] when two sources
    /// share a feed file and [`SettingsError::UnknownDefectCode`] for
    /// unknown codes in a `defects_to_ignore` list.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(&source.filename) {
                return Err(SettingsError::DuplicateSourceFilename(
                    source.filename.display().to_string(),
                ));
            }
        }
        if let Some(code) = self
            .prep
            .defects_to_ignore
            .iter()
            .chain(&self.pdf_get.defects_to_ignore)
            .find(|code| !defects::is_known(code))
        {
            return Err(SettingsError::UnknownDefectCode(code.clone()));
        }
        Ok(())
    }

    /// Load and validate settings
    ///
    /// # Errors
    /// Returns [`SettingsError`] when the file cannot be read, is not valid
    /// JSON, or fails [`Settings::validate`].
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::io_error(path, e))?;
        let settings: Self = serde_json::from_str(&content).map_err(|source| SettingsError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Write settings as pretty-printed JSON
    ///
    /// # Errors
    /// Returns [`SettingsError`] when the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let mut content = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        content.push('\n');
        std::fs::write(path, content).map_err(|e| SettingsError::io_error(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_uses_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.search.retrieve_forthcoming);
        assert_eq!(settings.pdf_get.pdf_path_type, PdfPathType::Symlink);
    }

    #[test]
    fn serde_names() {
        let settings = Settings::default()
            .with_id_pattern(IdPattern::ThreeAuthorsYear)
            .with_source(SearchSourceSettings::new(
                "colrev.crossref",
                "data/search/crossref.bib",
                SearchType::BackwardSearch,
            ));
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["project"]["id_pattern"], "three_authors_year");
        assert_eq!(json["sources"][0]["search_type"], "BACKWARD_SEARCH");
        assert_eq!(json["pdf_get"]["pdf_path_type"], "symlink");
    }

    #[test]
    fn package_parameters_are_flattened() {
        let package: PackageSettings =
            serde_json::from_str(r#"{"endpoint": "colrev.dblp", "rounds": 2}"#).unwrap();
        assert_eq!(package.endpoint, "colrev.dblp");
        assert_eq!(package.parameters["rounds"], serde_json::json!(2));
    }

    #[test]
    fn origin_prefix_is_file_name() {
        let source = SearchSourceSettings::new("colrev.curated", "data/search/md_curated.bib", SearchType::Md);
        assert_eq!(source.origin_prefix(), "md_curated.bib");
        assert!(source.is_curated());
    }

    #[test]
    fn rejects_duplicate_filenames() {
        let source = SearchSourceSettings::new("a", "data/search/x.bib", SearchType::Db);
        let settings = Settings::default()
            .with_source(source.clone())
            .with_source(source);
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::DuplicateSourceFilename(_))
        ));
    }

    #[test]
    fn rejects_unknown_defect_codes() {
        assert!(Settings::default()
            .with_defects_to_ignore(["mostly-all-caps"])
            .validate()
            .is_ok());
        assert!(matches!(
            Settings::default().with_defects_to_ignore(["all-caps"]).validate(),
            Err(SettingsError::UnknownDefectCode(code)) if code == "all-caps"
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings::default().with_curated_masterdata(true);
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }
}
