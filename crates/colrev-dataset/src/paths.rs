//! Project file layout

use std::path::{Path, PathBuf};

/// Main records file, relative to the project root
pub const RECORDS_FILE: &str = "data/records.bib";
/// Directory holding the feed files
pub const SEARCH_DIR: &str = "data/search";
/// Directory holding retrieved PDFs
pub const PDF_DIR: &str = "data/pdfs";
/// Manuscript of the synthesis
pub const PAPER_FILE: &str = "data/paper.md";
/// Project settings
pub const SETTINGS_FILE: &str = "settings.json";
/// Per-state counts
pub const STATUS_FILE: &str = "status.yaml";
/// Operation report log
pub const REPORT_LOG: &str = ".report.log";
/// Pre-commit hook configuration
pub const PRE_COMMIT_CONFIG: &str = ".pre-commit-config.yaml";

/// Absolute paths of one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    /// Layout rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Project root
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `data/records.bib`
    #[must_use]
    pub fn records(&self) -> PathBuf {
        self.root.join(RECORDS_FILE)
    }

    /// `data/search/`
    #[must_use]
    pub fn search(&self) -> PathBuf {
        self.root.join(SEARCH_DIR)
    }

    /// `data/pdfs/`
    #[must_use]
    pub fn pdfs(&self) -> PathBuf {
        self.root.join(PDF_DIR)
    }

    /// `data/paper.md`
    #[must_use]
    pub fn paper(&self) -> PathBuf {
        self.root.join(PAPER_FILE)
    }

    /// `settings.json`
    #[must_use]
    pub fn settings(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    /// `status.yaml`
    #[must_use]
    pub fn status(&self) -> PathBuf {
        self.root.join(STATUS_FILE)
    }

    /// `.report.log`
    #[must_use]
    pub fn report_log(&self) -> PathBuf {
        self.root.join(REPORT_LOG)
    }

    /// Feed file of a source (`data/search/<filename>`)
    #[must_use]
    pub fn feed_file(&self, filename: &str) -> PathBuf {
        self.search().join(filename)
    }

    /// Path relative to the root, for history lookups
    ///
    /// Paths outside the project are returned unchanged.
    #[must_use]
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}
