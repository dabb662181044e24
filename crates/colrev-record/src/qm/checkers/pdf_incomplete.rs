use crate::constants::{defects, fields};
use crate::qm::{Finding, QualityChecker};
use crate::record::Record;
use lopdf::Document;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Value of a roman numeral (`xii` -> 12)
fn roman_to_int(s: &str) -> Option<u32> {
    let value = |c: char| match c.to_ascii_lowercase() {
        'i' => Some(1),
        'v' => Some(5),
        'x' => Some(10),
        'l' => Some(50),
        'c' => Some(100),
        'd' => Some(500),
        'm' => Some(1000),
        _ => None,
    };
    let digits: Vec<u32> = s.chars().map(value).collect::<Option<_>>()?;
    if digits.is_empty() {
        return None;
    }
    let mut total: i64 = 0;
    for (i, d) in digits.iter().enumerate() {
        match digits.get(i + 1) {
            Some(next) if next > d => total -= i64::from(*d),
            _ => total += i64::from(*d),
        }
    }
    u32::try_from(total).ok()
}

fn page_number(s: &str) -> Option<u32> {
    s.trim().parse().ok().or_else(|| roman_to_int(s.trim()))
}

/// Number of pages stated by the `pages` field; `None` if it cannot be read
fn pages_in_metadata(pages: &str) -> Option<u32> {
    match pages.split_once("--") {
        Some((from, to)) => {
            let (from, to) = (page_number(from)?, page_number(to)?);
            to.checked_sub(from).map(|d| d + 1)
        }
        None => page_number(pages).map(|_| 1),
    }
}

/// PDF whose page count does not match the `pages` field
///
/// A single extra page (a publisher's cover page) is accepted. Missing or
/// empty files are reported as incomplete.
#[derive(Debug, Clone)]
pub struct PdfIncompleteChecker {
    project_root: PathBuf,
}

impl PdfIncompleteChecker {
    /// Checker resolving relative file paths against `project_root`
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    fn is_incomplete(&self, file: &Path, pages: Option<&str>) -> bool {
        let path = self.project_root.join(file);
        let Ok(meta) = std::fs::metadata(&path) else {
            debug!(path = %path.display(), "PDF not found");
            return true;
        };
        if meta.len() == 0 {
            return true;
        }
        let Some(expected) = pages.and_then(pages_in_metadata) else {
            return false;
        };
        match Document::load(&path) {
            Ok(doc) => {
                let actual = u32::try_from(doc.get_pages().len()).unwrap_or(u32::MAX);
                actual != expected && actual != expected + 1
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "PDF not parsable");
                true
            }
        }
    }
}

impl QualityChecker for PdfIncompleteChecker {
    fn name(&self) -> &'static str {
        "pdf-incomplete"
    }

    fn codes(&self) -> &'static [&'static str] {
        &[defects::PDF_INCOMPLETE]
    }

    fn run(&self, record: &Record) -> Vec<Finding> {
        let Some(file) = record.get(fields::FILE) else {
            return Vec::new();
        };
        let file = Path::new(file);
        if file.extension().is_none_or(|ext| ext != "pdf")
            || record.ignored_defect(fields::FILE, defects::PDF_INCOMPLETE)
        {
            return Vec::new();
        }
        let defective = self.is_incomplete(file, record.get(fields::PAGES));
        vec![Finding::check(fields::FILE, defects::PDF_INCOMPLETE, defective)]
    }
}
