//! Data: synthesise included records
//!
//! Data packages keep their own artefacts (a manuscript, extraction
//! tables) in step with the included records and report which records
//! they have synthesised. A record becomes `rev_synthesized` once every
//! configured package reports it.

use super::transition;
use crate::commit::CommitMessage;
use crate::error::{ColrevError, Result};
use crate::ReviewManager;
use colrev_dataset::ProjectPaths;
use colrev_state::{Operation, RecordState};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Endpoint of [`PaperMarkdown`]
pub const PAPER_MD: &str = "colrev.paper_md";

/// Marker after which new records are listed in the manuscript
pub const NEW_RECORD_SOURCE_TAG: &str = "<!-- NEW_RECORD_SOURCE -->";

const TO_SYNTHESIZE_HEADING: &str = "_Records to synthesize_:";
const LIST_ITEM: &str = "- @";

static CITATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"@([A-Za-z0-9_:\-]+)").expect("static regex"));

/// Package that synthesises included records
pub trait DataPackage: Send + Sync {
    /// Endpoint name used in the settings
    fn endpoint(&self) -> &str;

    /// Bring the package's files up to date with the `included` ids
    ///
    /// Returns the files that were written.
    ///
    /// # Errors
    /// Returns [`ColrevError`] when a file cannot be read or written.
    fn update(&self, paths: &ProjectPaths, included: &[String]) -> Result<Vec<PathBuf>>;

    /// Which of the `included` ids the package has synthesised
    ///
    /// # Errors
    /// Returns [`ColrevError`] when the package files cannot be read.
    fn synthesized(&self, paths: &ProjectPaths, included: &[String]) -> Result<BTreeSet<String>>;
}

/// Markdown manuscript at `data/paper.md`
///
/// New records are appended to the list below [`NEW_RECORD_SOURCE_TAG`].
/// A record counts as synthesised once it is cited in the manuscript but
/// no longer listed there.
#[derive(Debug, Clone, Default)]
pub struct PaperMarkdown {
    title: String,
}

impl PaperMarkdown {
    /// Package creating manuscripts titled `title`
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into() }
    }

    fn template(&self) -> String {
        let title = if self.title.is_empty() {
            "Manuscript template"
        } else {
            &self.title
        };
        format!(
            "---\ntitle: {title}\n---\n\n# Introduction\n\n# Methods\n\n# Results\n\n\
             {NEW_RECORD_SOURCE_TAG}{TO_SYNTHESIZE_HEADING}\n\n# References\n"
        )
    }
}

impl DataPackage for PaperMarkdown {
    fn endpoint(&self) -> &str {
        PAPER_MD
    }

    fn update(&self, paths: &ProjectPaths, included: &[String]) -> Result<Vec<PathBuf>> {
        let path = paths.paper();
        let text = if path.is_file() {
            fs::read_to_string(&path).map_err(|e| ColrevError::io_error(&path, e))?
        } else {
            info!("Creating manuscript");
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| ColrevError::io_error(parent, e))?;
            }
            self.template()
        };

        let cited = cited_ids(&text);
        let mut missing: Vec<String> = included.iter().filter(|id| !cited.contains(*id)).cloned().collect();
        missing.sort();
        if missing.is_empty() && path.is_file() {
            info!("All records included in {}", paths.relative(&path).display());
            return Ok(Vec::new());
        }

        let (updated, had_marker) = add_to_synthesize(&text, &missing);
        if !had_marker {
            warn!(
                "Marker {NEW_RECORD_SOURCE_TAG} not found in {}. Adding records at the end of the document.",
                paths.relative(&path).display()
            );
        }
        fs::write(&path, updated).map_err(|e| ColrevError::io_error(&path, e))?;
        for id in &missing {
            debug!(id = %id, "added to manuscript");
        }
        info!(added = missing.len(), "manuscript updated");
        Ok(vec![path])
    }

    fn synthesized(&self, paths: &ProjectPaths, included: &[String]) -> Result<BTreeSet<String>> {
        let path = paths.paper();
        if !path.is_file() {
            return Ok(BTreeSet::new());
        }
        let text = fs::read_to_string(&path).map_err(|e| ColrevError::io_error(&path, e))?;
        let cited = cited_ids(&text);
        let open: BTreeSet<String> = to_synthesize(&text).into_iter().collect();
        Ok(included
            .iter()
            .filter(|id| cited.contains(*id) && !open.contains(*id))
            .cloned()
            .collect())
    }
}

/// Ids cited anywhere in the manuscript
fn cited_ids(text: &str) -> BTreeSet<String> {
    CITATION.captures_iter(text).map(|c| c[1].to_string()).collect()
}

/// Ids listed below the marker, still waiting for synthesis
fn to_synthesize(text: &str) -> Vec<String> {
    let mut lines = text.lines().skip_while(|l| !l.contains(NEW_RECORD_SOURCE_TAG)).skip(1);
    let mut ids = Vec::new();
    for line in lines.by_ref() {
        if let Some(id) = line.trim().strip_prefix(LIST_ITEM) {
            ids.push(id.trim().to_string());
            break;
        }
        if !line.trim().is_empty() {
            return ids;
        }
    }
    for line in lines {
        match line.trim().strip_prefix(LIST_ITEM) {
            Some(id) => ids.push(id.trim().to_string()),
            None => break,
        }
    }
    ids
}

/// Append `missing` to the list below the marker
///
/// Without a marker, a marked list is added at the end. The flag reports
/// whether the marker was found.
fn add_to_synthesize(text: &str, missing: &[String]) -> (String, bool) {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let entries: Vec<String> = missing.iter().map(|id| format!("{LIST_ITEM}{id}")).collect();

    let had_marker = match lines.iter().position(|l| l.contains(NEW_RECORD_SOURCE_TAG)) {
        Some(marker) => {
            if !lines[marker].contains(TO_SYNTHESIZE_HEADING) {
                lines[marker].push_str(TO_SYNTHESIZE_HEADING);
            }
            let mut at = marker + 1;
            while lines.get(at).is_some_and(|l| l.trim().is_empty()) {
                at += 1;
            }
            if lines.get(at).is_some_and(|l| l.trim().starts_with(LIST_ITEM)) {
                while lines.get(at).is_some_and(|l| l.trim().starts_with(LIST_ITEM)) {
                    at += 1;
                }
                lines.splice(at..at, entries);
            } else {
                let mut block = vec![String::new()];
                block.extend(entries);
                if lines.get(marker + 1).is_some_and(|l| !l.trim().is_empty()) {
                    block.push(String::new());
                }
                lines.splice(marker + 1..marker + 1, block);
            }
            true
        }
        None => {
            if lines.last().is_some_and(|l| !l.trim().is_empty()) {
                lines.push(String::new());
            }
            lines.push(format!("{NEW_RECORD_SOURCE_TAG}{TO_SYNTHESIZE_HEADING}"));
            lines.push(String::new());
            lines.extend(entries);
            false
        }
    };

    let mut out = lines.join("\n");
    out.push('\n');
    (out, had_marker)
}

/// Data operation
pub struct Data<'a> {
    review_manager: &'a ReviewManager,
    packages: Vec<Box<dyn DataPackage>>,
}

impl std::fmt::Debug for Data<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("packages", &self.packages.iter().map(|p| p.endpoint()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<'a> Data<'a> {
    /// Data operation with the configured packages
    ///
    /// Projects without data packages get the markdown manuscript.
    #[must_use]
    pub fn new(review_manager: &'a ReviewManager) -> Self {
        let title = review_manager.settings().project.title.clone();
        let mut packages: Vec<Box<dyn DataPackage>> = Vec::new();
        for package in &review_manager.settings().data.packages {
            match package.endpoint.as_str() {
                PAPER_MD => packages.push(Box::new(PaperMarkdown::new(title.clone()))),
                other => warn!(endpoint = other, "data package not available"),
            }
        }
        if packages.is_empty() {
            packages.push(Box::new(PaperMarkdown::new(title)));
        }
        Self {
            review_manager,
            packages,
        }
    }

    /// Data operation with exactly `packages`
    #[must_use]
    pub fn with_packages(review_manager: &'a ReviewManager, packages: Vec<Box<dyn DataPackage>>) -> Self {
        Self {
            review_manager,
            packages,
        }
    }

    /// Update the data packages and mark synthesised records
    ///
    /// # Errors
    /// Returns [`ColrevError`] when the precondition fails, a package
    /// cannot write its files or the commit checks fail.
    pub fn main(&self) -> Result<CommitMessage> {
        let rm = self.review_manager;
        rm.notify(Operation::Data)?;
        let mut records = rm.dataset().load_records_dict(false)?;
        let mut message = CommitMessage::new(Operation::Data);

        let included: Vec<String> = records
            .values()
            .filter(|r| matches!(r.status(), RecordState::RevIncluded | RecordState::RevSynthesized))
            .map(|r| r.id.clone())
            .collect();
        if included.is_empty() {
            info!("No records included yet (use screen)");
            return Ok(message);
        }

        let mut synthesized: Option<BTreeSet<String>> = None;
        for package in &self.packages {
            for path in package.update(rm.paths(), &included)? {
                rm.dataset().add_changes(&path)?;
            }
            let done = package.synthesized(rm.paths(), &included)?;
            debug!(endpoint = package.endpoint(), synthesized = done.len(), "data package");
            synthesized = Some(match synthesized {
                Some(previous) => previous.intersection(&done).cloned().collect(),
                None => done,
            });
        }

        for id in synthesized.unwrap_or_default() {
            if let Some(record) = records.get_mut(&id) {
                if record.status() == RecordState::RevIncluded {
                    transition(record, RecordState::RevSynthesized, Operation::Data)?;
                    message.add_stat("synthesized", 1);
                }
            }
        }
        info!(synthesized = message.stat("synthesized"), "data");

        rm.dataset().save_records_dict(&mut records, false)?;
        rm.create_commit(&message)?;
        Ok(message)
    }
}
