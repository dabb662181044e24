//! Commit messages
//!
//! Each operation ends in exactly one commit. The message starts with the
//! operation name and lists the counts the operation collected:
//!
//! ```text
//! Dedupe
//!
//!  - merged: 2
//!  - processed: 14
//! ```

use chrono::Local;
use colrev_state::Operation;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Message of an operation commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessage {
    operation: Operation,
    stats: Vec<(String, usize)>,
    details: Vec<String>,
}

impl CommitMessage {
    /// Message for `operation` without stats
    #[must_use]
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            stats: Vec::new(),
            details: Vec::new(),
        }
    }

    /// Builder: add a count
    #[must_use]
    pub fn with_stat(mut self, name: impl Into<String>, count: usize) -> Self {
        self.add_stat(name, count);
        self
    }

    /// Add to a count, creating it when absent
    pub fn add_stat(&mut self, name: impl Into<String>, count: usize) {
        let name = name.into();
        match self.stats.iter_mut().find(|(n, _)| *n == name) {
            Some((_, n)) => *n += count,
            None => self.stats.push((name, count)),
        }
    }

    /// Add a free-text line
    pub fn add_detail(&mut self, detail: impl Into<String>) {
        self.details.push(detail.into());
    }

    /// Operation that produced the commit
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Count recorded under `name`
    #[must_use]
    pub fn stat(&self, name: &str) -> usize {
        self.stats
            .iter()
            .find(|(n, _)| n == name)
            .map_or(0, |(_, count)| *count)
    }

    /// First line of the message
    #[must_use]
    pub fn title(&self) -> String {
        let name = self.operation.as_str().replace('_', " ");
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Append a timestamped copy of the message to the report log at `path`
    ///
    /// # Errors
    /// Returns the IO error when the log cannot be opened or written.
    pub fn append_to_report(&self, path: &Path) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(file, "[{timestamp}] {self}")
    }
}

impl fmt::Display for CommitMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())?;
        if self.stats.is_empty() && self.details.is_empty() {
            return Ok(());
        }
        writeln!(f)?;
        for (name, count) in &self.stats {
            write!(f, "\n - {name}: {count}")?;
        }
        for detail in &self.details {
            write!(f, "\n - {detail}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_stats() {
        let mut message = CommitMessage::new(Operation::PdfGetMan).with_stat("linked", 1);
        message.add_stat("not available", 2);
        message.add_stat("linked", 1);
        assert_eq!(message.stat("linked"), 2);
        assert_eq!(
            message.to_string(),
            "Pdf get man\n\n - linked: 2\n - not available: 2"
        );
    }

    #[test]
    fn report_log_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join(".report.log");
        CommitMessage::new(Operation::Load).append_to_report(&log).unwrap();
        CommitMessage::new(Operation::Prep)
            .with_stat("prepared", 3)
            .append_to_report(&log)
            .unwrap();

        let content = std::fs::read_to_string(&log).unwrap();
        let titles: Vec<&str> = content
            .lines()
            .filter(|l| l.starts_with('['))
            .filter_map(|l| l.split_once("] ").map(|(_, t)| t))
            .collect();
        assert_eq!(titles, vec!["Load", "Prep"]);
        assert!(content.contains(" - prepared: 3"));
    }

    #[test]
    fn bare_title() {
        assert_eq!(CommitMessage::new(Operation::Load).to_string(), "Load");
    }
}
