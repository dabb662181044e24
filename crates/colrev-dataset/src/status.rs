//! Per-state record counts (`status.yaml`)

use crate::error::SettingsError;
use colrev_record::Record;
use colrev_state::RecordState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Record counts per state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Number of records per state, in lifecycle order
    pub states: BTreeMap<RecordState, usize>,
    /// Number of records
    pub total: usize,
}

impl StatusReport {
    /// Count the records per state
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut report = Self::default();
        for record in records {
            *report.states.entry(record.status()).or_default() += 1;
            report.total += 1;
        }
        report
    }

    /// Count from an origin-to-state index
    pub fn from_states<I>(states: I) -> Self
    where
        I: IntoIterator<Item = RecordState>,
    {
        let mut report = Self::default();
        for state in states {
            *report.states.entry(state).or_default() += 1;
            report.total += 1;
        }
        report
    }

    /// Records in `state`
    #[must_use]
    pub fn count(&self, state: RecordState) -> usize {
        self.states.get(&state).copied().unwrap_or(0)
    }

    /// Records at or beyond `state`
    #[must_use]
    pub fn count_post(&self, state: RecordState) -> usize {
        self.states
            .iter()
            .filter(|(s, _)| s.is_post(state))
            .map(|(_, n)| n)
            .sum()
    }

    /// YAML rendering
    ///
    /// # Errors
    /// Returns [`SettingsError::Yaml`] when serialization fails.
    pub fn to_yaml(&self) -> Result<String, SettingsError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write `status.yaml`
    ///
    /// # Errors
    /// Returns [`SettingsError`] when serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let yaml = self.to_yaml()?;
        std::fs::write(path, yaml).map_err(|e| SettingsError::io_error(path, e))
    }
}
