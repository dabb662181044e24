//! Field-level differences between two records

use crate::constants::is_identifying;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// One difference between two records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldChange {
    /// Field only present in the other record
    Add {
        /// Field name
        key: String,
        /// Value in the other record
        value: String,
    },
    /// Field only present in this record
    Remove {
        /// Field name
        key: String,
        /// Value in this record
        value: String,
    },
    /// Field present in both with different values
    Change {
        /// Field name
        key: String,
        /// Value in this record
        from: String,
        /// Value in the other record
        to: String,
    },
}

impl FieldChange {
    /// Name of the changed field
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Add { key, .. } | Self::Remove { key, .. } | Self::Change { key, .. } => key,
        }
    }
}

impl Display for FieldChange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add { key, value } => write!(f, "add {key}: {value}"),
            Self::Remove { key, value } => write!(f, "remove {key}: {value}"),
            Self::Change { key, from, to } => write!(f, "change {key}: {from} -> {to}"),
        }
    }
}

impl Record {
    /// Differences from `self` to `other`
    ///
    /// With `identifying_only`, only identifying fields are compared.
    /// Otherwise the entry type is included as `ENTRYTYPE`.
    #[must_use]
    pub fn get_diff(&self, other: &Record, identifying_only: bool) -> Vec<FieldChange> {
        let selected = |key: &str| !identifying_only || is_identifying(key);
        let mut changes = Vec::new();

        if !identifying_only && self.entry_type != other.entry_type {
            changes.push(FieldChange::Change {
                key: crate::constants::fields::ENTRYTYPE.to_string(),
                from: self.entry_type.to_string(),
                to: other.entry_type.to_string(),
            });
        }

        for (key, value) in self.fields().iter().filter(|(k, _)| selected(k)) {
            match other.get(key) {
                Some(to) if to != value => changes.push(FieldChange::Change {
                    key: key.clone(),
                    from: value.clone(),
                    to: to.to_string(),
                }),
                Some(_) => {}
                None => changes.push(FieldChange::Remove {
                    key: key.clone(),
                    value: value.clone(),
                }),
            }
        }
        for (key, value) in other.fields().iter().filter(|(k, _)| selected(k)) {
            if !self.contains(key) {
                changes.push(FieldChange::Add {
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::fields;
    use crate::entry_type::EntryType;
    use pretty_assertions::assert_eq;

    #[test]
    fn identifying_diff_skips_other_fields() {
        let a = Record::new("a", EntryType::Article)
            .with_field(fields::TITLE, "Old")
            .with_field(fields::PAGES, "1--2")
            .with_field(fields::DOI, "10.1/a");
        let b = Record::new("a", EntryType::Article)
            .with_field(fields::TITLE, "New")
            .with_field(fields::YEAR, "2020")
            .with_field(fields::DOI, "10.1/b");

        let diff = a.get_diff(&b, true);
        assert_eq!(
            diff,
            vec![
                FieldChange::Change {
                    key: "title".into(),
                    from: "Old".into(),
                    to: "New".into()
                },
                FieldChange::Remove {
                    key: "pages".into(),
                    value: "1--2".into()
                },
                FieldChange::Add {
                    key: "year".into(),
                    value: "2020".into()
                },
            ]
        );
        assert_eq!(a.get_diff(&b, false).len(), 4);
    }

    #[test]
    fn full_diff_reports_entrytype() {
        let a = Record::new("a", EntryType::Article);
        let b = Record::new("a", EntryType::Book);
        assert_eq!(a.get_diff(&b, false)[0].to_string(), "change ENTRYTYPE: article -> book");
    }
}
