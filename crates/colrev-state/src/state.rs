//! Lifecycle states
//!
//! States form a total order. Every comparison goes through [`RecordState::rank`],
//! so inserting a state only requires renumbering the rank table.

use crate::error::StateError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Lifecycle state of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    /// Retrieved by a search feed, not yet in the main store
    MdRetrieved,
    /// Imported into the main store
    MdImported,
    /// Metadata preparation failed and needs an operator
    MdNeedsManualPreparation,
    /// Metadata prepared
    MdPrepared,
    /// Deduplicated
    MdProcessed,
    /// Excluded at prescreen
    RevPrescreenExcluded,
    /// Included at prescreen
    RevPrescreenIncluded,
    /// PDF retrieval failed and needs an operator
    PdfNeedsManualRetrieval,
    /// PDF linked to the record
    PdfImported,
    /// PDF could not be obtained
    PdfNotAvailable,
    /// PDF preparation failed and needs an operator
    PdfNeedsManualPreparation,
    /// PDF prepared
    PdfPrepared,
    /// Excluded at screen
    RevExcluded,
    /// Included at screen
    RevIncluded,
    /// Data extracted and synthesized
    RevSynthesized,
}

impl RecordState {
    /// All states in lifecycle order
    pub const ALL: [RecordState; 15] = [
        Self::MdRetrieved,
        Self::MdImported,
        Self::MdNeedsManualPreparation,
        Self::MdPrepared,
        Self::MdProcessed,
        Self::RevPrescreenExcluded,
        Self::RevPrescreenIncluded,
        Self::PdfNeedsManualRetrieval,
        Self::PdfImported,
        Self::PdfNotAvailable,
        Self::PdfNeedsManualPreparation,
        Self::PdfPrepared,
        Self::RevExcluded,
        Self::RevIncluded,
        Self::RevSynthesized,
    ];

    /// Position in the lifecycle order
    #[inline]
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::MdRetrieved => 1,
            Self::MdImported => 2,
            Self::MdNeedsManualPreparation => 3,
            Self::MdPrepared => 4,
            Self::MdProcessed => 5,
            Self::RevPrescreenExcluded => 6,
            Self::RevPrescreenIncluded => 7,
            Self::PdfNeedsManualRetrieval => 8,
            Self::PdfImported => 9,
            Self::PdfNotAvailable => 10,
            Self::PdfNeedsManualPreparation => 11,
            Self::PdfPrepared => 12,
            Self::RevExcluded => 13,
            Self::RevIncluded => 14,
            Self::RevSynthesized => 15,
        }
    }

    /// Serialized name (`md_prepared`, ...)
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MdRetrieved => "md_retrieved",
            Self::MdImported => "md_imported",
            Self::MdNeedsManualPreparation => "md_needs_manual_preparation",
            Self::MdPrepared => "md_prepared",
            Self::MdProcessed => "md_processed",
            Self::RevPrescreenExcluded => "rev_prescreen_excluded",
            Self::RevPrescreenIncluded => "rev_prescreen_included",
            Self::PdfNeedsManualRetrieval => "pdf_needs_manual_retrieval",
            Self::PdfImported => "pdf_imported",
            Self::PdfNotAvailable => "pdf_not_available",
            Self::PdfNeedsManualPreparation => "pdf_needs_manual_preparation",
            Self::PdfPrepared => "pdf_prepared",
            Self::RevExcluded => "rev_excluded",
            Self::RevIncluded => "rev_included",
            Self::RevSynthesized => "rev_synthesized",
        }
    }

    /// States at or beyond `self` in the lifecycle order
    #[must_use]
    pub fn post_x(self) -> Vec<RecordState> {
        Self::ALL
            .iter()
            .copied()
            .filter(|s| s.rank() >= self.rank())
            .collect()
    }

    /// Whether `self` has progressed to or past `other`
    #[inline]
    #[must_use]
    pub const fn is_post(self, other: RecordState) -> bool {
        self.rank() >= other.rank()
    }

    /// Terminal exclusion states that only a forced update may leave
    #[inline]
    #[must_use]
    pub const fn requires_force_to_revive(self) -> bool {
        matches!(self, Self::RevPrescreenExcluded | Self::PdfNotAvailable)
    }

    /// The later of two states
    #[inline]
    #[must_use]
    pub fn later(self, other: RecordState) -> RecordState {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

impl PartialOrd for RecordState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RecordState {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl Display for RecordState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordState {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| StateError::UnknownState(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_are_strictly_increasing() {
        for pair in RecordState::ALL.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn post_x_includes_self_and_later_states() {
        let post = RecordState::MdProcessed.post_x();
        assert_eq!(post.first(), Some(&RecordState::MdProcessed));
        assert!(post.contains(&RecordState::RevSynthesized));
        assert!(!post.contains(&RecordState::MdPrepared));
        assert_eq!(post.len(), 11);
    }

    #[test]
    fn parse_and_display_agree() {
        for state in RecordState::ALL {
            let parsed: RecordState = state.to_string().parse().unwrap();
            assert_eq!(parsed, state);
        }
    }

    #[test]
    fn parse_unknown_state_fails() {
        let err = "md_unknown".parse::<RecordState>().unwrap_err();
        assert_eq!(err, StateError::UnknownState("md_unknown".into()));
    }

    #[test]
    fn serde_uses_snake_case_names() {
        let json = serde_json::to_string(&RecordState::PdfNeedsManualRetrieval).unwrap();
        assert_eq!(json, "\"pdf_needs_manual_retrieval\"");
    }

    #[test]
    fn later_picks_higher_rank() {
        assert_eq!(
            RecordState::MdPrepared.later(RecordState::MdImported),
            RecordState::MdPrepared
        );
        assert_eq!(
            RecordState::MdImported.later(RecordState::RevIncluded),
            RecordState::RevIncluded
        );
    }
}
