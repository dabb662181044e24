//! Pipeline operations

use crate::error::StateError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// An operation of the review pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Populate search feeds
    Search,
    /// Import feed records into the main store
    Load,
    /// Metadata preparation
    Prep,
    /// Manual metadata preparation
    PrepMan,
    /// Deduplication
    Dedupe,
    /// Title/abstract prescreen
    Prescreen,
    /// PDF retrieval
    PdfGet,
    /// Manual PDF retrieval
    PdfGetMan,
    /// PDF preparation
    PdfPrep,
    /// Manual PDF preparation
    PdfPrepMan,
    /// Full-text screen
    Screen,
    /// Data extraction and synthesis
    Data,
    /// Pseudo-operation: reformat the records file
    Format,
    /// Pseudo-operation: inspect the dataset
    Explore,
    /// Pseudo-operation: validate the dataset
    Check,
}

impl Operation {
    /// All operations
    pub const ALL: [Operation; 15] = [
        Self::Search,
        Self::Load,
        Self::Prep,
        Self::PrepMan,
        Self::Dedupe,
        Self::Prescreen,
        Self::PdfGet,
        Self::PdfGetMan,
        Self::PdfPrep,
        Self::PdfPrepMan,
        Self::Screen,
        Self::Data,
        Self::Format,
        Self::Explore,
        Self::Check,
    ];

    /// Serialized name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Load => "load",
            Self::Prep => "prep",
            Self::PrepMan => "prep_man",
            Self::Dedupe => "dedupe",
            Self::Prescreen => "prescreen",
            Self::PdfGet => "pdf_get",
            Self::PdfGetMan => "pdf_get_man",
            Self::PdfPrep => "pdf_prep",
            Self::PdfPrepMan => "pdf_prep_man",
            Self::Screen => "screen",
            Self::Data => "data",
            Self::Format => "format",
            Self::Explore => "explore",
            Self::Check => "check",
        }
    }

    /// Pseudo-operations map every state onto itself
    #[inline]
    #[must_use]
    pub const fn is_pseudo(&self) -> bool {
        matches!(self, Self::Format | Self::Explore | Self::Check)
    }

    /// Whether the operation can only start once records exist
    #[inline]
    #[must_use]
    pub const fn requires_records(&self) -> bool {
        !matches!(self, Self::Search | Self::Load | Self::Format | Self::Check)
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| StateError::UnknownOperation(s.to_string()))
    }
}
