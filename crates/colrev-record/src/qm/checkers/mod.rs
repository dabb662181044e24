//! Built-in quality checkers
//!
//! One checker per defect code. Every checker reports a finding for each
//! field it inspects so that stale notes are cleared on re-runs.

mod caps;
mod consistency;
mod format;
mod missing_field;
mod names;
mod pdf_incomplete;

pub use caps::{ContainerTitleAbbreviatedChecker, MostlyAllCapsChecker};
pub use consistency::{IdenticalTitleContainerChecker, InconsistentWithEntrytypeChecker};
pub use format::{
    DoiPatternChecker, ErroneousSymbolChecker, HtmlTagsChecker, IsbnPatternChecker,
    LanguageFormatChecker, PageRangeChecker, YearFormatChecker,
};
pub use missing_field::{required_fields, MissingFieldChecker};
pub use names::{NameAbbreviatedChecker, ThesisWithMultipleAuthorsChecker};
pub use pdf_incomplete::PdfIncompleteChecker;

use super::QualityModel;

/// Install every masterdata checker, missing-field first
pub fn register_defaults(qm: &mut QualityModel) {
    qm.register(Box::new(MissingFieldChecker))
        .register(Box::new(MostlyAllCapsChecker))
        .register(Box::new(HtmlTagsChecker))
        .register(Box::new(YearFormatChecker))
        .register(Box::new(DoiPatternChecker))
        .register(Box::new(IsbnPatternChecker))
        .register(Box::new(PageRangeChecker))
        .register(Box::new(ThesisWithMultipleAuthorsChecker))
        .register(Box::new(IdenticalTitleContainerChecker))
        .register(Box::new(ContainerTitleAbbreviatedChecker))
        .register(Box::new(NameAbbreviatedChecker))
        .register(Box::new(InconsistentWithEntrytypeChecker))
        .register(Box::new(LanguageFormatChecker))
        .register(Box::new(ErroneousSymbolChecker));
}
