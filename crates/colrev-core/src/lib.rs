//! CoLRev Core - review manager and lifecycle operations
//!
//! The review manager drives records through the lifecycle:
//! - each operation checks its precondition, moves records only along the
//!   transition table and ends with one commit
//! - record-level failures are logged and skipped, invariant violations
//!   abort before anything is committed
//! - the pre-commit checks run before every commit
//!
//! # Example
//!
//! ```rust,ignore
//! use colrev_core::prelude::*;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ReviewManager::open(std::path::Path::new("."))?;
//! Load::new(&manager).main()?;
//! Prep::new(&manager).main()?;
//! Dedupe::new(&manager).main()?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod commit;
pub mod corrections;
pub mod error;
pub mod logging;
pub mod operations;
pub mod pool;
pub mod reconcile;
pub mod review_manager;

pub use commit::CommitMessage;
pub use corrections::{check_correction_precondition, curated_corrections, Correction};
pub use error::{ColrevError, Result};
pub use operations::{
    Data, DataPackage, Dedupe, DirectoryRetriever, DuplicatePair, Load, ManualEdit, PaperMarkdown, PdfGet,
    PdfGetMan, PdfGetManDecision, PdfPrep, PdfPrepMan, PdfPrepManDecision, PdfRetriever, Prep, PrepMan,
    PrepPackage, Prescreen, PrescreenDecision, SameSourceMerges, Screen, ScreenDecision, Search,
};
pub use pool::WorkerPool;
pub use reconcile::{reconcile, LaterStatus, StatusResolver};
pub use review_manager::ReviewManager;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running operations
    pub use crate::{
        ColrevError, CommitMessage, Data, Dedupe, Load, PdfGet, PdfGetMan, PdfPrep, PdfPrepMan, Prep, PrepMan,
        Prescreen, ReviewManager, Screen, Search, WorkerPool,
    };
    pub use colrev_state::{Operation, RecordState};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
