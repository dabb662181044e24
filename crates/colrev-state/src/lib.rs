//! Record lifecycle state machine
//!
//! Every bibliographic record carries exactly one [`RecordState`]. Operations
//! ([`Operation`]) move records between states along a fixed transition table.
//!
//! # Core Concepts
//!
//! - [`RecordState`]: totally ordered lifecycle states, compared through [`RecordState::rank`]
//! - [`Operation`]: the pipeline operations plus the `format`/`explore`/`check` pseudo-operations
//! - [`StateModel`]: transition table, per-operation source/dest sets, validation
//!
//! # Example
//!
//! ```rust,ignore
//! use colrev_state::{Operation, RecordState, StateModel};
//!
//! let dest = StateModel::validate("Smith2020", RecordState::MdImported, RecordState::MdPrepared, Operation::Prep)?;
//! assert!(dest.is_post(RecordState::MdImported));
//! ```

#![warn(unreachable_pub)]

mod error;
mod model;
mod operation;
mod state;

pub use error::{StateError, StateResult};
pub use model::{StateModel, Transition, TRANSITIONS};
pub use operation::Operation;
pub use state::RecordState;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
