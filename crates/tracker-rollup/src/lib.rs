//! Tracker Rollup
//!
//! Pure functions over the record hierarchy.
//!
//! # Core Concepts
//!
//! - [`progress`]: completion percentages per level, plus the separate
//!   parent/child record averaging
//! - [`reconcile`]: forward completion and rollback of ancestor statuses
//! - [`validate_parent_status`]: rejects direct edits that contradict the
//!   children
//! - [`migrate`]: one-time conversion of legacy two-level initiatives
//!
//! # Example
//!
//! ```rust,ignore
//! use tracker_rollup::{progress, reconcile};
//!
//! sub_item.set_status(Status::Done);
//! reconcile(&record).apply_to(&mut record);
//! progress::refresh_progress(&mut record);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod migration;
mod propagation;

pub mod progress;

pub use error::PropagationError;
pub use migration::{migrate, needs_migration};
pub use propagation::{
    reconcile, reconcile_in_place, validate_parent_status, validate_phase_status,
    validate_record_status, PhaseUpdate, Reconciliation,
};

use tracker_model::Record;

/// Bring a record back in line after any child edit
///
/// Runs status propagation first so progress sees the final statuses.
pub fn settle(record: &mut Record) -> Reconciliation {
    let reconciliation = reconcile_in_place(record);
    progress::refresh_progress(record);
    reconciliation
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
