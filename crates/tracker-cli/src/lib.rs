//! Tracker CLI
//!
//! Maintenance commands that run the tracker against a JSON snapshot of the
//! document store:
//! - `migrate`: convert legacy initiatives and write the snapshot back
//! - `check`: list records whose stored status or progress is stale
//! - `timeline`: schedule spans and overdue flags as of a given day

#![warn(unreachable_pub)]
#![warn(missing_docs)]

pub mod commands;
pub mod logging;

pub use commands::{
    check_snapshot, load_config, migrate_snapshot, read_snapshot, timeline_snapshot,
    write_snapshot, CheckSummary, CollectionFindings, CollectionTimeline, MigrationSummary,
    TimelineSummary,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
