//! Tracker Model
//!
//! Typed hierarchy for initiatives and M&A deals.
//!
//! # Core Concepts
//!
//! - [`Record`]: top-level initiative or deal
//! - [`Phase`]: mid-level node (initiatives only)
//! - [`SubItem`]: leaf carrying the authoritative completion signal
//! - [`Status`]: canonical lifecycle, with [`LegacyStatus`] read aliases
//! - [`RecordDocument`]: tolerant persisted shape, including the legacy
//!   two-level initiative form
//!
//! # Example
//!
//! ```rust,ignore
//! use tracker_model::{Record, RecordDocument, RecordId, RecordKind};
//!
//! let doc = RecordDocument::from_document(&id, raw)?;
//! let record = doc.into_record(id, RecordKind::Deal)?;
//! println!("{} is {}", record.title, record.status);
//! ```

#![warn(unreachable_pub)]

mod document;
mod error;
mod ids;
mod record;
mod status;

pub mod schedule;

pub use document::{Document, RecordDocument, SubItemDocument};
pub use error::ModelError;
pub use ids::{PhaseId, RecordId, SubItemId};
pub use record::{Children, Grouping, Phase, Record, RecordKind, SubItem};
pub use status::{LegacyStatus, Priority, Status, UnknownStatus};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
