//! Core types for the tracker
//!
//! Defines:
//! - Tracker and collection configuration
//! - Drafts used to create records and children
//! - Mutation targets and outcomes
//! - Load, audit and timeline reports

use crate::error::TrackerError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracker_model::{PhaseId, Priority, RecordId, RecordKind, Status, SubItemId};
use tracker_rollup::Reconciliation;

fn default_order_by() -> String {
    "topicNumber".to_string()
}

/// One document collection and how to read it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Collection name in the store
    pub name: String,
    /// Shape of the records it holds
    pub kind: RecordKind,
    /// Field used to order the snapshot
    #[serde(default = "default_order_by")]
    pub order_by: String,
}

impl CollectionConfig {
    /// Create collection config
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            name: name.into(),
            kind,
            order_by: default_order_by(),
        }
    }

    /// Default initiatives collection
    #[inline]
    #[must_use]
    pub fn initiatives() -> Self {
        Self::new("initiatives", RecordKind::Initiative)
    }

    /// Default M&A deals collection
    #[inline]
    #[must_use]
    pub fn deals() -> Self {
        Self::new("mnaDeals", RecordKind::Deal)
    }

    /// With ordering field
    #[inline]
    #[must_use]
    pub fn with_order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = field.into();
        self
    }
}

/// Tracker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Initiatives collection
    pub initiatives: CollectionConfig,
    /// Deals collection
    pub deals: CollectionConfig,
    /// Buffered events per subscriber before it lags
    pub event_capacity: usize,
    /// Write migrated legacy documents back on load
    pub migrate_on_load: bool,
}

impl TrackerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With event capacity
    #[inline]
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// With migration write-back toggled
    #[inline]
    #[must_use]
    pub fn with_migrate_on_load(mut self, persist: bool) -> Self {
        self.migrate_on_load = persist;
        self
    }

    /// Parse TOML; missing keys take their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, TrackerError> {
        let config: Self =
            toml::from_str(source).map_err(|e| TrackerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Both collections
    #[must_use]
    pub fn collections(&self) -> [&CollectionConfig; 2] {
        [&self.initiatives, &self.deals]
    }

    /// Check for unusable values
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.event_capacity == 0 {
            return Err(TrackerError::Config("event_capacity must be at least 1".into()));
        }
        let mut seen = HashSet::new();
        for collection in self.collections() {
            if collection.name.trim().is_empty() {
                return Err(TrackerError::Config("collection name is empty".into()));
            }
            if collection.order_by.trim().is_empty() {
                return Err(TrackerError::Config(format!(
                    "collection {} has an empty order_by",
                    collection.name
                )));
            }
            if !seen.insert(collection.name.as_str()) {
                return Err(TrackerError::Config(format!(
                    "collection {} configured twice",
                    collection.name
                )));
            }
        }
        Ok(())
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            initiatives: CollectionConfig::initiatives(),
            deals: CollectionConfig::deals(),
            event_capacity: 64,
            migrate_on_load: true,
        }
    }
}

/// Fields for a new record
#[derive(Debug, Clone, Default)]
pub struct RecordDraft {
    /// Title
    pub title: String,
    /// Initial status
    pub status: Status,
    /// Priority
    pub priority: Priority,
    /// Owner
    pub owner: String,
    /// Description
    pub description: String,
    /// Due date
    pub deadline: Option<NaiveDate>,
    /// Start date
    pub start_date: Option<NaiveDate>,
    /// Grouping parent
    pub parent_id: Option<RecordId>,
}

impl RecordDraft {
    /// Create draft with a title
    #[inline]
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Group under another record
    #[inline]
    #[must_use]
    pub fn under(mut self, parent_id: RecordId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Fields for a new phase
#[derive(Debug, Clone, Default)]
pub struct PhaseDraft {
    /// Title
    pub title: String,
    /// Initial status (kept only while the phase has no sub-items)
    pub status: Status,
    /// Due date
    pub deadline: Option<NaiveDate>,
}

impl PhaseDraft {
    /// Create draft with a title
    #[inline]
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Fields for a new sub-item
#[derive(Debug, Clone, Default)]
pub struct SubItemDraft {
    /// Title
    pub title: String,
    /// Initial status
    pub status: Status,
    /// Due date
    pub deadline: Option<NaiveDate>,
    /// Responsible person
    pub responsible: String,
    /// Priority
    pub priority: Priority,
    /// Description
    pub description: String,
}

impl SubItemDraft {
    /// Create draft with a title
    #[inline]
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// With initial status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }
}

/// Node addressed by a mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A whole record
    Record(RecordId),
    /// A phase of an initiative
    Phase {
        /// Owning record
        record_id: RecordId,
        /// Phase
        phase_id: PhaseId,
    },
    /// A sub-item, under a phase for initiatives
    SubItem {
        /// Owning record
        record_id: RecordId,
        /// Owning phase (initiatives)
        phase_id: Option<PhaseId>,
        /// Sub-item
        sub_item_id: SubItemId,
    },
}

impl Target {
    /// Record the target lives in
    #[must_use]
    pub fn record_id(&self) -> &RecordId {
        match self {
            Target::Record(id)
            | Target::Phase { record_id: id, .. }
            | Target::SubItem { record_id: id, .. } => id,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Record(id) => write!(f, "record {id}"),
            Target::Phase { record_id, phase_id } => write!(f, "phase {record_id}/{phase_id}"),
            Target::SubItem {
                record_id,
                phase_id: Some(phase_id),
                sub_item_id,
            } => write!(f, "sub-item {record_id}/{phase_id}/{sub_item_id}"),
            Target::SubItem {
                record_id,
                phase_id: None,
                sub_item_id,
            } => write!(f, "sub-item {record_id}/{sub_item_id}"),
        }
    }
}

/// What a persisted mutation changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReport {
    /// Record that was rewritten
    pub record_id: RecordId,
    /// Ancestor status flips
    pub reconciliation: Reconciliation,
    /// Record status after the mutation
    pub status: Status,
    /// Record progress after the mutation
    pub progress: u8,
    /// Grouping parent whose progress was refreshed
    pub parent_progress: Option<(RecordId, u8)>,
    /// Previous grouping parent, when the record moved away from it
    pub former_parent_progress: Option<(RecordId, u8)>,
}

/// Result of a mutation entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Persisted and published
    Applied(MutationReport),
    /// Target id unknown; nothing happened
    NotFound(Target),
}

impl MutationOutcome {
    /// Report, when applied
    #[must_use]
    pub fn report(&self) -> Option<&MutationReport> {
        match self {
            MutationOutcome::Applied(report) => Some(report),
            MutationOutcome::NotFound(_) => None,
        }
    }

    /// Whether the mutation was applied
    #[inline]
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied(_))
    }
}

/// Summary of a collection load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records now in the cache
    pub loaded: usize,
    /// Legacy records converted to the phased shape
    pub migrated: Vec<RecordId>,
    /// Migrated in memory but the write-back failed
    pub migration_write_failures: Vec<RecordId>,
    /// Documents that could not be decoded
    pub skipped: Vec<RecordId>,
}

/// A persisted record whose derived fields disagree with its children
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inconsistency {
    /// Offending record
    pub record_id: RecordId,
    /// Status as stored
    pub stored_status: Status,
    /// Status after reconciliation
    pub expected_status: Status,
    /// Progress as stored
    pub stored_progress: u8,
    /// Progress recomputed from the tree
    pub expected_progress: u8,
    /// Phases whose stored status or progress is off
    pub phases: Vec<PhaseId>,
    /// Still in the legacy two-level shape
    pub legacy_shape: bool,
}

/// Result of [`audit`](crate::TreeMutationService::audit)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    /// Records whose stored state is stale
    pub inconsistencies: Vec<Inconsistency>,
    /// Documents that could not be decoded
    pub skipped: Vec<RecordId>,
}

impl AuditReport {
    /// Whether every stored document decoded and is consistent
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.inconsistencies.is_empty() && self.skipped.is_empty()
    }
}

/// One record on the schedule view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    /// Record
    pub record_id: RecordId,
    /// Outline number
    pub topic_number: String,
    /// Title
    pub title: String,
    /// Current status
    pub status: Status,
    /// Current progress
    pub progress: u8,
    /// Bar start and end; `None` when no deadline is known anywhere
    pub span: Option<(NaiveDate, NaiveDate)>,
    /// Record deadline has passed without completion
    pub overdue: bool,
    /// Phases and sub-items past their deadline
    pub overdue_items: usize,
}
