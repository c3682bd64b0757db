//! Hierarchy nodes
//!
//! A [`Record`] is the top-level tracked entity. Initiatives own
//! [`Phase`]s which own [`SubItem`]s; deals own [`SubItem`]s directly.
//! The shape is fixed: there is no deeper nesting.

use crate::document::{serde_date, SubItemDocument};
use crate::ids::{PhaseId, RecordId, SubItemId};
use crate::status::{Priority, Status};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Leaf unit of work
///
/// `completed` mirrors `status == Concluído`. Both fields are private so the
/// mirror can only change through [`SubItem::set_status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "SubItemDocument")]
pub struct SubItem {
    /// Sub-item id
    pub id: SubItemId,
    /// Title
    pub title: String,
    status: Status,
    completed: bool,
    /// Due date
    #[serde(with = "serde_date")]
    pub deadline: Option<NaiveDate>,
    /// Responsible person
    pub responsible: String,
    /// Priority
    pub priority: Priority,
    /// Free-form description
    pub description: String,
}

impl SubItem {
    /// Create a pending sub-item
    #[must_use]
    pub fn new(id: SubItemId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            status: Status::Pending,
            completed: false,
            deadline: None,
            responsible: String::new(),
            priority: Priority::Low,
            description: String::new(),
        }
    }

    /// With initial status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.set_status(status);
        self
    }

    /// With deadline
    #[inline]
    #[must_use]
    pub fn with_deadline(mut self, deadline: NaiveDate) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Current status
    #[inline]
    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Whether the sub-item is `Concluído`
    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Change status, keeping `completed` in sync
    #[inline]
    pub fn set_status(&mut self, status: Status) {
        self.status = status;
        self.completed = status.is_done();
    }
}

/// Mid-level grouping node of an initiative
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    /// Phase id
    pub id: PhaseId,
    /// Title
    #[serde(default)]
    pub title: String,
    /// Status; derived from sub-items when any exist
    #[serde(default)]
    pub status: Status,
    /// Due date
    #[serde(default, with = "serde_date")]
    pub deadline: Option<NaiveDate>,
    /// Derived completion percentage
    #[serde(default)]
    pub progress: u8,
    /// Leaf items
    #[serde(default)]
    pub sub_items: Vec<SubItem>,
}

impl Phase {
    /// Create an empty pending phase
    #[must_use]
    pub fn new(id: PhaseId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            status: Status::Pending,
            deadline: None,
            progress: 0,
            sub_items: Vec::new(),
        }
    }

    /// With sub-items
    #[inline]
    #[must_use]
    pub fn with_sub_items(mut self, sub_items: Vec<SubItem>) -> Self {
        self.sub_items = sub_items;
        self
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Find a sub-item by id
    #[must_use]
    pub fn sub_item_mut(&mut self, id: &SubItemId) -> Option<&mut SubItem> {
        self.sub_items.iter_mut().find(|s| &s.id == id)
    }
}

/// Which collection a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Strategic initiative: Record → Phase → SubItem
    Initiative,
    /// M&A deal: Record → SubItem
    Deal,
}

impl RecordKind {
    /// Empty children container for this kind
    #[must_use]
    pub fn empty_children(self) -> Children {
        match self {
            RecordKind::Initiative => Children::Phases(Vec::new()),
            RecordKind::Deal => Children::SubItems(Vec::new()),
        }
    }
}

/// Children of a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Children {
    /// Initiative phases
    Phases(Vec<Phase>),
    /// Deal sub-items
    SubItems(Vec<SubItem>),
}

impl Children {
    /// Number of direct children
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Children::Phases(phases) => phases.len(),
            Children::SubItems(items) => items.len(),
        }
    }

    /// Whether there are no direct children
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Statuses of the direct children, in order
    #[must_use]
    pub fn statuses(&self) -> Vec<Status> {
        match self {
            Children::Phases(phases) => phases.iter().map(|p| p.status).collect(),
            Children::SubItems(items) => items.iter().map(SubItem::status).collect(),
        }
    }
}

/// Parent/child record grouping
///
/// Grouping only feeds progress averaging between records. It never
/// influences status rollup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Grouping {
    /// Top-level record
    #[default]
    Standalone,
    /// Record listed under another record
    Grouped {
        /// Grouping parent
        parent_id: RecordId,
    },
}

impl Grouping {
    /// Parent id when grouped
    #[inline]
    #[must_use]
    pub fn parent_id(&self) -> Option<&RecordId> {
        match self {
            Grouping::Standalone => None,
            Grouping::Grouped { parent_id } => Some(parent_id),
        }
    }
}

/// Top-level tracked entity (initiative or deal)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Document id
    pub id: RecordId,
    /// Outline number ("1", "2", ...)
    pub topic_number: String,
    /// Title
    pub title: String,
    /// Status; derived from children when any exist
    pub status: Status,
    /// Priority
    pub priority: Priority,
    /// Owner or responsible person
    pub owner: String,
    /// Description
    pub description: String,
    /// Due date
    pub deadline: Option<NaiveDate>,
    /// Start date (deals)
    pub start_date: Option<NaiveDate>,
    /// Derived completion percentage
    pub progress: u8,
    /// Archived deals are hidden from boards
    pub archived: bool,
    /// Last persisted mutation
    pub last_update: Option<DateTime<Utc>>,
    /// Grouping under another record
    pub grouping: Grouping,
    /// Phases or sub-items
    pub children: Children,
}

impl Record {
    /// Create an empty record of the given kind
    #[must_use]
    pub fn new(id: RecordId, kind: RecordKind, title: impl Into<String>) -> Self {
        Self {
            id,
            topic_number: String::new(),
            title: title.into(),
            status: Status::Pending,
            priority: Priority::Low,
            owner: String::new(),
            description: String::new(),
            deadline: None,
            start_date: None,
            progress: 0,
            archived: false,
            last_update: None,
            grouping: Grouping::Standalone,
            children: kind.empty_children(),
        }
    }

    /// Kind, as implied by the children container
    #[inline]
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self.children {
            Children::Phases(_) => RecordKind::Initiative,
            Children::SubItems(_) => RecordKind::Deal,
        }
    }

    /// Phases (empty for deals)
    #[must_use]
    pub fn phases(&self) -> &[Phase] {
        match &self.children {
            Children::Phases(phases) => phases,
            Children::SubItems(_) => &[],
        }
    }

    /// Find a phase by id
    #[must_use]
    pub fn phase_mut(&mut self, id: &PhaseId) -> Option<&mut Phase> {
        match &mut self.children {
            Children::Phases(phases) => phases.iter_mut().find(|p| &p.id == id),
            Children::SubItems(_) => None,
        }
    }

    /// Resolve a sub-item
    ///
    /// Initiatives need `phase`; deals ignore it and look at their own
    /// sub-items.
    #[must_use]
    pub fn sub_item_mut(
        &mut self,
        phase: Option<&PhaseId>,
        id: &SubItemId,
    ) -> Option<&mut SubItem> {
        match (&mut self.children, phase) {
            (Children::Phases(phases), Some(phase_id)) => phases
                .iter_mut()
                .find(|p| &p.id == phase_id)
                .and_then(|p| p.sub_item_mut(id)),
            (Children::Phases(_), None) => None,
            (Children::SubItems(items), _) => items.iter_mut().find(|s| &s.id == id),
        }
    }

    /// All sub-items across every level
    pub fn all_sub_items(&self) -> impl Iterator<Item = &SubItem> {
        let (phases, flat): (&[Phase], &[SubItem]) = match &self.children {
            Children::Phases(phases) => (phases, &[]),
            Children::SubItems(items) => (&[], items),
        };
        phases
            .iter()
            .flat_map(|p| p.sub_items.iter())
            .chain(flat.iter())
    }

    /// Parent id when grouped
    #[inline]
    #[must_use]
    pub fn parent_id(&self) -> Option<&RecordId> {
        self.grouping.parent_id()
    }
}
