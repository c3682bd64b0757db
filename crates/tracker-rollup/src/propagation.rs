//! Status propagation
//!
//! A node with children is `Concluído` exactly when every child is. The
//! reconciler walks phases first and then the record, so the record step
//! sees phase statuses after their own rollup or rollback. Nodes without
//! children keep whatever status the caller set.

use crate::error::PropagationError;
use tracker_model::{Children, Phase, PhaseId, Record, Status, SubItem};

/// Phase status flip computed by [`reconcile`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseUpdate {
    /// Phase to change
    pub phase_id: PhaseId,
    /// Status before reconciliation
    pub from: Status,
    /// Status after reconciliation
    pub to: Status,
}

/// Ancestor status changes required after a child edit
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reconciliation {
    /// Phases whose status must flip, in phase order
    pub phase_updates: Vec<PhaseUpdate>,
    /// New record status, `None` when unchanged
    pub record_status: Option<Status>,
}

impl Reconciliation {
    /// Whether nothing needs to change
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phase_updates.is_empty() && self.record_status.is_none()
    }

    /// Write the changes into `record`
    pub fn apply_to(&self, record: &mut Record) {
        for update in &self.phase_updates {
            if let Some(phase) = record.phase_mut(&update.phase_id) {
                phase.status = update.to;
            }
        }
        if let Some(status) = self.record_status {
            record.status = status;
        }
    }
}

/// Status a parent must move to, given its children
///
/// `None` means the parent is already consistent or has no children.
fn rolled_up(current: Status, children: impl IntoIterator<Item = Status>) -> Option<Status> {
    let mut any = false;
    let mut all_done = true;
    for status in children {
        any = true;
        all_done &= status.is_done();
    }
    if !any {
        return None;
    }
    match (all_done, current.is_done()) {
        (true, false) => Some(Status::Done),
        (false, true) => Some(Status::InProgress),
        _ => None,
    }
}

/// Compute the ancestor status changes for `record`
#[must_use]
pub fn reconcile(record: &Record) -> Reconciliation {
    match &record.children {
        Children::Phases(phases) => {
            let mut phase_updates = Vec::new();
            let mut effective = Vec::with_capacity(phases.len());
            for phase in phases {
                let next = rolled_up(phase.status, phase.sub_items.iter().map(SubItem::status));
                if let Some(to) = next {
                    phase_updates.push(PhaseUpdate {
                        phase_id: phase.id.clone(),
                        from: phase.status,
                        to,
                    });
                }
                effective.push(next.unwrap_or(phase.status));
            }
            Reconciliation {
                phase_updates,
                record_status: rolled_up(record.status, effective),
            }
        }
        Children::SubItems(items) => Reconciliation {
            phase_updates: Vec::new(),
            record_status: rolled_up(record.status, items.iter().map(SubItem::status)),
        },
    }
}

/// Reconcile and apply in one step
pub fn reconcile_in_place(record: &mut Record) -> Reconciliation {
    let reconciliation = reconcile(record);
    reconciliation.apply_to(record);
    reconciliation
}

/// Check a direct status edit on a node with the given children
///
/// Childless nodes accept anything. Otherwise the requested status must
/// agree with the children: `Concluído` only when all are done, and nothing
/// else when all are done.
pub fn validate_parent_status(
    children: &[Status],
    requested: Status,
) -> Result<(), PropagationError> {
    if children.is_empty() {
        return Ok(());
    }
    let total = children.len();
    let pending = children.iter().filter(|s| !s.is_done()).count();
    match (requested.is_done(), pending) {
        (true, 0) => Ok(()),
        (true, pending) => Err(PropagationError::ChildrenIncomplete { pending, total }),
        (false, 0) => Err(PropagationError::ChildrenComplete { total }),
        (false, _) => Ok(()),
    }
}

/// [`validate_parent_status`] for a record's direct children
pub fn validate_record_status(record: &Record, requested: Status) -> Result<(), PropagationError> {
    validate_parent_status(&record.children.statuses(), requested)
}

/// [`validate_parent_status`] for a phase's sub-items
pub fn validate_phase_status(phase: &Phase, requested: Status) -> Result<(), PropagationError> {
    let statuses: Vec<Status> = phase.sub_items.iter().map(SubItem::status).collect();
    validate_parent_status(&statuses, requested)
}
