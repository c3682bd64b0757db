//! Legacy initiative migration
//!
//! Old initiatives kept a flat `subItems` checklist on the record. The
//! current shape nests every sub-item under a phase. [`migrate`] wraps each
//! legacy sub-item in its own phase and drops the `subItems` key, whose
//! presence is what marks a document as needing migration.

use tracker_model::{Phase, PhaseId, RecordDocument, Status, SubItem, SubItemId};

/// Whether the document still carries the legacy `subItems` key
#[inline]
#[must_use]
pub fn needs_migration(doc: &RecordDocument) -> bool {
    doc.sub_items.is_some()
}

/// Convert a legacy initiative document to the phased shape
///
/// Documents that already have phases keep them untouched; a stray
/// `subItems` key next to them is dropped. Running this on its own output
/// returns the same document.
#[must_use]
pub fn migrate(mut doc: RecordDocument) -> RecordDocument {
    let legacy = doc.sub_items.take();
    if doc.phases.as_ref().is_some_and(|p| !p.is_empty()) {
        return doc;
    }
    doc.phases = Some(
        legacy
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, item)| wrap_in_phase(index, item))
            .collect(),
    );
    doc
}

fn wrap_in_phase(index: usize, mut item: SubItem) -> Phase {
    let ordinal = index + 1;
    if item.id.as_str().is_empty() {
        item.id = SubItemId::new(format!("legacy-{ordinal}"));
    }
    let (status, progress) = if item.is_completed() {
        (Status::Done, 100)
    } else {
        (Status::Pending, 0)
    };

    let mut phase = Phase::new(PhaseId::wrapping(&item.id), format!("Fase {ordinal}"))
        .with_status(status);
    phase.deadline = item.deadline;
    phase.progress = progress;
    phase.sub_items = vec![item];
    phase
}
