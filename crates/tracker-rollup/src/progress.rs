//! Completion percentages
//!
//! All functions are pure, never panic, and return 0 for empty input.
//! Rounding is half-up, done in integer arithmetic.

use tracker_model::{Children, Phase, Record, Status, SubItem};

/// `round(100 * part / total)`, 0 when `total` is 0
fn percent(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let value = (200 * part.min(total) + total) / (2 * total);
    u8::try_from(value).unwrap_or(100)
}

fn rounded_mean(values: impl IntoIterator<Item = u8>) -> u8 {
    let (sum, count) = values
        .into_iter()
        .fold((0u64, 0u64), |(sum, count), v| (sum + u64::from(v.min(100)), count + 1));
    if count == 0 {
        return 0;
    }
    u8::try_from((2 * sum + count) / (2 * count)).unwrap_or(100)
}

/// Progress of a childless node: 100 when `Concluído`, else 0
#[inline]
#[must_use]
pub fn status_progress(status: Status) -> u8 {
    if status.is_done() {
        100
    } else {
        0
    }
}

/// Share of completed sub-items
#[must_use]
pub fn progress_of_leaf_group(sub_items: &[SubItem]) -> u8 {
    let done = sub_items.iter().filter(|s| s.is_completed()).count();
    percent(done, sub_items.len())
}

/// Progress of one phase
#[must_use]
pub fn phase_progress(phase: &Phase) -> u8 {
    if phase.sub_items.is_empty() {
        status_progress(phase.status)
    } else {
        progress_of_leaf_group(&phase.sub_items)
    }
}

/// Mean of per-phase progress
#[must_use]
pub fn progress_of_phase_group(phases: &[Phase]) -> u8 {
    rounded_mean(phases.iter().map(phase_progress))
}

/// Mean of the progress of records grouped under one parent
///
/// Only for parent/child record grouping. Never used inside a record's own
/// tree.
#[must_use]
pub fn progress_of_parent_group(grouped_progress: impl IntoIterator<Item = u8>) -> u8 {
    rounded_mean(grouped_progress)
}

/// Progress of a record from its own tree
#[must_use]
pub fn progress_of_record(record: &Record) -> u8 {
    match &record.children {
        Children::Phases(phases) if !phases.is_empty() => progress_of_phase_group(phases),
        Children::SubItems(items) if !items.is_empty() => progress_of_leaf_group(items),
        _ => status_progress(record.status),
    }
}

/// Recompute the stored progress of every phase and of the record
pub fn refresh_progress(record: &mut Record) {
    if let Children::Phases(phases) = &mut record.children {
        for phase in phases.iter_mut() {
            phase.progress = phase_progress(phase);
        }
    }
    record.progress = progress_of_record(record);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_model::{PhaseId, RecordId, RecordKind, SubItemId};

    fn items(done: usize, total: usize) -> Vec<SubItem> {
        (0..total)
            .map(|i| {
                let status = if i < done { Status::Done } else { Status::Pending };
                SubItem::new(SubItemId::new(format!("s{i}")), "item").with_status(status)
            })
            .collect()
    }

    #[test]
    fn leaf_group_rounds_half_up() {
        assert_eq!(progress_of_leaf_group(&items(0, 0)), 0);
        assert_eq!(progress_of_leaf_group(&items(1, 2)), 50);
        assert_eq!(progress_of_leaf_group(&items(1, 3)), 33);
        assert_eq!(progress_of_leaf_group(&items(2, 3)), 67);
        assert_eq!(progress_of_leaf_group(&items(1, 8)), 13);
        assert_eq!(progress_of_leaf_group(&items(3, 3)), 100);
    }

    #[test]
    fn empty_phase_counts_by_status() {
        let phases = vec![
            Phase::new(PhaseId::from("p1"), "Fase 1").with_status(Status::Done),
            Phase::new(PhaseId::from("p2"), "Fase 2").with_sub_items(items(1, 2)),
        ];
        assert_eq!(progress_of_phase_group(&phases), 75);
        assert_eq!(progress_of_phase_group(&[]), 0);
    }

    #[test]
    fn parent_group_averages_child_progress() {
        assert_eq!(progress_of_parent_group([100, 50, 0]), 50);
        assert_eq!(progress_of_parent_group([33, 34]), 34);
        assert_eq!(progress_of_parent_group(Vec::new()), 0);
    }

    #[test]
    fn leafless_record_uses_status() {
        let mut record = Record::new(RecordId::from("r1"), RecordKind::Deal, "Target");
        assert_eq!(progress_of_record(&record), 0);
        record.status = Status::Done;
        assert_eq!(progress_of_record(&record), 100);
        record.status = Status::InProgress;
        assert_eq!(progress_of_record(&record), 0);
    }

    #[test]
    fn refresh_updates_phase_and_record() {
        let mut record = Record::new(RecordId::from("r1"), RecordKind::Initiative, "Expansion");
        record.children = Children::Phases(vec![
            Phase::new(PhaseId::from("p1"), "Fase 1").with_sub_items(items(1, 4)),
            Phase::new(PhaseId::from("p2"), "Fase 2").with_sub_items(items(2, 2)),
        ]);
        refresh_progress(&mut record);
        assert_eq!(record.phases()[0].progress, 25);
        assert_eq!(record.phases()[1].progress, 100);
        assert_eq!(record.progress, 63);
    }
}
