use proptest::prelude::*;
use tracker_model::{Children, Record, RecordDocument, Status, SubItem};
use tracker_rollup::{migrate, needs_migration, progress, reconcile, settle, validate_record_status};
use tracker_test_utils::{arb_deal, arb_initiative, arb_status, arb_sub_items};

fn assert_consistent(record: &Record) {
    for phase in record.phases() {
        if !phase.sub_items.is_empty() {
            let all = phase.sub_items.iter().all(SubItem::is_completed);
            assert_eq!(phase.status.is_done(), all, "phase {}", phase.id);
        }
        for item in &phase.sub_items {
            assert_eq!(item.is_completed(), item.status().is_done());
        }
    }
    let children = record.children.statuses();
    if !children.is_empty() {
        assert_eq!(record.status.is_done(), children.iter().all(|s| s.is_done()));
    }
}

proptest! {
    #[test]
    fn prop_settle_is_idempotent(mut record in prop_oneof![arb_initiative(), arb_deal()]) {
        settle(&mut record);
        let settled = record.clone();
        prop_assert!(reconcile(&record).is_empty());
        settle(&mut record);
        prop_assert_eq!(record, settled);
    }

    #[test]
    fn prop_settled_records_hold_the_completion_rule(mut record in prop_oneof![arb_initiative(), arb_deal()]) {
        settle(&mut record);
        assert_consistent(&record);
        prop_assert!(validate_record_status(&record, record.status).is_ok());
    }

    #[test]
    fn prop_reopening_any_item_rolls_back(mut record in arb_initiative(), reopen in arb_status(), pick in any::<prop::sample::Index>()) {
        prop_assume!(!reopen.is_done());
        if let Children::Phases(phases) = &mut record.children {
            for phase in phases.iter_mut() {
                phase.status = Status::Done;
                for item in &mut phase.sub_items {
                    item.set_status(Status::Done);
                }
            }
        }
        settle(&mut record);
        prop_assume!(record.status == Status::Done);

        let total = record.all_sub_items().count();
        prop_assume!(total > 0);
        let target = pick.index(total);
        let mut seen = 0;
        if let Children::Phases(phases) = &mut record.children {
            for phase in phases.iter_mut() {
                for item in &mut phase.sub_items {
                    if seen == target {
                        item.set_status(reopen);
                    }
                    seen += 1;
                }
            }
        }
        settle(&mut record);

        let reopened = record
            .phases()
            .iter()
            .find(|p| p.sub_items.iter().any(|s| !s.is_completed()))
            .unwrap();
        prop_assert_eq!(reopened.status, Status::InProgress);
        prop_assert_eq!(record.status, Status::InProgress);
        prop_assert!(record.progress < 100);
    }

    #[test]
    fn prop_progress_is_bounded(mut record in prop_oneof![arb_initiative(), arb_deal()]) {
        settle(&mut record);
        prop_assert!(record.progress <= 100);
        for phase in record.phases() {
            prop_assert!(phase.progress <= 100);
        }
        if record.children.is_empty() {
            prop_assert_eq!(record.progress == 100, record.status.is_done());
        }
    }

    #[test]
    fn prop_leaf_group_matches_ratio(items in arb_sub_items(12)) {
        let done = items.iter().filter(|s| s.is_completed()).count();
        let value = progress::progress_of_leaf_group(&items);
        if items.is_empty() {
            prop_assert_eq!(value, 0);
        } else {
            let exact = 100.0 * done as f64 / items.len() as f64;
            prop_assert!((f64::from(value) - exact).abs() <= 0.5);
        }
    }

    #[test]
    fn prop_migration_is_idempotent(items in arb_sub_items(6)) {
        let legacy = RecordDocument {
            sub_items: Some(items.clone()),
            ..RecordDocument::default()
        };
        let once = migrate(legacy);
        prop_assert!(!needs_migration(&once));
        prop_assert_eq!(once.phases.as_ref().map(Vec::len), Some(items.len()));
        prop_assert_eq!(migrate(once.clone()), once);
    }
}
