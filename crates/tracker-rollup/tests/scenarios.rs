use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tracker_model::{PhaseId, RecordDocument, RecordId, Status, SubItemId};
use tracker_rollup::{migrate, progress, settle};
use tracker_test_utils::{document, initiative, phase, sub_item};

fn set(record: &mut tracker_model::Record, id: &str, status: Status) {
    record
        .sub_item_mut(Some(&PhaseId::from("p1")), &SubItemId::from(id))
        .unwrap()
        .set_status(status);
    settle(record);
}

#[test]
fn completion_rolls_up_and_back() {
    let mut record = initiative(
        "r1",
        Status::Pending,
        vec![phase(
            "p1",
            Status::Pending,
            vec![sub_item("a", Status::Pending), sub_item("b", Status::Pending)],
        )],
    );

    // One of two done
    set(&mut record, "a", Status::Done);
    assert_ne!(record.phases()[0].status, Status::Done);
    assert_eq!(record.progress, 50);

    // Both done
    set(&mut record, "b", Status::Done);
    assert_eq!(record.phases()[0].status, Status::Done);
    assert_eq!(record.status, Status::Done);
    assert_eq!(record.progress, 100);

    // Reopen one
    set(&mut record, "b", Status::InProgress);
    assert_eq!(record.phases()[0].status, Status::InProgress);
    assert_eq!(record.status, Status::InProgress);
    assert_eq!(record.progress, 50);
}

#[test]
fn legacy_record_migrates_to_single_item_phases() {
    let legacy = RecordDocument::from_document(
        &RecordId::from("r1"),
        document(json!({"subItems": [{"id": "s1", "completed": true}]})),
    )
    .unwrap();

    let migrated = Value::Object(migrate(legacy).to_document().unwrap());
    assert!(migrated.get("subItems").is_none());

    let phase = &migrated["phases"][0];
    assert_eq!(phase["title"], json!("Fase 1"));
    assert_eq!(phase["status"], json!("Concluído"));
    let item = &phase["subItems"][0];
    assert_eq!(item["id"], json!("s1"));
    assert_eq!(item["status"], json!("Concluído"));
    assert_eq!(item["completed"], json!(true));
    assert_eq!(item["responsible"], json!(""));
    assert_eq!(item["priority"], json!("Baixa"));
}

#[test]
fn grouped_progress_is_separate_from_tree_progress() {
    let mut done = initiative("c1", Status::Pending, vec![phase("p1", Status::Done, vec![])]);
    let open = initiative("c2", Status::Pending, vec![phase("p1", Status::Pending, vec![])]);
    settle(&mut done);

    assert_eq!(done.status, Status::Done);
    assert_eq!(
        progress::progress_of_parent_group([done.progress, progress::progress_of_record(&open)]),
        50
    );
}
