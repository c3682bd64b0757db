//! Testing utilities for the tracker workspace
//!
//! Shared builders, document fixtures, proptest strategies and a store that
//! fails on demand.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::{json, Value};
use tracker_core::{HierarchyStore, MemoryStore, StoreError, WriteMode};
use tracker_model::{
    Children, Document, Phase, PhaseId, Record, RecordId, RecordKind, Status, SubItem, SubItemId,
};

pub fn sub_item(id: &str, status: Status) -> SubItem {
    SubItem::new(SubItemId::from(id), id).with_status(status)
}

pub fn phase(id: &str, status: Status, sub_items: Vec<SubItem>) -> Phase {
    Phase::new(PhaseId::from(id), id)
        .with_status(status)
        .with_sub_items(sub_items)
}

pub fn initiative(id: &str, status: Status, phases: Vec<Phase>) -> Record {
    let mut record = Record::new(RecordId::from(id), RecordKind::Initiative, id);
    record.status = status;
    record.children = Children::Phases(phases);
    record
}

pub fn deal(id: &str, status: Status, sub_items: Vec<SubItem>) -> Record {
    let mut record = Record::new(RecordId::from(id), RecordKind::Deal, id);
    record.status = status;
    record.children = Children::SubItems(sub_items);
    record
}

/// Unwrap a `json!` object into a store document
pub fn document(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Two-level initiative as written before phases existed
pub fn legacy_initiative_document() -> Document {
    document(json!({
        "topicNumber": "3",
        "title": "Abrir filial em Recife",
        "status": "Em Dia",
        "priority": "Alta",
        "owner": "Ana",
        "deadline": "2024-12-01",
        "progress": 50,
        "keyMetrics": [{"name": "NPS", "value": "70"}],
        "subItems": [
            {"id": "s1", "title": "Contrato de locação", "completed": true, "deadline": "2024-06-01"},
            {"id": "s2", "title": "Contratações", "completed": false}
        ]
    }))
}

/// Phased initiative whose first phase has one sub-item left open
pub fn phased_initiative_document() -> Document {
    document(json!({
        "topicNumber": "1",
        "title": "Expansão Nordeste",
        "status": "Em execução",
        "priority": "Média",
        "phases": [
            {
                "id": "p1",
                "title": "Planejamento",
                "status": "Em execução",
                "subItems": [
                    {"id": "a", "title": "Estudo", "status": "Concluído", "completed": true},
                    {"id": "b", "title": "Orçamento", "status": "Pendente", "completed": false}
                ]
            },
            {"id": "p2", "title": "Execução", "status": "Pendente", "subItems": []}
        ]
    }))
}

/// Deal with a two-item checklist, one of them done
pub fn deal_document() -> Document {
    document(json!({
        "topicNumber": "1",
        "title": "Aquisição Alfa",
        "status": "Em execução",
        "startDate": "2024-01-15",
        "subItems": [
            {"id": "nda", "title": "NDA", "status": "Concluído", "completed": true},
            {"id": "dd", "title": "Due diligence", "status": "Em execução", "completed": false}
        ]
    }))
}

/// One write seen by [`FlakyStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCall {
    pub collection: String,
    pub id: RecordId,
    pub mode: WriteMode,
    pub succeeded: bool,
}

#[derive(Debug, Default)]
struct Faults {
    failing_writes: usize,
    reads_fail: bool,
}

/// [`MemoryStore`] wrapper that fails writes or reads when told to
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    faults: Mutex<Faults>,
    writes: Mutex<Vec<WriteCall>>,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Fail the next `count` writes or deletes
    pub fn fail_next_writes(&self, count: usize) {
        self.faults.lock().failing_writes = count;
    }

    /// Make every read fail until turned off
    pub fn fail_reads(&self, fail: bool) {
        self.faults.lock().reads_fail = fail;
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Every write attempt so far, in order
    pub fn write_calls(&self) -> Vec<WriteCall> {
        self.writes.lock().clone()
    }

    fn take_write_fault(&self) -> bool {
        let mut faults = self.faults.lock();
        if faults.failing_writes > 0 {
            faults.failing_writes -= 1;
            true
        } else {
            false
        }
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.faults.lock().reads_fail {
            Err(StoreError::Unavailable("injected read failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl HierarchyStore for FlakyStore {
    async fn get(&self, collection: &str, id: &RecordId) -> Result<Option<Document>, StoreError> {
        self.check_read()?;
        self.inner.get(collection, id).await
    }

    async fn get_all(
        &self,
        collection: &str,
        order_by: &str,
    ) -> Result<Vec<(RecordId, Document)>, StoreError> {
        self.check_read()?;
        self.inner.get_all(collection, order_by).await
    }

    async fn set(
        &self,
        collection: &str,
        id: &RecordId,
        document: Document,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        let fail = self.take_write_fault();
        self.writes.lock().push(WriteCall {
            collection: collection.to_string(),
            id: id.clone(),
            mode,
            succeeded: !fail,
        });
        if fail {
            return Err(StoreError::Unavailable("injected write failure".into()));
        }
        self.inner.set(collection, id, document, mode).await
    }

    async fn delete(&self, collection: &str, id: &RecordId) -> Result<(), StoreError> {
        if self.take_write_fault() {
            return Err(StoreError::Unavailable("injected delete failure".into()));
        }
        self.inner.delete(collection, id).await
    }
}

pub fn arb_status() -> impl Strategy<Value = Status> {
    prop_oneof![
        Just(Status::Pending),
        Just(Status::InProgress),
        Just(Status::Done),
        Just(Status::Suspended),
    ]
}

pub fn arb_sub_items(max: usize) -> impl Strategy<Value = Vec<SubItem>> {
    prop::collection::vec(arb_status(), 0..=max).prop_map(|statuses| {
        statuses
            .into_iter()
            .enumerate()
            .map(|(i, status)| sub_item(&format!("s{i}"), status))
            .collect()
    })
}

pub fn arb_phases(max_phases: usize, max_items: usize) -> impl Strategy<Value = Vec<Phase>> {
    prop::collection::vec((arb_status(), arb_sub_items(max_items)), 0..=max_phases).prop_map(
        |phases| {
            phases
                .into_iter()
                .enumerate()
                .map(|(i, (status, items))| {
                    let mut node = phase(&format!("p{i}"), status, items);
                    for item in &mut node.sub_items {
                        item.id = SubItemId::new(format!("p{i}-{}", item.id));
                    }
                    node
                })
                .collect()
        },
    )
}

/// Initiative with arbitrary, possibly inconsistent, statuses
pub fn arb_initiative() -> impl Strategy<Value = Record> {
    (arb_status(), arb_phases(4, 5)).prop_map(|(status, phases)| initiative("r", status, phases))
}

/// Deal with arbitrary, possibly inconsistent, statuses
pub fn arb_deal() -> impl Strategy<Value = Record> {
    (arb_status(), arb_sub_items(6)).prop_map(|(status, items)| deal("d", status, items))
}
