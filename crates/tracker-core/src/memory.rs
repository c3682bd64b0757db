//! In-process hierarchy store
//!
//! [`MemoryStore`] keeps every collection in memory and can be seeded from
//! or exported to a JSON snapshot of the form `{ collection: { id: doc } }`.
//! It is what the CLI runs against and what integration tests use.

use crate::store::{HierarchyStore, StoreError, WriteMode};
use async_trait::async_trait;
use dashmap::DashMap;
use indexmap::IndexMap;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use tracker_model::{Document, RecordId};

/// Snapshot of all collections, in a stable order
pub type Snapshot = IndexMap<String, IndexMap<String, Document>>;

/// Dashmap-backed document store
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Collection name -> documents in insertion order
    collections: DashMap<String, IndexMap<RecordId, Document>>,
    /// Successful `set` calls
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a snapshot
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        for (collection, docs) in snapshot {
            let docs = docs
                .into_iter()
                .map(|(id, doc)| (RecordId::new(id), doc))
                .collect();
            store.collections.insert(collection, docs);
        }
        store
    }

    /// Parse a JSON snapshot
    pub fn from_json_str(source: &str) -> Result<Self, StoreError> {
        let snapshot: Snapshot =
            serde_json::from_str(source).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Export every collection, sorted by collection name
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot: Snapshot = self
            .collections
            .iter()
            .map(|entry| {
                let docs = entry
                    .value()
                    .iter()
                    .map(|(id, doc)| (id.to_string(), doc.clone()))
                    .collect();
                (entry.key().clone(), docs)
            })
            .collect();
        snapshot.sort_keys();
        snapshot
    }

    /// Export as pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Number of documents in a collection
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |docs| docs.len())
    }

    /// Whether a collection holds no documents
    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Successful writes since creation
    #[inline]
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(AtomicOrdering::Relaxed)
    }

    /// Read a document without going through the async interface
    #[must_use]
    pub fn document(&self, collection: &str, id: &RecordId) -> Option<Document> {
        self.collections
            .get(collection)
            .and_then(|docs| docs.get(id).cloned())
    }
}

/// Rank used for ordering: missing and null first, then numbers, then
/// strings.
fn order_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(_) => 4,
    }
}

fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => order_rank(a).cmp(&order_rank(b)),
    }
}

#[async_trait]
impl HierarchyStore for MemoryStore {
    async fn get(&self, collection: &str, id: &RecordId) -> Result<Option<Document>, StoreError> {
        Ok(self.document(collection, id))
    }

    async fn get_all(
        &self,
        collection: &str,
        order_by: &str,
    ) -> Result<Vec<(RecordId, Document)>, StoreError> {
        let mut docs: Vec<(RecordId, Document)> = self
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default();
        docs.sort_by(|(_, a), (_, b)| compare_field(a.get(order_by), b.get(order_by)));
        Ok(docs)
    }

    async fn set(
        &self,
        collection: &str,
        id: &RecordId,
        document: Document,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        match (mode, docs.get_mut(id)) {
            (WriteMode::Merge, Some(existing)) => existing.extend(document),
            _ => {
                docs.insert(id.clone(), document);
            }
        }
        self.writes.fetch_add(1, AtomicOrdering::Relaxed);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &RecordId) -> Result<(), StoreError> {
        if let Some(mut docs) = self.collections.get_mut(collection) {
            docs.shift_remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn merge_is_shallow() {
        let store = MemoryStore::new();
        let id = RecordId::from("r1");
        store
            .set(
                "initiatives",
                &id,
                doc(json!({"title": "A", "subItems": [1, 2], "keyMetrics": ["x"]})),
                WriteMode::Replace,
            )
            .await
            .unwrap();
        store
            .set(
                "initiatives",
                &id,
                doc(json!({"title": "B", "subItems": [3]})),
                WriteMode::Merge,
            )
            .await
            .unwrap();

        let stored = store.get("initiatives", &id).await.unwrap().unwrap();
        assert_eq!(
            Value::Object(stored),
            json!({"title": "B", "subItems": [3], "keyMetrics": ["x"]})
        );
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn replace_drops_missing_keys() {
        let store = MemoryStore::new();
        let id = RecordId::from("r1");
        store
            .set("c", &id, doc(json!({"subItems": []})), WriteMode::Replace)
            .await
            .unwrap();
        store
            .set("c", &id, doc(json!({"phases": []})), WriteMode::Replace)
            .await
            .unwrap();
        let stored = store.document("c", &id).unwrap();
        assert!(!stored.contains_key("subItems"));
    }

    #[tokio::test]
    async fn get_all_orders_by_field() {
        let store = MemoryStore::from_json_str(
            r#"{"mnaDeals": {
                "b": {"topicNumber": "2"},
                "c": {},
                "a": {"topicNumber": "1"}
            }}"#,
        )
        .unwrap();
        let ids: Vec<String> = store
            .get_all("mnaDeals", "topicNumber")
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id.to_string())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert!(store.get_all("missing", "topicNumber").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_and_snapshot() {
        let store = MemoryStore::from_json_str(r#"{"z": {"1": {}}, "a": {"2": {}, "3": {}}}"#)
            .unwrap();
        store.delete("a", &RecordId::from("2")).await.unwrap();
        store.delete("a", &RecordId::from("404")).await.unwrap();

        let snapshot = store.snapshot();
        let names: Vec<&String> = snapshot.keys().collect();
        assert_eq!(names, vec!["a", "z"]);
        assert_eq!(store.len("a"), 1);
        assert!(store.is_empty("missing"));
    }

    #[test]
    fn rejects_malformed_snapshot() {
        let err = MemoryStore::from_json_str("[1, 2]").unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
