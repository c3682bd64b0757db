//! Hierarchy store interface
//!
//! The document database behind the tracker. Each record is one JSON
//! document keyed by id inside a named collection; phases and sub-items are
//! embedded in it.

use async_trait::async_trait;
use tracker_model::{Document, RecordId};

/// How [`HierarchyStore::set`] treats an existing document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteMode {
    /// Shallow field merge; nested arrays are replaced wholesale
    Merge,
    /// Overwrite the whole document
    Replace,
}

/// Store failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Store could not be reached; the same call may succeed later
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Store refused the operation
    #[error("store rejected the operation: {0}")]
    Rejected(String),

    /// Document could not be (de)serialized by the store
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Check if the failure is transient
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Document store holding one collection per record kind
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HierarchyStore: Send + Sync {
    /// Fetch one document
    async fn get(&self, collection: &str, id: &RecordId) -> Result<Option<Document>, StoreError>;

    /// Fetch the whole collection ordered by `order_by`
    async fn get_all(
        &self,
        collection: &str,
        order_by: &str,
    ) -> Result<Vec<(RecordId, Document)>, StoreError>;

    /// Write a document
    async fn set(
        &self,
        collection: &str,
        id: &RecordId,
        document: Document,
        mode: WriteMode,
    ) -> Result<(), StoreError>;

    /// Delete a document; deleting a missing id is not an error
    async fn delete(&self, collection: &str, id: &RecordId) -> Result<(), StoreError>;
}
