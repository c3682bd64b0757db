//! Tracker Core - tree mutations over a document store
//!
//! The layer the dashboard talks to:
//! - Loads a collection, migrating legacy initiatives on the way in
//! - Applies sub-item, phase and record edits with status propagation
//! - Persists each mutated record before the cache sees it
//! - Notifies subscribers of cache changes
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tracker_core::{CollectionConfig, MemoryStore, TreeMutationService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let service = TreeMutationService::new(store, CollectionConfig::initiatives());
//! service.load().await?;
//!
//! let outcome = service
//!     .set_sub_item_completed(&record_id, Some(&phase_id), &sub_item_id, true)
//!     .await?;
//! println!("record is now {:?}", outcome.report().map(|r| r.status));
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

// Core modules
pub mod cache;
pub mod error;
pub mod memory;
pub mod service;
pub mod store;
pub mod types;

// Re-exports for convenience
pub use cache::{GroupRefresh, RecordCache, RecordEvent};
pub use error::TrackerError;
pub use memory::{MemoryStore, Snapshot};
pub use service::TreeMutationService;
pub use store::{HierarchyStore, StoreError, WriteMode};
pub use types::{
    AuditReport, CollectionConfig, Inconsistency, LoadReport, MutationOutcome, MutationReport,
    PhaseDraft, RecordDraft, SubItemDraft, Target, TimelineEntry, TrackerConfig,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Tracker Core
    pub use crate::{
        CollectionConfig, HierarchyStore, MemoryStore, MutationOutcome, RecordEvent,
        TrackerConfig, TrackerError, TreeMutationService, WriteMode,
    };
    pub use tracker_model::{PhaseId, Record, RecordId, Status, SubItemId};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::prelude::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn deal_checklist_flow() {
        let store = Arc::new(MemoryStore::from_json_str(
            r#"{"mnaDeals": {"d1": {
                "topicNumber": "1",
                "title": "Target Co",
                "status": "Em execução",
                "subItems": [
                    {"id": "nda", "title": "NDA", "completed": true},
                    {"id": "dd", "title": "Due diligence", "completed": false}
                ]
            }}}"#,
        )
        .unwrap());
        let config = TrackerConfig::new();
        let service = TreeMutationService::with_config(store.clone(), config.deals.clone(), &config);
        service.load().await.unwrap();

        let deal = RecordId::from("d1");
        assert_eq!(service.record(&deal).unwrap().progress, 50);

        let outcome = service
            .set_sub_item_completed(&deal, None, &SubItemId::from("dd"), true)
            .await
            .unwrap();
        assert!(outcome.is_applied());
        assert_eq!(service.record(&deal).unwrap().status, Status::Done);

        service
            .set_sub_item_completed(&deal, None, &SubItemId::from("nda"), false)
            .await
            .unwrap();
        let record = service.record(&deal).unwrap();
        assert_eq!(record.status, Status::InProgress);
        assert_eq!(record.progress, 50);
        assert_eq!(store.snapshot()["mnaDeals"]["d1"]["status"], "Em execução");
    }
}
