//! Tree mutation service
//!
//! Entry point for every change to a collection. Each mutation follows one
//! fixed order:
//!
//! 1. clone the cached record into a draft
//! 2. edit the draft
//! 3. reconcile ancestor statuses, then recompute progress
//! 4. persist the whole record and wait for the store
//! 5. commit the draft to the cache and notify subscribers
//!
//! If step 4 fails the cache and subscribers never see the draft.
//!
//! A record that other records are grouped under stores their averaged
//! progress, so the written document, the cache and the returned report
//! carry the same value.

use crate::cache::{RecordCache, RecordEvent};
use crate::error::TrackerError;
use crate::store::{HierarchyStore, WriteMode};
use crate::types::{
    AuditReport, CollectionConfig, Inconsistency, LoadReport, MutationOutcome, MutationReport,
    PhaseDraft, RecordDraft, SubItemDraft, Target, TimelineEntry, TrackerConfig,
};
use chrono::{NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracker_model::{
    schedule, Children, Document, Grouping, Phase, PhaseId, Record, RecordDocument, RecordId,
    RecordKind, Status, SubItem, SubItemId,
};
use tracker_rollup::{
    migrate, needs_migration, progress, settle, validate_phase_status, validate_record_status,
    Reconciliation,
};

/// Result of editing a draft
enum Edit {
    /// Draft changed; go on and persist
    Changed,
    /// Addressed node does not exist
    Missing,
}

/// Mutation service for one collection
pub struct TreeMutationService<S: ?Sized> {
    store: Arc<S>,
    collection: CollectionConfig,
    migrate_on_load: bool,
    cache: RecordCache,
}

impl<S: HierarchyStore + ?Sized> TreeMutationService<S> {
    /// Create service with default settings
    #[must_use]
    pub fn new(store: Arc<S>, collection: CollectionConfig) -> Self {
        Self::with_config(store, collection, &TrackerConfig::default())
    }

    /// Create service using the shared tracker settings
    #[must_use]
    pub fn with_config(store: Arc<S>, collection: CollectionConfig, config: &TrackerConfig) -> Self {
        Self {
            store,
            collection,
            migrate_on_load: config.migrate_on_load,
            cache: RecordCache::new(config.event_capacity),
        }
    }

    /// Collection this service owns
    #[inline]
    #[must_use]
    pub fn collection(&self) -> &CollectionConfig {
        &self.collection
    }

    /// Snapshot of every cached record
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.cache.snapshot()
    }

    /// Snapshot of one record
    #[must_use]
    pub fn record(&self, id: &RecordId) -> Option<Record> {
        self.cache.get(id)
    }

    /// Subscribe to cache changes
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RecordEvent> {
        self.cache.subscribe()
    }

    /// Read the collection into the cache
    ///
    /// Legacy initiatives are migrated and settled on the way in, and the
    /// settled document replaces the legacy one in the store. Other records
    /// only get their progress recomputed. Undecodable documents are skipped
    /// with a warning instead of failing the load.
    pub async fn load(&self) -> Result<LoadReport, TrackerError> {
        let name = &self.collection.name;
        let docs = self
            .store
            .get_all(name, &self.collection.order_by)
            .await
            .map_err(|source| TrackerError::Load {
                collection: name.clone(),
                source,
            })?;

        let mut report = LoadReport::default();
        let mut records = Vec::with_capacity(docs.len());
        for (id, raw) in docs {
            let mut doc = match RecordDocument::from_document(&id, raw) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(record_id = %id, collection = %name, "Skipping document: {}", e);
                    report.skipped.push(id);
                    continue;
                }
            };

            let legacy = self.collection.kind == RecordKind::Initiative && needs_migration(&doc);
            if legacy {
                doc = migrate(doc);
            }
            let extra = legacy.then(|| std::mem::take(&mut doc.extra));

            let mut record = match doc.into_record(id.clone(), self.collection.kind) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(record_id = %id, collection = %name, "Skipping document: {}", e);
                    report.skipped.push(id);
                    continue;
                }
            };

            match extra {
                Some(extra) => {
                    settle(&mut record);
                    report.migrated.push(id.clone());
                    if self.migrate_on_load && !self.write_migrated(&record, extra).await {
                        report.migration_write_failures.push(id);
                    }
                }
                None => progress::refresh_progress(&mut record),
            }
            records.push(record);
        }

        report.loaded = self.cache.replace_all(records);
        tracing::info!(
            collection = %name,
            "Loaded {} records ({} migrated, {} skipped)",
            report.loaded,
            report.migrated.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    async fn write_migrated(&self, record: &Record, extra: Document) -> bool {
        let id = &record.id;
        let doc = RecordDocument {
            extra,
            ..RecordDocument::from(record)
        };
        let encoded = match doc.to_document() {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(record_id = %id, "Cannot encode migrated record: {}", e);
                return false;
            }
        };
        match self
            .store
            .set(&self.collection.name, id, encoded, WriteMode::Replace)
            .await
        {
            Ok(()) => {
                tracing::info!(record_id = %id, "Migrated legacy initiative to phases");
                true
            }
            Err(e) => {
                tracing::warn!(record_id = %id, "Migration write failed, will retry on next load: {}", e);
                false
            }
        }
    }

    /// Set a sub-item's status and propagate upward
    ///
    /// Initiatives address the sub-item through `phase_id`; deals pass
    /// `None`.
    pub async fn apply_child_status_change(
        &self,
        record_id: &RecordId,
        phase_id: Option<&PhaseId>,
        sub_item_id: &SubItemId,
        status: Status,
    ) -> Result<MutationOutcome, TrackerError> {
        let target = Target::SubItem {
            record_id: record_id.clone(),
            phase_id: phase_id.cloned(),
            sub_item_id: sub_item_id.clone(),
        };
        self.mutate(target, |record| {
            Ok(match record.sub_item_mut(phase_id, sub_item_id) {
                Some(item) => {
                    item.set_status(status);
                    Edit::Changed
                }
                None => Edit::Missing,
            })
        })
        .await
    }

    /// Checkbox form of [`apply_child_status_change`](Self::apply_child_status_change)
    pub async fn set_sub_item_completed(
        &self,
        record_id: &RecordId,
        phase_id: Option<&PhaseId>,
        sub_item_id: &SubItemId,
        completed: bool,
    ) -> Result<MutationOutcome, TrackerError> {
        let status = if completed { Status::Done } else { Status::Pending };
        self.apply_child_status_change(record_id, phase_id, sub_item_id, status)
            .await
    }

    /// Set a phase status directly
    ///
    /// Rejected when the phase has sub-items that disagree.
    pub async fn apply_phase_status_change(
        &self,
        record_id: &RecordId,
        phase_id: &PhaseId,
        status: Status,
    ) -> Result<MutationOutcome, TrackerError> {
        let target = Target::Phase {
            record_id: record_id.clone(),
            phase_id: phase_id.clone(),
        };
        self.mutate(target, |record| {
            require_phases(record, "apply_phase_status_change")?;
            let Some(phase) = record.phase_mut(phase_id) else {
                return Ok(Edit::Missing);
            };
            validate_phase_status(phase, status)?;
            phase.status = status;
            Ok(Edit::Changed)
        })
        .await
    }

    /// Set a record status directly
    ///
    /// Rejected when the record has children that disagree.
    pub async fn apply_record_status_change(
        &self,
        record_id: &RecordId,
        status: Status,
    ) -> Result<MutationOutcome, TrackerError> {
        self.mutate(Target::Record(record_id.clone()), |record| {
            validate_record_status(record, status)?;
            record.status = status;
            Ok(Edit::Changed)
        })
        .await
    }

    /// Create an empty record with the next topic number
    ///
    /// Top-level records get the next free number; grouped records get the
    /// next number under their parent ("3.1", "3.2", ...).
    pub async fn create_record(&self, draft: RecordDraft) -> Result<MutationReport, TrackerError> {
        let id = RecordId::generate();
        let grouping = grouping_of(draft.parent_id.clone());
        let topic_number = self.topic_number_for(&id, &grouping)?;

        let mut record = Record::new(id, self.collection.kind, String::new());
        record.topic_number = topic_number;
        record.grouping = grouping;
        record.status = draft.status;
        apply_fields(&mut record, draft);

        let reconciliation = settle(&mut record);
        tracing::info!(record_id = %record.id, "Creating record {}", record.title);
        self.persist(record, reconciliation, WriteMode::Replace).await
    }

    /// Rewrite a record's own fields
    ///
    /// Title, priority, owner, description, dates and grouping come from
    /// `draft`. A different status is checked the same way as
    /// [`apply_record_status_change`](Self::apply_record_status_change).
    /// Moving the record under another parent, or out of one, renumbers it
    /// and refreshes the progress of both parents.
    pub async fn update_record(
        &self,
        record_id: &RecordId,
        draft: RecordDraft,
    ) -> Result<MutationOutcome, TrackerError> {
        self.mutate(Target::Record(record_id.clone()), |record| {
            let grouping = grouping_of(draft.parent_id.clone());
            if grouping != record.grouping {
                record.topic_number = self.topic_number_for(record_id, &grouping)?;
                record.grouping = grouping;
            }
            if draft.status != record.status {
                validate_record_status(record, draft.status)?;
                record.status = draft.status;
            }
            apply_fields(record, draft);
            Ok(Edit::Changed)
        })
        .await
    }

    /// Append a phase to an initiative
    pub async fn add_phase(
        &self,
        record_id: &RecordId,
        draft: PhaseDraft,
    ) -> Result<MutationOutcome, TrackerError> {
        self.mutate(Target::Record(record_id.clone()), |record| {
            require_phases(record, "add_phase")?;
            if let Children::Phases(phases) = &mut record.children {
                let mut phase = Phase::new(PhaseId::generate(), draft.title).with_status(draft.status);
                phase.deadline = draft.deadline;
                phases.push(phase);
            }
            Ok(Edit::Changed)
        })
        .await
    }

    /// Append a sub-item to a phase (initiatives) or to the record (deals)
    pub async fn add_sub_item(
        &self,
        record_id: &RecordId,
        phase_id: Option<&PhaseId>,
        draft: SubItemDraft,
    ) -> Result<MutationOutcome, TrackerError> {
        let target = match phase_id {
            Some(phase_id) => Target::Phase {
                record_id: record_id.clone(),
                phase_id: phase_id.clone(),
            },
            None => Target::Record(record_id.clone()),
        };
        self.mutate(target, |record| {
            let item = sub_item_from(draft);
            let items = match (&mut record.children, phase_id) {
                (Children::SubItems(items), _) => items,
                (Children::Phases(phases), Some(phase_id)) => {
                    match phases.iter_mut().find(|p| &p.id == phase_id) {
                        Some(phase) => &mut phase.sub_items,
                        None => return Ok(Edit::Missing),
                    }
                }
                (Children::Phases(_), None) => return Ok(Edit::Missing),
            };
            items.push(item);
            Ok(Edit::Changed)
        })
        .await
    }

    /// Remove a phase and everything under it
    pub async fn remove_phase(
        &self,
        record_id: &RecordId,
        phase_id: &PhaseId,
    ) -> Result<MutationOutcome, TrackerError> {
        let target = Target::Phase {
            record_id: record_id.clone(),
            phase_id: phase_id.clone(),
        };
        self.mutate(target, |record| {
            require_phases(record, "remove_phase")?;
            let Children::Phases(phases) = &mut record.children else {
                return Ok(Edit::Missing);
            };
            let before = phases.len();
            phases.retain(|p| &p.id != phase_id);
            Ok(if phases.len() == before {
                Edit::Missing
            } else {
                Edit::Changed
            })
        })
        .await
    }

    /// Remove one sub-item
    pub async fn remove_sub_item(
        &self,
        record_id: &RecordId,
        phase_id: Option<&PhaseId>,
        sub_item_id: &SubItemId,
    ) -> Result<MutationOutcome, TrackerError> {
        let target = Target::SubItem {
            record_id: record_id.clone(),
            phase_id: phase_id.cloned(),
            sub_item_id: sub_item_id.clone(),
        };
        self.mutate(target, |record| {
            let items = match (&mut record.children, phase_id) {
                (Children::SubItems(items), _) => items,
                (Children::Phases(phases), Some(phase_id)) => {
                    match phases.iter_mut().find(|p| &p.id == phase_id) {
                        Some(phase) => &mut phase.sub_items,
                        None => return Ok(Edit::Missing),
                    }
                }
                (Children::Phases(_), None) => return Ok(Edit::Missing),
            };
            let before = items.len();
            items.retain(|s| &s.id != sub_item_id);
            Ok(if items.len() == before {
                Edit::Missing
            } else {
                Edit::Changed
            })
        })
        .await
    }

    /// Archive or restore a record
    ///
    /// Initiatives can only be archived once `Concluído` or `Suspenso`.
    /// Deals and restores have no precondition.
    pub async fn set_archived(
        &self,
        record_id: &RecordId,
        archived: bool,
    ) -> Result<MutationOutcome, TrackerError> {
        self.mutate(Target::Record(record_id.clone()), |record| {
            let archivable = matches!(record.status, Status::Done | Status::Suspended);
            if archived && record.kind() == RecordKind::Initiative && !archivable {
                return Err(TrackerError::ArchiveRejected {
                    record_id: record.id.clone(),
                    status: record.status,
                });
            }
            record.archived = archived;
            Ok(Edit::Changed)
        })
        .await
    }

    /// Delete a record with its embedded phases and sub-items
    pub async fn delete_record(&self, record_id: &RecordId) -> Result<MutationOutcome, TrackerError> {
        let target = Target::Record(record_id.clone());
        if self.cache.get(record_id).is_none() {
            tracing::warn!(record_id = %record_id, "Delete skipped, {} not found", target);
            return Ok(MutationOutcome::NotFound(target));
        }

        if let Err(source) = self.store.delete(&self.collection.name, record_id).await {
            tracing::error!(record_id = %record_id, "Delete failed: {}", source);
            return Err(TrackerError::Persistence {
                record_id: record_id.clone(),
                source,
            });
        }

        match self.cache.remove(record_id) {
            Some((removed, parent_progress)) => {
                tracing::info!(record_id = %record_id, "Deleted record {}", removed.title);
                Ok(MutationOutcome::Applied(MutationReport {
                    record_id: removed.id,
                    reconciliation: Reconciliation::default(),
                    status: removed.status,
                    progress: removed.progress,
                    parent_progress,
                    former_parent_progress: None,
                }))
            }
            None => Ok(MutationOutcome::NotFound(target)),
        }
    }

    /// Compare stored documents with what reconciliation would produce
    ///
    /// Reads the store directly; the cache is not touched. Undecodable
    /// documents are listed in [`AuditReport::skipped`]. Progress of records
    /// that others are grouped under is derived on load, so it is not
    /// compared.
    pub async fn audit(&self) -> Result<AuditReport, TrackerError> {
        let name = &self.collection.name;
        let docs = self
            .store
            .get_all(name, &self.collection.order_by)
            .await
            .map_err(|source| TrackerError::Load {
                collection: name.clone(),
                source,
            })?;

        let mut report = AuditReport::default();
        let mut decoded = Vec::with_capacity(docs.len());
        for (id, raw) in docs {
            let entry = RecordDocument::from_document(&id, raw).and_then(|mut doc| {
                let legacy_shape =
                    self.collection.kind == RecordKind::Initiative && needs_migration(&doc);
                if legacy_shape {
                    doc = migrate(doc);
                }
                doc.into_record(id.clone(), self.collection.kind)
                    .map(|record| (record, legacy_shape))
            });
            match entry {
                Ok(entry) => decoded.push(entry),
                Err(e) => {
                    tracing::warn!(record_id = %id, collection = %name, "Skipping document: {}", e);
                    report.skipped.push(id);
                }
            }
        }

        let grouping_parents: HashSet<RecordId> = decoded
            .iter()
            .filter_map(|(record, _)| record.parent_id().cloned())
            .collect();

        for (stored, legacy_shape) in decoded {
            let mut expected = stored.clone();
            settle(&mut expected);
            if grouping_parents.contains(&stored.id) {
                expected.progress = stored.progress;
            }

            let phases: Vec<PhaseId> = stored
                .phases()
                .iter()
                .zip(expected.phases())
                .filter(|(s, e)| s.status != e.status || s.progress != e.progress)
                .map(|(s, _)| s.id.clone())
                .collect();

            if legacy_shape
                || !phases.is_empty()
                || stored.status != expected.status
                || stored.progress != expected.progress
            {
                tracing::debug!(record_id = %stored.id, "Record is inconsistent");
                report.inconsistencies.push(Inconsistency {
                    record_id: stored.id,
                    stored_status: stored.status,
                    expected_status: expected.status,
                    stored_progress: stored.progress,
                    expected_progress: expected.progress,
                    phases,
                    legacy_shape,
                });
            }
        }
        Ok(report)
    }

    /// Schedule view of the cached, non-archived records
    #[must_use]
    pub fn timeline(&self, today: NaiveDate) -> Vec<TimelineEntry> {
        self.cache
            .snapshot()
            .into_iter()
            .filter(|record| !record.archived)
            .map(|record| {
                let span = schedule::schedule_span(&record);
                let overdue = schedule::is_overdue(record.deadline, record.status, today);
                let overdue_items = record
                    .phases()
                    .iter()
                    .filter(|p| schedule::is_overdue(p.deadline, p.status, today))
                    .count()
                    + record
                        .all_sub_items()
                        .filter(|s| schedule::is_overdue(s.deadline, s.status(), today))
                        .count();
                TimelineEntry {
                    record_id: record.id,
                    topic_number: record.topic_number,
                    title: record.title,
                    status: record.status,
                    progress: record.progress,
                    span,
                    overdue,
                    overdue_items,
                }
            })
            .collect()
    }

    /// Outline number for `record_id` under `grouping`
    fn topic_number_for(&self, record_id: &RecordId, grouping: &Grouping) -> Result<String, TrackerError> {
        let Some(parent_id) = grouping.parent_id() else {
            return Ok(self.cache.next_topic_number().to_string());
        };
        let invalid = || TrackerError::InvalidGrouping {
            record_id: record_id.clone(),
            parent_id: parent_id.clone(),
        };
        if parent_id == record_id {
            return Err(invalid());
        }
        self.cache
            .next_child_topic_number(parent_id)
            .ok_or_else(invalid)
    }

    async fn mutate<F>(&self, target: Target, edit: F) -> Result<MutationOutcome, TrackerError>
    where
        F: FnOnce(&mut Record) -> Result<Edit, TrackerError>,
    {
        let Some(mut draft) = self.cache.get(target.record_id()) else {
            tracing::warn!(record_id = %target.record_id(), "Mutation skipped, {} not found", target);
            return Ok(MutationOutcome::NotFound(target));
        };

        match edit(&mut draft) {
            Ok(Edit::Changed) => {}
            Ok(Edit::Missing) => {
                tracing::warn!(record_id = %target.record_id(), "Mutation skipped, {} not found", target);
                return Ok(MutationOutcome::NotFound(target));
            }
            Err(e) => {
                tracing::debug!(record_id = %target.record_id(), "Mutation of {} rejected: {}", target, e);
                return Err(e);
            }
        }

        let reconciliation = settle(&mut draft);
        if !reconciliation.is_empty() {
            tracing::debug!(
                record_id = %draft.id,
                "Reconciled {} phases, record status {:?}",
                reconciliation.phase_updates.len(),
                reconciliation.record_status
            );
        }
        self.persist(draft, reconciliation, WriteMode::Merge)
            .await
            .map(MutationOutcome::Applied)
    }

    async fn persist(
        &self,
        mut draft: Record,
        reconciliation: Reconciliation,
        mode: WriteMode,
    ) -> Result<MutationReport, TrackerError> {
        draft.last_update = Some(Utc::now());
        if let Some(grouped) = self.cache.group_progress(&draft.id) {
            draft.progress = grouped;
        }
        let document = RecordDocument::from(&draft).to_document()?;

        if let Err(source) = self
            .store
            .set(&self.collection.name, &draft.id, document, mode)
            .await
        {
            tracing::error!(record_id = %draft.id, "Persisting record failed: {}", source);
            return Err(TrackerError::Persistence {
                record_id: draft.id,
                source,
            });
        }
        tracing::debug!(record_id = %draft.id, "Persisted record ({:?})", mode);

        let record_id = draft.id.clone();
        let status = draft.status;
        let progress = draft.progress;
        let refresh = self.cache.commit(draft);
        Ok(MutationReport {
            record_id,
            reconciliation,
            status,
            progress,
            parent_progress: refresh.parent,
            former_parent_progress: refresh.former_parent,
        })
    }
}

fn require_phases(record: &Record, operation: &'static str) -> Result<(), TrackerError> {
    match record.kind() {
        RecordKind::Initiative => Ok(()),
        kind => Err(TrackerError::Unsupported { operation, kind }),
    }
}

fn grouping_of(parent_id: Option<RecordId>) -> Grouping {
    match parent_id {
        Some(parent_id) => Grouping::Grouped { parent_id },
        None => Grouping::Standalone,
    }
}

/// Copy the editable fields; status and grouping are handled by the caller
fn apply_fields(record: &mut Record, draft: RecordDraft) {
    record.title = draft.title;
    record.priority = draft.priority;
    record.owner = draft.owner;
    record.description = draft.description;
    record.deadline = draft.deadline;
    record.start_date = draft.start_date;
}

fn sub_item_from(draft: SubItemDraft) -> SubItem {
    let mut item = SubItem::new(SubItemId::generate(), draft.title).with_status(draft.status);
    item.deadline = draft.deadline;
    item.responsible = draft.responsible;
    item.priority = draft.priority;
    item.description = draft.description;
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::{MockHierarchyStore, StoreError};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tracker_model::Document;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn initiative_doc() -> Document {
        doc(json!({
            "topicNumber": "1",
            "title": "Expansion",
            "status": "Em execução",
            "phases": [{
                "id": "p1",
                "title": "Fase 1",
                "status": "Em execução",
                "subItems": [
                    {"id": "a", "title": "A", "status": "Concluído", "completed": true},
                    {"id": "b", "title": "B", "status": "Pendente", "completed": false}
                ]
            }]
        }))
    }

    async fn seeded(initiatives: Vec<(&str, Document)>) -> (Arc<MemoryStore>, TreeMutationService<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        for (id, body) in initiatives {
            store
                .set("initiatives", &RecordId::from(id), body, WriteMode::Replace)
                .await
                .unwrap();
        }
        let service = TreeMutationService::new(store.clone(), CollectionConfig::initiatives());
        service.load().await.unwrap();
        (store, service)
    }

    #[tokio::test]
    async fn completing_last_sub_item_completes_ancestors() {
        let (store, service) = seeded(vec![("r1", initiative_doc())]).await;
        let writes = store.write_count();

        let outcome = service
            .apply_child_status_change(
                &RecordId::from("r1"),
                Some(&PhaseId::from("p1")),
                &SubItemId::from("b"),
                Status::Done,
            )
            .await
            .unwrap();

        let report = outcome.report().unwrap();
        assert_eq!(report.status, Status::Done);
        assert_eq!(report.progress, 100);
        assert_eq!(report.reconciliation.phase_updates.len(), 1);
        assert_eq!(store.write_count(), writes + 1);

        let stored = store.document("initiatives", &RecordId::from("r1")).unwrap();
        assert_eq!(stored["status"], json!("Concluído"));
        assert_eq!(stored["phases"][0]["status"], json!("Concluído"));
        assert_eq!(stored["phases"][0]["subItems"][1]["completed"], json!(true));
        assert!(stored["lastUpdate"].is_string());
    }

    #[tokio::test]
    async fn unknown_targets_are_no_ops() {
        let (store, service) = seeded(vec![("r1", initiative_doc())]).await;
        let writes = store.write_count();

        let missing_record = service
            .set_sub_item_completed(&RecordId::from("nope"), None, &SubItemId::from("a"), true)
            .await
            .unwrap();
        assert!(matches!(missing_record, MutationOutcome::NotFound(Target::SubItem { .. })));

        let missing_phase = service
            .apply_child_status_change(
                &RecordId::from("r1"),
                Some(&PhaseId::from("p9")),
                &SubItemId::from("a"),
                Status::Done,
            )
            .await
            .unwrap();
        assert!(!missing_phase.is_applied());
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn direct_parent_edits_are_validated() {
        let (_, service) = seeded(vec![("r1", initiative_doc())]).await;

        let err = service
            .apply_record_status_change(&RecordId::from("r1"), Status::Done)
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = service
            .apply_phase_status_change(&RecordId::from("r1"), &PhaseId::from("p1"), Status::Done)
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let ok = service
            .apply_phase_status_change(&RecordId::from("r1"), &PhaseId::from("p1"), Status::Suspended)
            .await
            .unwrap();
        assert!(ok.is_applied());
        assert_eq!(
            service.record(&RecordId::from("r1")).unwrap().phases()[0].status,
            Status::Suspended
        );
    }

    #[tokio::test]
    async fn failed_write_leaves_cache_untouched() {
        let mut store = MockHierarchyStore::new();
        store
            .expect_get_all()
            .returning(|_, _| Ok(vec![(RecordId::from("r1"), initiative_doc())]));
        store
            .expect_set()
            .times(1)
            .returning(|_, _, _, _| Err(StoreError::Unavailable("offline".into())));

        let service = TreeMutationService::new(Arc::new(store), CollectionConfig::initiatives());
        service.load().await.unwrap();
        let before = service.record(&RecordId::from("r1")).unwrap();
        let mut events = service.subscribe();

        let err = service
            .apply_child_status_change(
                &RecordId::from("r1"),
                Some(&PhaseId::from("p1")),
                &SubItemId::from("b"),
                Status::Done,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TrackerError::Persistence { .. }));
        assert!(err.is_retryable());
        assert_eq!(service.record(&RecordId::from("r1")).unwrap(), before);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn store_is_written_before_subscribers_hear() {
        let mut store = MockHierarchyStore::new();
        store.expect_get_all().returning(|_, _| Ok(Vec::new()));
        store.expect_set().times(1).returning(|_, _, _, _| Ok(()));

        let service = TreeMutationService::new(Arc::new(store), CollectionConfig::deals());
        service.load().await.unwrap();
        let mut events = service.subscribe();

        let report = service.create_record(RecordDraft::new("Target Co")).await.unwrap();
        assert_eq!(events.try_recv().unwrap(), RecordEvent::Upserted(report.record_id.clone()));
        let created = service.record(&report.record_id).unwrap();
        assert_eq!(created.topic_number, "1");
        assert_eq!(created.progress, 0);
        assert!(created.children.is_empty());
    }

    #[tokio::test]
    async fn legacy_initiative_is_migrated_on_load() {
        let legacy = doc(json!({
            "topicNumber": "2",
            "title": "Legacy",
            "status": "Em Dia",
            "subItems": [
                {"id": "s1", "title": "Lease", "completed": true},
                {"id": "s2", "title": "Hire", "completed": false}
            ]
        }));
        let (store, service) = seeded(vec![("r2", legacy)]).await;

        let stored = store.document("initiatives", &RecordId::from("r2")).unwrap();
        assert!(!stored.contains_key("subItems"));
        assert_eq!(stored["phases"][0]["id"], json!("fase-s1"));

        let record = service.record(&RecordId::from("r2")).unwrap();
        assert_eq!(record.status, Status::InProgress);
        assert_eq!(record.progress, 50);
    }

    #[tokio::test]
    async fn phase_operations_reject_deals() {
        let store = Arc::new(MemoryStore::new());
        store
            .set("mnaDeals", &RecordId::from("d1"), doc(json!({"title": "Target"})), WriteMode::Replace)
            .await
            .unwrap();
        let service = TreeMutationService::new(store, CollectionConfig::deals());
        service.load().await.unwrap();

        let err = service
            .add_phase(&RecordId::from("d1"), PhaseDraft::new("Fase 1"))
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::Unsupported { operation: "add_phase", .. }));

        let archived = service.set_archived(&RecordId::from("d1"), true).await.unwrap();
        assert!(archived.is_applied());
        assert!(service.record(&RecordId::from("d1")).unwrap().archived);
    }

    #[tokio::test]
    async fn adding_open_sub_item_rolls_back_done_phase() {
        let done = doc(json!({
            "title": "Done",
            "status": "Concluído",
            "phases": [{
                "id": "p1",
                "status": "Concluído",
                "subItems": [{"id": "a", "status": "Concluído"}]
            }]
        }));
        let (_, service) = seeded(vec![("r1", done)]).await;

        let outcome = service
            .add_sub_item(
                &RecordId::from("r1"),
                Some(&PhaseId::from("p1")),
                SubItemDraft::new("Follow-up"),
            )
            .await
            .unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.status, Status::InProgress);
        assert_eq!(report.progress, 50);

        let outcome = service
            .remove_phase(&RecordId::from("r1"), &PhaseId::from("p1"))
            .await
            .unwrap();
        let record = service.record(&RecordId::from("r1")).unwrap();
        assert!(outcome.is_applied());
        assert!(record.children.is_empty());
        assert_eq!(record.progress, 0);
    }
}
