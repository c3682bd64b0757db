//! Record cache
//!
//! Holds the last known state of every record in a collection and tells
//! subscribers when it changes. Only the mutation service writes to it;
//! everyone else reads snapshots.
//!
//! Locks are plain synchronous sections and are released before events are
//! published, so no lock is ever held across an `.await`.

use indexmap::IndexMap;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracker_model::{schedule, Record, RecordId};
use tracker_rollup::progress::{progress_of_parent_group, progress_of_record};

/// Change notification sent to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordEvent {
    /// Whole collection (re)loaded
    Loaded {
        /// Records now cached
        count: usize,
    },
    /// Record created or rewritten
    Upserted(RecordId),
    /// Record deleted
    Removed(RecordId),
    /// Grouping parent's averaged progress changed
    ProgressRefreshed {
        /// Grouping parent
        record_id: RecordId,
        /// New progress
        progress: u8,
    },
}

/// Grouping parents whose progress a commit refreshed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupRefresh {
    /// Parent the record is grouped under now
    pub parent: Option<(RecordId, u8)>,
    /// Parent the record was moved away from
    pub former_parent: Option<(RecordId, u8)>,
}

/// In-memory view of one collection
#[derive(Debug)]
pub struct RecordCache {
    records: RwLock<IndexMap<RecordId, Record>>,
    events: broadcast::Sender<RecordEvent>,
}

/// Recompute a grouping parent's progress from its grouped records
///
/// Returns the new value when `parent_id` exists and has grouped records.
fn refresh_group(records: &mut IndexMap<RecordId, Record>, parent_id: &RecordId) -> Option<u8> {
    let grouped: Vec<u8> = records
        .values()
        .filter(|r| r.parent_id() == Some(parent_id))
        .map(|r| r.progress)
        .collect();
    if grouped.is_empty() {
        return None;
    }
    let progress = progress_of_parent_group(grouped);
    let parent = records.get_mut(parent_id)?;
    parent.progress = progress;
    Some(progress)
}

/// Refresh a parent that just lost a grouped record
///
/// Once nothing is grouped under it, its progress comes from its own tree
/// again.
fn release_group(records: &mut IndexMap<RecordId, Record>, parent_id: &RecordId) -> Option<u8> {
    if let Some(progress) = refresh_group(records, parent_id) {
        return Some(progress);
    }
    let parent = records.get_mut(parent_id)?;
    parent.progress = progress_of_record(parent);
    Some(parent.progress)
}

impl RecordCache {
    /// Create empty cache
    #[must_use]
    pub fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            records: RwLock::new(IndexMap::new()),
            events,
        }
    }

    /// Subscribe to change events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RecordEvent> {
        self.events.subscribe()
    }

    /// All records in collection order
    #[must_use]
    pub fn snapshot(&self) -> Vec<Record> {
        self.records.read().values().cloned().collect()
    }

    /// One record
    #[must_use]
    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.records.read().get(id).cloned()
    }

    /// Number of cached records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Topic number for the next top-level record
    #[must_use]
    pub fn next_topic_number(&self) -> u32 {
        let records = self.records.read();
        schedule::next_topic_number(records.values().map(|r| r.topic_number.as_str()))
    }

    /// Outline number for a new record grouped under `parent_id`
    ///
    /// `None` when the parent is not cached.
    #[must_use]
    pub fn next_child_topic_number(&self, parent_id: &RecordId) -> Option<String> {
        let records = self.records.read();
        let parent = records.get(parent_id)?;
        Some(schedule::next_child_topic_number(
            &parent.topic_number,
            records.values().map(|r| r.topic_number.as_str()),
        ))
    }

    /// Current averaged progress of a grouping parent
    #[must_use]
    pub fn group_progress(&self, parent_id: &RecordId) -> Option<u8> {
        let records = self.records.read();
        let grouped: Vec<u8> = records
            .values()
            .filter(|r| r.parent_id() == Some(parent_id))
            .map(|r| r.progress)
            .collect();
        (!grouped.is_empty()).then(|| progress_of_parent_group(grouped))
    }

    /// Replace the whole collection, deriving grouping parent progress
    pub fn replace_all(&self, loaded: Vec<Record>) -> usize {
        let count = {
            let mut records = self.records.write();
            *records = loaded.into_iter().map(|r| (r.id.clone(), r)).collect();
            let parents: Vec<RecordId> = records
                .values()
                .filter_map(|r| r.parent_id().cloned())
                .collect();
            for parent_id in &parents {
                refresh_group(&mut records, parent_id);
            }
            records.len()
        };
        self.publish(RecordEvent::Loaded { count });
        count
    }

    /// Store a persisted record and refresh grouping progress around it
    ///
    /// When the record moved to another parent, both parents are refreshed.
    pub fn commit(&self, record: Record) -> GroupRefresh {
        let id = record.id.clone();
        let parent_id = record.parent_id().cloned();
        let (own, refresh) = {
            let mut records = self.records.write();
            let previous = records
                .insert(id.clone(), record)
                .and_then(|old| old.parent_id().cloned());
            let own = refresh_group(&mut records, &id);
            let parent = parent_id
                .as_ref()
                .and_then(|p| refresh_group(&mut records, p).map(|v| (p.clone(), v)));
            let former_parent = previous
                .filter(|p| Some(p) != parent_id.as_ref())
                .and_then(|p| release_group(&mut records, &p).map(|v| (p, v)));
            (own, GroupRefresh { parent, former_parent })
        };

        self.publish(RecordEvent::Upserted(id.clone()));
        if let Some(progress) = own {
            self.publish(RecordEvent::ProgressRefreshed {
                record_id: id,
                progress,
            });
        }
        for (record_id, progress) in refresh.parent.iter().chain(&refresh.former_parent) {
            self.publish(RecordEvent::ProgressRefreshed {
                record_id: record_id.clone(),
                progress: *progress,
            });
        }
        refresh
    }

    /// Drop a record and refresh its grouping parent
    pub fn remove(&self, id: &RecordId) -> Option<(Record, Option<(RecordId, u8)>)> {
        let (removed, parent) = {
            let mut records = self.records.write();
            let removed = records.shift_remove(id)?;
            let parent = removed
                .parent_id()
                .and_then(|p| release_group(&mut records, p).map(|v| (p.clone(), v)));
            (removed, parent)
        };

        self.publish(RecordEvent::Removed(id.clone()));
        if let Some((record_id, progress)) = &parent {
            self.publish(RecordEvent::ProgressRefreshed {
                record_id: record_id.clone(),
                progress: *progress,
            });
        }
        Some((removed, parent))
    }

    fn publish(&self, event: RecordEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tracker_model::{Grouping, RecordKind};

    fn record(id: &str, progress: u8) -> Record {
        let mut record = Record::new(RecordId::from(id), RecordKind::Deal, id);
        record.progress = progress;
        record.topic_number = id.trim_start_matches('r').to_string();
        record
    }

    fn grouped(id: &str, parent: &str, progress: u8) -> Record {
        let mut record = record(id, progress);
        record.grouping = Grouping::Grouped {
            parent_id: RecordId::from(parent),
        };
        record.topic_number = String::new();
        record
    }

    #[test]
    fn replace_all_derives_group_progress() {
        let cache = RecordCache::new(8);
        let mut events = cache.subscribe();
        cache.replace_all(vec![record("r1", 0), grouped("c1", "r1", 100), grouped("c2", "r1", 25)]);

        assert_eq!(cache.get(&RecordId::from("r1")).unwrap().progress, 63);
        assert_eq!(events.try_recv().unwrap(), RecordEvent::Loaded { count: 3 });
        assert_eq!(cache.next_topic_number(), 2);
    }

    #[test]
    fn commit_refreshes_parent_only() {
        let cache = RecordCache::new(8);
        cache.replace_all(vec![record("r1", 0), grouped("c1", "r1", 0), grouped("c2", "r1", 0)]);
        let mut events = cache.subscribe();

        let refresh = cache.commit(grouped("c1", "r1", 100));
        assert_eq!(refresh.parent, Some((RecordId::from("r1"), 50)));
        assert_eq!(refresh.former_parent, None);
        assert_eq!(events.try_recv().unwrap(), RecordEvent::Upserted(RecordId::from("c1")));
        assert_eq!(
            events.try_recv().unwrap(),
            RecordEvent::ProgressRefreshed {
                record_id: RecordId::from("r1"),
                progress: 50
            }
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn remove_refreshes_parent() {
        let cache = RecordCache::new(8);
        cache.replace_all(vec![record("r1", 0), grouped("c1", "r1", 100), grouped("c2", "r1", 0)]);

        let (removed, parent) = cache.remove(&RecordId::from("c2")).unwrap();
        assert_eq!(removed.id.as_str(), "c2");
        assert_eq!(parent, Some((RecordId::from("r1"), 100)));
        assert!(cache.remove(&RecordId::from("c2")).is_none());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn standalone_records_have_no_group_progress() {
        let cache = RecordCache::new(1);
        cache.replace_all(vec![record("r1", 40)]);
        assert_eq!(cache.group_progress(&RecordId::from("r1")), None);
        assert_eq!(cache.commit(record("r1", 60)), GroupRefresh::default());
        assert_eq!(cache.snapshot()[0].progress, 60);
    }

    #[test]
    fn moving_a_record_refreshes_both_parents() {
        let cache = RecordCache::new(8);
        cache.replace_all(vec![record("r1", 0), record("r2", 0), grouped("c1", "r1", 100)]);
        assert_eq!(cache.get(&RecordId::from("r1")).unwrap().progress, 100);

        let refresh = cache.commit(grouped("c1", "r2", 100));
        assert_eq!(refresh.parent, Some((RecordId::from("r2"), 100)));
        // r1 has nothing grouped under it anymore; a childless pending deal is at 0
        assert_eq!(refresh.former_parent, Some((RecordId::from("r1"), 0)));
        assert_eq!(cache.get(&RecordId::from("r1")).unwrap().progress, 0);
        assert_eq!(cache.group_progress(&RecordId::from("r1")), None);
    }

    #[test]
    fn removing_last_grouped_record_restores_own_progress() {
        let cache = RecordCache::new(8);
        cache.replace_all(vec![record("r1", 0), grouped("c1", "r1", 40)]);

        let (_, parent) = cache.remove(&RecordId::from("c1")).unwrap();
        assert_eq!(parent, Some((RecordId::from("r1"), 0)));
    }

    #[test]
    fn child_topic_numbers_follow_the_parent() {
        let cache = RecordCache::new(1);
        let mut child = grouped("c1", "r3", 0);
        child.topic_number = "3.1".into();
        cache.replace_all(vec![record("r3", 0), child]);

        assert_eq!(cache.next_child_topic_number(&RecordId::from("r3")).as_deref(), Some("3.2"));
        assert_eq!(cache.next_child_topic_number(&RecordId::from("nope")), None);
        assert_eq!(cache.next_topic_number(), 4);
    }

    proptest::proptest! {
        #[test]
        fn prop_group_progress_stays_within_children(children in proptest::collection::vec(0u8..=100, 1..8)) {
            let mut records = vec![record("r1", 0)];
            for (i, progress) in children.iter().enumerate() {
                records.push(grouped(&format!("c{i}"), "r1", *progress));
            }
            let cache = RecordCache::new(4);
            cache.replace_all(records);

            let parent = cache.get(&RecordId::from("r1")).unwrap().progress;
            let min = *children.iter().min().unwrap();
            let max = *children.iter().max().unwrap();
            proptest::prop_assert!(min <= parent && parent <= max);
            proptest::prop_assert_eq!(cache.group_progress(&RecordId::from("r1")), Some(parent));
        }
    }
}
