//! Snapshot commands
//!
//! Each command builds one [`TreeMutationService`] per configured
//! collection over a [`MemoryStore`] seeded from the snapshot file.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use tracker_core::{
    CollectionConfig, Inconsistency, LoadReport, MemoryStore, TimelineEntry, TrackerConfig,
    TreeMutationService,
};
use tracker_model::RecordId;

/// Read a TOML config file, or fall back to defaults
pub fn load_config(path: Option<&Path>) -> Result<TrackerConfig> {
    let Some(path) = path else {
        return Ok(TrackerConfig::default());
    };
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    TrackerConfig::from_toml_str(&source).with_context(|| format!("parsing config {}", path.display()))
}

/// Read a JSON snapshot into a store
pub fn read_snapshot(path: &Path) -> Result<MemoryStore> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    MemoryStore::from_json_str(&source).with_context(|| format!("parsing snapshot {}", path.display()))
}

/// Write the store back as a JSON snapshot
pub fn write_snapshot(store: &MemoryStore, path: &Path) -> Result<()> {
    let json = store.to_json_string()?;
    std::fs::write(path, json).with_context(|| format!("writing snapshot {}", path.display()))
}

/// What `migrate` did per collection
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationSummary {
    /// Collection name and records converted to phases
    pub migrated: Vec<(String, Vec<RecordId>)>,
    /// Records that failed to decode
    pub skipped: Vec<(String, Vec<RecordId>)>,
    /// Records loaded across all collections
    pub loaded: usize,
}

impl MigrationSummary {
    /// Total migrated records
    #[must_use]
    pub fn migrated_count(&self) -> usize {
        self.migrated.iter().map(|(_, ids)| ids.len()).sum()
    }

    fn record(&mut self, collection: &CollectionConfig, report: LoadReport) {
        self.loaded += report.loaded;
        if !report.migrated.is_empty() {
            self.migrated.push((collection.name.clone(), report.migrated));
        }
        if !report.skipped.is_empty() {
            self.skipped.push((collection.name.clone(), report.skipped));
        }
    }
}

/// Load every collection with migration write-back enabled
pub async fn migrate_snapshot(
    store: Arc<MemoryStore>,
    config: &TrackerConfig,
) -> Result<MigrationSummary> {
    let config = config.clone().with_migrate_on_load(true);
    let mut summary = MigrationSummary::default();
    for collection in config.collections() {
        let service = TreeMutationService::with_config(store.clone(), collection.clone(), &config);
        let report = service
            .load()
            .await
            .with_context(|| format!("loading {}", collection.name))?;
        if !report.migration_write_failures.is_empty() {
            anyhow::bail!(
                "{} migrated records in {} could not be written",
                report.migration_write_failures.len(),
                collection.name
            );
        }
        summary.record(collection, report);
    }
    tracing::info!(
        "Migration finished: {} records loaded, {} migrated",
        summary.loaded,
        summary.migrated_count()
    );
    Ok(summary)
}

/// Inconsistent records of one collection
#[derive(Debug, Clone, Serialize)]
pub struct CollectionFindings {
    /// Collection name
    pub collection: String,
    /// Records whose stored state is stale
    pub inconsistencies: Vec<Inconsistency>,
    /// Documents that could not be decoded
    pub skipped: Vec<RecordId>,
}

/// Result of `check`
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckSummary {
    /// Findings per collection, empty collections omitted
    pub collections: Vec<CollectionFindings>,
}

impl CheckSummary {
    /// Whether every stored record is consistent
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.collections
            .iter()
            .all(|c| c.inconsistencies.is_empty() && c.skipped.is_empty())
    }

    /// Plain-text report
    #[must_use]
    pub fn render_text(&self) -> String {
        if self.is_clean() {
            return "All records consistent.\n".to_string();
        }
        let mut out = String::new();
        for findings in &self.collections {
            let _ = writeln!(out, "{}:", findings.collection);
            for item in &findings.inconsistencies {
                let _ = write!(
                    out,
                    "  {}: status {} -> {}, progress {} -> {}",
                    item.record_id,
                    item.stored_status,
                    item.expected_status,
                    item.stored_progress,
                    item.expected_progress
                );
                if !item.phases.is_empty() {
                    let _ = write!(out, ", {} stale phases", item.phases.len());
                }
                if item.legacy_shape {
                    out.push_str(", legacy shape");
                }
                out.push('\n');
            }
            for id in &findings.skipped {
                let _ = writeln!(out, "  {id}: unreadable document");
            }
        }
        out
    }
}

/// Audit every collection without writing anything
pub async fn check_snapshot(store: Arc<MemoryStore>, config: &TrackerConfig) -> Result<CheckSummary> {
    let mut summary = CheckSummary::default();
    for collection in config.collections() {
        let service = TreeMutationService::with_config(store.clone(), collection.clone(), config);
        let report = service
            .audit()
            .await
            .with_context(|| format!("checking {}", collection.name))?;
        if !report.is_clean() {
            tracing::warn!(
                collection = %collection.name,
                "{} inconsistent records, {} unreadable",
                report.inconsistencies.len(),
                report.skipped.len()
            );
            summary.collections.push(CollectionFindings {
                collection: collection.name.clone(),
                inconsistencies: report.inconsistencies,
                skipped: report.skipped,
            });
        }
    }
    Ok(summary)
}

/// Timeline of one collection
#[derive(Debug, Clone, Serialize)]
pub struct CollectionTimeline {
    /// Collection name
    pub collection: String,
    /// Active records in outline order
    pub entries: Vec<TimelineEntry>,
}

/// Result of `timeline`
#[derive(Debug, Clone, Default, Serialize)]
pub struct TimelineSummary {
    /// Day the overdue flags were computed for
    pub today: Option<NaiveDate>,
    /// One timeline per collection
    pub collections: Vec<CollectionTimeline>,
}

impl TimelineSummary {
    /// Records past their deadline across all collections
    #[must_use]
    pub fn overdue_count(&self) -> usize {
        self.collections
            .iter()
            .flat_map(|c| &c.entries)
            .filter(|e| e.overdue)
            .count()
    }

    /// Plain-text report, one line per record
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for timeline in &self.collections {
            let _ = writeln!(out, "{}:", timeline.collection);
            for entry in &timeline.entries {
                let span = match entry.span {
                    Some((start, end)) => format!("{start} .. {end}"),
                    None => "no dates".to_string(),
                };
                let _ = write!(
                    out,
                    "  {} {} [{}] {}%, {}",
                    entry.topic_number, entry.title, entry.status, entry.progress, span
                );
                if entry.overdue {
                    out.push_str(", overdue");
                }
                if entry.overdue_items > 0 {
                    let _ = write!(out, ", {} overdue items", entry.overdue_items);
                }
                out.push('\n');
            }
        }
        out
    }
}

/// Load every collection read-only and lay out its schedule
pub async fn timeline_snapshot(
    store: Arc<MemoryStore>,
    config: &TrackerConfig,
    today: NaiveDate,
) -> Result<TimelineSummary> {
    let config = config.clone().with_migrate_on_load(false);
    let mut summary = TimelineSummary {
        today: Some(today),
        ..TimelineSummary::default()
    };
    for collection in config.collections() {
        let service = TreeMutationService::with_config(store.clone(), collection.clone(), &config);
        service
            .load()
            .await
            .with_context(|| format!("loading {}", collection.name))?;
        let mut entries = service.timeline(today);
        entries.sort_by(|a, b| topic_order(&a.topic_number).cmp(&topic_order(&b.topic_number)));
        summary.collections.push(CollectionTimeline {
            collection: collection.name.clone(),
            entries,
        });
    }
    Ok(summary)
}

fn topic_order(topic_number: &str) -> Vec<u32> {
    topic_number
        .split('.')
        .map(|part| part.trim().parse().unwrap_or(u32::MAX))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_without_file() {
        let config = load_config(None).unwrap();
        assert_eq!(config, TrackerConfig::default());
    }

    #[test]
    fn clean_summary_renders_one_line() {
        let summary = CheckSummary::default();
        assert!(summary.is_clean());
        assert_eq!(summary.render_text(), "All records consistent.\n");
    }

    #[test]
    fn unreadable_documents_make_the_summary_dirty() {
        let summary = CheckSummary {
            collections: vec![CollectionFindings {
                collection: "initiatives".to_string(),
                inconsistencies: Vec::new(),
                skipped: vec![RecordId::from("bad")],
            }],
        };
        assert!(!summary.is_clean());
        assert_eq!(summary.render_text(), "initiatives:\n  bad: unreadable document\n");
    }

    #[test]
    fn topic_numbers_sort_numerically() {
        let mut topics = vec!["10", "2.1", "2", "1", "2.10", "2.2"];
        topics.sort_by_key(|t| topic_order(t));
        assert_eq!(topics, vec!["1", "2", "2.1", "2.2", "2.10", "10"]);
    }
}
