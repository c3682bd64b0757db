//! Persisted document shape
//!
//! Records are stored as loosely typed JSON objects. [`RecordDocument`] is
//! the tolerant wire form: it accepts the legacy two-level initiative shape
//! (`subItems` on the record), missing fields and legacy status labels, and
//! keeps unknown dashboard fields in `extra` so replace-writes do not drop
//! them. [`Record`] is the typed form the rollup works on.

use crate::error::ModelError;
use crate::ids::{RecordId, SubItemId};
use crate::record::{Children, Grouping, Phase, Record, RecordKind, SubItem};
use crate::status::{Priority, Status};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Raw store document
pub type Document = Map<String, Value>;

/// ISO `YYYY-MM-DD` dates, tolerant of empty strings and full timestamps
pub(crate) mod serde_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => {
                let day = s.get(..10).unwrap_or(s);
                NaiveDate::parse_from_str(day, "%Y-%m-%d")
                    .map(Some)
                    .map_err(serde::de::Error::custom)
            }
        }
    }
}

fn lenient_progress<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    // Clamped to 0..=100 first, so the cast cannot truncate.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(raw.clamp(0.0, 100.0).round() as u8)
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc)))
}

/// Sub-item as found in storage
///
/// Old checklist items only carried `completed`; newer ones carry `status`.
/// When both exist `status` wins.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubItemDocument {
    /// Sub-item id
    #[serde(default)]
    pub id: String,
    /// Title
    #[serde(default)]
    pub title: String,
    /// Status label
    #[serde(default)]
    pub status: Option<Status>,
    /// Legacy completion flag
    #[serde(default)]
    pub completed: Option<bool>,
    /// Due date
    #[serde(default, with = "serde_date")]
    pub deadline: Option<NaiveDate>,
    /// Responsible person
    #[serde(default)]
    pub responsible: Option<String>,
    /// Priority
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
}

impl From<SubItemDocument> for SubItem {
    fn from(doc: SubItemDocument) -> Self {
        let status = doc.status.unwrap_or(if doc.completed.unwrap_or(false) {
            Status::Done
        } else {
            Status::Pending
        });
        let mut item = SubItem::new(SubItemId::new(doc.id), doc.title).with_status(status);
        item.deadline = doc.deadline;
        item.responsible = doc.responsible.unwrap_or_default();
        item.priority = doc.priority.unwrap_or_default();
        item.description = doc.description.unwrap_or_default();
        item
    }
}

/// Record body as stored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDocument {
    /// Outline number
    #[serde(default)]
    pub topic_number: String,
    /// Title
    #[serde(default)]
    pub title: String,
    /// Status
    #[serde(default)]
    pub status: Status,
    /// Priority
    #[serde(default)]
    pub priority: Priority,
    /// Owner
    #[serde(default)]
    pub owner: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Due date
    #[serde(default, with = "serde_date")]
    pub deadline: Option<NaiveDate>,
    /// Start date
    #[serde(
        default,
        with = "serde_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<NaiveDate>,
    /// Derived progress
    #[serde(default, deserialize_with = "lenient_progress")]
    pub progress: u8,
    /// Archive flag
    #[serde(default)]
    pub archived: bool,
    /// Last mutation timestamp
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_update: Option<DateTime<Utc>>,
    /// Grouping parent
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Initiative phases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phases: Option<Vec<Phase>>,
    /// Deal sub-items, or the legacy initiative checklist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_items: Option<Vec<SubItem>>,
    /// Fields this crate does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RecordDocument {
    /// Decode a raw store document
    pub fn from_document(id: &RecordId, doc: Document) -> Result<Self, ModelError> {
        serde_json::from_value(Value::Object(doc)).map_err(|source| ModelError::Decode {
            record_id: id.clone(),
            source,
        })
    }

    /// Encode into a raw store document
    pub fn to_document(&self) -> Result<Document, ModelError> {
        match serde_json::to_value(self).map_err(ModelError::Encode)? {
            Value::Object(map) => Ok(map),
            _ => Err(ModelError::NotAnObject),
        }
    }

    /// Convert into a typed record
    ///
    /// Initiatives still in the legacy shape must be migrated first.
    pub fn into_record(self, id: RecordId, kind: RecordKind) -> Result<Record, ModelError> {
        let children = match kind {
            RecordKind::Initiative => {
                if self.sub_items.as_ref().is_some_and(|s| !s.is_empty())
                    && self.phases.as_ref().map_or(true, Vec::is_empty)
                {
                    return Err(ModelError::LegacyShape(id));
                }
                Children::Phases(self.phases.unwrap_or_default())
            }
            RecordKind::Deal => {
                if self.phases.as_ref().is_some_and(|p| !p.is_empty()) {
                    return Err(ModelError::UnexpectedPhases(id));
                }
                Children::SubItems(self.sub_items.unwrap_or_default())
            }
        };

        let grouping = match self.parent_id {
            Some(parent) if !parent.trim().is_empty() => Grouping::Grouped {
                parent_id: RecordId::new(parent),
            },
            _ => Grouping::Standalone,
        };

        Ok(Record {
            id,
            topic_number: self.topic_number,
            title: self.title,
            status: self.status,
            priority: self.priority,
            owner: self.owner,
            description: self.description,
            deadline: self.deadline,
            start_date: self.start_date,
            progress: self.progress.min(100),
            archived: self.archived,
            last_update: self.last_update,
            grouping,
            children,
        })
    }
}

impl From<&Record> for RecordDocument {
    fn from(record: &Record) -> Self {
        let (phases, sub_items) = match &record.children {
            Children::Phases(phases) => (Some(phases.clone()), None),
            Children::SubItems(items) => (None, Some(items.clone())),
        };
        Self {
            topic_number: record.topic_number.clone(),
            title: record.title.clone(),
            status: record.status,
            priority: record.priority,
            owner: record.owner.clone(),
            description: record.description.clone(),
            deadline: record.deadline,
            start_date: record.start_date,
            progress: record.progress,
            archived: record.archived,
            last_update: record.last_update,
            parent_id: record.parent_id().map(ToString::to_string),
            phases,
            sub_items,
            extra: Map::new(),
        }
    }
}
