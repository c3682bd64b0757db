//! Error types for Tracker Core
//!
//! Covers:
//! - Status edits rejected by the completion rule
//! - Archive and regrouping requests the record does not allow
//! - Store failures while persisting a mutation
//! - Undecodable documents
//! - Configuration problems

use crate::store::StoreError;
use tracker_model::{ModelError, RecordId, RecordKind, Status};
use tracker_rollup::PropagationError;

/// Main tracker error type
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Direct parent status edit contradicts its children
    #[error("status change rejected: {0}")]
    ValidationRejected(#[from] PropagationError),

    /// Only finished or suspended initiatives can be archived
    #[error("record {record_id} cannot be archived while {status}")]
    ArchiveRejected {
        /// Record to archive
        record_id: RecordId,
        /// Its current status
        status: Status,
    },

    /// Grouping parent is unknown or is the record itself
    #[error("record {record_id} cannot be grouped under {parent_id}")]
    InvalidGrouping {
        /// Record being grouped
        record_id: RecordId,
        /// Requested parent
        parent_id: RecordId,
    },

    /// Store write failed; cache and subscribers were left untouched
    #[error("failed to persist record {record_id}: {source}")]
    Persistence {
        /// Record whose write failed
        record_id: RecordId,
        /// Underlying store failure
        #[source]
        source: StoreError,
    },

    /// Reading a collection failed
    #[error("failed to load collection {collection}: {source}")]
    Load {
        /// Collection name
        collection: String,
        /// Underlying store failure
        #[source]
        source: StoreError,
    },

    /// Document could not be decoded or encoded
    #[error("document error: {0}")]
    Document(#[from] ModelError),

    /// Operation does not apply to this record kind
    #[error("{operation} is not supported for {kind:?} records")]
    Unsupported {
        /// Operation name
        operation: &'static str,
        /// Kind it was attempted on
        kind: RecordKind,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl TrackerError {
    /// Check if the error is a rejected edit
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ValidationRejected(_) | Self::ArchiveRejected { .. } | Self::InvalidGrouping { .. }
        )
    }

    /// Check if retrying the same call may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Persistence { source, .. } | Self::Load { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Short message suitable for a toast or status line
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::ValidationRejected(PropagationError::ChildrenIncomplete { pending, .. }) => {
                format!("Conclua os {pending} itens pendentes antes de concluir este.")
            }
            Self::ValidationRejected(PropagationError::ChildrenComplete { .. }) => {
                "Todos os itens estão concluídos; reabra um item para alterar o status.".into()
            }
            Self::ArchiveRejected { .. } => {
                "Apenas iniciativas concluídas ou suspensas podem ser arquivadas.".into()
            }
            Self::InvalidGrouping { .. } => "Selecione um tópico pai válido.".into(),
            Self::Persistence { .. } | Self::Load { .. } => {
                "Não foi possível salvar a alteração. Tente novamente.".into()
            }
            Self::Document(_) | Self::Unsupported { .. } | Self::Config(_) => self.to_string(),
        }
    }
}
