//! Model errors

use crate::ids::RecordId;

/// Errors converting between store documents and typed records
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Document body could not be decoded
    #[error("record {record_id}: undecodable document: {source}")]
    Decode {
        /// Offending record
        record_id: RecordId,
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },

    /// Record could not be encoded
    #[error("record encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Encoded record was not a JSON object
    #[error("record did not encode to an object")]
    NotAnObject,

    /// Initiative still has the legacy `subItems` checklist
    #[error("record {0} is in the legacy shape and must be migrated first")]
    LegacyShape(RecordId),

    /// Deal document carries initiative phases
    #[error("deal {0} has phases; deals hold sub-items directly")]
    UnexpectedPhases(RecordId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_record() {
        let err = ModelError::LegacyShape(RecordId::from("r9"));
        assert!(err.to_string().contains("r9"));
    }
}
