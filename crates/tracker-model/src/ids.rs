//! Identifiers for records, phases and sub-items
//!
//! Ids are opaque strings assigned by the document store (records) or by the
//! owning form (phases, sub-items). Newly created nodes get a ULID so ids
//! sort by creation time.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing id
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh, time-sortable id
            #[inline]
            #[must_use]
            pub fn generate() -> Self {
                Self(Ulid::new().to_string().to_lowercase())
            }

            /// Borrow the raw id
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Document id of a top-level record (initiative or deal)
    RecordId
}

string_id! {
    /// Id of a phase inside an initiative
    PhaseId
}

string_id! {
    /// Id of a leaf sub-item
    SubItemId
}

impl PhaseId {
    /// Deterministic id for a phase synthesized around a legacy sub-item
    #[inline]
    #[must_use]
    pub fn wrapping(sub_item: &SubItemId) -> Self {
        Self(format!("fase-{}", sub_item.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = RecordId::generate();
        let b = RecordId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 26);
    }

    #[test]
    fn wrapping_phase_id_is_deterministic() {
        let sub = SubItemId::from("s1");
        assert_eq!(PhaseId::wrapping(&sub), PhaseId::wrapping(&sub));
        assert_eq!(PhaseId::wrapping(&sub).as_str(), "fase-s1");
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = SubItemId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
