//! Status and priority enums
//!
//! [`Status`] is the canonical four-value lifecycle shared by records,
//! phases and sub-items. Older documents carry values from the kanban-era
//! [`LegacyStatus`] set; those are read as aliases and never written back.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical node status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    /// Not started
    #[default]
    #[serde(rename = "Pendente", alias = "A Fazer")]
    Pending,
    /// Work ongoing
    #[serde(
        rename = "Em execução",
        alias = "Em Dia",
        alias = "Em Risco",
        alias = "Atrasado"
    )]
    InProgress,
    /// Finished
    #[serde(rename = "Concluído")]
    Done,
    /// On hold
    #[serde(rename = "Suspenso")]
    Suspended,
}

impl Status {
    /// All canonical statuses in board order
    pub const ALL: [Status; 4] = [
        Status::Pending,
        Status::InProgress,
        Status::Done,
        Status::Suspended,
    ];

    /// Persisted label
    #[inline]
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Status::Pending => "Pendente",
            Status::InProgress => "Em execução",
            Status::Done => "Concluído",
            Status::Suspended => "Suspenso",
        }
    }

    /// Whether this is the terminal `Concluído` status
    #[inline]
    #[must_use]
    pub fn is_done(self) -> bool {
        matches!(self, Status::Done)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a label matches neither status set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status label: {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pendente" => Ok(Status::Pending),
            "Em execução" => Ok(Status::InProgress),
            "Concluído" => Ok(Status::Done),
            "Suspenso" => Ok(Status::Suspended),
            other => other.parse::<LegacyStatus>().map(LegacyStatus::canonical),
        }
    }
}

/// Kanban-era status labels
///
/// Only used to read old documents. `Em Risco` and `Atrasado` were health
/// markers on top of "in progress", so they collapse into
/// [`Status::InProgress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyStatus {
    /// `A Fazer`
    ToDo,
    /// `Em Dia`
    OnTrack,
    /// `Em Risco`
    AtRisk,
    /// `Atrasado`
    Late,
    /// `Concluído`
    Done,
}

impl LegacyStatus {
    /// Persisted label
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            LegacyStatus::ToDo => "A Fazer",
            LegacyStatus::OnTrack => "Em Dia",
            LegacyStatus::AtRisk => "Em Risco",
            LegacyStatus::Late => "Atrasado",
            LegacyStatus::Done => "Concluído",
        }
    }

    /// Canonical status this label maps to
    #[must_use]
    pub fn canonical(self) -> Status {
        match self {
            LegacyStatus::ToDo => Status::Pending,
            LegacyStatus::OnTrack | LegacyStatus::AtRisk | LegacyStatus::Late => {
                Status::InProgress
            }
            LegacyStatus::Done => Status::Done,
        }
    }
}

impl FromStr for LegacyStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A Fazer" => Ok(LegacyStatus::ToDo),
            "Em Dia" => Ok(LegacyStatus::OnTrack),
            "Em Risco" => Ok(LegacyStatus::AtRisk),
            "Atrasado" => Ok(LegacyStatus::Late),
            "Concluído" => Ok(LegacyStatus::Done),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Record and sub-item priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    /// `Baixa`
    #[default]
    #[serde(rename = "Baixa")]
    Low,
    /// `Média`
    #[serde(rename = "Média")]
    Medium,
    /// `Alta`
    #[serde(rename = "Alta")]
    High,
}

impl Priority {
    /// Persisted label
    #[inline]
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Baixa",
            Priority::Medium => "Média",
            Priority::High => "Alta",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_labels_round_trip() {
        for status in Status::ALL {
            assert_eq!(status.label().parse::<Status>().unwrap(), status);
        }
    }

    #[test]
    fn legacy_labels_map_to_canonical() {
        assert_eq!("A Fazer".parse::<Status>().unwrap(), Status::Pending);
        assert_eq!("Em Dia".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!("Em Risco".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!("Atrasado".parse::<Status>().unwrap(), Status::InProgress);
    }

    #[test]
    fn legacy_labels_deserialize_as_aliases() {
        let status: Status = serde_json::from_str("\"Atrasado\"").unwrap();
        assert_eq!(status, Status::InProgress);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"Em execução\"");
    }

    #[test]
    fn unknown_label_is_rejected() {
        let err = "Em Andamento".parse::<Status>().unwrap_err();
        assert!(err.to_string().contains("Em Andamento"));
        assert!(serde_json::from_str::<Status>("\"Em Andamento\"").is_err());
    }

    #[test]
    fn priority_defaults_to_low() {
        assert_eq!(Priority::default(), Priority::Low);
        assert_eq!(serde_json::to_string(&Priority::Medium).unwrap(), "\"Média\"");
    }
}
