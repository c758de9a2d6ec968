//! Lifecycle status shared by every status-bearing entity.

use crate::errors::{Result, StrongroomError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a secret, datum, association or order.
///
/// Independent of the soft-delete flag: deleting a row does not move it to
/// [`EntityStatus::Deleted`], and a row in that status is still visible to
/// default reads until it is soft deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Active,
    Saving,
    Queued,
    Killed,
    PendingDelete,
    Deleted,
}

impl EntityStatus {
    /// Every accepted status, in declaration order
    pub const ALL: [EntityStatus; 6] = [
        EntityStatus::Active,
        EntityStatus::Saving,
        EntityStatus::Queued,
        EntityStatus::Killed,
        EntityStatus::PendingDelete,
        EntityStatus::Deleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Active => "active",
            EntityStatus::Saving => "saving",
            EntityStatus::Queued => "queued",
            EntityStatus::Killed => "killed",
            EntityStatus::PendingDelete => "pending_delete",
            EntityStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(EntityStatus::Active),
            "saving" => Ok(EntityStatus::Saving),
            "queued" => Ok(EntityStatus::Queued),
            "killed" => Ok(EntityStatus::Killed),
            "pending_delete" => Ok(EntityStatus::PendingDelete),
            "deleted" => Ok(EntityStatus::Deleted),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// Check that a status-bearing entity carries one of the accepted statuses.
pub fn validate_status(entity_name: &str, status: Option<&str>) -> Result<EntityStatus> {
    let raw = match status {
        Some(s) if !s.is_empty() => s,
        _ => {
            return Err(StrongroomError::validation_field(
                format!("{} status is required", entity_name),
                "status",
            ))
        }
    };

    raw.parse::<EntityStatus>().map_err(|_| {
        StrongroomError::validation_field(
            format!("Invalid status '{}' for {}", raw, entity_name),
            "status",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in EntityStatus::ALL {
            assert_eq!(status.as_str().parse::<EntityStatus>().unwrap(), status);
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::Value::String(status.as_str().to_string())
            );
        }
    }

    #[test]
    fn test_validate_status_accepts_all_known() {
        for status in EntityStatus::ALL {
            assert_eq!(validate_status("Secret", Some(status.as_str())).unwrap(), status);
        }
    }

    #[test]
    fn test_validate_status_rejects_unknown_and_missing() {
        for bad in [Some("ACTIVE"), Some("archived"), Some(""), None] {
            let err = validate_status("Secret", bad).unwrap_err();
            assert!(matches!(err, StrongroomError::Validation { .. }), "{:?}", bad);
        }
    }
}
