//! Partner organisations
//!
//! Organisations apply through the public partnerships page and land in
//! `pending`. Management approves, then publishes them to the public list,
//! or rejects them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PartnerStatus {
    #[default]
    Pending,
    Approved,
    Published,
    Rejected,
}

impl PartnerStatus {
    pub const ALL: [PartnerStatus; 4] = [
        PartnerStatus::Pending,
        PartnerStatus::Approved,
        PartnerStatus::Published,
        PartnerStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PartnerStatus::Pending => "pending",
            PartnerStatus::Approved => "approved",
            PartnerStatus::Published => "published",
            PartnerStatus::Rejected => "rejected",
        }
    }

    /// Whether management may move a partner from `self` to `to`
    pub fn can_become(&self, to: PartnerStatus) -> bool {
        use PartnerStatus::*;
        matches!(
            (self, to),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, Published)
                | (Approved, Rejected)
                | (Published, Rejected)
                | (Rejected, Approved)
        )
    }
}

impl fmt::Display for PartnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartnerStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PartnerStatus::Pending),
            "approved" => Ok(PartnerStatus::Approved),
            "published" => Ok(PartnerStatus::Published),
            "rejected" => Ok(PartnerStatus::Rejected),
            _ => Err(anyhow::anyhow!("Invalid partner status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partner {
    pub id: i64,
    pub organization_name: String,
    pub contact_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub partnership_type: String,
    pub status: PartnerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Application form and management edits share the same fields
#[derive(Debug, Clone, Deserialize)]
pub struct PartnerInput {
    pub organization_name: String,
    pub contact_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub partnership_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partner_status_flow() {
        assert!(PartnerStatus::Pending.can_become(PartnerStatus::Approved));
        assert!(PartnerStatus::Approved.can_become(PartnerStatus::Published));
        assert!(!PartnerStatus::Pending.can_become(PartnerStatus::Published));
        assert!(!PartnerStatus::Published.can_become(PartnerStatus::Pending));
        assert!(PartnerStatus::Published.can_become(PartnerStatus::Rejected));
    }

    #[test]
    fn test_partner_status_from_str() {
        for status in PartnerStatus::ALL {
            assert_eq!(PartnerStatus::from_str(status.as_str()).unwrap(), status);
        }
    }
}
