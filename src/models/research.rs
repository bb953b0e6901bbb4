//! Research paper model
//!
//! Papers are written by consultants and researchers as drafts, submitted
//! for review, then published (or sent back with a reason) by management.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResearchStatus {
    #[default]
    Draft,
    /// Submitted, awaiting review
    Pending,
    Published,
    Archived,
}

impl ResearchStatus {
    pub const ALL: [ResearchStatus; 4] = [
        ResearchStatus::Draft,
        ResearchStatus::Pending,
        ResearchStatus::Published,
        ResearchStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchStatus::Draft => "draft",
            ResearchStatus::Pending => "pending",
            ResearchStatus::Published => "published",
            ResearchStatus::Archived => "archived",
        }
    }

    /// Authors may only change their paper while it is a draft
    pub fn is_editable(&self) -> bool {
        *self == ResearchStatus::Draft
    }
}

impl fmt::Display for ResearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResearchStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(ResearchStatus::Draft),
            "pending" => Ok(ResearchStatus::Pending),
            "published" => Ok(ResearchStatus::Published),
            "archived" => Ok(ResearchStatus::Archived),
            _ => Err(anyhow::anyhow!("Invalid research status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchPaper {
    pub id: i64,
    pub researcher_id: i64,
    /// Joined from the author on reads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub researcher_name: Option<String>,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub category: String,
    pub status: ResearchStatus,
    pub views: i64,
    pub likes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateResearchInput {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub pdf_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateResearchInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub pdf_url: Option<String>,
}
