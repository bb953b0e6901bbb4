//! Homepage hero carousel images

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::team::default_true;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeroImage {
    pub id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeroImageInput {
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    pub image_url: String,
    #[serde(default)]
    pub link_url: Option<String>,
    /// Appended after the last image when omitted
    #[serde(default)]
    pub display_order: Option<i32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// One entry of a reorder request
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct DisplayOrder {
    pub id: i64,
    pub display_order: i32,
}
