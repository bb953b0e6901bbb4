//! Researcher profile model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public-facing details of a consultant or researcher, one per user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearcherProfile {
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    pub years_of_experience: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub average_rating: f64,
    pub total_ratings: i64,
    pub updated_at: DateTime<Utc>,
}

impl ResearcherProfile {
    /// Empty profile for a user who has not filled one in
    pub fn empty(user_id: i64) -> Self {
        Self {
            user_id,
            specialization: None,
            years_of_experience: 0,
            bio: None,
            photo_url: None,
            average_rating: 0.0,
            total_ratings: 0,
            updated_at: Utc::now(),
        }
    }
}

/// A researcher user joined with their profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Researcher {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub role: super::UserRole,
    pub profile: ResearcherProfile,
    /// Published papers by this researcher
    pub published_papers: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateResearcherProfileInput {
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub years_of_experience: Option<i32>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateResearcherInput {
    pub rating: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_profile() {
        let profile = ResearcherProfile::empty(7);
        assert_eq!(profile.user_id, 7);
        assert_eq!(profile.total_ratings, 0);
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("bio").is_none());
    }
}
