//! Query strings and small bodies shared by several handlers

use serde::Deserialize;

use crate::models::{UserRole, UserStatus};

/// `?all=true` includes hidden or inactive rows for staff
#[derive(Debug, Default, Deserialize)]
pub struct AllQuery {
    #[serde(default)]
    pub all: bool,
}

/// Extra filter on the admin user list
#[derive(Debug, Default, Deserialize)]
pub struct RoleQuery {
    #[serde(default)]
    pub role: Option<UserRole>,
}

/// Extra filter on the public research list
#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserStatusInput {
    pub status: UserStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_query_parses_role_names() {
        let query: RoleQuery = serde_json::from_str(r#"{"role":"consultant"}"#).unwrap();
        assert_eq!(query.role, Some(UserRole::Consultant));
        let empty: RoleQuery = serde_json::from_str("{}").unwrap();
        assert!(empty.role.is_none());
    }

    #[test]
    fn test_all_query_defaults_false() {
        let query: AllQuery = serde_json::from_str("{}").unwrap();
        assert!(!query.all);
    }
}
