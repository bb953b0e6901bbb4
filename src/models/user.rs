//! User model
//!
//! Users authenticate by email. Their role decides which dashboards and
//! endpoints they can reach; their status decides whether they can log in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered account of any role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Login identity (unique)
    pub email: String,
    pub full_name: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub status: UserStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new active user.
    ///
    /// The password must already be hashed with
    /// `services::password::hash_password()`.
    pub fn new(email: String, full_name: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // assigned by the database
            email,
            full_name,
            password_hash,
            role,
            status: UserStatus::Active,
            phone: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Management or admin
    pub fn is_management(&self) -> bool {
        matches!(self.role, UserRole::Management | UserRole::Admin)
    }

    /// Roles allowed to review and price assignment requests
    pub fn is_reviewer(&self) -> bool {
        matches!(
            self.role,
            UserRole::Consultant | UserRole::Management | UserRole::Admin
        )
    }

    /// Roles allowed to verify payments
    pub fn is_finance(&self) -> bool {
        matches!(
            self.role,
            UserRole::Accountant | UserRole::Management | UserRole::Admin
        )
    }

    /// Roles that publish research and carry a researcher profile
    pub fn is_researcher(&self) -> bool {
        self.role.has_researcher_profile()
    }

    /// Anyone who is not a client sees every assignment
    pub fn is_staff(&self) -> bool {
        self.role != UserRole::Client
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// User role.
///
/// - Client: submits assignment requests
/// - Consultant: reviews and prices requests, publishes research
/// - Researcher: publishes research
/// - Management: runs the organisation's content and review queues
/// - Accountant: verifies payments
/// - Admin: everything, including user administration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Client,
    Consultant,
    Researcher,
    Management,
    Accountant,
    Admin,
}

impl UserRole {
    pub const ALL: [UserRole; 6] = [
        UserRole::Client,
        UserRole::Consultant,
        UserRole::Researcher,
        UserRole::Management,
        UserRole::Accountant,
        UserRole::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Client => "client",
            UserRole::Consultant => "consultant",
            UserRole::Researcher => "researcher",
            UserRole::Management => "management",
            UserRole::Accountant => "accountant",
            UserRole::Admin => "admin",
        }
    }

    pub fn has_researcher_profile(&self) -> bool {
        matches!(self, UserRole::Consultant | UserRole::Researcher)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        UserRole::ALL
            .into_iter()
            .find(|role| role.as_str() == lower)
            .ok_or_else(|| anyhow::anyhow!("Invalid user role: {}", s))
    }
}

/// Account status.
///
/// Only active users may log in. Suspension is an administrative action;
/// inactive is a dormant account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            "suspended" => Ok(UserStatus::Suspended),
            _ => Err(anyhow::anyhow!("Invalid user status: {}", s)),
        }
    }
}

/// Input for creating a user (before password hashing)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub email: String,
    pub full_name: String,
    /// Plaintext password (will be hashed)
    pub password: String,
    /// Defaults to client
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Partial update of a user
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Plaintext; hashed before storage
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub status: Option<UserStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_role(role: UserRole) -> User {
        User::new("u@test.com".to_string(), "U".to_string(), "hash".to_string(), role)
    }

    #[test]
    fn test_user_new_is_active() {
        let user = user_with_role(UserRole::Client);
        assert_eq!(user.id, 0);
        assert!(user.is_active());
        assert!(user.phone.is_none());
    }

    #[test]
    fn test_role_groups() {
        let consultant = user_with_role(UserRole::Consultant);
        let accountant = user_with_role(UserRole::Accountant);
        let management = user_with_role(UserRole::Management);
        let client = user_with_role(UserRole::Client);
        let admin = user_with_role(UserRole::Admin);

        assert!(consultant.is_reviewer());
        assert!(!consultant.is_finance());
        assert!(consultant.is_researcher());

        assert!(accountant.is_finance());
        assert!(!accountant.is_reviewer());

        assert!(management.is_reviewer());
        assert!(management.is_finance());
        assert!(management.is_management());
        assert!(!management.is_admin());

        assert!(admin.is_management());
        assert!(admin.is_reviewer());
        assert!(!admin.is_researcher());

        assert!(!client.is_staff());
        assert!(accountant.is_staff());
    }

    #[test]
    fn test_user_role_from_str() {
        assert_eq!(UserRole::from_str("admin").unwrap(), UserRole::Admin);
        assert_eq!(UserRole::from_str("Accountant").unwrap(), UserRole::Accountant);
        assert_eq!(UserRole::from_str("RESEARCHER").unwrap(), UserRole::Researcher);
        assert!(UserRole::from_str("editor").is_err());
    }

    #[test]
    fn test_user_role_display_roundtrip() {
        for role in UserRole::ALL {
            assert_eq!(UserRole::from_str(&role.to_string()).unwrap(), role);
        }
    }

    #[test]
    fn test_user_status_from_str() {
        assert_eq!(UserStatus::from_str("suspended").unwrap(), UserStatus::Suspended);
        assert_eq!(UserStatus::from_str("Inactive").unwrap(), UserStatus::Inactive);
        assert!(UserStatus::from_str("banned").is_err());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = user_with_role(UserRole::Client);
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "client");
        assert_eq!(json["status"], "active");
    }
}
