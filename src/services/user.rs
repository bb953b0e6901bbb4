//! User service
//!
//! Registration, login/logout, session validation, profile and password
//! changes, and the admin user-management operations. Account status is
//! enforced here: only active users may log in, and suspending or deleting
//! a user revokes every session they hold.

use crate::config::AdminBootstrapConfig;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{
    CreateUserInput, ListQuery, PagedResult, Session, UpdateUserInput, User, UserRole, UserStatus,
};
use crate::services::listing;
use crate::services::password::{check_password_policy, hash_password, verify_password};
use crate::services::rate_limiter::LoginRateLimiter;
use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials
    #[error("{0}")]
    AuthenticationError(String),

    #[error("{0}")]
    ValidationError(String),

    /// Email already registered
    #[error("{0}")]
    UserExists(String),

    #[error("User not found")]
    NotFound,

    /// Account is inactive or suspended
    #[error("{0}")]
    AccountDisabled(String),

    #[error("Too many failed login attempts. Please try again later.")]
    RateLimited,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Self-registration input; the account is always a client
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub full_name: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl RegisterInput {
    pub fn new(
        email: impl Into<String>,
        full_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            full_name: full_name.into(),
            password: password.into(),
            phone: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Fields a user may change on their own account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileInput {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordInput {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    rate_limiter: Arc<LoginRateLimiter>,
    session_expiration_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        rate_limiter: Arc<LoginRateLimiter>,
    ) -> Self {
        Self::with_session_expiration(
            user_repo,
            session_repo,
            rate_limiter,
            DEFAULT_SESSION_EXPIRATION_DAYS,
        )
    }

    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        rate_limiter: Arc<LoginRateLimiter>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            rate_limiter,
            session_expiration_days,
        }
    }

    pub fn rate_limiter(&self) -> &Arc<LoginRateLimiter> {
        &self.rate_limiter
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Register a new client account
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let email = normalize_email(&input.email);
        let full_name = input.full_name.trim().to_string();
        validate_identity(&email, &full_name)?;
        check_password_policy(&input.password).map_err(UserServiceError::ValidationError)?;
        self.ensure_email_free(&email, None).await?;

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let mut user = User::new(email, full_name, password_hash, UserRole::Client);
        user.phone = non_empty(input.phone);

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;
        tracing::info!("Registered client {} ({})", created.id, created.email);
        Ok(created)
    }

    /// Check credentials and open a session.
    ///
    /// Failed attempts count against the email in the rate limiter; a
    /// successful login clears them.
    pub async fn login(&self, input: LoginInput) -> Result<(Session, User), UserServiceError> {
        let email = normalize_email(&input.email);
        if self.rate_limiter.is_limited(&email).await {
            tracing::warn!("Login rate limit hit for {}", email);
            return Err(UserServiceError::RateLimited);
        }

        let user = match self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to get user by email")?
        {
            Some(user) => user,
            None => {
                self.rate_limiter.record_failure(&email).await;
                return Err(invalid_credentials());
            }
        };

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            self.rate_limiter.record_failure(&email).await;
            return Err(invalid_credentials());
        }

        if !user.is_active() {
            return Err(UserServiceError::AccountDisabled(format!(
                "Your account is {}. Please contact the administrator.",
                user.status
            )));
        }

        self.rate_limiter.clear(&email).await;
        let session = self.create_session(user.id).await?;
        tracing::info!("User {} logged in", user.id);
        Ok((session, user))
    }

    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Expired sessions are deleted. A session whose user is no longer
    /// active resolves to `None`.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            let _ = self.session_repo.delete(token).await;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user.filter(User::is_active))
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }

    // ========================================================================
    // Own account
    // ========================================================================

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?;
        Ok(user)
    }

    pub async fn get_required(&self, id: i64) -> Result<User, UserServiceError> {
        self.get_by_id(id).await?.ok_or(UserServiceError::NotFound)
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        let mut user = self.get_required(user_id).await?;

        if let Some(full_name) = input.full_name {
            user.full_name = full_name.trim().to_string();
        }
        if let Some(email) = input.email {
            let email = normalize_email(&email);
            if email != user.email {
                self.ensure_email_free(&email, Some(user.id)).await?;
                user.email = email;
            }
        }
        if let Some(phone) = input.phone {
            user.phone = non_empty(Some(phone));
        }
        validate_identity(&user.email, &user.full_name)?;

        self.save(user).await
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        input: ChangePasswordInput,
    ) -> Result<(), UserServiceError> {
        let mut user = self.get_required(user_id).await?;

        let current_ok = verify_password(&input.current_password, &user.password_hash)
            .context("Failed to verify password")?;
        if !current_ok {
            return Err(UserServiceError::AuthenticationError(
                "Current password is incorrect".to_string(),
            ));
        }
        if input.new_password != input.confirm_password {
            return Err(UserServiceError::ValidationError(
                "New passwords do not match".to_string(),
            ));
        }
        check_password_policy(&input.new_password).map_err(UserServiceError::ValidationError)?;

        user.password_hash =
            hash_password(&input.new_password).context("Failed to hash password")?;
        self.save(user).await?;
        tracing::info!("User {} changed their password", user_id);
        Ok(())
    }

    // ========================================================================
    // Administration
    // ========================================================================

    /// All users, newest first
    pub async fn list_users(&self) -> Result<Vec<User>, UserServiceError> {
        let users = self.user_repo.list().await.context("Failed to list users")?;
        Ok(users)
    }

    /// Filtered, paged user list for the admin screen
    pub async fn search_users(
        &self,
        query: &ListQuery,
        role: Option<UserRole>,
    ) -> Result<PagedResult<User>, UserServiceError> {
        let mut users = self.list_users().await?;
        if let Some(role) = role {
            users.retain(|u| u.role == role);
        }
        Ok(listing::apply(users, query))
    }

    /// Create a user with any role (admin)
    pub async fn create_user(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let email = normalize_email(&input.email);
        let full_name = input.full_name.trim().to_string();
        validate_identity(&email, &full_name)?;
        check_password_policy(&input.password).map_err(UserServiceError::ValidationError)?;
        self.ensure_email_free(&email, None).await?;

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let mut user = User::new(email, full_name, password_hash, input.role.unwrap_or_default());
        user.phone = non_empty(input.phone);

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;
        tracing::info!("Created {} account {}", created.role, created.id);
        Ok(created)
    }

    /// Apply an admin edit. `acting_id` is the admin performing it.
    pub async fn update_user(
        &self,
        id: i64,
        input: UpdateUserInput,
        acting_id: i64,
    ) -> Result<User, UserServiceError> {
        let mut user = self.get_required(id).await?;

        if let Some(email) = input.email {
            let email = normalize_email(&email);
            if email != user.email {
                self.ensure_email_free(&email, Some(user.id)).await?;
                user.email = email;
            }
        }
        if let Some(full_name) = input.full_name {
            user.full_name = full_name.trim().to_string();
        }
        if let Some(phone) = input.phone {
            user.phone = non_empty(Some(phone));
        }
        if let Some(password) = input.password {
            check_password_policy(&password).map_err(UserServiceError::ValidationError)?;
            user.password_hash = hash_password(&password).context("Failed to hash password")?;
        }
        if let Some(role) = input.role {
            if id == acting_id && role != user.role {
                return Err(UserServiceError::ValidationError(
                    "You cannot change your own role".to_string(),
                ));
            }
            user.role = role;
        }
        let previous_status = user.status;
        if let Some(status) = input.status {
            if id == acting_id && status != UserStatus::Active {
                return Err(UserServiceError::ValidationError(
                    "You cannot deactivate your own account".to_string(),
                ));
            }
            user.status = status;
        }
        validate_identity(&user.email, &user.full_name)?;

        let updated = self.save(user).await?;
        if previous_status != updated.status {
            self.after_status_change(&updated).await?;
        }
        Ok(updated)
    }

    /// Set a user's account status; anything but active revokes their sessions
    pub async fn set_status(
        &self,
        id: i64,
        status: UserStatus,
        acting_id: i64,
    ) -> Result<User, UserServiceError> {
        if id == acting_id && status != UserStatus::Active {
            return Err(UserServiceError::ValidationError(
                "You cannot deactivate your own account".to_string(),
            ));
        }
        let mut user = self.get_required(id).await?;
        if user.status == status {
            return Ok(user);
        }
        user.status = status;
        let updated = self.save(user).await?;
        self.after_status_change(&updated).await?;
        Ok(updated)
    }

    pub async fn delete_user(&self, id: i64, acting_id: i64) -> Result<(), UserServiceError> {
        if id == acting_id {
            return Err(UserServiceError::ValidationError(
                "You cannot delete your own account".to_string(),
            ));
        }
        self.session_repo
            .delete_by_user(id)
            .await
            .context("Failed to revoke sessions")?;
        let deleted = self
            .user_repo
            .delete(id)
            .await
            .context("Failed to delete user")?;
        if !deleted {
            return Err(UserServiceError::NotFound);
        }
        tracing::info!("Deleted user {}", id);
        Ok(())
    }

    pub async fn count_by_role(&self) -> Result<Vec<(UserRole, i64)>, UserServiceError> {
        let counts = self
            .user_repo
            .count_by_role()
            .await
            .context("Failed to count users")?;
        Ok(counts)
    }

    /// Create the configured admin account when no admin exists yet
    pub async fn ensure_admin(
        &self,
        config: &AdminBootstrapConfig,
    ) -> Result<Option<User>, UserServiceError> {
        let (Some(email), Some(password)) = (&config.email, &config.password) else {
            return Ok(None);
        };

        let has_admin = self
            .count_by_role()
            .await?
            .iter()
            .any(|(role, count)| *role == UserRole::Admin && *count > 0);
        if has_admin {
            return Ok(None);
        }

        let admin = self
            .create_user(CreateUserInput {
                email: email.clone(),
                full_name: config
                    .full_name
                    .clone()
                    .unwrap_or_else(|| "Administrator".to_string()),
                password: password.clone(),
                role: Some(UserRole::Admin),
                phone: None,
            })
            .await?;
        Ok(Some(admin))
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn ensure_email_free(
        &self,
        email: &str,
        owner: Option<i64>,
    ) -> Result<(), UserServiceError> {
        let existing = self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to check email")?;
        match existing {
            Some(user) if Some(user.id) != owner => Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            ))),
            _ => Ok(()),
        }
    }

    async fn save(&self, mut user: User) -> Result<User, UserServiceError> {
        user.updated_at = Utc::now();
        let updated = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user")?;
        Ok(updated)
    }

    async fn after_status_change(&self, user: &User) -> Result<(), UserServiceError> {
        tracing::info!("User {} is now {}", user.id, user.status);
        if !user.is_active() {
            let revoked = self
                .session_repo
                .delete_by_user(user.id)
                .await
                .context("Failed to revoke sessions")?;
            tracing::info!("Revoked {} session(s) of user {}", revoked, user.id);
        }
        Ok(())
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let session = Session::issue(user_id, self.session_expiration_days);
        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;
        Ok(created)
    }
}

fn invalid_credentials() -> UserServiceError {
    UserServiceError::AuthenticationError("Invalid email or password".to_string())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_identity(email: &str, full_name: &str) -> Result<(), UserServiceError> {
    if email.is_empty() {
        return Err(UserServiceError::ValidationError(
            "Email cannot be empty".to_string(),
        ));
    }
    if !email.contains('@') {
        return Err(UserServiceError::ValidationError(
            "Invalid email format".to_string(),
        ));
    }
    if full_name.is_empty() {
        return Err(UserServiceError::ValidationError(
            "Full name cannot be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_service() -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
            Arc::new(LoginRateLimiter::default()),
        )
    }

    async fn admin(service: &UserService) -> User {
        service
            .create_user(CreateUserInput {
                email: "admin@example.com".to_string(),
                full_name: "Admin".to_string(),
                password: "adminpass".to_string(),
                role: Some(UserRole::Admin),
                phone: None,
            })
            .await
            .unwrap()
    }

    // ========================================================================
    // Registration and login
    // ========================================================================

    #[tokio::test]
    async fn test_register_creates_client() {
        let service = setup_test_service().await;
        let user = service
            .register(RegisterInput::new(" Pat@Example.com ", "Pat", "password123"))
            .await
            .unwrap();

        assert_eq!(user.role, UserRole::Client);
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.email, "pat@example.com");
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let service = setup_test_service().await;

        let short = service
            .register(RegisterInput::new("a@example.com", "A", "short"))
            .await;
        assert!(matches!(short, Err(UserServiceError::ValidationError(_))));

        let no_at = service
            .register(RegisterInput::new("invalid-email", "A", "password123"))
            .await;
        assert!(matches!(no_at, Err(UserServiceError::ValidationError(_))));

        let no_name = service
            .register(RegisterInput::new("a@example.com", "  ", "password123"))
            .await;
        assert!(matches!(no_name, Err(UserServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_register_duplicate_email_fails() {
        let service = setup_test_service().await;
        service
            .register(RegisterInput::new("same@example.com", "One", "password123"))
            .await
            .unwrap();

        let result = service
            .register(RegisterInput::new("SAME@example.com", "Two", "password456"))
            .await;
        assert!(matches!(result, Err(UserServiceError::UserExists(_))));
    }

    #[tokio::test]
    async fn test_login_and_validate_session() {
        let service = setup_test_service().await;
        let user = service
            .register(RegisterInput::new("c@example.com", "C", "password123"))
            .await
            .unwrap();

        let (session, logged_in) = service
            .login(LoginInput::new("C@example.com", "password123"))
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);

        let resolved = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(resolved.id, user.id);

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_wrong_password_fails() {
        let service = setup_test_service().await;
        service
            .register(RegisterInput::new("c@example.com", "C", "password123"))
            .await
            .unwrap();

        let result = service.login(LoginInput::new("c@example.com", "wrongpass")).await;
        assert!(matches!(result, Err(UserServiceError::AuthenticationError(_))));

        let result = service.login(LoginInput::new("nobody@example.com", "password123")).await;
        assert!(matches!(result, Err(UserServiceError::AuthenticationError(_))));
    }

    #[tokio::test]
    async fn test_login_rate_limited_after_repeated_failures() {
        let service = setup_test_service().await;
        service
            .register(RegisterInput::new("c@example.com", "C", "password123"))
            .await
            .unwrap();

        for _ in 0..5 {
            let result = service.login(LoginInput::new("c@example.com", "wrongpass")).await;
            assert!(matches!(result, Err(UserServiceError::AuthenticationError(_))));
        }

        // even the right password is refused while locked out
        let result = service.login(LoginInput::new("c@example.com", "password123")).await;
        assert!(matches!(result, Err(UserServiceError::RateLimited)));
    }

    // ========================================================================
    // Status and administration
    // ========================================================================

    #[tokio::test]
    async fn test_suspended_user_cannot_login_and_loses_sessions() {
        let service = setup_test_service().await;
        let admin = admin(&service).await;
        let user = service
            .register(RegisterInput::new("c@example.com", "C", "password123"))
            .await
            .unwrap();
        let (session, _) = service
            .login(LoginInput::new("c@example.com", "password123"))
            .await
            .unwrap();

        service
            .set_status(user.id, UserStatus::Suspended, admin.id)
            .await
            .unwrap();

        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        let result = service.login(LoginInput::new("c@example.com", "password123")).await;
        assert!(matches!(result, Err(UserServiceError::AccountDisabled(_))));
    }

    #[tokio::test]
    async fn test_suspend_then_reactivate_round_trips() {
        let service = setup_test_service().await;
        let admin = admin(&service).await;
        let mut input = RegisterInput::new("c@example.com", "Casey", "password123");
        input.phone = Some("+233 20 000 0000".to_string());
        let original = service.register(input).await.unwrap();

        service
            .set_status(original.id, UserStatus::Suspended, admin.id)
            .await
            .unwrap();
        let restored = service
            .set_status(original.id, UserStatus::Active, admin.id)
            .await
            .unwrap();

        assert_eq!(restored.status, UserStatus::Active);
        assert_eq!(restored.email, original.email);
        assert_eq!(restored.full_name, original.full_name);
        assert_eq!(restored.role, original.role);
        assert_eq!(restored.phone, original.phone);
        assert_eq!(restored.password_hash, original.password_hash);
    }

    #[tokio::test]
    async fn test_admin_cannot_lock_themselves_out() {
        let service = setup_test_service().await;
        let admin = admin(&service).await;

        let result = service
            .set_status(admin.id, UserStatus::Suspended, admin.id)
            .await;
        assert!(matches!(result, Err(UserServiceError::ValidationError(_))));

        let result = service.delete_user(admin.id, admin.id).await;
        assert!(matches!(result, Err(UserServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_deleted_user_disappears_from_list() {
        let service = setup_test_service().await;
        let admin = admin(&service).await;
        let user = service
            .register(RegisterInput::new("c@example.com", "C", "password123"))
            .await
            .unwrap();

        service.delete_user(user.id, admin.id).await.unwrap();

        let users = service.list_users().await.unwrap();
        assert!(users.iter().all(|u| u.id != user.id));
        assert!(matches!(
            service.delete_user(user.id, admin.id).await,
            Err(UserServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_search_users_by_role_and_text() {
        let service = setup_test_service().await;
        admin(&service).await;
        service
            .register(RegisterInput::new("pat@example.com", "Pat Client", "password123"))
            .await
            .unwrap();
        service
            .register(RegisterInput::new("sam@example.com", "Sam Client", "password123"))
            .await
            .unwrap();

        let clients = service
            .search_users(&ListQuery::default(), Some(UserRole::Client))
            .await
            .unwrap();
        assert_eq!(clients.total, 2);

        let query = ListQuery {
            q: Some("sam".to_string()),
            ..Default::default()
        };
        let found = service.search_users(&query, None).await.unwrap();
        assert_eq!(found.total, 1);
        assert_eq!(found.items[0].email, "sam@example.com");
    }

    #[tokio::test]
    async fn test_update_user_changes_role_and_password() {
        let service = setup_test_service().await;
        let admin = admin(&service).await;
        let user = service
            .register(RegisterInput::new("c@example.com", "C", "password123"))
            .await
            .unwrap();

        let updated = service
            .update_user(
                user.id,
                UpdateUserInput {
                    role: Some(UserRole::Consultant),
                    password: Some("newpassword".to_string()),
                    ..Default::default()
                },
                admin.id,
            )
            .await
            .unwrap();
        assert_eq!(updated.role, UserRole::Consultant);

        assert!(service
            .login(LoginInput::new("c@example.com", "newpassword"))
            .await
            .is_ok());
    }

    // ========================================================================
    // Own account
    // ========================================================================

    #[tokio::test]
    async fn test_update_profile_email_must_be_free() {
        let service = setup_test_service().await;
        service
            .register(RegisterInput::new("taken@example.com", "A", "password123"))
            .await
            .unwrap();
        let user = service
            .register(RegisterInput::new("b@example.com", "B", "password123"))
            .await
            .unwrap();

        let result = service
            .update_profile(
                user.id,
                UpdateProfileInput {
                    email: Some("taken@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(UserServiceError::UserExists(_))));

        let updated = service
            .update_profile(
                user.id,
                UpdateProfileInput {
                    full_name: Some("Bea".to_string()),
                    phone: Some("555".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.full_name, "Bea");
        assert_eq!(updated.phone.as_deref(), Some("555"));
    }

    #[tokio::test]
    async fn test_change_password_rules() {
        let service = setup_test_service().await;
        let user = service
            .register(RegisterInput::new("c@example.com", "C", "password123"))
            .await
            .unwrap();

        let wrong_current = service
            .change_password(
                user.id,
                ChangePasswordInput {
                    current_password: "nope-nope".to_string(),
                    new_password: "password456".to_string(),
                    confirm_password: "password456".to_string(),
                },
            )
            .await;
        assert!(matches!(wrong_current, Err(UserServiceError::AuthenticationError(_))));

        let mismatch = service
            .change_password(
                user.id,
                ChangePasswordInput {
                    current_password: "password123".to_string(),
                    new_password: "password456".to_string(),
                    confirm_password: "password789".to_string(),
                },
            )
            .await;
        assert!(matches!(mismatch, Err(UserServiceError::ValidationError(_))));

        service
            .change_password(
                user.id,
                ChangePasswordInput {
                    current_password: "password123".to_string(),
                    new_password: "password456".to_string(),
                    confirm_password: "password456".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(service
            .login(LoginInput::new("c@example.com", "password456"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let service = setup_test_service().await;
        let config = AdminBootstrapConfig {
            email: Some("root@example.com".to_string()),
            password: Some("rootpassword".to_string()),
            full_name: None,
        };

        let created = service.ensure_admin(&config).await.unwrap().unwrap();
        assert_eq!(created.role, UserRole::Admin);
        assert_eq!(created.full_name, "Administrator");
        assert!(service.ensure_admin(&config).await.unwrap().is_none());

        let unconfigured = AdminBootstrapConfig::default();
        assert!(service.ensure_admin(&unconfigured).await.unwrap().is_none());
    }
}
