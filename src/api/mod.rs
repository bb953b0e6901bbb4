//! API layer - HTTP handlers and routing
//!
//! Every endpoint lives under `/api`. Routers are grouped by who may call
//! them; each group carries its own role gate and the groups are merged
//! into one tree:
//! - public (no session)
//! - signed in (any role)
//! - clients
//! - authors (consultants and researchers)
//! - reviewers (consultants, management, admin)
//! - management (management, admin)
//! - admin

pub mod assignments;
pub mod auth;
pub mod common;
pub mod dashboard;
pub mod diagnostics;
pub mod hero_images;
pub mod middleware;
pub mod partnerships;
pub mod payments;
pub mod profile;
pub mod research;
pub mod researchers;
pub mod responses;
pub mod team;
pub mod upload;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the `/api` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let auth_layer =
        || axum_middleware::from_fn_with_state(state.clone(), middleware::require_auth);

    let admin_routes = Router::new()
        .nest("/admin/users", users::router())
        .nest("/admin/hero-images", hero_images::admin_router())
        .nest("/assignment-requests", assignments::admin_router())
        .nest("/payment-settings", payments::admin_settings_router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(auth_layer());

    let management_routes = Router::new()
        .nest("/admin/researchers", researchers::management_router())
        .nest("/team-members", team::management_members_router())
        .nest("/team-applications", team::management_applications_router())
        .nest("/partnerships", partnerships::management_router())
        .nest("/management/research", research::management_router())
        .nest("/management", dashboard::management_router())
        .nest("/donation-inquiry", payments::management_donations_router())
        .route_layer(axum_middleware::from_fn(middleware::require_management))
        .route_layer(auth_layer());

    let reviewer_routes = Router::new()
        .nest("/management/assignments", assignments::reviewer_router())
        .route_layer(axum_middleware::from_fn(middleware::require_reviewer))
        .route_layer(auth_layer());

    let author_routes = Router::new()
        .nest("/consultant/my-research", research::author_router())
        .nest("/profile", profile::researcher_router())
        .route_layer(axum_middleware::from_fn(middleware::require_researcher))
        .route_layer(auth_layer());

    let client_routes = Router::new()
        .nest("/assignment-requests", assignments::client_router())
        .nest("/client", dashboard::client_router())
        .route_layer(axum_middleware::from_fn(middleware::require_client))
        .route_layer(auth_layer());

    let upload_limit = state.upload_service.max_file_size() as usize + MULTIPART_OVERHEAD;
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/profile", profile::router())
        .nest("/researchers", researchers::protected_router())
        .nest("/assignment-requests", assignments::protected_router())
        .nest(
            "/upload",
            upload::router().layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route_layer(auth_layer());

    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/hero-images", hero_images::public_router())
        .nest("/researchers", researchers::public_router())
        .nest("/team-members", team::public_members_router())
        .nest("/team-applications", team::public_applications_router())
        .nest("/partnerships", partnerships::public_router())
        .nest("/assignment-requests", assignments::public_router())
        .nest("/research", research::public_router())
        .nest("/payment-settings", payments::public_settings_router())
        .nest("/donation-inquiry", payments::public_donations_router())
        .merge(diagnostics::router())
        .merge(admin_routes)
        .merge(management_routes)
        .merge(reviewer_routes)
        .merge(author_routes)
        .merge(client_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);
    let upload = &state.config.upload;

    let mut router = Router::new().nest("/api", build_api_router(state.clone()));
    if upload.public_prefix.starts_with('/') && upload.public_prefix.len() > 1 {
        router = router.nest_service(
            upload.public_prefix.trim_end_matches('/'),
            ServeDir::new(&upload.path),
        );
    }

    router
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Cookie-friendly CORS for the configured origin; `*` allows any origin
/// without credentials
fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    if origin == "*" {
        return cors.allow_origin(AllowOrigin::any());
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => cors.allow_origin(value).allow_credentials(true),
        Err(_) => {
            tracing::warn!("Invalid CORS origin {:?}; cross-origin requests disabled", origin);
            cors
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::Config;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateUserInput, UserRole};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        state: AppState,
        _uploads: TempDir,
    }

    impl TestApp {
        async fn new() -> Self {
            let pool = create_test_pool().await.unwrap();
            migrations::run_migrations(&pool).await.unwrap();
            let uploads = TempDir::new().unwrap();
            let mut config = Config::default();
            config.upload.path = uploads.path().to_path_buf();
            let cache = Arc::new(MemoryCache::new(100, Duration::from_secs(60)));

            let state = AppState::new(pool, config, cache);
            Self {
                router: build_router(state.clone()),
                state,
                _uploads: uploads,
            }
        }

        async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }

        async fn login(&self, email: &str, password: &str) -> String {
            let (status, body) = self
                .send(
                    Method::POST,
                    "/api/auth/login",
                    None,
                    Some(json!({"email": email, "password": password})),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{body}");
            body["token"].as_str().unwrap().to_string()
        }

        /// Create a user with `role` directly and sign them in
        async fn user(&self, email: &str, role: UserRole) -> (i64, String) {
            let user = self
                .state
                .user_service
                .create_user(CreateUserInput {
                    email: email.to_string(),
                    full_name: format!("{} user", role),
                    password: "password123".to_string(),
                    role: Some(role),
                    phone: None,
                })
                .await
                .unwrap();
            (user.id, self.login(email, "password123").await)
        }

        async fn register_client(&self, email: &str) -> (i64, String) {
            let (status, body) = self
                .send(
                    Method::POST,
                    "/api/auth/register",
                    None,
                    Some(json!({
                        "email": email,
                        "full_name": "Client Person",
                        "password": "password123"
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
            assert_eq!(body["user"]["role"], "client");
            (
                body["user"]["id"].as_i64().unwrap(),
                body["token"].as_str().unwrap().to_string(),
            )
        }

        async fn open_request(&self, token: &str) -> i64 {
            let (status, body) = self
                .send(
                    Method::POST,
                    "/api/assignment-requests",
                    Some(token),
                    Some(json!({
                        "title": "Second opinion",
                        "subject": "Cardiology",
                        "description": "Review of recent ECG results"
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
            body["id"].as_i64().unwrap()
        }
    }

    fn partner(name: &str) -> Value {
        json!({
            "organization_name": name,
            "contact_name": "Contact",
            "email": "contact@example.org",
            "partnership_type": "research"
        })
    }

    #[tokio::test]
    async fn test_role_gates() {
        let app = TestApp::new().await;
        let (_, client) = app.register_client("client@example.com").await;

        let (status, body) = app.send(Method::GET, "/api/admin/users", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");

        let (status, body) = app
            .send(Method::GET, "/api/admin/users", Some(&client), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");
        assert!(body["error"].is_string());

        let (status, _) = app
            .send(Method::GET, "/api/management/stats", Some(&client), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .send(Method::GET, "/api/client/stats", Some(&client), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn test_public_endpoints() {
        let app = TestApp::new().await;

        let (status, body) = app
            .send(Method::GET, "/api/assignment-requests/statuses", None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().len() >= 10);

        let (status, body) = app.send(Method::GET, "/api/test-db", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connected"], true);
        assert_eq!(body["driver"], "sqlite");

        let (status, body) = app.send(Method::GET, "/api/hero-images", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_db_report_hides_driver_errors() {
        let app = TestApp::new().await;
        app.state.pool.close().await;

        let (status, body) = app.send(Method::GET, "/api/test-db", None, None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["connected"], false);
        assert_eq!(body["error"], "Database did not answer");
    }

    #[tokio::test]
    async fn test_malformed_body_is_validation_error() {
        let app = TestApp::new().await;
        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "missing password"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_new_partner_is_pending_in_admin_list() {
        let app = TestApp::new().await;
        let (_, admin) = app.user("admin@example.com", UserRole::Admin).await;

        let (status, created) = app
            .send(Method::POST, "/api/partnerships", None, Some(partner("Acme Health")))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "pending");

        let (status, list) = app
            .send(Method::GET, "/api/partnerships/admin", Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let found = list["items"]
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["id"] == created["id"])
            .unwrap();
        assert_eq!(found["status"], "pending");

        let (_, public) = app.send(Method::GET, "/api/partnerships", None, None).await;
        assert_eq!(public, json!([]));
    }

    #[tokio::test]
    async fn test_pending_filter_only_returns_pending() {
        let app = TestApp::new().await;
        let (_, manager) = app.user("manager@example.com", UserRole::Management).await;

        let mut ids = Vec::new();
        for name in ["One", "Two", "Three"] {
            let (_, body) = app
                .send(Method::POST, "/api/partnerships", None, Some(partner(name)))
                .await;
            ids.push(body["id"].as_i64().unwrap());
        }
        let (status, _) = app
            .send(
                Method::PUT,
                &format!("/api/partnerships/{}/approve", ids[0]),
                Some(&manager),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, list) = app
            .send(
                Method::GET,
                "/api/partnerships/admin?status=pending",
                Some(&manager),
                None,
            )
            .await;
        let items = list["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|p| p["status"] == "pending"));
    }

    #[tokio::test]
    async fn test_hero_toggle_twice_restores_state() {
        let app = TestApp::new().await;
        let (_, admin) = app.user("admin@example.com", UserRole::Admin).await;

        let (status, created) = app
            .send(
                Method::POST,
                "/api/admin/hero-images",
                Some(&admin),
                Some(json!({"title": "Welcome", "image_url": "/uploads/a.jpg"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let uri = format!("/api/admin/hero-images/{}/toggle", created["id"]);

        let (_, once) = app.send(Method::PUT, &uri, Some(&admin), None).await;
        assert_ne!(once["is_active"], created["is_active"]);
        let (_, twice) = app.send(Method::PUT, &uri, Some(&admin), None).await;
        assert_eq!(twice["is_active"], created["is_active"]);

        let (_, public) = app.send(Method::GET, "/api/hero-images", None, None).await;
        assert_eq!(public.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_hero_reorder_with_unknown_id_is_not_found() {
        let app = TestApp::new().await;
        let (_, admin) = app.user("admin@example.com", UserRole::Admin).await;

        let (status, body) = app
            .send(
                Method::PUT,
                "/api/admin/hero-images/reorder",
                Some(&admin),
                Some(json!([{"id": 999, "display_order": 1}])),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_assignment_without_price_has_no_price_fields() {
        let app = TestApp::new().await;
        let (_, client) = app.register_client("client@example.com").await;
        let id = app.open_request(&client).await;

        let (status, body) = app
            .send(
                Method::GET,
                &format!("/api/assignment-requests/{}", id),
                Some(&client),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending_review");
        assert!(body.get("proposed_price").is_none());
        assert!(body.get("final_price").is_none());
    }

    #[tokio::test]
    async fn test_invalid_transition_is_refused() {
        let app = TestApp::new().await;
        let (_, client) = app.register_client("client@example.com").await;
        let (_, admin) = app.user("admin@example.com", UserRole::Admin).await;
        let id = app.open_request(&client).await;

        let (status, body) = app
            .send(
                Method::PUT,
                &format!("/api/assignment-requests/{}/status", id),
                Some(&admin),
                Some(json!({"status": "completed"})),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn test_stale_transition_is_conflict() {
        let app = TestApp::new().await;
        let (_, client) = app.register_client("client@example.com").await;
        let (_, consultant) = app.user("doc@example.com", UserRole::Consultant).await;
        let id = app.open_request(&client).await;
        let uri = format!("/api/assignment-requests/{}/status", id);

        let (status, body) = app
            .send(
                Method::PUT,
                &uri,
                Some(&consultant),
                Some(json!({"status": "under_review", "expected_status": "pending_review"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], "under_review");

        // A second reviewer still looking at the old status
        let (status, body) = app
            .send(
                Method::PUT,
                &uri,
                Some(&consultant),
                Some(json!({
                    "status": "rejected",
                    "expected_status": "pending_review",
                    "reason": "Out of scope"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_suspend_and_reactivate_round_trips() {
        let app = TestApp::new().await;
        let (_, admin) = app.user("admin@example.com", UserRole::Admin).await;
        let (client_id, _) = app.register_client("client@example.com").await;
        let uri = format!("/api/admin/users/{}", client_id);
        let status_uri = format!("{}/status", uri);

        let (_, mut before) = app.send(Method::GET, &uri, Some(&admin), None).await;
        let (status, suspended) = app
            .send(
                Method::PUT,
                &status_uri,
                Some(&admin),
                Some(json!({"status": "suspended"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(suspended["status"], "suspended");

        let (_, mut after) = app
            .send(
                Method::PUT,
                &status_uri,
                Some(&admin),
                Some(json!({"status": "active"})),
            )
            .await;
        for user in [&mut before, &mut after] {
            user.as_object_mut().unwrap().remove("updated_at");
        }
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_suspended_user_is_signed_out_and_cannot_log_in() {
        let app = TestApp::new().await;
        let (_, admin) = app.user("admin@example.com", UserRole::Admin).await;
        let (client_id, client) = app.register_client("client@example.com").await;

        let (status, _) = app.send(Method::GET, "/api/auth/me", Some(&client), None).await;
        assert_eq!(status, StatusCode::OK);

        app.send(
            Method::PUT,
            &format!("/api/admin/users/{}/status", client_id),
            Some(&admin),
            Some(json!({"status": "suspended"})),
        )
        .await;

        let (status, _) = app.send(Method::GET, "/api/auth/me", Some(&client), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "client@example.com", "password": "password123"})),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_deleted_user_leaves_user_list() {
        let app = TestApp::new().await;
        let (_, admin) = app.user("admin@example.com", UserRole::Admin).await;
        let (client_id, _) = app.register_client("client@example.com").await;

        let (status, _) = app
            .send(
                Method::DELETE,
                &format!("/api/admin/users/{}", client_id),
                Some(&admin),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, list) = app
            .send(Method::GET, "/api/admin/users?per_page=100", Some(&admin), None)
            .await;
        assert!(list["items"]
            .as_array()
            .unwrap()
            .iter()
            .all(|u| u["id"] != json!(client_id)));

        let (status, _) = app
            .send(
                Method::GET,
                &format!("/api/admin/users/{}", client_id),
                Some(&admin),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_research_review_cycle() {
        let app = TestApp::new().await;
        let (_, author) = app.user("author@example.com", UserRole::Researcher).await;
        let (_, manager) = app.user("manager@example.com", UserRole::Management).await;

        let (status, draft) = app
            .send(
                Method::POST,
                "/api/consultant/my-research",
                Some(&author),
                Some(json!({
                    "title": "Malaria trends",
                    "summary": "Ten years of data",
                    "content": "Full text",
                    "category": "Epidemiology"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{draft}");
        let id = draft["id"].as_i64().unwrap();

        let (status, _) = app
            .send(Method::GET, &format!("/api/research/{}", id), None, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        app.send(
            Method::POST,
            &format!("/api/consultant/my-research/{}/submit", id),
            Some(&author),
            None,
        )
        .await;
        let (status, published) = app
            .send(
                Method::PUT,
                &format!("/api/management/research/{}/approve", id),
                Some(&manager),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{published}");
        assert_eq!(published["status"], "published");

        let (_, list) = app
            .send(Method::GET, "/api/research?category=epidemiology", None, None)
            .await;
        assert_eq!(list["total"], 1);
    }
}
