//! `/api/auth`: login, user registration, current user.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use healthguard_core::validation::{validate_password, validate_username};
use healthguard_core::{CoreError, User, UserRole};
use healthguard_db::DbError;

use super::AppState;
use crate::auth::{authenticate, hash_password, CurrentUser};
use crate::error::{ApiError, ApiResult};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

async fn login(
    State(node): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user = authenticate(node.db(), req.username.trim(), &req.password)
        .await?
        .ok_or_else(|| {
            warn!(username = %req.username, "Failed login attempt");
            ApiError::Unauthorized("Invalid username or password".to_string())
        })?;

    if !user.is_active {
        return Err(ApiError::Forbidden("Account is deactivated".to_string()));
    }

    let access_token = node.jwt().issue(&user)?;
    info!(username = %user.username, "User logged in");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        user,
    }))
}

async fn register(
    State(node): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    if !caller.is_admin() {
        return Err(ApiError::Forbidden(
            "Only admins can register new users".to_string(),
        ));
    }

    let username = validate_username(&req.username)?;
    validate_password(&req.password)?;
    let role = match req.role.as_deref() {
        Some(role) => role.parse::<UserRole>()?,
        None => UserRole::default(),
    };

    let hash = hash_password(&req.password)?;
    let user = node
        .db()
        .users()
        .create(&username, &hash, role)
        .await
        .map_err(|e| match e {
            DbError::UniqueViolation { .. } => ApiError::from(CoreError::UserExists(username.clone())),
            other => ApiError::from(other),
        })?;

    info!(username = %user.username, role = %user.role, by = %caller.username, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::node::testing::test_node;
    use crate::routes::router;
    use crate::routes::test_util::{admin_token, send};

    #[tokio::test]
    async fn test_login_and_me() {
        let node = test_node().await;
        let app = router(node.clone());

        let token = admin_token(&app).await;
        let (status, body) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "admin");
        assert_eq!(body["role"], "admin");
        assert!(body.get("password_hash").is_none());

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let node = test_node().await;
        let app = router(node.clone());

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"username": "admin", "password": "nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid username or password");

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_me_requires_token() {
        let node = test_node().await;
        let app = router(node.clone());

        let (status, _) = send(&app, Method::GET, "/api/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, Method::GET, "/api/auth/me", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_register_flow() {
        let node = test_node().await;
        let app = router(node.clone());
        let admin = admin_token(&app).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            Some(&admin),
            Some(json!({"username": "nurse", "password": "ward-7"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["role"], "viewer");
        assert_eq!(body["is_active"], true);

        // Duplicate username.
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            Some(&admin),
            Some(json!({"username": "nurse", "password": "ward-7"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "Username already exists");

        // Viewers can't register users.
        let (_, login) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"username": "nurse", "password": "ward-7"})),
        )
        .await;
        let viewer = login["access_token"].as_str().unwrap();
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            Some(viewer),
            Some(json!({"username": "intern", "password": "pass1"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let node = test_node().await;
        let app = router(node.clone());
        let admin = admin_token(&app).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            Some(&admin),
            Some(json!({"username": "ab", "password": "long-enough"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "validation_error");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            Some(&admin),
            Some(json!({"username": "auditor", "password": "long-enough", "role": "root"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_deactivated_account() {
        let node = test_node().await;
        let app = router(node.clone());
        let token = admin_token(&app).await;

        let admin = node.db().users().get_by_username("admin").await.unwrap().unwrap();
        node.db().users().set_active(&admin.uuid, false).await.unwrap();

        // Existing tokens stop working.
        let (status, _) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"username": "admin", "password": crate::node::testing::ADMIN_PASSWORD})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Account is deactivated");

        node.shutdown().await;
    }
}
