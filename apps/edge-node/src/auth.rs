//! Dashboard authentication.
//!
//! Access tokens are HS256 JWTs signed with `auth.secret_key`; passwords
//! are stored as argon2 PHC strings. Handlers that need a caller take a
//! [`CurrentUser`] argument.
//!
//! ```text
//! Authorization: Bearer <jwt>   ──┐
//!                                 ├──► JwtManager::validate ──► users.get_by_username ──► CurrentUser
//! GET /api/vitals/stream?token=  ─┘                                   (active only)
//! ```

use std::sync::Arc;

use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use healthguard_core::{User, UserRole};
use healthguard_db::{Database, DbResult};

use crate::error::{ApiError, ApiResult};
use crate::node::EdgeNode;

/// Username of the account created on an empty store.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,

    /// Role at issue time
    pub role: UserRole,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

/// JWT token manager.
pub struct JwtManager {
    secret: String,
    lifetime_minutes: i64,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("lifetime_minutes", &self.lifetime_minutes)
            .finish_non_exhaustive()
    }
}

impl JwtManager {
    pub fn new(secret: impl Into<String>, lifetime_minutes: i64) -> Self {
        JwtManager {
            secret: secret.into(),
            lifetime_minutes,
        }
    }

    /// Issues an access token for `user`.
    pub fn issue(&self, user: &User) -> ApiResult<String> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.lifetime_minutes);

        let claims = Claims {
            sub: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ApiError::Internal(format!("Failed to generate token: {e}")))
    }

    /// Validates signature and expiry.
    pub fn validate(&self, token: &str) -> ApiResult<Claims> {
        let token_data: TokenData<Claims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| {
            debug!(error = %e, "Token rejected");
            ApiError::Unauthorized("Could not validate credentials".to_string())
        })?;

        Ok(token_data.claims)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// =============================================================================
// Passwords
// =============================================================================

/// Hashes a password into an argon2 PHC string.
pub fn hash_password(password: &str) -> ApiResult<String> {
    use argon2::{
        password_hash::{rand_core::OsRng, SaltString},
        Argon2, PasswordHasher,
    };

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {e}")))
}

/// Checks `password` against a stored PHC string. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Creates the `admin` account when the store has no users.
///
/// Returns true if an account was created.
pub async fn seed_admin(db: &Database, password: &str) -> ApiResult<bool> {
    if db.users().count().await? > 0 {
        return Ok(false);
    }

    let hash = hash_password(password)?;
    db.users()
        .create(DEFAULT_ADMIN_USERNAME, &hash, UserRole::Admin)
        .await?;

    if password == "admin" {
        warn!("Default admin account uses the default password; change DEFAULT_ADMIN_PASSWORD");
    }
    info!(username = DEFAULT_ADMIN_USERNAME, "Seeded admin account");
    Ok(true)
}

/// Looks up a user for login. `None` for unknown usernames or wrong passwords.
pub async fn authenticate(db: &Database, username: &str, password: &str) -> DbResult<Option<User>> {
    let user = db.users().get_by_username(username).await?;
    Ok(user.filter(|u| verify_password(password, &u.password_hash)))
}

// =============================================================================
// Extractor
// =============================================================================

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

impl FromRequestParts<Arc<EdgeNode>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        node: &Arc<EdgeNode>,
    ) -> Result<Self, Self::Rejection> {
        let header_token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(extract_bearer_token)
            .map(str::to_string);

        // EventSource clients can't set headers.
        let token = match header_token {
            Some(token) => token,
            None => Query::<TokenQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(q)| q.token)
                .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?,
        };

        let claims = node.jwt().validate(&token)?;
        let user = node
            .db()
            .users()
            .get_by_username(&claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| ApiError::Unauthorized("Could not validate credentials".to_string()))?;

        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod tests {
    use healthguard_db::DbConfig;

    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: 1,
            uuid: Uuid::new_v4().to_string(),
            username: "nurse".to_string(),
            password_hash: String::new(),
            role,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test-secret", 60);
        let token = manager.issue(&user(UserRole::Viewer)).unwrap();

        let claims = manager.validate(&token).unwrap();
        assert_eq!(claims.sub, "nurse");
        assert_eq!(claims.role, UserRole::Viewer);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtManager::new("secret-a", 60)
            .issue(&user(UserRole::Admin))
            .unwrap();
        let err = JwtManager::new("secret-b", 60).validate(&token).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let manager = JwtManager::new("test-secret", -10);
        let token = manager.issue(&user(UserRole::Viewer)).unwrap();
        assert!(manager.validate(&token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("s3cret").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn test_seed_admin_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(seed_admin(&db, "pw-1234").await.unwrap());
        assert!(!seed_admin(&db, "other").await.unwrap());
        assert_eq!(db.users().count().await.unwrap(), 1);

        let admin = authenticate(&db, "admin", "pw-1234").await.unwrap().unwrap();
        assert!(admin.is_admin());
        assert!(authenticate(&db, "admin", "other").await.unwrap().is_none());
        assert!(authenticate(&db, "ghost", "pw-1234").await.unwrap().is_none());
    }
}
