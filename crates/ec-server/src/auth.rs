//! User accounts and bearer-token authentication.
//!
//! Passwords are stored as `salt$sha256(salt || password)` in hex. Login
//! issues an opaque random token kept in an in-memory session table until it
//! expires. All `/v1` routes except health, register, token and popular
//! studies require `Authorization: Bearer <token>`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::state::SharedState;

const SALT_BYTES: usize = 16;
const TOKEN_BYTES: usize = 32;

/// Unique user identifier.
pub type UserId = String;

/// Authenticated caller, inserted into request extensions by [`auth_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

/// Stored account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip)]
    password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Lower-case hex of `n` random bytes.
pub fn random_hex(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    rand::rng().fill(&mut bytes[..]);
    to_hex(&bytes)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hash_with_salt(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Salted SHA-256 password hash, `salt$digest`.
pub fn hash_password(password: &str) -> String {
    let salt = random_hex(SALT_BYTES);
    let digest = hash_with_salt(&salt, password);
    format!("{salt}${digest}")
}

/// Check `password` against a hash produced by [`hash_password`].
pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, digest)) => hash_with_salt(salt, password) == digest,
        None => false,
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// In-memory account store keyed by normalized email.
#[derive(Clone, Default)]
pub struct UserStore {
    inner: Arc<Mutex<HashMap<String, User>>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account. Fails on malformed input or a taken email.
    pub async fn register(&self, email: &str, password: &str) -> Result<User, String> {
        let email = normalize_email(email);
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(format!("invalid email address '{email}'")),
        }
        if password.is_empty() {
            return Err("password must not be empty".to_string());
        }

        let mut users = self.inner.lock().await;
        if users.contains_key(&email) {
            return Err("Email already registered".to_string());
        }
        let user = User {
            id: random_hex(16),
            email: email.clone(),
            password_hash: hash_password(password),
            created_at: Utc::now(),
        };
        users.insert(email, user.clone());
        Ok(user)
    }

    /// Account matching the credentials, if any.
    pub async fn authenticate(&self, email: &str, password: &str) -> Option<User> {
        let users = self.inner.lock().await;
        users
            .get(&normalize_email(email))
            .filter(|u| verify_password(password, &u.password_hash))
            .cloned()
    }

    pub async fn get(&self, id: &str) -> Option<User> {
        self.inner.lock().await.values().find(|u| u.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[derive(Debug, Clone)]
struct Session {
    user_id: UserId,
    expires_at: Instant,
}

/// Token → session table with a fixed time-to-live.
#[derive(Clone)]
pub struct SessionStore {
    ttl: Duration,
    inner: Arc<Mutex<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, inner: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a fresh token for `user_id`, pruning expired sessions.
    pub async fn issue(&self, user_id: &str) -> String {
        let now = Instant::now();
        let mut sessions = self.inner.lock().await;
        sessions.retain(|_, s| s.expires_at > now);
        let token = random_hex(TOKEN_BYTES);
        sessions.insert(token.clone(), Session { user_id: user_id.to_string(), expires_at: now + self.ttl });
        token
    }

    /// User owning `token`, if the token exists and has not expired.
    pub async fn validate(&self, token: &str) -> Option<UserId> {
        let mut sessions = self.inner.lock().await;
        match sessions.get(token) {
            Some(s) if s.expires_at > Instant::now() => Some(s.user_id.clone()),
            Some(_) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }
}

/// Extract Bearer token from headers.
fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
}

/// Axum middleware guarding the protected router.
pub async fn auth_middleware(
    State(state): State<SharedState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer(request.headers()) else {
        return unauthorized("missing Authorization: Bearer <token> header");
    };
    match state.sessions.validate(token).await {
        Some(user_id) => {
            request.extensions_mut().insert(AuthUser(user_id));
            next.run(request).await
        }
        None => unauthorized("invalid or expired token"),
    }
}

fn unauthorized(msg: &str) -> Response {
    let body = serde_json::json!({ "error": msg, "kind": "auth" });
    (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let h = hash_password("s3cret");
        let (salt, digest) = h.split_once('$').unwrap();
        assert_eq!(salt.len(), SALT_BYTES * 2);
        assert_eq!(digest.len(), 64);
        assert!(verify_password("s3cret", &h));
        assert!(!verify_password("S3cret", &h));
        assert!(!verify_password("s3cret", "garbage"));
        assert_ne!(hash_password("s3cret"), h);
    }

    #[test]
    fn extract_bearer_parses_header() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer abc123".parse().unwrap());
        assert_eq!(extract_bearer(&headers), Some("abc123"));

        let mut headers2 = HeaderMap::new();
        headers2.insert("authorization", "Basic abc".parse().unwrap());
        assert_eq!(extract_bearer(&headers2), None);
    }

    #[tokio::test]
    async fn register_and_authenticate() {
        let users = UserStore::new();
        let user = users.register(" Ana@Example.org ", "pw").await.unwrap();
        assert_eq!(user.email, "ana@example.org");
        assert!(users.register("ana@example.org", "other").await.is_err());
        assert!(users.register("not-an-email", "pw").await.is_err());
        assert!(users.register("b@example.org", "").await.is_err());

        assert_eq!(users.authenticate("ANA@example.org", "pw").await.unwrap().id, user.id);
        assert!(users.authenticate("ana@example.org", "wrong").await.is_none());
        assert!(users.authenticate("nobody@example.org", "pw").await.is_none());
        assert_eq!(users.get(&user.id).await.unwrap().email, user.email);
        assert_eq!(users.len().await, 1);
    }

    #[tokio::test]
    async fn sessions_expire() {
        let live = SessionStore::new(Duration::from_secs(3600));
        let token = live.issue("u1").await;
        assert_eq!(token.len(), TOKEN_BYTES * 2);
        assert_eq!(live.validate(&token).await.as_deref(), Some("u1"));
        assert_eq!(live.validate("unknown").await, None);

        let expired = SessionStore::new(Duration::ZERO);
        let token = expired.issue("u1").await;
        assert_eq!(expired.validate(&token).await, None);
    }
}
