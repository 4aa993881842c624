use crate::app::{ApiJson, AppState, json_error, json_ok};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use log::info;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// A registered application user.
///
/// Users live in a mutable in-memory list for the lifetime of the process;
/// there is no durable account store in this demo. The plaintext password is
/// kept only for mock credential checks and is never serialized into a
/// response body.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user identifier
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Email address (unique, lowercase)
    pub email: String,

    /// Mock password, compared verbatim at login
    #[serde(skip_serializing)]
    pub password: String,

    /// Subscription plan label ("free", "pro", ...)
    pub plan: String,

    /// Account creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Registration form data
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Display name for the new account
    pub name: String,

    /// Email address (must be unique)
    pub email: String,

    /// Password in plaintext (mock auth, only compared, never hashed)
    pub password: String,

    /// Optional plan; defaults to "free"
    #[serde(default)]
    pub plan: Option<String>,
}

/// Login form data
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email address of the account
    pub email: String,

    /// Password in plaintext
    pub password: String,
}

/// An authenticated user session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Id of the authenticated user
    pub user_id: Uuid,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

/// User id attached to a request by [`require_auth`].
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

/// Global sessions storage
///
/// Stores all active sessions in a thread-safe map keyed by token.
lazy_static! {
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds

/// User id attributed to uploads that arrive without a bearer token
pub const DEMO_USER_ID: Uuid = Uuid::from_u128(0x1001);

/// Mint a mock access token for a user.
///
/// The token is a plain concatenation of the user id and a millisecond
/// timestamp. It is an opaque lookup key into the session map, not a
/// verifiable credential.
fn mint_token(user_id: Uuid) -> String {
    format!("{}-{}", user_id.simple(), Utc::now().timestamp_millis())
}

/// Create a new session for an authenticated user.
///
/// # Arguments
/// * `user_id` - Id of the user to create a session for
///
/// # Returns
/// * `String` - The access token keying the new session
pub fn create_session(user_id: Uuid) -> String {
    let token = mint_token(user_id);
    let session = Session {
        user_id,
        expires_at: SystemTime::now() + Duration::from_secs(SESSION_DURATION),
    };

    let mut sessions = SESSIONS.write().unwrap();
    sessions.insert(token.clone(), session);

    token
}

/// Validate an access token.
///
/// # Arguments
/// * `token` - The token to look up
///
/// # Returns
/// * `Option<Uuid>` - The user id for the session if valid and unexpired
pub fn validate_token(token: &str) -> Option<Uuid> {
    let sessions = SESSIONS.read().unwrap();

    if let Some(session) = sessions.get(token) {
        if session.expires_at > SystemTime::now() {
            return Some(session.user_id);
        }
    }

    None
}

/// Drop a session. Unknown tokens are ignored.
pub fn revoke_token(token: &str) {
    let mut sessions = SESSIONS.write().unwrap();
    sessions.remove(token);
}

/// Exchange a valid token for a fresh one.
///
/// The old token is removed from the session map, so it cannot be replayed
/// after a refresh.
///
/// # Returns
/// * `Option<String>` - The replacement token, or None if the old one was
///   unknown or expired
pub fn refresh_session(token: &str) -> Option<String> {
    let session = {
        let mut sessions = SESSIONS.write().unwrap();
        sessions.remove(token)?
    };

    if session.expires_at <= SystemTime::now() {
        return None;
    }

    Some(create_session(session.user_id))
}

/// Pull the bearer token out of an `Authorization` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

// Web handler functions below

/// Handle user registration
///
/// Validates the submitted fields, rejects duplicate email addresses, stores
/// the new user in the in-memory list, and opens a session.
///
/// # Arguments
/// * `state` - Shared application state
/// * `req` - JSON body with name, email, password, and optional plan
///
/// # Returns
/// * `Response` - 201 with the user and token, 400 on bad input, 409 on a
///   duplicate email
pub async fn handle_register(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Response {
    let name = req.name.trim();
    let email = req.email.trim().to_lowercase();

    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return json_error(
            StatusCode::BAD_REQUEST,
            "Name, email and password are required",
        );
    }
    if !EMAIL_REGEX.is_match(&email) {
        return json_error(StatusCode::BAD_REQUEST, "Invalid email address");
    }

    let user = {
        let mut users = state.users.write().unwrap();
        if users.iter().any(|u| u.email == email) {
            return json_error(StatusCode::CONFLICT, "Email address is already registered");
        }

        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email,
            password: req.password,
            plan: req.plan.unwrap_or_else(|| "free".to_string()),
            created_at: Utc::now(),
        };
        users.push(user.clone());
        user
    };

    let token = create_session(user.id);
    info!("registered user {}", user.email);

    (
        StatusCode::CREATED,
        json_ok(json!({ "user": user, "token": token })),
    )
        .into_response()
}

/// Handle user login
///
/// Scans the in-memory user list for a matching email and compares the
/// password verbatim (mock auth). Opens a session on success.
///
/// # Returns
/// * `Response` - 200 with the user and token, or 401 on a mismatch
#[axum::debug_handler]
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Response {
    let email = req.email.trim().to_lowercase();

    let user = {
        let users = state.users.read().unwrap();
        users
            .iter()
            .find(|u| u.email == email && u.password == req.password)
            .cloned()
    };

    match user {
        Some(user) => {
            let token = create_session(user.id);
            json_ok(json!({ "user": user, "token": token })).into_response()
        }
        None => json_error(StatusCode::UNAUTHORIZED, "Invalid email or password"),
    }
}

/// Handle user logout
///
/// Drops the session for the supplied bearer token. Logging out without a
/// token, or with an unknown one, still succeeds.
pub async fn handle_logout(headers: HeaderMap) -> Response {
    if let Some(token) = bearer_token(&headers) {
        revoke_token(token);
    }

    json_ok(json!({ "message": "Logged out" })).into_response()
}

/// Handle token refresh
///
/// Exchanges a valid bearer token for a fresh one; the old token stops
/// working immediately.
///
/// # Returns
/// * `Response` - 200 with the new token, or 401 if the old token is unknown
///   or expired
pub async fn handle_refresh(headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return json_error(StatusCode::UNAUTHORIZED, "Missing bearer token");
    };

    match refresh_session(token) {
        Some(new_token) => json_ok(json!({ "token": new_token })).into_response(),
        None => json_error(StatusCode::UNAUTHORIZED, "Invalid or expired token"),
    }
}

/// Authentication middleware
///
/// Rejects requests without a valid bearer token and attaches the resolved
/// [`AuthUser`] to the request extensions for downstream handlers.
pub async fn require_auth(mut request: Request, next: Next) -> Response {
    if let Some(token) = bearer_token(request.headers()) {
        if let Some(user_id) = validate_token(token) {
            request.extensions_mut().insert(AuthUser(user_id));
            return next.run(request).await;
        }
    }

    json_error(StatusCode::UNAUTHORIZED, "Invalid or missing token")
}
