use crate::app::{ApiJson, AppState, json_error, json_ok};
use crate::auth::AuthUser;
use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Profile update form data
///
/// Only the supplied fields are changed; omitted ones keep their value.
#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    /// New display name
    pub name: Option<String>,

    /// New plan label
    pub plan: Option<String>,
}

/// Return the profile of the authenticated user.
///
/// The route sits behind [`crate::auth::require_auth`], so `AuthUser` is
/// always present; a missing record means the session outlived the user list
/// (e.g. a token from before a restart would not validate at all, so this is
/// effectively unreachable and mapped to 404 for safety).
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Response {
    let users = state.users.read().unwrap();

    match users.iter().find(|u| u.id == user_id) {
        Some(user) => json_ok(json!(user)).into_response(),
        None => json_error(StatusCode::NOT_FOUND, "User not found"),
    }
}

/// Update the profile of the authenticated user.
///
/// Serves both POST and PUT on `/api/users/profile`; the two verbs behave
/// identically in the original API.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Response {
    let mut users = state.users.write().unwrap();

    let Some(user) = users.iter_mut().find(|u| u.id == user_id) else {
        return json_error(StatusCode::NOT_FOUND, "User not found");
    };

    if let Some(name) = update.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return json_error(StatusCode::BAD_REQUEST, "Name cannot be empty");
        }
        user.name = name;
    }
    if let Some(plan) = update.plan {
        user.plan = plan;
    }

    json_ok(json!(user.clone())).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::DEMO_USER_ID;
    use crate::config::Config;

    fn demo_state() -> Arc<AppState> {
        Arc::new(AppState::with_demo_data(Config::default()))
    }

    #[tokio::test]
    async fn profile_roundtrip_reads_back_updates() {
        let state = demo_state();

        let response = update_profile(
            State(state.clone()),
            Extension(AuthUser(DEMO_USER_ID)),
            ApiJson(ProfileUpdate {
                name: Some("Renamed User".to_string()),
                plan: Some("pro".to_string()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = get_profile(State(state.clone()), Extension(AuthUser(DEMO_USER_ID))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let users = state.users.read().unwrap();
        let user = users.iter().find(|u| u.id == DEMO_USER_ID).unwrap();
        assert_eq!(user.name, "Renamed User");
        assert_eq!(user.plan, "pro");
    }

    #[tokio::test]
    async fn update_keeps_omitted_fields_and_rejects_empty_name() {
        let state = demo_state();

        let response = update_profile(
            State(state.clone()),
            Extension(AuthUser(DEMO_USER_ID)),
            ApiJson(ProfileUpdate {
                name: None,
                plan: Some("pro".to_string()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            state.users.read().unwrap()[0].name,
            "Demo User",
            "omitted name must be untouched"
        );

        let response = update_profile(
            State(state.clone()),
            Extension(AuthUser(DEMO_USER_ID)),
            ApiJson(ProfileUpdate {
                name: Some("   ".to_string()),
                plan: None,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_user_id_is_not_found() {
        let state = demo_state();
        let response = get_profile(
            State(state),
            Extension(AuthUser(uuid::Uuid::new_v4())),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
