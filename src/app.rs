use crate::analytics;
use crate::auth::{self, DEMO_USER_ID, User};
use crate::config::Config;
use crate::paging::PageInfo;
use crate::processed;
use crate::profile;
use crate::sheets::{self, MAX_UPLOAD_BYTES, Sheet};
use axum::{
    Json, Router, async_trait,
    extract::{DefaultBodyLimit, FromRequest, FromRequestParts, Path as AxumPath, Request},
    http::{StatusCode, request::Parts},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::de::DeserializeOwned;
use chrono::Utc;
use log::info;
use serde_json::{Value, json};
use std::sync::{Arc, RwLock};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

/// Id of the seeded "sales" demo sheet (keyed by the analytics fixtures)
pub const DEMO_SHEET_SALES: Uuid = Uuid::from_u128(0x2001);

/// Id of the seeded "inventory" demo sheet
pub const DEMO_SHEET_INVENTORY: Uuid = Uuid::from_u128(0x2002);

/// Shared application state: configuration plus the in-memory stores.
///
/// Everything lives in process memory and is lost on restart; that is the
/// documented behavior of this demo, not an omission.
pub struct AppState {
    pub config: Config,
    pub users: RwLock<Vec<User>>,
    pub sheets: RwLock<Vec<Sheet>>,
}

impl AppState {
    /// Empty state.
    pub fn new(config: Config) -> Self {
        AppState {
            config,
            users: RwLock::new(Vec::new()),
            sheets: RwLock::new(Vec::new()),
        }
    }

    /// State pre-seeded with the demo user and two processed demo sheets,
    /// so the dashboard has data to show before any upload happens.
    pub fn with_demo_data(config: Config) -> Self {
        let state = AppState::new(config);

        state.users.write().unwrap().push(User {
            id: DEMO_USER_ID,
            name: "Demo User".to_string(),
            email: "demo@sheetboard.dev".to_string(),
            password: "demo123".to_string(),
            plan: "free".to_string(),
            created_at: Utc::now(),
        });

        {
            let mut sheets = state.sheets.write().unwrap();
            sheets.push(Sheet {
                id: DEMO_SHEET_SALES,
                filename: "demo-sales.csv".to_string(),
                original_name: "sales-2024.csv".to_string(),
                file_size: 48_213,
                upload_date: Utc::now(),
                processed: true,
                row_count: Some(1284),
                column_count: Some(9),
                user_id: DEMO_USER_ID,
            });
            sheets.push(Sheet {
                id: DEMO_SHEET_INVENTORY,
                filename: "demo-inventory.xlsx".to_string(),
                original_name: "inventory.xlsx".to_string(),
                file_size: 23_870,
                upload_date: Utc::now(),
                processed: true,
                row_count: Some(402),
                column_count: Some(6),
                user_id: DEMO_USER_ID,
            });
        }

        state
    }
}

/// Success envelope: `{"success": true, "data": ...}`
pub fn json_ok(data: Value) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

/// Success envelope for paginated lists
pub fn json_page(data: Value, pagination: PageInfo) -> Json<Value> {
    Json(json!({ "success": true, "data": data, "pagination": pagination }))
}

/// Error envelope: `{"success": false, "error": "..."}` with the given status
pub fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "error": message }))).into_response()
}

/// JSON body extractor whose rejections use the error envelope.
///
/// A malformed body through plain `Json` yields axum's plain-text rejection;
/// this wrapper keeps the status code and message but reshapes the response
/// so every error the API emits has the same shape.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_error(rejection.status(), &rejection.body_text())),
        }
    }
}

/// Path extractor whose rejections use the error envelope.
///
/// Covers non-UUID `:id` segments, which plain `Path` would reject with a
/// plain-text 400.
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AxumPath::<T>::from_request_parts(parts, state).await {
            Ok(AxumPath(value)) => Ok(ApiPath(value)),
            Err(rejection) => Err(json_error(rejection.status(), &rejection.body_text())),
        }
    }
}

async fn health() -> Json<Value> {
    json_ok(json!({ "status": "ok", "timestamp": Utc::now() }))
}

async fn not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "Route not found")
}

/// Assemble the application router.
pub fn router(state: Arc<AppState>) -> Router {
    // Profile routes sit behind the bearer-token middleware; everything else
    // is open, matching the demo API.
    let protected = Router::new()
        .route(
            "/api/users/profile",
            get(profile::get_profile)
                .post(profile::update_profile)
                .put(profile::update_profile),
        )
        .route_layer(middleware::from_fn(auth::require_auth));

    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/register", post(auth::handle_register))
        .route("/api/auth/login", post(auth::handle_login))
        .route("/api/auth/logout", post(auth::handle_logout))
        .route("/api/auth/refresh", post(auth::handle_refresh))
        .merge(protected)
        .route(
            "/api/sheets",
            get(sheets::list_sheets).post(sheets::upload_sheet),
        )
        .route(
            "/api/sheets/:id",
            get(sheets::get_sheet).delete(sheets::delete_sheet),
        )
        .route("/api/analytics/:id", get(analytics::get_analytics))
        .route(
            "/api/analytics/:id/insights",
            post(analytics::generate_insights),
        )
        .route(
            "/api/analytics/:id/charts",
            post(analytics::generate_charts),
        )
        .route(
            "/api/processed-data/:id",
            get(processed::get_processed_data),
        )
        .route(
            "/api/processed-data/:id/export",
            get(processed::export_processed_data),
        )
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server with the given configuration.
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&config.upload_dir)?;

    let state = Arc::new(AppState::with_demo_data(config));
    let app = router(state.clone());

    let listener = TcpListener::bind((state.config.host.as_str(), state.config.port)).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_seed_contains_fixture_sheets() {
        let state = AppState::with_demo_data(Config::default());

        let sheets = state.sheets.read().unwrap();
        assert_eq!(sheets.len(), 2);
        assert!(sheets.iter().all(|s| s.processed));
        assert!(sheets.iter().any(|s| s.id == DEMO_SHEET_SALES));
        assert!(sheets.iter().any(|s| s.id == DEMO_SHEET_INVENTORY));

        let users = state.users.read().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, DEMO_USER_ID);
    }

    #[test]
    fn envelopes_have_expected_shape() {
        let Json(ok) = json_ok(json!({ "x": 1 }));
        assert_eq!(ok["success"], json!(true));
        assert_eq!(ok["data"]["x"], json!(1));
    }

    async fn envelope_of(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn extractor_rejections_use_the_error_envelope() {
        use tower::ServiceExt;

        let app = router(Arc::new(AppState::new(Config::default())));

        // Non-UUID path segment
        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/sheets/not-a-uuid")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let value = envelope_of(response).await;
        assert_eq!(value["success"], json!(false));
        assert!(value["error"].is_string());

        // Malformed JSON body
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/auth/login")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let value = envelope_of(response).await;
        assert_eq!(value["success"], json!(false));
    }
}
