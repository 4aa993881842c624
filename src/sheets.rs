use crate::app::{ApiPath, AppState, json_error, json_ok, json_page};
use crate::auth::{self, DEMO_USER_ID};
use crate::paging::{self, PageQuery};
use axum::{
    extract::{Multipart, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Metadata record for an uploaded spreadsheet file.
///
/// The raw bytes go to the upload directory; everything the API serves comes
/// from this in-memory record. `row_count`/`column_count` stay empty until
/// the simulated processing task fills them in, and they are random numbers,
/// not derived from the file content.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheet {
    /// Unique sheet identifier
    pub id: Uuid,

    /// Name of the stored file on disk
    pub filename: String,

    /// Original filename as uploaded by the client
    pub original_name: String,

    /// Upload size in bytes
    pub file_size: u64,

    /// Time the upload was accepted
    pub upload_date: DateTime<Utc>,

    /// Whether the simulated processing pass has completed
    pub processed: bool,

    /// Simulated row count (set when processed)
    pub row_count: Option<u32>,

    /// Simulated column count (set when processed)
    pub column_count: Option<u32>,

    /// Id of the user who uploaded the file
    pub user_id: Uuid,
}

/// File extensions accepted by the upload endpoint
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["csv", "xls", "xlsx"];

/// MIME types accepted by the upload endpoint. Browsers send
/// `application/octet-stream` for xls/xlsx often enough that it stays on the
/// list, as the original allow-list did.
pub const ALLOWED_MIME_TYPES: [&str; 4] = [
    "text/csv",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/octet-stream",
];

/// Upload size cap in bytes
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Check an upload against the extension and MIME allow-lists.
///
/// # Arguments
/// * `original_name` - Client-supplied filename
/// * `content_type` - Content type of the multipart field, if any
///
/// # Returns
/// * `Result<String, String>` - The lowercase extension, or a rejection
///   message suitable for a 400 response
pub fn validate_upload(original_name: &str, content_type: Option<&str>) -> Result<String, String> {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .ok_or_else(|| "File has no extension".to_string())?;

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(format!(
            "Unsupported file type .{} (allowed: csv, xls, xlsx)",
            extension
        ));
    }

    if let Some(mime) = content_type {
        if !ALLOWED_MIME_TYPES.contains(&mime) {
            return Err(format!("Unsupported content type {}", mime));
        }
    }

    Ok(extension)
}

/// Flip a sheet to processed with the given counts.
///
/// Returns false when the sheet no longer exists; the fire-and-forget
/// processing task treats that as a no-op (the upload was deleted before its
/// timer fired).
pub fn complete_processing(state: &AppState, sheet_id: Uuid, rows: u32, cols: u32) -> bool {
    let mut sheets = state.sheets.write().unwrap();

    if let Some(sheet) = sheets.iter_mut().find(|s| s.id == sheet_id) {
        sheet.processed = true;
        sheet.row_count = Some(rows);
        sheet.column_count = Some(cols);
        true
    } else {
        false
    }
}

/// Spawn the simulated processing task for a freshly uploaded sheet.
///
/// Sleeps for the configured delay, then marks the sheet processed with
/// random row/column counts. Not cancellable and not retried.
pub fn spawn_processing(state: Arc<AppState>, sheet_id: Uuid) {
    let delay = Duration::from_millis(state.config.processing_delay_ms);

    tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        let (rows, cols) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(120..=4800), rng.gen_range(4..=18))
        };

        if complete_processing(&state, sheet_id, rows, cols) {
            info!("sheet {} processed ({} rows, {} cols)", sheet_id, rows, cols);
        } else {
            debug!("sheet {} deleted before processing finished", sheet_id);
        }
    });
}

// Web handler functions below

/// List uploaded sheets, newest first, paginated.
pub async fn list_sheets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Response {
    let (page, limit) = query.normalize();

    let mut all: Vec<Sheet> = state.sheets.read().unwrap().clone();
    all.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));

    let (window, info) = paging::paginate(&all, page, limit);
    json_page(json!(window), info).into_response()
}

/// Handle a spreadsheet upload.
///
/// Expects a multipart body with a `file` field. The file is checked against
/// the allow-lists, written to the upload directory under a generated name,
/// and registered as an unprocessed sheet; a background timer later flips the
/// processed flag.
///
/// # Returns
/// * `Response` - 201 with the new sheet record, or 400 on a rejected upload
pub async fn upload_sheet(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut original_name = None;
    let mut content_type = None;
    let mut data = Vec::new();

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }
                original_name = field.file_name().map(|name| name.to_string());
                content_type = field.content_type().map(|mime| mime.to_string());
                data = match field.bytes().await {
                    Ok(bytes) => bytes.to_vec(),
                    // Keeps the multipart error's own status, so an upload
                    // past the body cap comes back as 413, not 400.
                    Err(err) => return json_error(err.status(), &err.body_text()),
                };
            }
            Ok(None) => break,
            Err(err) => return json_error(err.status(), &err.body_text()),
        }
    }

    let Some(original_name) = original_name else {
        return json_error(StatusCode::BAD_REQUEST, "Missing file field");
    };
    if data.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "No file data received");
    }

    let extension = match validate_upload(&original_name, content_type.as_deref()) {
        Ok(extension) => extension,
        Err(message) => return json_error(StatusCode::BAD_REQUEST, &message),
    };

    // Uploads carry an optional bearer token; anonymous ones land on the
    // shared demo user.
    let user_id = auth::bearer_token(&headers)
        .and_then(auth::validate_token)
        .unwrap_or(DEMO_USER_ID);

    let id = Uuid::new_v4();
    let filename = format!("{}.{}", id.simple(), extension);
    let path = state.config.upload_dir.join(&filename);

    if let Err(err) = tokio::fs::write(&path, &data).await {
        warn!("failed to store upload {}: {}", path.display(), err);
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store file");
    }

    let sheet = Sheet {
        id,
        filename,
        original_name,
        file_size: data.len() as u64,
        upload_date: Utc::now(),
        processed: false,
        row_count: None,
        column_count: None,
        user_id,
    };

    state.sheets.write().unwrap().push(sheet.clone());
    spawn_processing(state.clone(), id);

    info!(
        "accepted upload {} ({} bytes) as sheet {}",
        sheet.original_name, sheet.file_size, sheet.id
    );

    (StatusCode::CREATED, json_ok(json!(sheet))).into_response()
}

/// Fetch a single sheet record.
pub async fn get_sheet(
    State(state): State<Arc<AppState>>,
    ApiPath(sheet_id): ApiPath<Uuid>,
) -> Response {
    let sheets = state.sheets.read().unwrap();

    match sheets.iter().find(|s| s.id == sheet_id) {
        Some(sheet) => json_ok(json!(sheet)).into_response(),
        None => json_error(StatusCode::NOT_FOUND, "Sheet not found"),
    }
}

/// Delete a sheet record and its stored file.
pub async fn delete_sheet(
    State(state): State<Arc<AppState>>,
    ApiPath(sheet_id): ApiPath<Uuid>,
) -> Response {
    let removed = {
        let mut sheets = state.sheets.write().unwrap();
        let before = sheets.len();
        let removed = sheets.iter().find(|s| s.id == sheet_id).cloned();
        sheets.retain(|s| s.id != sheet_id);
        debug_assert!(removed.is_none() || sheets.len() + 1 == before);
        removed
    };

    match removed {
        Some(sheet) => {
            // Best effort; the record is gone either way.
            let path = state.config.upload_dir.join(&sheet.filename);
            let _ = tokio::fs::remove_file(&path).await;

            info!("deleted sheet {}", sheet.id);
            json_ok(json!({ "message": "Sheet deleted", "id": sheet.id })).into_response()
        }
        None => json_error(StatusCode::NOT_FOUND, "Sheet not found"),
    }
}
