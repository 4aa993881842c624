use crate::app::{ApiPath, AppState, json_error, json_ok, json_page};
use crate::paging::{self, PageQuery};
use crate::sheets::Sheet;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// One mock row of "processed" spreadsheet data.
///
/// Rows are generated deterministically from the sheet id, so repeated reads
/// of the same sheet page the same data. Field order here defines the CSV
/// header order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedRow {
    pub id: u32,
    pub product: String,
    pub category: String,
    pub region: String,
    pub units: u32,
    pub revenue: f64,
    pub date: String,
}

/// CSV header, matching `ProcessedRow` serialization keys in field order
pub const CSV_HEADERS: [&str; 7] = [
    "id", "product", "category", "region", "units", "revenue", "date",
];

/// Cap on generated rows regardless of the sheet's simulated row count
pub const MAX_MOCK_ROWS: u32 = 500;

const PRODUCTS: [&str; 6] = ["Notebook", "Monitor", "Keyboard", "Mouse", "Headset", "Webcam"];
const CATEGORIES: [&str; 4] = ["Electronics", "Office", "Peripherals", "Accessories"];
const REGIONS: [&str; 5] = ["North", "South", "East", "West", "Central"];

fn seed_from(id: &Uuid) -> u64 {
    id.as_bytes()
        .iter()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(*b as u64))
}

/// Generate the mock processed rows for a sheet.
///
/// The count follows the sheet's simulated `row_count`, capped at
/// [`MAX_MOCK_ROWS`]; an unprocessed sheet yields no rows.
pub fn mock_rows(sheet: &Sheet) -> Vec<ProcessedRow> {
    let count = sheet.row_count.unwrap_or(0).min(MAX_MOCK_ROWS) as usize;
    let seed = seed_from(&sheet.id);

    (1..=count)
        .map(|i| {
            let k = seed.wrapping_add(i as u64).wrapping_mul(2654435761);
            let date = sheet.upload_date - Duration::days((k % 30) as i64);

            ProcessedRow {
                id: i as u32,
                product: PRODUCTS[(k % PRODUCTS.len() as u64) as usize].to_string(),
                category: CATEGORIES[(k % CATEGORIES.len() as u64) as usize].to_string(),
                region: REGIONS[(k % REGIONS.len() as u64) as usize].to_string(),
                units: (k % 90 + 10) as u32,
                revenue: ((k % 90_000 + 10_000) as f64) / 100.0,
                date: date.format("%Y-%m-%d").to_string(),
            }
        })
        .collect()
}

/// Escape one CSV field.
///
/// Fields containing a comma, quote, or newline are wrapped in quotes with
/// embedded quotes doubled; everything else passes through untouched.
fn escape_csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Convert processed rows to CSV format.
///
/// The first line is the header row with the record keys; each following
/// line is one record with comma-separated, escaped values.
///
/// # Arguments
/// * `rows` - The rows to convert
///
/// # Returns
/// * `String` - CSV content
pub fn to_csv(rows: &[ProcessedRow]) -> String {
    let mut csv_content = String::new();

    csv_content.push_str(&CSV_HEADERS.join(","));
    csv_content.push('\n');

    for row in rows {
        let fields = [
            row.id.to_string(),
            row.product.clone(),
            row.category.clone(),
            row.region.clone(),
            row.units.to_string(),
            format!("{:.2}", row.revenue),
            row.date.clone(),
        ];

        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                csv_content.push(',');
            }
            csv_content.push_str(&escape_csv_field(field));
        }
        csv_content.push('\n');
    }

    csv_content
}

/// Export format query parameter
#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    /// One of `csv`, `json`, `pdf`; defaults to `csv`
    pub format: Option<String>,
}

fn find_sheet(state: &AppState, sheet_id: Uuid) -> Option<Sheet> {
    state
        .sheets
        .read()
        .unwrap()
        .iter()
        .find(|s| s.id == sheet_id)
        .cloned()
}

/// Return one page of a sheet's processed data.
///
/// 404 for an unknown sheet; 409 while the processing timer has not fired
/// yet (the record exists but its rows do not).
pub async fn get_processed_data(
    State(state): State<Arc<AppState>>,
    ApiPath(sheet_id): ApiPath<Uuid>,
    Query(query): Query<PageQuery>,
) -> Response {
    let Some(sheet) = find_sheet(&state, sheet_id) else {
        return json_error(StatusCode::NOT_FOUND, "Sheet not found");
    };
    if !sheet.processed {
        return json_error(StatusCode::CONFLICT, "Sheet is still processing");
    }

    let rows = mock_rows(&sheet);
    let (page, limit) = query.normalize();
    let (window, info) = paging::paginate(&rows, page, limit);

    json_page(json!(window), info).into_response()
}

/// Export a sheet's processed data.
///
/// Branches on the `format` query parameter: CSV streams a download, JSON
/// returns the serialized rows, PDF is a stub (501).
pub async fn export_processed_data(
    State(state): State<Arc<AppState>>,
    ApiPath(sheet_id): ApiPath<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Response {
    let Some(sheet) = find_sheet(&state, sheet_id) else {
        return json_error(StatusCode::NOT_FOUND, "Sheet not found");
    };
    if !sheet.processed {
        return json_error(StatusCode::CONFLICT, "Sheet is still processing");
    }

    match query.format.as_deref().unwrap_or("csv") {
        "csv" => {
            let csv = to_csv(&mock_rows(&sheet));
            let disposition = format!(
                "attachment; filename=\"{}.csv\"",
                sheet.id.simple()
            );

            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
                .header(header::CONTENT_DISPOSITION, disposition)
                .body(Body::from(csv))
                .unwrap_or_else(|_| {
                    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to build export")
                })
        }
        "json" => json_ok(json!({
            "sheetId": sheet.id,
            "rows": mock_rows(&sheet),
        }))
        .into_response(),
        "pdf" => json_error(
            StatusCode::NOT_IMPLEMENTED,
            "PDF export is not available in this demo",
        ),
        other => json_error(
            StatusCode::BAD_REQUEST,
            &format!("Unsupported export format {}", other),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn processed_sheet(row_count: u32) -> Sheet {
        Sheet {
            id: Uuid::new_v4(),
            filename: "x.csv".to_string(),
            original_name: "x.csv".to_string(),
            file_size: 1,
            upload_date: Utc::now(),
            processed: true,
            row_count: Some(row_count),
            column_count: Some(7),
            user_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn mock_rows_follow_row_count_with_cap() {
        assert_eq!(mock_rows(&processed_sheet(42)).len(), 42);
        assert_eq!(mock_rows(&processed_sheet(9000)).len(), MAX_MOCK_ROWS as usize);

        let mut unprocessed = processed_sheet(42);
        unprocessed.processed = false;
        unprocessed.row_count = None;
        assert!(mock_rows(&unprocessed).is_empty());
    }

    #[test]
    fn mock_rows_are_deterministic_per_sheet() {
        let sheet = processed_sheet(20);
        let first = mock_rows(&sheet);
        let second = mock_rows(&sheet);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.product, b.product);
            assert_eq!(a.revenue, b.revenue);
            assert_eq!(a.date, b.date);
        }
    }

    #[test]
    fn csv_header_matches_first_record_keys() {
        let rows = mock_rows(&processed_sheet(3));
        let csv = to_csv(&rows);
        let header: Vec<&str> = csv.lines().next().unwrap().split(',').collect();

        let first = serde_json::to_value(&rows[0]).unwrap();
        let mut keys: Vec<&str> = first.as_object().unwrap().keys().map(String::as_str).collect();
        let mut sorted_header = header.clone();
        keys.sort_unstable();
        sorted_header.sort_unstable();

        assert_eq!(sorted_header, keys);
        assert_eq!(header, CSV_HEADERS.to_vec());
    }

    #[test]
    fn csv_body_has_one_line_per_row() {
        let rows = mock_rows(&processed_sheet(5));
        let csv = to_csv(&rows);
        assert_eq!(csv.lines().count(), 6); // header + 5 rows
    }

    #[test]
    fn csv_escaping_wraps_special_fields() {
        assert_eq!(escape_csv_field("plain"), "plain");
        assert_eq!(escape_csv_field("a,b"), "\"a,b\"");
        assert_eq!(escape_csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[tokio::test]
    async fn processed_data_requires_a_processed_sheet() {
        let state = Arc::new(AppState::new(crate::config::Config::default()));

        let missing = get_processed_data(
            State(state.clone()),
            ApiPath(Uuid::new_v4()),
            Query(PageQuery::default()),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let mut sheet = processed_sheet(10);
        sheet.processed = false;
        let id = sheet.id;
        state.sheets.write().unwrap().push(sheet);

        let pending =
            get_processed_data(State(state), ApiPath(id), Query(PageQuery::default())).await;
        assert_eq!(pending.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn export_branches_on_format() {
        let state = Arc::new(AppState::new(crate::config::Config::default()));
        let sheet = processed_sheet(5);
        let id = sheet.id;
        state.sheets.write().unwrap().push(sheet);

        let csv = export_processed_data(
            State(state.clone()),
            ApiPath(id),
            Query(ExportQuery { format: None }),
        )
        .await;
        assert_eq!(csv.status(), StatusCode::OK);
        assert_eq!(
            csv.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/csv; charset=utf-8"
        );

        let json_export = export_processed_data(
            State(state.clone()),
            ApiPath(id),
            Query(ExportQuery {
                format: Some("json".to_string()),
            }),
        )
        .await;
        assert_eq!(json_export.status(), StatusCode::OK);

        let pdf = export_processed_data(
            State(state.clone()),
            ApiPath(id),
            Query(ExportQuery {
                format: Some("pdf".to_string()),
            }),
        )
        .await;
        assert_eq!(pdf.status(), StatusCode::NOT_IMPLEMENTED);

        let other = export_processed_data(
            State(state),
            ApiPath(id),
            Query(ExportQuery {
                format: Some("xml".to_string()),
            }),
        )
        .await;
        assert_eq!(other.status(), StatusCode::BAD_REQUEST);
    }
}
