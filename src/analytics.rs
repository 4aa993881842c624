use crate::app::{ApiPath, AppState, DEMO_SHEET_INVENTORY, DEMO_SHEET_SALES, json_error, json_ok};
use crate::sheets::Sheet;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use lazy_static::lazy_static;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Hand-written analytics fixtures keyed by sheet id string.
///
/// Seeded demo sheets get curated payloads; anything else falls through to
/// [`fallback_summary`]. No derivation from file content happens anywhere.
lazy_static! {
    static ref SUMMARY_FIXTURES: HashMap<String, Value> = {
        let mut fixtures = HashMap::new();
        fixtures.insert(
            DEMO_SHEET_SALES.to_string(),
            json!({
                "totalRows": 1284,
                "totalColumns": 9,
                "dataQuality": 0.97,
                "completeness": 0.99,
                "topCategories": ["Electronics", "Office", "Peripherals"],
                "monthlyTrend": [42, 51, 48, 63, 71, 69],
                "highlights": [
                    "Revenue grew 12% month over month",
                    "Electronics accounts for 46% of total units"
                ]
            }),
        );
        fixtures.insert(
            DEMO_SHEET_INVENTORY.to_string(),
            json!({
                "totalRows": 402,
                "totalColumns": 6,
                "dataQuality": 0.91,
                "completeness": 0.88,
                "topCategories": ["Warehouse A", "Warehouse B"],
                "monthlyTrend": [12, 14, 11, 15, 13, 16],
                "highlights": [
                    "18 SKUs are below the restock threshold"
                ]
            }),
        );
        fixtures
    };
}

/// Build a generic summary for a sheet with no curated fixture.
fn fallback_summary(sheet: &Sheet) -> Value {
    json!({
        "totalRows": sheet.row_count,
        "totalColumns": sheet.column_count,
        "dataQuality": 0.9,
        "completeness": 0.9,
        "topCategories": [],
        "monthlyTrend": [],
        "highlights": [
            format!("{} uploaded and processed", sheet.original_name)
        ]
    })
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

/// Return the analytics summary for a sheet.
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    ApiPath(sheet_id): ApiPath<Uuid>,
) -> Response {
    let Some(sheet) = find_sheet(&state, sheet_id) else {
        return json_error(StatusCode::NOT_FOUND, "Sheet not found");
    };

    let summary = SUMMARY_FIXTURES
        .get(&sheet_id.to_string())
        .cloned()
        .unwrap_or_else(|| fallback_summary(&sheet));

    json_ok(json!({
        "sheetId": sheet.id,
        "generatedAt": Utc::now(),
        "summary": summary,
    }))
    .into_response()
}

/// Generate the mock insight list for a sheet.
pub async fn generate_insights(
    State(state): State<Arc<AppState>>,
    ApiPath(sheet_id): ApiPath<Uuid>,
) -> Response {
    let Some(sheet) = find_sheet(&state, sheet_id) else {
        return json_error(StatusCode::NOT_FOUND, "Sheet not found");
    };

    let insights = json!([
        {
            "type": "trend",
            "title": "Upward trend detected",
            "description": format!(
                "Values in {} show a steady rise across the sampled period",
                sheet.original_name
            ),
            "confidence": 0.82
        },
        {
            "type": "outlier",
            "title": "Possible outliers",
            "description": "3 rows deviate more than two standard deviations from the mean",
            "confidence": 0.67
        },
        {
            "type": "quality",
            "title": "Missing values",
            "description": "Roughly 2% of cells in the sampled columns are empty",
            "confidence": 0.95
        }
    ]);

    json_ok(json!({
        "sheetId": sheet.id,
        "generatedAt": Utc::now(),
        "insights": insights,
    }))
    .into_response()
}

/// Generate chart placeholder configurations for a sheet.
///
/// These are layout descriptors for the dashboard, not rendered images.
pub async fn generate_charts(
    State(state): State<Arc<AppState>>,
    ApiPath(sheet_id): ApiPath<Uuid>,
) -> Response {
    let Some(sheet) = find_sheet(&state, sheet_id) else {
        return json_error(StatusCode::NOT_FOUND, "Sheet not found");
    };

    let charts = json!([
        {
            "id": "revenue-by-category",
            "type": "bar",
            "title": "Revenue by category",
            "xAxis": "category",
            "yAxis": "revenue",
            "placeholder": true
        },
        {
            "id": "units-over-time",
            "type": "line",
            "title": "Units over time",
            "xAxis": "date",
            "yAxis": "units",
            "placeholder": true
        },
        {
            "id": "regional-split",
            "type": "pie",
            "title": "Regional split",
            "dimension": "region",
            "placeholder": true
        }
    ]);

    json_ok(json!({
        "sheetId": sheet.id,
        "generatedAt": Utc::now(),
        "charts": charts,
    }))
    .into_response()
}
