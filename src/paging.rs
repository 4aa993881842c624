use serde::{Deserialize, Serialize};

/// Default number of items per page when the client does not specify one
pub const DEFAULT_LIMIT: u32 = 10;

/// Upper bound on the per-page item count
pub const MAX_LIMIT: u32 = 100;

/// Query parameters shared by all paginated list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// 1-based page number
    pub page: Option<u32>,

    /// Items per page
    pub limit: Option<u32>,
}

/// Pagination metadata attached to list responses
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl PageQuery {
    /// Resolve the raw query into an effective `(page, limit)` pair.
    ///
    /// Page numbers below 1 are bumped to 1 and the limit is clamped to
    /// `1..=MAX_LIMIT`, so a handler never has to second-guess the values.
    pub fn normalize(&self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        (page, limit)
    }
}

/// Slice one page out of an in-memory list.
///
/// Pages past the end of the list yield an empty window rather than an
/// error, matching how the list endpoints behave for out-of-range pages.
pub fn paginate<T: Clone>(items: &[T], page: u32, limit: u32) -> (Vec<T>, PageInfo) {
    let total = items.len() as u64;
    let total_pages = total.div_ceil(limit as u64) as u32;

    let start = (page as usize).saturating_sub(1).saturating_mul(limit as usize);
    let window = if start >= items.len() {
        Vec::new()
    } else {
        let end = (start + limit as usize).min(items.len());
        items[start..end].to_vec()
    };

    (
        window,
        PageInfo {
            page,
            limit,
            total,
            total_pages,
        },
    )
}
