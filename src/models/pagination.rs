use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const MAX_PER_PAGE: i64 = 200;

/// Highest page whose row offset still fits in an `i64`
pub const MAX_PAGE: i64 = i64::MAX / MAX_PER_PAGE;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageQuery {
    /// Page number, 1-based
    pub fn page(&self) -> i64 {
        self.page.filter(|p| *p > 0).map_or(1, |p| p.min(MAX_PAGE))
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.filter(|p| *p > 0).map_or(MAX_PER_PAGE, |p| p.min(MAX_PER_PAGE))
    }

    /// Rows skipped before this page
    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.per_page()
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct PaginationLinks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    pub first: String,
    pub last: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: i64,
    #[serde(rename = "perPage")]
    pub per_page: i64,
    pub pages: i64,
    pub total: i64,
    pub links: PaginationLinks,
}

impl Pagination {
    /// Page metadata with links rooted at `base_path`
    pub fn new(base_path: &str, page: i64, per_page: i64, total: i64) -> Self {
        let pages = (total + per_page - 1) / per_page;
        let link = |p: i64| format!("{}?perPage={}&page={}", base_path, per_page, p);

        let links = PaginationLinks {
            prev: (page > 1).then(|| link(page - 1)),
            next: (page < pages).then(|| link(page + 1)),
            first: link(1),
            last: link(pages),
        };

        Self { page, per_page, pages, total, links }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[aliases(KpiPage = PaginatedResponse<crate::models::KpiSummary>)]
pub struct PaginatedResponse<T: Serialize> {
    pub pagination: Pagination,
    pub records: Vec<T>,
}
