use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Template type served by the primary warehouse database
pub const REGULAR_TEMPLATE_TYPE: &str = "REGULAR";

/// Per-organization query templates. The template columns hold organization-authored text.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrganizationSettings {
    pub organization_id: i64,
    pub template_type: String,
    pub reaction_query_template: String,
    pub reaction_r2d2_query_template: String,
    pub reaction_ctc_query_template: String,
    pub report_query_template: String,
}

impl OrganizationSettings {
    pub fn is_regular(&self) -> bool {
        self.template_type == REGULAR_TEMPLATE_TYPE
    }
}
