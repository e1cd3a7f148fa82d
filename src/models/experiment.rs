use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Model names whose experiments get `pattern_id` injected into KPI definitions
pub const PATTERN_MAPPED_MODELS: [&str; 2] = ["MPB_MODEL", "CMO_MODEL"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Experiment {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub device_type: String,
    #[schema(value_type = String)]
    pub schedule_start_time: NaiveDateTime,
    #[schema(value_type = String)]
    pub schedule_end_time: NaiveDateTime,
    pub kpi_id: Option<i64>,
    pub delete_flg: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Project {
    pub id: i64,
    pub organization_id: Option<i64>,
    pub name: String,
    pub delete_flg: bool,
}

/// One arm of an experiment's variation tree. Rows are read ordered by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Variation {
    pub id: i64,
    pub experiment_id: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub variation_type: String,
    pub is_root: bool,
}

/// A targeting condition of a variation. `nested_variation_id` makes it a nesting condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Condition {
    pub id: i64,
    pub variation_id: i64,
    pub name: String,
    pub nested_variation_id: Option<i64>,
}

/// True when any live model record of the experiment requires pattern id injection
pub fn uses_pattern_mapping<'a>(model_names: impl IntoIterator<Item = &'a str>) -> bool {
    model_names.into_iter().any(|name| PATTERN_MAPPED_MODELS.contains(&name))
}
