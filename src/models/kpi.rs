use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::utils::{ApiError, ApiResult};

static NO_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\S*$").unwrap());

/// Stored KPI row. At most one row per experiment, soft deleted through `delete_flg`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Kpi {
    pub id: i64,
    pub project_id: i64,
    pub experiment_id: i64,
    pub name: String,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
    pub create_time: NaiveDateTime,
    pub update_time: NaiveDateTime,
    pub delete_flg: bool,
    /// Canonical settings JSON, with injected pattern ids
    pub kpi_settings: String,
    pub reaction_query: Option<String>,
    pub if_custom_reaction_query: bool,
    pub report_query: Option<String>,
    pub if_custom_report_query: bool,
}

/// Unit a KPI is counted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasedOn {
    Overall,
    Session,
    EasyId,
    MemberId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KpiType {
    Conversion,
    Click,
    ClickThroughConversion,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    Url,
    CustomParameter,
    AddToCart,
    ConversionUrl,
    ConversionCustomParameter,
    ConversionAddToCart,
    #[serde(rename = "r2d2")]
    R2d2,
}

impl ConditionType {
    /// Conversion side of a click-through-conversion KPI
    pub fn is_conversion(&self) -> bool {
        matches!(
            self,
            Self::ConversionUrl | Self::ConversionCustomParameter | Self::ConversionAddToCart
        )
    }
}

/// One condition group of a KPI definition. Sub-conditions reach the templates verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiCondition {
    pub condition_type: ConditionType,
    #[serde(default)]
    pub conditions: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct KpiDefinition {
    #[validate(length(min = 5, max = 200), regex(path = *NO_WHITESPACE))]
    pub kpi_definition_name: String,
    pub main_kpi: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kpi_type: Option<KpiType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_id: Option<String>,
    #[serde(default)]
    pub kpi_conditions: Vec<KpiCondition>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl KpiDefinition {
    pub fn has_r2d2(&self) -> bool {
        self.kpi_conditions.iter().any(|c| c.condition_type == ConditionType::R2d2)
    }

    pub fn is_click_through_conversion(&self) -> bool {
        self.kpi_type == Some(KpiType::ClickThroughConversion)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct KpiSettings {
    pub based_on: BasedOn,
    #[validate(length(min = 1), nested)]
    pub kpi_definitions: Vec<KpiDefinition>,
}

impl KpiSettings {
    /// Name uniqueness and exactly one main KPI
    pub fn is_consistent(&self) -> bool {
        let mut names = std::collections::HashSet::new();
        let unique = self.kpi_definitions.iter().all(|d| names.insert(d.kpi_definition_name.as_str()));
        let main_count = self.kpi_definitions.iter().filter(|d| d.main_kpi).count();
        unique && main_count == 1
    }

    pub fn definition_names(&self) -> Vec<String> {
        self.kpi_definitions.iter().map(|d| d.kpi_definition_name.clone()).collect()
    }
}

/// Which generated query a custom override targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Reaction,
    Report,
}

impl QueryKind {
    /// Parse the `{type}_query` path segment
    pub fn from_path_segment(segment: &str) -> ApiResult<Self> {
        match segment.strip_suffix("_query") {
            Some("reaction") => Ok(Self::Reaction),
            Some("report") => Ok(Self::Report),
            Some(other) => Err(unsupported_query_type(other)),
            None => Err(unsupported_query_type(segment)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reaction => "reaction",
            Self::Report => "report",
        }
    }

    /// Response key reporting the customized flag, e.g. `if_reactionQuery_customized`
    pub fn customized_key(&self) -> String {
        format!("if_{}Query_customized", self.as_str())
    }
}

fn unsupported_query_type(kind: &str) -> ApiError {
    ApiError::unsupported_format(format!("The format {} is not supported.", kind))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct KpiCreatedResponse {
    #[serde(rename = "kpiId")]
    pub kpi_id: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct KpiUpdatedResponse {
    #[serde(rename = "experimentId")]
    pub experiment_id: i64,
    #[serde(rename = "kpiId")]
    pub kpi_id: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct KpiDetailResponse {
    #[schema(value_type = String, example = "session")]
    pub based_on: Value,
    #[schema(value_type = Vec<Object>)]
    pub kpi_definitions: Value,
    #[serde(rename = "experimentId")]
    pub experiment_id: i64,
    #[serde(rename = "kpiId")]
    pub kpi_id: i64,
    #[serde(rename = "reactionQuery")]
    pub reaction_query: Option<String>,
    #[serde(rename = "reportQuery")]
    pub report_query: Option<String>,
    #[serde(rename = "if_reactionQuery_customized")]
    pub if_reaction_query_customized: bool,
    #[serde(rename = "if_reportQuery_customized")]
    pub if_report_query_customized: bool,
}

impl KpiDetailResponse {
    pub fn from_kpi(kpi: &Kpi) -> ApiResult<Self> {
        let settings: Value = serde_json::from_str(&kpi.kpi_settings)?;
        Ok(Self {
            based_on: settings.get("based_on").cloned().unwrap_or(Value::Null),
            kpi_definitions: settings.get("kpi_definitions").cloned().unwrap_or(Value::Null),
            experiment_id: kpi.experiment_id,
            kpi_id: kpi.id,
            reaction_query: kpi.reaction_query.clone(),
            report_query: kpi.report_query.clone(),
            if_reaction_query_customized: kpi.if_custom_reaction_query,
            if_report_query_customized: kpi.if_custom_report_query,
        })
    }
}

/// Row of the project KPI listing
#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct KpiSummary {
    #[serde(rename = "kpiId")]
    #[sqlx(rename = "id")]
    pub kpi_id: i64,
    pub name: String,
    #[serde(rename = "updatedBy")]
    pub updated_by: Option<i64>,
    #[serde(rename = "updateTime")]
    #[schema(value_type = String)]
    pub update_time: NaiveDateTime,
    #[sqlx(rename = "delete_flg")]
    pub outdated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_kind_requires_query_suffix() {
        assert_eq!(QueryKind::from_path_segment("reaction_query").unwrap(), QueryKind::Reaction);
        assert_eq!(QueryKind::from_path_segment("report_query").unwrap(), QueryKind::Report);

        let err = QueryKind::from_path_segment("reaction").unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedFormat(_)));
        assert_eq!(err.to_string(), "The format reaction is not supported.");

        let err = QueryKind::from_path_segment("summary_query").unwrap_err();
        assert_eq!(err.to_string(), "The format summary is not supported.");
    }
}
