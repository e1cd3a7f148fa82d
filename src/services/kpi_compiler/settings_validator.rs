//! Validation of inbound and stored KPI settings

use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use serde_json::Value;
use validator::Validate;

use crate::models::KpiSettings;
use crate::utils::{ApiError, ApiResult};

pub const EMPTY_BODY_MESSAGE: &str = "JSON body may not be empty.";
pub const WRONG_FORMAT_MESSAGE: &str = "Wrong KPI Setting Format sent.";

static SCHEMA_SOURCE: &str = include_str!("kpi_settings_schema.json");

static SETTINGS_SCHEMA: Lazy<Result<JSONSchema, String>> = Lazy::new(|| -> Result<JSONSchema, String> {
    let document: Value = serde_json::from_str(SCHEMA_SOURCE).map_err(|e| e.to_string())?;
    JSONSchema::options()
        .with_draft(Draft::Draft4)
        .compile(&document)
        .map_err(|e| e.to_string())
});

fn settings_schema() -> ApiResult<&'static JSONSchema> {
    SETTINGS_SCHEMA.as_ref().map_err(|e| {
        tracing::error!("KPI settings schema failed to compile: {}", e);
        ApiError::internal_error("KPI settings schema is unavailable")
    })
}

fn is_empty_body(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Validate a request body and return the typed settings
///
/// Shape violations are all reported at once, sorted. Semantic violations
/// (duplicate names, not exactly one main KPI) share one generic message.
pub fn validate(raw: &Value) -> ApiResult<KpiSettings> {
    if is_empty_body(raw) {
        return Err(ApiError::validation_error(EMPTY_BODY_MESSAGE));
    }

    let schema = settings_schema()?;
    if let Err(errors) = schema.validate(raw) {
        let mut messages: Vec<String> = errors
            .map(|error| {
                let path = error.instance_path.to_string();
                if path.is_empty() { error.to_string() } else { format!("{} {}", path, error) }
            })
            .collect();
        messages.sort();
        return Err(ApiError::multiple_validation(messages));
    }

    let settings: KpiSettings = serde_json::from_value(raw.clone()).map_err(|e| {
        tracing::warn!("KPI settings passed the schema but not the typed model: {}", e);
        ApiError::validation_error(WRONG_FORMAT_MESSAGE)
    })?;

    check_typed(&settings)?;
    Ok(settings)
}

/// Field-level and semantic checks on typed settings
pub fn check_typed(settings: &KpiSettings) -> ApiResult<()> {
    if let Err(errors) = settings.validate() {
        tracing::warn!("KPI settings field validation failed: {}", errors);
        return Err(ApiError::validation_error(WRONG_FORMAT_MESSAGE));
    }
    if !settings.is_consistent() {
        return Err(ApiError::validation_error(WRONG_FORMAT_MESSAGE));
    }
    Ok(())
}

/// Re-check settings loaded from storage before queries are regenerated from them
pub fn revalidate_stored(stored: &str) -> ApiResult<KpiSettings> {
    let settings: KpiSettings = serde_json::from_str(stored).map_err(|e| {
        tracing::warn!("Stored KPI settings cannot be read: {}", e);
        ApiError::validation_error(WRONG_FORMAT_MESSAGE)
    })?;
    check_typed(&settings)?;
    Ok(settings)
}
