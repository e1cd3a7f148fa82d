//! Pattern id injection for model-driven experiments

use serde_json::Value;

use crate::models::uses_pattern_mapping;
use crate::services::kpi_compiler::pattern_resolver::{VariationDesign, resolve_pattern_id};
use crate::utils::ApiResult;

const PATTERN_NAME_KEY: &str = "pattern_name";
const PATTERN_ID_KEY: &str = "pattern_id";

/// Set `pattern_id` on every KPI definition that names a pattern
///
/// Only experiments running a pattern-mapped model are touched. Re-running
/// overwrites the previous ids. Returns whether injection ran.
pub fn inject_pattern_ids<'a>(
    settings: &mut Value,
    design: &VariationDesign,
    model_names: impl IntoIterator<Item = &'a str>,
) -> ApiResult<bool> {
    if !uses_pattern_mapping(model_names) {
        return Ok(false);
    }

    let Some(definitions) = settings.get_mut("kpi_definitions").and_then(Value::as_array_mut)
    else {
        return Ok(true);
    };

    for definition in definitions.iter_mut() {
        let Some(pattern_name) = find_pattern_name(definition) else {
            continue;
        };
        let pattern_id = resolve_pattern_id(design, &pattern_name)?;
        tracing::debug!("Resolved pattern {} to {}", pattern_name, pattern_id);

        if let Value::Object(map) = definition {
            map.insert(PATTERN_ID_KEY.to_string(), Value::String(pattern_id));
        }
    }

    Ok(true)
}

/// First `pattern_name` string found: own keys first, then nested values in document order
fn find_pattern_name(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(name)) = map.get(PATTERN_NAME_KEY) {
                return Some(name.clone());
            }
            map.values().find_map(find_pattern_name)
        },
        Value::Array(items) => items.iter().find_map(find_pattern_name),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Condition, Variation};
    use crate::utils::ApiError;
    use serde_json::json;

    fn design() -> VariationDesign {
        VariationDesign::new(
            vec![Variation { id: 203, experiment_id: 102, variation_type: "Target".into(), is_root: true }],
            vec![Condition {
                id: 111,
                variation_id: 203,
                name: "seed_data_condition_105".into(),
                nested_variation_id: None,
            }],
        )
    }

    #[test]
    fn test_injects_for_mapped_models() {
        let mut settings = json!({
            "based_on": "session",
            "kpi_definitions": [
                {"kpi_definition_name": "first_kpi", "main_kpi": true, "pattern_name": "seed_data_condition_105"},
                {"kpi_definition_name": "other_kpi", "main_kpi": false}
            ]
        });

        assert!(inject_pattern_ids(&mut settings, &design(), ["MPB_MODEL"]).unwrap());
        assert_eq!(settings["kpi_definitions"][0]["pattern_id"], "target__203__111");
        assert!(settings["kpi_definitions"][1].get("pattern_id").is_none());
    }

    #[test]
    fn test_skips_other_models() {
        let mut settings = json!({
            "kpi_definitions": [{"pattern_name": "seed_data_condition_105"}]
        });
        let before = settings.clone();

        assert!(!inject_pattern_ids(&mut settings, &design(), ["OTHER_MODEL"]).unwrap());
        assert_eq!(settings, before);
    }

    #[test]
    fn test_finds_nested_pattern_name_and_overwrites() {
        let mut settings = json!({
            "kpi_definitions": [{
                "pattern_id": "stale",
                "kpi_conditions": [{"condition_type": "url", "meta": {"pattern_name": "seed_data_condition_105"}}]
            }]
        });

        inject_pattern_ids(&mut settings, &design(), ["CMO_MODEL"]).unwrap();
        let once = settings.clone();
        inject_pattern_ids(&mut settings, &design(), ["CMO_MODEL"]).unwrap();

        assert_eq!(settings["kpi_definitions"][0]["pattern_id"], "target__203__111");
        assert_eq!(settings, once);
    }

    #[test]
    fn test_unknown_pattern_name_is_not_found() {
        let mut settings = json!({"kpi_definitions": [{"pattern_name": "missing"}]});
        let err = inject_pattern_ids(&mut settings, &design(), ["MPB_MODEL"]).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
