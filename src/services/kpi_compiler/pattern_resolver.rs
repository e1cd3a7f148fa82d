//! Variation tree walk producing pattern identifiers
//!
//! A pattern identifier is `{variation_type}__{variation_id}__{condition_id}` and names
//! the leaf condition a visitor was bucketed into.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::models::{Condition, Variation};
use crate::utils::{ApiError, ApiResult};

/// Deepest chain of nesting conditions accepted before the tree is treated as corrupt
pub const MAX_VARIATION_DEPTH: usize = 64;

/// Variation design of one experiment, flattened the way it is stored
#[derive(Debug, Clone, Default)]
pub struct VariationDesign {
    variations: Vec<Variation>,
    conditions_by_variation: HashMap<i64, Vec<Condition>>,
}

impl VariationDesign {
    /// Build from flat rows. Variations and conditions are ordered by id.
    pub fn new(mut variations: Vec<Variation>, mut conditions: Vec<Condition>) -> Self {
        variations.sort_by_key(|v| v.id);
        conditions.sort_by_key(|c| c.id);

        let mut conditions_by_variation: HashMap<i64, Vec<Condition>> = HashMap::new();
        for condition in conditions {
            conditions_by_variation.entry(condition.variation_id).or_default().push(condition);
        }

        Self { variations, conditions_by_variation }
    }

    pub fn variations(&self) -> &[Variation] {
        &self.variations
    }

    fn variation(&self, id: i64) -> Option<&Variation> {
        self.variations.iter().find(|v| v.id == id)
    }

    fn conditions_of(&self, variation_id: i64) -> &[Condition] {
        self.conditions_by_variation.get(&variation_id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn all_conditions(&self) -> impl Iterator<Item = &Condition> {
        self.variations.iter().flat_map(|v| self.conditions_of(v.id).iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternTuple {
    pub variation_type: String,
    pub variation_id: i64,
    pub condition_id: i64,
}

impl PatternTuple {
    fn new(variation: &Variation, condition_id: i64) -> Self {
        Self {
            variation_type: variation.variation_type.to_lowercase(),
            variation_id: variation.id,
            condition_id,
        }
    }
}

impl fmt::Display for PatternTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}__{}__{}", self.variation_type, self.variation_id, self.condition_id)
    }
}

/// Enumerate leaf patterns, depth first from every root variation
pub fn enumerate_patterns(design: &VariationDesign) -> ApiResult<Vec<PatternTuple>> {
    let mut patterns = Vec::new();
    let mut on_path = HashSet::new();

    for root in design.variations.iter().filter(|v| v.is_root) {
        walk(design, root, 0, &mut on_path, &mut patterns)?;
    }

    Ok(patterns)
}

fn walk(
    design: &VariationDesign,
    variation: &Variation,
    depth: usize,
    on_path: &mut HashSet<i64>,
    patterns: &mut Vec<PatternTuple>,
) -> ApiResult<()> {
    if depth >= MAX_VARIATION_DEPTH {
        return Err(ApiError::invalid_data(format!(
            "Variation tree of experiment {} is nested deeper than {} levels",
            variation.experiment_id, MAX_VARIATION_DEPTH
        )));
    }
    if !on_path.insert(variation.id) {
        return Err(ApiError::invalid_data(format!(
            "Variation {} of experiment {} is nested inside itself",
            variation.id, variation.experiment_id
        )));
    }

    for condition in design.conditions_of(variation.id) {
        match condition.nested_variation_id {
            Some(nested_id) => {
                let nested = design.variation(nested_id).ok_or_else(|| {
                    ApiError::invalid_data(format!(
                        "Condition {} points to missing variation {}",
                        condition.id, nested_id
                    ))
                })?;
                walk(design, nested, depth + 1, on_path, patterns)?;
            },
            None => patterns.push(PatternTuple::new(variation, condition.id)),
        }
    }

    on_path.remove(&variation.id);
    Ok(())
}

/// Identifier list passed to templates as `phxbanditpatterns`
pub fn pattern_identifiers(design: &VariationDesign) -> ApiResult<Vec<String>> {
    Ok(enumerate_patterns(design)?.iter().map(PatternTuple::to_string).collect())
}

/// Resolve the identifier of the single condition named `pattern_name`
pub fn resolve_pattern_id(design: &VariationDesign, pattern_name: &str) -> ApiResult<String> {
    let matches: Vec<&Condition> =
        design.all_conditions().filter(|c| c.name == pattern_name).collect();

    let condition = match matches.as_slice() {
        [] => {
            return Err(ApiError::not_found(format!(
                "Condition with pattern name {} does not exist",
                pattern_name
            )));
        },
        [single] => *single,
        many => {
            let ids: Vec<String> = many.iter().map(|c| c.id.to_string()).collect();
            return Err(ApiError::validation_error(format!(
                "Pattern name {} is ambiguous, it matches conditions {}",
                pattern_name,
                ids.join(", ")
            )));
        },
    };

    let variation = design.variation(condition.variation_id).ok_or_else(|| {
        ApiError::invalid_data(format!(
            "Condition {} belongs to missing variation {}",
            condition.id, condition.variation_id
        ))
    })?;

    Ok(PatternTuple::new(variation, condition.id).to_string())
}
