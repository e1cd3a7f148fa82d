//! KPI definition to query compiler
//!
//! Validated KPI settings plus the experiment's variation design and the
//! organization's templates go in, sanitized reaction and report query text
//! comes out. Everything here is synchronous and free of I/O.

pub mod escaper;
pub mod params;
pub mod pattern_injector;
pub mod pattern_resolver;
pub mod renderer;
pub mod settings_validator;
pub mod template;


pub use escaper::sanitize;
pub use params::{
    CtcGroup, ExperimentContext, ReactionConditions, ReactionParams, ReactionRender,
    ReactionTemplate, ReportParams, build_reaction_params, build_report_params,
    group_click_through,
};
pub use pattern_injector::inject_pattern_ids;
pub use pattern_resolver::{
    PatternTuple, VariationDesign, enumerate_patterns, pattern_identifiers, resolve_pattern_id,
};
pub use renderer::{render_reaction_query, render_report_query};
pub use template::{Template, TemplateError};

use crate::config::HiveConfig;
use crate::models::KpiSettings;
use crate::utils::ApiResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQueries {
    pub reaction_query: String,
    pub report_query: String,
}

pub fn compile_reaction_query(
    ctx: &ExperimentContext,
    settings: &KpiSettings,
    hive: &HiveConfig,
) -> ApiResult<String> {
    let renders = build_reaction_params(ctx, settings, hive)?;
    render_reaction_query(ctx, &renders)
}

pub fn compile_report_query(
    ctx: &ExperimentContext,
    settings: &KpiSettings,
    hive: &HiveConfig,
) -> ApiResult<String> {
    let params = build_report_params(ctx, settings, hive)?;
    render_report_query(ctx, &params)
}

/// Both queries, reaction first
pub fn compile_queries(
    ctx: &ExperimentContext,
    settings: &KpiSettings,
    hive: &HiveConfig,
) -> ApiResult<CompiledQueries> {
    Ok(CompiledQueries {
        reaction_query: compile_reaction_query(ctx, settings, hive)?,
        report_query: compile_report_query(ctx, settings, hive)?,
    })
}
