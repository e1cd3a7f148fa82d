use serde::Serialize;
use serde_json::json;

use crate::services::kpi_compiler::escaper::sanitize;
use crate::services::kpi_compiler::params::{ExperimentContext, ReactionRender, ReportParams};
use crate::services::kpi_compiler::template::Template;
use crate::utils::{ApiError, ApiResult};

/// Render every reaction fragment in order, concatenate, then sanitize
pub fn render_reaction_query(ctx: &ExperimentContext, renders: &[ReactionRender]) -> ApiResult<String> {
    let mut query = String::new();
    for render in renders {
        let source = render.template.source(&ctx.org_settings);
        query.push_str(&render_one(ctx, render.template.label(), source, &render.params)?);
    }
    Ok(sanitize(&query))
}

pub fn render_report_query(ctx: &ExperimentContext, params: &ReportParams) -> ApiResult<String> {
    let source = &ctx.org_settings.report_query_template;
    let query = render_one(ctx, "report", source, params)?;
    Ok(sanitize(&query))
}

/// Templates see their parameters under `params`
fn render_one<P: Serialize>(
    ctx: &ExperimentContext,
    label: &str,
    source: &str,
    params: &P,
) -> ApiResult<String> {
    let context = json!({ "params": serde_json::to_value(params)? });

    Template::parse(source).and_then(|template| template.render(&context)).map_err(|e| {
        tracing::error!(
            "Failed to render {} template of organization {} for experiment {}: {}",
            label,
            ctx.org_settings.organization_id,
            ctx.experiment.id,
            e
        );
        ApiError::from(e)
    })
}
