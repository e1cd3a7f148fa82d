//! Template parameters for reaction and report queries

use serde::Serialize;

use crate::config::HiveConfig;
use crate::models::{Experiment, KpiCondition, KpiDefinition, KpiSettings, OrganizationSettings, Project};
use crate::services::kpi_compiler::pattern_resolver::{VariationDesign, pattern_identifiers};
use crate::utils::{ApiError, ApiResult};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Everything the compiler needs to know about one experiment
#[derive(Debug, Clone)]
pub struct ExperimentContext {
    pub experiment: Experiment,
    pub project: Project,
    pub org_settings: OrganizationSettings,
    pub design: VariationDesign,
    /// Names of live model records
    pub model_names: Vec<String>,
}

impl ExperimentContext {
    pub fn model_name_refs(&self) -> impl Iterator<Item = &str> {
        self.model_names.iter().map(String::as_str)
    }
}

/// Organization template a reaction fragment is rendered with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionTemplate {
    General,
    R2d2,
    ClickThroughConversion,
}

impl ReactionTemplate {
    pub fn source<'a>(&self, settings: &'a OrganizationSettings) -> &'a str {
        match self {
            Self::General => &settings.reaction_query_template,
            Self::R2d2 => &settings.reaction_r2d2_query_template,
            Self::ClickThroughConversion => &settings.reaction_ctc_query_template,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::General => "reaction",
            Self::R2d2 => "reaction_r2d2",
            Self::ClickThroughConversion => "reaction_ctc",
        }
    }
}

/// Condition group of a click-through-conversion KPI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CtcGroup {
    pub kpi: String,
    pub conditions: Vec<KpiCondition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReactionConditions {
    Plain(Vec<KpiCondition>),
    Grouped(Vec<CtcGroup>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactionParams {
    pub ghp_hive_dbname: String,
    pub reaction_table: String,
    pub kpi_name: String,
    pub kpi_conditions: ReactionConditions,
    pub experiment_id: i64,
    pub phxbanditpatterns: Vec<String>,
    pub start_datetime: String,
    pub end_datetime: String,
    /// Only the first fragment emits the session settings and table DDL
    pub settings: bool,
}

/// One reaction fragment ready to render
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionRender {
    pub template: ReactionTemplate,
    pub params: ReactionParams,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportParams {
    pub ghp_hive_dbname: String,
    pub report_table: String,
    pub kpi_names: Vec<String>,
    pub experiment_id: i64,
    pub phxbanditpatterns: Vec<String>,
    pub kpi_count: usize,
}

/// Build one render per KPI definition, in order
///
/// Every definition is checked before anything is returned, so a rejected
/// r2d2 definition means no fragment gets rendered.
pub fn build_reaction_params(
    ctx: &ExperimentContext,
    settings: &KpiSettings,
    hive: &HiveConfig,
) -> ApiResult<Vec<ReactionRender>> {
    let patterns = pattern_identifiers(&ctx.design)?;
    let start_datetime = ctx.experiment.schedule_start_time.format(DATETIME_FORMAT).to_string();
    let end_datetime = ctx.experiment.schedule_end_time.format(DATETIME_FORMAT).to_string();
    let database = hive.database_for(&ctx.org_settings).to_string();

    let mut renders = Vec::with_capacity(settings.kpi_definitions.len());
    for (index, definition) in settings.kpi_definitions.iter().enumerate() {
        let template = select_template(definition, ctx.experiment.id)?;
        let kpi_conditions = match template {
            ReactionTemplate::ClickThroughConversion => {
                ReactionConditions::Grouped(group_click_through(&definition.kpi_conditions))
            },
            _ => ReactionConditions::Plain(definition.kpi_conditions.clone()),
        };

        renders.push(ReactionRender {
            template,
            params: ReactionParams {
                ghp_hive_dbname: database.clone(),
                reaction_table: hive.reaction_table.clone(),
                kpi_name: definition.kpi_definition_name.clone(),
                kpi_conditions,
                experiment_id: ctx.experiment.id,
                phxbanditpatterns: patterns.clone(),
                start_datetime: start_datetime.clone(),
                end_datetime: end_datetime.clone(),
                settings: index == 0,
            },
        });
    }

    Ok(renders)
}

pub fn build_report_params(
    ctx: &ExperimentContext,
    settings: &KpiSettings,
    hive: &HiveConfig,
) -> ApiResult<ReportParams> {
    Ok(ReportParams {
        ghp_hive_dbname: hive.database_for(&ctx.org_settings).to_string(),
        report_table: hive.report_table.clone(),
        kpi_names: settings.definition_names(),
        experiment_id: ctx.experiment.id,
        phxbanditpatterns: pattern_identifiers(&ctx.design)?,
        kpi_count: settings.kpi_definitions.len(),
    })
}

fn select_template(definition: &KpiDefinition, experiment_id: i64) -> ApiResult<ReactionTemplate> {
    let has_r2d2 = definition.has_r2d2();
    if has_r2d2 && (definition.kpi_conditions.len() > 1 || definition.is_click_through_conversion())
    {
        tracing::warn!(
            "Rejected r2d2 KPI definition {} of experiment {}",
            definition.kpi_definition_name,
            experiment_id
        );
        return Err(ApiError::forbidden(format!(
            "KPI definition {} uses an r2d2 condition, which must be its only condition and cannot be a clickThroughConversion",
            definition.kpi_definition_name
        )));
    }

    if has_r2d2 {
        Ok(ReactionTemplate::R2d2)
    } else if definition.is_click_through_conversion() {
        Ok(ReactionTemplate::ClickThroughConversion)
    } else {
        Ok(ReactionTemplate::General)
    }
}

/// One `click_{i}` group per click condition, then the conversion group last
pub fn group_click_through(conditions: &[KpiCondition]) -> Vec<CtcGroup> {
    let (conversions, clicks): (Vec<&KpiCondition>, Vec<&KpiCondition>) =
        conditions.iter().partition(|c| c.condition_type.is_conversion());

    let mut groups: Vec<CtcGroup> = clicks
        .into_iter()
        .enumerate()
        .map(|(i, c)| CtcGroup { kpi: format!("click_{}", i), conditions: vec![c.clone()] })
        .collect();
    groups.push(CtcGroup {
        kpi: "conversion".to_string(),
        conditions: conversions.into_iter().cloned().collect(),
    });
    groups
}
