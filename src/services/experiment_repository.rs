use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::models::{Condition, Experiment, OrganizationSettings, Project, Variation};
use crate::services::kpi_compiler::{ExperimentContext, VariationDesign};
use crate::utils::{ApiError, ApiResult};

/// Read-only access to experiments and everything hanging off them
#[async_trait]
pub trait ExperimentSource: Send + Sync {
    /// Live experiment, or 404
    async fn find_experiment(&self, experiment_id: i64) -> ApiResult<Experiment>;

    /// Live project, or 404
    async fn find_project(&self, project_id: i64) -> ApiResult<Project>;

    /// Experiment, project, organization settings, variation design and live models
    async fn load_context(&self, experiment_id: i64) -> ApiResult<ExperimentContext>;
}

#[derive(Clone)]
pub struct SqliteExperimentRepository {
    pool: SqlitePool,
}

impl SqliteExperimentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_org_settings(&self, project: &Project) -> ApiResult<OrganizationSettings> {
        let organization_id = project.organization_id.ok_or_else(|| {
            ApiError::not_found(format!(
                "Organization settings for project ID {} do not exist, the project has no organization.",
                project.id
            ))
        })?;

        sqlx::query_as::<_, OrganizationSettings>(
            r#"SELECT organization_id, template_type, reaction_query_template,
                      reaction_r2d2_query_template, reaction_ctc_query_template,
                      report_query_template
               FROM organization_settings
               WHERE organization_id = ?"#,
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            ApiError::not_found(format!(
                "Organization settings for organization ID {} of project ID {} do not exist.",
                organization_id, project.id
            ))
        })
    }

    async fn load_design(&self, experiment_id: i64) -> ApiResult<VariationDesign> {
        let variations: Vec<Variation> = sqlx::query_as(
            "SELECT id, experiment_id, type, is_root FROM variations WHERE experiment_id = ? ORDER BY id",
        )
        .bind(experiment_id)
        .fetch_all(&self.pool)
        .await?;

        let conditions: Vec<Condition> = sqlx::query_as(
            r#"SELECT c.id, c.variation_id, c.name, c.nested_variation_id
               FROM conditions c
               JOIN variations v ON v.id = c.variation_id
               WHERE v.experiment_id = ?
               ORDER BY c.id"#,
        )
        .bind(experiment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(VariationDesign::new(variations, conditions))
    }

    async fn live_model_names(&self, experiment_id: i64) -> ApiResult<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT model_name FROM experiment_models WHERE experiment_id = ? AND delete_flg = 0 ORDER BY id",
        )
        .bind(experiment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }
}

#[async_trait]
impl ExperimentSource for SqliteExperimentRepository {
    async fn find_experiment(&self, experiment_id: i64) -> ApiResult<Experiment> {
        sqlx::query_as::<_, Experiment>(
            r#"SELECT id, project_id, name, device_type, schedule_start_time,
                      schedule_end_time, kpi_id, delete_flg
               FROM experiments
               WHERE id = ? AND delete_flg = 0"#,
        )
        .bind(experiment_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            ApiError::not_found(format!(
                "The experiment with given ID {} does not exist.",
                experiment_id
            ))
        })
    }

    async fn find_project(&self, project_id: i64) -> ApiResult<Project> {
        sqlx::query_as::<_, Project>(
            "SELECT id, organization_id, name, delete_flg FROM projects WHERE id = ? AND delete_flg = 0",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            ApiError::not_found(format!("The project with given ID {} does not exist.", project_id))
        })
    }

    async fn load_context(&self, experiment_id: i64) -> ApiResult<ExperimentContext> {
        let experiment = self.find_experiment(experiment_id).await?;
        let project = self.find_project(experiment.project_id).await?;
        let org_settings = self.find_org_settings(&project).await?;
        let design = self.load_design(experiment_id).await?;
        let model_names = self.live_model_names(experiment_id).await?;

        tracing::debug!(
            "Loaded experiment {} with {} variations and models {:?}",
            experiment_id,
            design.variations().len(),
            model_names
        );

        Ok(ExperimentContext { experiment, project, org_settings, design, model_names })
    }
}
