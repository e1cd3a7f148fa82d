use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::HiveConfig;
use crate::models::{
    Kpi, KpiCreatedResponse, KpiDetailResponse, KpiSettings, KpiSummary, KpiUpdatedResponse,
    PageQuery, PaginatedResponse, Pagination, Project, QueryKind, UserContext,
};
use crate::services::casbin_service::CasbinService;
use crate::services::experiment_repository::ExperimentSource;
use crate::services::kpi_compiler::{
    self, ExperimentContext, inject_pattern_ids, settings_validator,
};
use crate::utils::{ApiError, ApiResult};

const KPI_RESOURCE: &str = "kpi";
const EDIT_ACTION: &str = "edit";
const EDIT_QUERY_ACTION: &str = "editQuery";

const KPI_COLUMNS: &str = r#"id, project_id, experiment_id, name, created_by, updated_by,
    create_time, update_time, delete_flg, kpi_settings, reaction_query,
    if_custom_reaction_query, report_query, if_custom_report_query"#;

/// KPI lifecycle: create, replace, read, soft delete, custom overrides and regeneration
pub struct KpiService {
    pool: SqlitePool,
    experiments: Arc<dyn ExperimentSource>,
    casbin_service: Arc<CasbinService>,
    hive: HiveConfig,
}

impl KpiService {
    pub fn new(
        pool: SqlitePool,
        experiments: Arc<dyn ExperimentSource>,
        casbin_service: Arc<CasbinService>,
        hive: HiveConfig,
    ) -> Self {
        Self { pool, experiments, casbin_service, hive }
    }

    pub async fn create_kpi(
        &self,
        experiment_id: i64,
        body: Value,
        user: &UserContext,
    ) -> ApiResult<KpiCreatedResponse> {
        let ctx = self.experiments.load_context(experiment_id).await?;
        settings_validator::validate(&body)?;

        if self.find_any_kpi(experiment_id).await?.is_some() {
            return Err(already_exists(experiment_id));
        }

        let (canonical, settings) = self.canonicalize(&ctx, body)?;
        let queries = kpi_compiler::compile_queries(&ctx, &settings, &self.hive)?;
        let name = format!("{}_{}_kpi", ctx.project.name, experiment_id);
        let now = Utc::now().naive_utc();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"INSERT INTO kpis (project_id, experiment_id, name, created_by, updated_by,
                                 create_time, update_time, kpi_settings, reaction_query, report_query)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(ctx.experiment.project_id)
        .bind(experiment_id)
        .bind(&name)
        .bind(user.user_id)
        .bind(user.user_id)
        .bind(now)
        .bind(now)
        .bind(&canonical)
        .bind(&queries.reaction_query)
        .bind(&queries.report_query)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => already_exists(experiment_id),
            other => ApiError::from(other),
        })?;

        let kpi_id = result.last_insert_rowid();

        sqlx::query("UPDATE experiments SET kpi_id = ? WHERE id = ?")
            .bind(kpi_id)
            .bind(experiment_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!("Created KPI {} ({}) for experiment {} by user {}", kpi_id, name, experiment_id, user.user_id);
        Ok(KpiCreatedResponse { kpi_id })
    }

    /// Replace settings, regenerate both queries and drop both custom overrides
    pub async fn update_kpi(
        &self,
        experiment_id: i64,
        body: Value,
        user: &UserContext,
    ) -> ApiResult<KpiUpdatedResponse> {
        let ctx = self.experiments.load_context(experiment_id).await?;
        self.require(user, &ctx.project, EDIT_ACTION).await?;
        settings_validator::validate(&body)?;

        let kpi = self.find_any_kpi(experiment_id).await?.ok_or_else(|| missing_kpi(experiment_id))?;

        let (canonical, settings) = self.canonicalize(&ctx, body)?;
        let queries = kpi_compiler::compile_queries(&ctx, &settings, &self.hive)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"UPDATE kpis
               SET kpi_settings = ?, reaction_query = ?, report_query = ?,
                   if_custom_reaction_query = 0, if_custom_report_query = 0,
                   delete_flg = 0, updated_by = ?, update_time = ?
               WHERE id = ?"#,
        )
        .bind(&canonical)
        .bind(&queries.reaction_query)
        .bind(&queries.report_query)
        .bind(user.user_id)
        .bind(Utc::now().naive_utc())
        .bind(kpi.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE experiments SET kpi_id = ? WHERE id = ?")
            .bind(kpi.id)
            .bind(experiment_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if kpi.delete_flg {
            tracing::info!("Revived soft-deleted KPI {} of experiment {}", kpi.id, experiment_id);
        }
        tracing::info!("Updated KPI {} for experiment {} by user {}", kpi.id, experiment_id, user.user_id);
        Ok(KpiUpdatedResponse { experiment_id, kpi_id: kpi.id })
    }

    pub async fn get_kpi(&self, experiment_id: i64) -> ApiResult<KpiDetailResponse> {
        self.experiments.find_experiment(experiment_id).await?;
        let kpi = self.find_live_kpi(experiment_id).await?;
        KpiDetailResponse::from_kpi(&kpi)
    }

    pub async fn delete_kpi(&self, experiment_id: i64, user: &UserContext) -> ApiResult<KpiCreatedResponse> {
        self.experiments.find_experiment(experiment_id).await?;
        let kpi = self.find_live_kpi(experiment_id).await?;

        sqlx::query("UPDATE kpis SET delete_flg = 1, updated_by = ?, update_time = ? WHERE id = ?")
            .bind(user.user_id)
            .bind(Utc::now().naive_utc())
            .bind(kpi.id)
            .execute(&self.pool)
            .await?;

        tracing::info!("Soft deleted KPI {} of experiment {} by user {}", kpi.id, experiment_id, user.user_id);
        Ok(KpiCreatedResponse { kpi_id: kpi.id })
    }

    /// Store a hand-written query verbatim and mark it customized
    pub async fn update_custom_query(
        &self,
        experiment_id: i64,
        kind: QueryKind,
        query: String,
        user: &UserContext,
    ) -> ApiResult<Value> {
        let experiment = self.experiments.find_experiment(experiment_id).await?;
        let project = self.experiments.find_project(experiment.project_id).await?;
        self.require(user, &project, EDIT_QUERY_ACTION).await?;

        let kpi = self.find_live_kpi(experiment_id).await?;

        // Column names come from the enum, never from the request
        let sql = match kind {
            QueryKind::Reaction => {
                "UPDATE kpis SET reaction_query = ?, if_custom_reaction_query = 1, updated_by = ?, update_time = ? WHERE id = ?"
            },
            QueryKind::Report => {
                "UPDATE kpis SET report_query = ?, if_custom_report_query = 1, updated_by = ?, update_time = ? WHERE id = ?"
            },
        };

        sqlx::query(sql)
            .bind(&query)
            .bind(user.user_id)
            .bind(Utc::now().naive_utc())
            .bind(kpi.id)
            .execute(&self.pool)
            .await?;

        tracing::info!(
            "Custom {} query stored for KPI {} of experiment {} by user {}",
            kind.as_str(),
            kpi.id,
            experiment_id,
            user.user_id
        );

        let mut response = Map::new();
        response.insert(kind.customized_key(), Value::Bool(true));
        Ok(Value::Object(response))
    }

    /// Rebuild the reaction query from stored settings. The custom flag is left as is.
    pub async fn regenerate_reaction_query(&self, experiment_id: i64) -> ApiResult<KpiUpdatedResponse> {
        let ctx = self.experiments.load_context(experiment_id).await?;
        let kpi = self.find_live_kpi(experiment_id).await?;

        let settings = settings_validator::revalidate_stored(&kpi.kpi_settings)?;
        let reaction_query = kpi_compiler::compile_reaction_query(&ctx, &settings, &self.hive)?;

        sqlx::query("UPDATE kpis SET reaction_query = ?, update_time = ? WHERE id = ?")
            .bind(&reaction_query)
            .bind(Utc::now().naive_utc())
            .bind(kpi.id)
            .execute(&self.pool)
            .await?;

        tracing::info!("Regenerated reaction query of KPI {} for experiment {}", kpi.id, experiment_id);
        Ok(KpiUpdatedResponse { experiment_id, kpi_id: kpi.id })
    }

    pub async fn list_project_kpis(
        &self,
        project_id: i64,
        page_query: &PageQuery,
    ) -> ApiResult<PaginatedResponse<KpiSummary>> {
        self.experiments.find_project(project_id).await?;

        let page = page_query.page();
        let per_page = page_query.per_page();

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM kpis WHERE project_id = ? AND delete_flg = 0")
                .bind(project_id)
                .fetch_one(&self.pool)
                .await?;

        let records: Vec<KpiSummary> = sqlx::query_as(
            r#"SELECT id, name, updated_by, update_time, delete_flg
               FROM kpis
               WHERE project_id = ? AND delete_flg = 0
               ORDER BY id
               LIMIT ? OFFSET ?"#,
        )
        .bind(project_id)
        .bind(per_page)
        .bind(page_query.offset())
        .fetch_all(&self.pool)
        .await?;

        let base_path = format!("/api/v1/projects/{}/kpis", project_id);
        Ok(PaginatedResponse { pagination: Pagination::new(&base_path, page, per_page, total), records })
    }

    /// Inject pattern ids, then re-read the typed settings from the canonical document
    fn canonicalize(&self, ctx: &ExperimentContext, mut body: Value) -> ApiResult<(String, KpiSettings)> {
        if inject_pattern_ids(&mut body, &ctx.design, ctx.model_name_refs())? {
            tracing::debug!("Pattern ids injected into KPI settings of experiment {}", ctx.experiment.id);
        }
        let canonical = serde_json::to_string(&body)?;
        let settings: KpiSettings = serde_json::from_value(body)
            .map_err(|_| ApiError::validation_error(settings_validator::WRONG_FORMAT_MESSAGE))?;
        Ok((canonical, settings))
    }

    async fn require(&self, user: &UserContext, project: &Project, action: &str) -> ApiResult<()> {
        self.casbin_service
            .check_permission(user, project.organization_id, KPI_RESOURCE, action)
            .await
    }

    /// Row regardless of `delete_flg`
    async fn find_any_kpi(&self, experiment_id: i64) -> ApiResult<Option<Kpi>> {
        let sql = format!("SELECT {} FROM kpis WHERE experiment_id = ?", KPI_COLUMNS);
        let kpi = sqlx::query_as::<_, Kpi>(&sql)
            .bind(experiment_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(kpi)
    }

    async fn find_live_kpi(&self, experiment_id: i64) -> ApiResult<Kpi> {
        match self.find_any_kpi(experiment_id).await? {
            Some(kpi) if !kpi.delete_flg => Ok(kpi),
            _ => Err(missing_kpi(experiment_id)),
        }
    }
}

fn already_exists(experiment_id: i64) -> ApiError {
    ApiError::forbidden(format!(
        "The kpi for experiment with experiment ID {} already exists",
        experiment_id
    ))
}

fn missing_kpi(experiment_id: i64) -> ApiError {
    ApiError::not_found(format!("KPI for the experiment ID {} does not exist", experiment_id))
}
