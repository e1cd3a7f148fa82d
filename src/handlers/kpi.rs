use axum::{
    Json,
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use serde_json::Value;
use std::sync::Arc;

use crate::AppState;
use crate::models::{
    KpiCreatedResponse, KpiDetailResponse, KpiPage, KpiSummary, KpiUpdatedResponse, PageQuery,
    PaginatedResponse, QueryKind, UserContext,
};
use crate::utils::{ApiError, ApiResult, ErrorResponse, parse_path_id};

/// Empty bodies become `null` so the validator reports them as empty
fn parse_json_body(body: &Bytes) -> ApiResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!("Rejected malformed JSON body: {}", e);
        ApiError::validation_error(format!("Malformed JSON body: {}", e))
    })
}

// Create the KPI of an experiment
#[utoipa::path(
    post,
    path = "/api/v2/experiments/{experiment_id}/kpis",
    params(
        ("experiment_id" = String, Path, description = "Experiment ID")
    ),
    request_body(content = Object, description = "KPI settings", content_type = "application/json"),
    responses(
        (status = 201, description = "KPI created", body = KpiCreatedResponse),
        (status = 400, description = "Invalid id or KPI settings", body = ErrorResponse),
        (status = 404, description = "Experiment not found", body = ErrorResponse),
        (status = 409, description = "KPI already exists or r2d2 not allowed", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "KPIs"
)]
pub async fn create_kpi(
    State(state): State<Arc<AppState>>,
    Path(experiment_id): Path<String>,
    Extension(user): Extension<UserContext>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<KpiCreatedResponse>)> {
    let experiment_id = parse_path_id(&experiment_id)?;
    let body = parse_json_body(&body)?;
    tracing::debug!("Creating KPI for experiment {} by user {}", experiment_id, user.user_id);

    let created = state.kpi_service.create_kpi(experiment_id, body, &user).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

// Replace the KPI settings and regenerate both queries
#[utoipa::path(
    put,
    path = "/api/v2/experiments/{experiment_id}/kpis",
    params(
        ("experiment_id" = String, Path, description = "Experiment ID")
    ),
    request_body(content = Object, description = "KPI settings", content_type = "application/json"),
    responses(
        (status = 200, description = "KPI updated", body = KpiUpdatedResponse),
        (status = 400, description = "Invalid id or KPI settings", body = ErrorResponse),
        (status = 404, description = "Experiment or KPI not found", body = ErrorResponse),
        (status = 409, description = "Permission denied or r2d2 not allowed", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "KPIs"
)]
pub async fn update_kpi(
    State(state): State<Arc<AppState>>,
    Path(experiment_id): Path<String>,
    Extension(user): Extension<UserContext>,
    body: Bytes,
) -> ApiResult<Json<KpiUpdatedResponse>> {
    let experiment_id = parse_path_id(&experiment_id)?;
    let body = parse_json_body(&body)?;
    tracing::debug!("Updating KPI for experiment {} by user {}", experiment_id, user.user_id);

    let updated = state.kpi_service.update_kpi(experiment_id, body, &user).await?;
    Ok(Json(updated))
}

#[utoipa::path(
    get,
    path = "/api/v2/experiments/{experiment_id}/kpis",
    params(
        ("experiment_id" = String, Path, description = "Experiment ID")
    ),
    responses(
        (status = 200, description = "KPI settings, queries and customization flags", body = KpiDetailResponse),
        (status = 400, description = "Invalid id", body = ErrorResponse),
        (status = 404, description = "Experiment or KPI not found", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "KPIs"
)]
pub async fn get_kpi(
    State(state): State<Arc<AppState>>,
    Path(experiment_id): Path<String>,
) -> ApiResult<Json<KpiDetailResponse>> {
    let experiment_id = parse_path_id(&experiment_id)?;
    let kpi = state.kpi_service.get_kpi(experiment_id).await?;
    Ok(Json(kpi))
}

// Soft delete
#[utoipa::path(
    delete,
    path = "/api/v2/experiments/{experiment_id}/kpis",
    params(
        ("experiment_id" = String, Path, description = "Experiment ID")
    ),
    responses(
        (status = 200, description = "KPI deleted", body = KpiCreatedResponse),
        (status = 400, description = "Invalid id", body = ErrorResponse),
        (status = 404, description = "Experiment or KPI not found", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "KPIs"
)]
pub async fn delete_kpi(
    State(state): State<Arc<AppState>>,
    Path(experiment_id): Path<String>,
    Extension(user): Extension<UserContext>,
) -> ApiResult<Json<KpiCreatedResponse>> {
    let experiment_id = parse_path_id(&experiment_id)?;
    let deleted = state.kpi_service.delete_kpi(experiment_id, &user).await?;
    Ok(Json(deleted))
}

// Store a hand-written reaction or report query
#[utoipa::path(
    put,
    path = "/api/v2/experiments/{experiment_id}/kpis/{query_type}",
    params(
        ("experiment_id" = String, Path, description = "Experiment ID"),
        ("query_type" = String, Path, description = "reaction_query or report_query")
    ),
    request_body(content = String, description = "Raw query text", content_type = "text/plain"),
    responses(
        (status = 200, description = "Query stored, e.g. {\"if_reactionQuery_customized\": true}", body = Object),
        (status = 400, description = "Invalid id or unsupported query type", body = ErrorResponse),
        (status = 404, description = "Experiment or KPI not found", body = ErrorResponse),
        (status = 409, description = "Permission denied", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "KPIs"
)]
pub async fn update_custom_query(
    State(state): State<Arc<AppState>>,
    Path((experiment_id, query_type)): Path<(String, String)>,
    Extension(user): Extension<UserContext>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let experiment_id = parse_path_id(&experiment_id)?;
    let kind = QueryKind::from_path_segment(&query_type)?;
    let query = String::from_utf8(body.to_vec())
        .map_err(|_| ApiError::validation_error("Query text must be valid UTF-8."))?;

    let response = state
        .kpi_service
        .update_custom_query(experiment_id, kind, query, &user)
        .await?;
    Ok(Json(response))
}

// Regenerate the reaction query from the stored settings
#[utoipa::path(
    post,
    path = "/api/v2/experiments/{experiment_id}/reaction_query",
    params(
        ("experiment_id" = String, Path, description = "Experiment ID")
    ),
    responses(
        (status = 200, description = "Reaction query regenerated", body = KpiUpdatedResponse),
        (status = 400, description = "Invalid id or stored settings", body = ErrorResponse),
        (status = 404, description = "Experiment or KPI not found", body = ErrorResponse),
        (status = 409, description = "r2d2 not allowed", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "KPIs"
)]
pub async fn regenerate_reaction_query(
    State(state): State<Arc<AppState>>,
    Path(experiment_id): Path<String>,
) -> ApiResult<Json<KpiUpdatedResponse>> {
    let experiment_id = parse_path_id(&experiment_id)?;
    let regenerated = state.kpi_service.regenerate_reaction_query(experiment_id).await?;
    Ok(Json(regenerated))
}

// List the live KPIs of a project
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/kpis",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        PageQuery
    ),
    responses(
        (status = 200, description = "Paginated KPI list", body = KpiPage),
        (status = 400, description = "Invalid id", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "KPIs"
)]
pub async fn list_project_kpis(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    Query(page_query): Query<PageQuery>,
) -> ApiResult<Json<PaginatedResponse<KpiSummary>>> {
    let project_id = parse_path_id(&project_id)?;
    let page = state.kpi_service.list_project_kpis(project_id, &page_query).await?;
    tracing::debug!("Listed {} KPIs of project {}", page.records.len(), project_id);
    Ok(Json(page))
}
