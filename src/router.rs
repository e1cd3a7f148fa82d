use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{AppState, handlers, middleware, models, utils};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::kpi::create_kpi,
        handlers::kpi::update_kpi,
        handlers::kpi::get_kpi,
        handlers::kpi::delete_kpi,
        handlers::kpi::update_custom_query,
        handlers::kpi::regenerate_reaction_query,
        handlers::kpi::list_project_kpis,
    ),
    components(
        schemas(
            models::KpiCreatedResponse,
            models::KpiUpdatedResponse,
            models::KpiDetailResponse,
            models::KpiSummary,
            models::KpiPage,
            models::Pagination,
            models::PaginationLinks,
            utils::ErrorResponse,
        )
    ),
    tags(
        (name = "KPIs", description = "Experiment KPI settings and generated queries"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            );
        }
    }
}

/// Full application router: health probes, API docs and the authenticated KPI API
pub fn build_router(state: Arc<AppState>) -> Router {
    let auth_state =
        middleware::AuthState { jwt_util: Arc::clone(&state.jwt_util), db: state.db.clone() };

    let protected_routes = Router::new()
        .route(
            "/api/v2/experiments/:experiment_id/kpis",
            post(handlers::kpi::create_kpi)
                .put(handlers::kpi::update_kpi)
                .get(handlers::kpi::get_kpi)
                .delete(handlers::kpi::delete_kpi),
        )
        .route(
            "/api/v2/experiments/:experiment_id/kpis/:query_type",
            put(handlers::kpi::update_custom_query),
        )
        .route(
            "/api/v2/experiments/:experiment_id/reaction_query",
            post(handlers::kpi::regenerate_reaction_query),
        )
        .route("/api/v1/projects/:project_id/kpis", get(handlers::kpi::list_project_kpis))
        .with_state(Arc::clone(&state))
        .layer(axum_middleware::from_fn_with_state(auth_state, middleware::auth_middleware));

    let health_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::ready_check))
        .with_state(Arc::clone(&state));

    Router::new()
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(protected_routes)
        .merge(health_routes)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
}
