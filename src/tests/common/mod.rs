// Common test utilities and seed helpers

pub mod templates;

use axum::Router;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::sync::Arc;
use std::time::Duration;

use crate::config::HiveConfig;
use crate::services::{CasbinService, KpiService, SqliteExperimentRepository};
use crate::utils::JwtUtil;
use crate::{AppState, build_router};

pub const TEST_JWT_SECRET: &str = "test-secret-key-for-kpi-tests";

/// Experiments seeded by `seed_fixture`
pub const GENERAL_EXPERIMENT_ID: i64 = 6;
pub const R2D2_EXPERIMENT_ID: i64 = 7;
pub const PATTERN_EXPERIMENT_ID: i64 = 102;
pub const SPECIAL_CHARS_EXPERIMENT_ID: i64 = 105;

/// Create an in-memory SQLite database for testing
pub async fn create_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(3))
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");

    sqlx::migrate!().run(&pool).await.expect("Failed to run migrations");

    pool
}

pub async fn create_test_casbin_service() -> Arc<CasbinService> {
    Arc::new(CasbinService::new().await.expect("Failed to create Casbin service"))
}

/// Organization plus its query templates; returns the organization id
pub async fn create_organization(pool: &SqlitePool, code: &str, template_type: &str) -> i64 {
    let org_id = sqlx::query("INSERT INTO organizations (code, name) VALUES (?, ?)")
        .bind(code)
        .bind(format!("{} organization", code))
        .execute(pool)
        .await
        .expect("Failed to create organization")
        .last_insert_rowid();

    sqlx::query(
        r#"INSERT INTO organization_settings
               (organization_id, template_type, reaction_query_template,
                reaction_r2d2_query_template, reaction_ctc_query_template, report_query_template)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(org_id)
    .bind(template_type)
    .bind(templates::REACTION_TEMPLATE)
    .bind(templates::REACTION_R2D2_TEMPLATE)
    .bind(templates::REACTION_CTC_TEMPLATE)
    .bind(templates::REPORT_TEMPLATE)
    .execute(pool)
    .await
    .expect("Failed to create organization settings");

    org_id
}

pub async fn create_project(pool: &SqlitePool, organization_id: Option<i64>, name: &str) -> i64 {
    sqlx::query("INSERT INTO projects (organization_id, name) VALUES (?, ?)")
        .bind(organization_id)
        .bind(name)
        .execute(pool)
        .await
        .expect("Failed to create project")
        .last_insert_rowid()
}

pub async fn create_experiment(pool: &SqlitePool, experiment_id: i64, project_id: i64) {
    sqlx::query(
        r#"INSERT INTO experiments (id, project_id, name, device_type, schedule_start_time, schedule_end_time)
           VALUES (?, ?, ?, 'PC', '2024-07-01 00:00:00', '2024-07-31 23:59:59')"#,
    )
    .bind(experiment_id)
    .bind(project_id)
    .bind(format!("experiment_{}", experiment_id))
    .execute(pool)
    .await
    .expect("Failed to create experiment");
}

pub async fn create_variation(
    pool: &SqlitePool,
    variation_id: i64,
    experiment_id: i64,
    variation_type: &str,
    is_root: bool,
) {
    sqlx::query("INSERT INTO variations (id, experiment_id, type, is_root) VALUES (?, ?, ?, ?)")
        .bind(variation_id)
        .bind(experiment_id)
        .bind(variation_type)
        .bind(is_root)
        .execute(pool)
        .await
        .expect("Failed to create variation");
}

pub async fn create_condition(
    pool: &SqlitePool,
    condition_id: i64,
    variation_id: i64,
    name: &str,
    nested_variation_id: Option<i64>,
) {
    sqlx::query("INSERT INTO conditions (id, variation_id, name, nested_variation_id) VALUES (?, ?, ?, ?)")
        .bind(condition_id)
        .bind(variation_id)
        .bind(name)
        .bind(nested_variation_id)
        .execute(pool)
        .await
        .expect("Failed to create condition");
}

pub async fn create_experiment_model(pool: &SqlitePool, experiment_id: i64, model_name: &str) {
    sqlx::query("INSERT INTO experiment_models (experiment_id, model_name) VALUES (?, ?)")
        .bind(experiment_id)
        .bind(model_name)
        .execute(pool)
        .await
        .expect("Failed to create experiment model");
}

pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    organization_id: Option<i64>,
    is_system_admin: bool,
) -> i64 {
    sqlx::query("INSERT INTO users (username, email, organization_id, is_system_admin) VALUES (?, ?, ?, ?)")
        .bind(username)
        .bind(format!("{}@example.com", username))
        .bind(organization_id)
        .bind(is_system_admin)
        .execute(pool)
        .await
        .expect("Failed to create user")
        .last_insert_rowid()
}

pub async fn create_role(pool: &SqlitePool, code: &str, organization_id: Option<i64>) -> i64 {
    sqlx::query("INSERT INTO roles (code, name, organization_id) VALUES (?, ?, ?)")
        .bind(code)
        .bind(code)
        .bind(organization_id)
        .execute(pool)
        .await
        .expect("Failed to create role")
        .last_insert_rowid()
}

/// Grant seeded permissions, by code, to a role
pub async fn grant_permissions(pool: &SqlitePool, role_id: i64, codes: &[&str]) {
    for code in codes {
        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id) SELECT ?, id FROM permissions WHERE code = ?",
        )
        .bind(role_id)
        .bind(code)
        .execute(pool)
        .await
        .expect("Failed to grant permission");
    }
}

pub async fn assign_role_to_user(pool: &SqlitePool, user_id: i64, role_id: i64) {
    sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(role_id)
        .execute(pool)
        .await
        .expect("Failed to assign role");
}

pub struct Fixture {
    pub org_id: i64,
    pub project_id: i64,
    pub admin_user_id: i64,
    pub editor_user_id: i64,
    pub viewer_user_id: i64,
}

/// One REGULAR organization with project "shop" and four experiments:
///
/// * 6, 7 and 105: a Control and a Target arm with one condition each
/// * 102: same shape plus an `MPB_MODEL`, Target is variation 203 with
///   condition 111 named `seed_data_condition_105`
///
/// Users: a system admin, an editor holding `kpi:edit` and `kpi:editQuery`
/// in the organization, and a viewer without grants.
pub async fn seed_fixture(pool: &SqlitePool) -> Fixture {
    let org_id = create_organization(pool, "phoenix", "REGULAR").await;
    let project_id = create_project(pool, Some(org_id), "shop").await;

    for (experiment_id, base) in [(6, 10), (7, 20), (105, 30)] {
        create_experiment(pool, experiment_id, project_id).await;
        create_variation(pool, base + 1, experiment_id, "Control", true).await;
        create_variation(pool, base + 2, experiment_id, "Target", true).await;
        create_condition(pool, base * 10 + 1, base + 1, &format!("control_{}", experiment_id), None).await;
        create_condition(pool, base * 10 + 2, base + 2, &format!("target_{}", experiment_id), None).await;
    }

    create_experiment(pool, PATTERN_EXPERIMENT_ID, project_id).await;
    create_variation(pool, 202, PATTERN_EXPERIMENT_ID, "Control", true).await;
    create_variation(pool, 203, PATTERN_EXPERIMENT_ID, "Target", true).await;
    create_condition(pool, 110, 202, "seed_data_condition_104", None).await;
    create_condition(pool, 111, 203, "seed_data_condition_105", None).await;
    create_experiment_model(pool, PATTERN_EXPERIMENT_ID, "MPB_MODEL").await;

    let admin_user_id = create_user(pool, "admin", None, true).await;
    let editor_user_id = create_user(pool, "editor", Some(org_id), false).await;
    let viewer_user_id = create_user(pool, "viewer", Some(org_id), false).await;

    let editor_role_id = create_role(pool, "kpi_editor", Some(org_id)).await;
    grant_permissions(pool, editor_role_id, &["api:kpi:edit", "api:kpi:editQuery"]).await;
    assign_role_to_user(pool, editor_user_id, editor_role_id).await;

    Fixture { org_id, project_id, admin_user_id, editor_user_id, viewer_user_id }
}

pub fn test_hive_config() -> HiveConfig {
    HiveConfig::default()
}

/// Application state over `pool` with policies loaded from it
pub async fn create_test_state(pool: &SqlitePool) -> Arc<AppState> {
    let casbin_service = create_test_casbin_service().await;
    casbin_service.reload_policies_from_db(pool).await.expect("Failed to load policies");

    let experiments = Arc::new(SqliteExperimentRepository::new(pool.clone()));
    let kpi_service = Arc::new(KpiService::new(
        pool.clone(),
        experiments,
        Arc::clone(&casbin_service),
        test_hive_config(),
    ));

    Arc::new(AppState {
        db: pool.clone(),
        jwt_util: Arc::new(JwtUtil::new(TEST_JWT_SECRET, "24h")),
        casbin_service,
        kpi_service,
    })
}

pub async fn create_test_app(pool: &SqlitePool) -> (Router, Arc<AppState>) {
    let state = create_test_state(pool).await;
    (build_router(Arc::clone(&state)), state)
}

pub fn bearer_token(state: &AppState, user_id: i64, username: &str) -> String {
    let token = state.jwt_util.generate_token(user_id, username).expect("Failed to generate token");
    format!("Bearer {}", token)
}
