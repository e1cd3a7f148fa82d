use crate::models::UserContext;
use crate::services::casbin_service::CasbinService;
use crate::tests::common::{create_test_casbin_service, create_test_db, seed_fixture};
use crate::utils::ApiError;

fn user(user_id: i64, organization_id: Option<i64>, is_system_admin: bool) -> UserContext {
    UserContext { user_id, username: format!("user_{}", user_id), organization_id, is_system_admin }
}

#[tokio::test]
async fn test_casbin_service_new() {
    let service = CasbinService::new().await;
    assert!(service.is_ok(), "CasbinService should initialize successfully");
}

#[tokio::test]
async fn test_enforce_without_policies() {
    let service = create_test_casbin_service().await;

    let result = service.enforce(1, "org:1:kpi", "edit").await;
    assert!(!result.unwrap(), "Should deny without policies");
}

#[tokio::test]
async fn test_add_and_enforce_policy() {
    let service = create_test_casbin_service().await;

    assert!(service.add_policy(1, "org:1:kpi", "edit").await.unwrap());
    assert!(service.add_role_for_user(100, 1).await.unwrap());

    assert!(service.enforce(100, "org:1:kpi", "edit").await.unwrap());
    assert!(!service.enforce(100, "org:1:kpi", "editQuery").await.unwrap());
    assert!(!service.enforce(100, "org:2:kpi", "edit").await.unwrap());
}

#[tokio::test]
async fn test_user_and_role_ids_do_not_collide() {
    let service = create_test_casbin_service().await;

    // Role 5 holds the grant; user 5 has no role at all
    service.add_policy(5, "org:1:kpi", "edit").await.unwrap();

    assert!(!service.enforce(5, "org:1:kpi", "edit").await.unwrap());
}

#[tokio::test]
async fn test_reload_policies_from_db_scopes_by_organization() {
    let pool = create_test_db().await;
    let fixture = seed_fixture(&pool).await;
    let service = create_test_casbin_service().await;

    service.reload_policies_from_db(&pool).await.unwrap();

    let org_key = CasbinService::format_resource_key(Some(fixture.org_id), "kpi");
    assert!(service.enforce(fixture.editor_user_id, &org_key, "edit").await.unwrap());
    assert!(service.enforce(fixture.editor_user_id, &org_key, "editQuery").await.unwrap());
    assert!(!service.enforce(fixture.viewer_user_id, &org_key, "edit").await.unwrap());

    let other_org_key = CasbinService::format_resource_key(Some(fixture.org_id + 1), "kpi");
    assert!(!service.enforce(fixture.editor_user_id, &other_org_key, "edit").await.unwrap());
}

#[tokio::test]
async fn test_check_permission() {
    let pool = create_test_db().await;
    let fixture = seed_fixture(&pool).await;
    let service = create_test_casbin_service().await;
    service.reload_policies_from_db(&pool).await.unwrap();

    let editor = user(fixture.editor_user_id, Some(fixture.org_id), false);
    assert!(service.check_permission(&editor, Some(fixture.org_id), "kpi", "edit").await.is_ok());

    let viewer = user(fixture.viewer_user_id, Some(fixture.org_id), false);
    let err = service.check_permission(&viewer, Some(fixture.org_id), "kpi", "edit").await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
    assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);

    let admin = user(fixture.admin_user_id, None, true);
    assert!(service.check_permission(&admin, Some(fixture.org_id), "kpi", "editQuery").await.is_ok());
}

#[test]
fn test_format_resource_key() {
    assert_eq!(CasbinService::format_resource_key(Some(3), "kpi"), "org:3:kpi");
    assert_eq!(CasbinService::format_resource_key(None, "kpi"), "system:kpi");
}

#[tokio::test]
async fn test_reload_policies_replaces_previous_state() {
    let pool = create_test_db().await;
    let fixture = seed_fixture(&pool).await;
    let service = create_test_casbin_service().await;
    let org_key = CasbinService::format_resource_key(Some(fixture.org_id), "kpi");

    service.add_policy(99, &org_key, "edit").await.unwrap();
    service.add_role_for_user(fixture.viewer_user_id, 99).await.unwrap();
    assert!(service.enforce(fixture.viewer_user_id, &org_key, "edit").await.unwrap());

    service.reload_policies_from_db(&pool).await.unwrap();
    service.reload_policies_from_db(&pool).await.unwrap();

    assert!(!service.enforce(fixture.viewer_user_id, &org_key, "edit").await.unwrap());
    assert!(service.enforce(fixture.editor_user_id, &org_key, "edit").await.unwrap());
}
