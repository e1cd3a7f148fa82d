use casbin::prelude::*;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::UserContext;
use crate::utils::{ApiError, ApiResult};

const RBAC_MODEL: &str = r#"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[role_definition]
g = _, _

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act
"#;

/// RBAC permission checks over policies mirrored from the database
///
/// Subjects are prefixed, "u:<user_id>" for users and "r:<role_id>" for roles,
/// so a user id never collides with a role id inside g().
pub struct CasbinService {
    enforcer: Arc<RwLock<Enforcer>>,
}

impl CasbinService {
    pub async fn new() -> ApiResult<Self> {
        let model = DefaultModel::from_str(RBAC_MODEL).await.map_err(|e| {
            tracing::error!("Failed to create Casbin model: {:?}", e);
            ApiError::internal_error(format!("Failed to initialize Casbin model: {}", e))
        })?;

        let enforcer = Enforcer::new(model, casbin::MemoryAdapter::default()).await.map_err(|e| {
            tracing::error!("Failed to create Casbin enforcer: {:?}", e);
            ApiError::internal_error(format!("Failed to initialize Casbin enforcer: {}", e))
        })?;

        tracing::info!("Casbin service initialized successfully");

        Ok(Self { enforcer: Arc::new(RwLock::new(enforcer)) })
    }

    pub async fn enforce(&self, user_id: i64, resource: &str, action: &str) -> ApiResult<bool> {
        let enforcer = self.enforcer.read().await;

        enforcer
            .enforce(vec![format!("u:{}", user_id), resource.to_string(), action.to_string()])
            .map_err(|e| {
                tracing::error!("Casbin enforce error: {:?}", e);
                ApiError::internal_error(format!("Permission check failed: {}", e))
            })
    }

    /// Fail with `Forbidden` unless the caller may perform `action` on the
    /// organization's `resource`. System admins always pass.
    pub async fn check_permission(
        &self,
        user: &UserContext,
        organization_id: Option<i64>,
        resource: &str,
        action: &str,
    ) -> ApiResult<()> {
        if user.is_system_admin {
            return Ok(());
        }

        let scoped_resource = Self::format_resource_key(organization_id, resource);
        if self.enforce(user.user_id, &scoped_resource, action).await? {
            tracing::debug!("Permission granted for user {} on {}:{}", user.user_id, scoped_resource, action);
            return Ok(());
        }

        tracing::warn!(
            "Permission denied for user {} (resource={}, action={})",
            user.user_id,
            scoped_resource,
            action
        );
        Err(ApiError::forbidden(format!(
            "User {} does not have permission {} on {}.",
            user.username, action, resource
        )))
    }

    /// Role has permission to perform action on resource
    pub async fn add_policy(&self, role_id: i64, resource: &str, action: &str) -> ApiResult<bool> {
        let mut enforcer = self.enforcer.write().await;

        let parts = vec![format!("r:{}", role_id), resource.to_string(), action.to_string()];

        enforcer.add_policy(parts).await.map_err(|e| {
            tracing::error!("Failed to add policy: {:?}", e);
            ApiError::internal_error(format!("Failed to add policy: {}", e))
        })
    }

    pub async fn add_role_for_user(&self, user_id: i64, role_id: i64) -> ApiResult<bool> {
        let mut enforcer = self.enforcer.write().await;

        let parts = vec![format!("u:{}", user_id), format!("r:{}", role_id)];

        enforcer.add_grouping_policy(parts).await.map_err(|e| {
            tracing::error!("Failed to add role for user: {:?}", e);
            ApiError::internal_error(format!("Failed to assign role: {}", e))
        })
    }

    /// Replace all in-memory policies with the role grants and user roles stored in the database
    pub async fn reload_policies_from_db(&self, pool: &sqlx::SqlitePool) -> ApiResult<()> {
        let mut enforcer = self.enforcer.write().await;

        enforcer.clear_policy().await.map_err(|e| {
            tracing::error!("Failed to clear policies: {:?}", e);
            ApiError::internal_error(format!("Failed to clear policies: {}", e))
        })?;

        let role_permissions: Vec<(i64, Option<i64>, String, String)> = sqlx::query_as(
            r#"
            SELECT rp.role_id, r.organization_id, p.code, COALESCE(p.action, '') as action
            FROM role_permissions rp
            JOIN permissions p ON rp.permission_id = p.id
            JOIN roles r ON r.id = rp.role_id
            WHERE r.delete_flg = 0
            "#,
        )
        .fetch_all(pool)
        .await?;

        let mut policy_count = 0;
        for (role_id, org_id, code, action) in role_permissions {
            // "api:kpi:edit" -> resource "kpi", action from the column or the remaining segments
            let parts: Vec<&str> = code.split(':').collect();
            if parts.len() < 2 {
                tracing::warn!("Skipping malformed permission code {}", code);
                continue;
            }

            let act = if !action.is_empty() {
                action
            } else if parts.len() >= 3 {
                parts[2..].join(":")
            } else {
                "view".to_string()
            };

            let scoped_resource = Self::format_resource_key(org_id, parts[1]);
            let policy = vec![format!("r:{}", role_id), scoped_resource, act];
            match enforcer.add_policy(policy).await {
                Ok(true) => policy_count += 1,
                Ok(false) => {},
                Err(e) => tracing::warn!("Failed to load policy {} for role {}: {:?}", code, role_id, e),
            }
        }

        let user_roles: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT ur.user_id, ur.role_id FROM user_roles ur JOIN users u ON u.id = ur.user_id WHERE u.delete_flg = 0",
        )
        .fetch_all(pool)
        .await?;

        let mut role_count = 0;
        for (user_id, role_id) in user_roles {
            let grouping = vec![format!("u:{}", user_id), format!("r:{}", role_id)];
            match enforcer.add_grouping_policy(grouping).await {
                Ok(true) => role_count += 1,
                Ok(false) => {},
                Err(e) => tracing::warn!("Failed to load role {} for user {}: {:?}", role_id, user_id, e),
            }
        }

        tracing::info!(
            "Policies reloaded from database ({} policies, {} user roles)",
            policy_count,
            role_count
        );
        Ok(())
    }

    pub(crate) fn format_resource_key(org_id: Option<i64>, resource: &str) -> String {
        match org_id {
            Some(id) => format!("org:{}:{}", id, resource),
            None => format!("system:{}", resource),
        }
    }
}
