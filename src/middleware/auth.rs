use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::models::{User, UserContext};
use crate::utils::{ApiError, JwtUtil};

#[derive(Clone)]
pub struct AuthState {
    pub jwt_util: Arc<JwtUtil>,
    pub db: SqlitePool,
}

/// Bearer token authentication.
/// Verifies the JWT, loads the live user and stores a `UserContext` in request extensions.
/// Permission grants are checked later by the services that need them.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let method = req.method().to_string();
    let uri = req.uri().path().to_string();

    tracing::debug!("Auth middleware processing: {} {}", method, uri);

    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Missing authorization header for {} {}", method, uri);
            ApiError::unauthorized("Missing authorization header")
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::warn!("Invalid authorization header format for {} {}", method, uri);
        ApiError::unauthorized("Invalid authorization header format")
    })?;

    let claims = state.jwt_util.verify_token(token).map_err(|err| {
        tracing::warn!("JWT verification failed for {} {}: {:?}", method, uri, err);
        err
    })?;

    let user_id = claims.sub.parse::<i64>().map_err(|_| {
        tracing::warn!("JWT subject {} is not a user id", claims.sub);
        ApiError::unauthorized("Invalid or expired token")
    })?;

    let user = sqlx::query_as::<_, User>(
        r#"SELECT id, username, email, NULLIF(organization_id, 0) AS organization_id,
                  is_system_admin, delete_flg
           FROM users
           WHERE id = ? AND delete_flg = 0"#,
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| {
        tracing::warn!("Token of unknown or deleted user {} used on {} {}", user_id, method, uri);
        ApiError::unauthorized("User does not exist")
    })?;

    tracing::debug!("JWT token verified for user {} (ID: {}) on {} {}", user.username, user.id, method, uri);

    req.extensions_mut().insert(UserContext::from(user));

    Ok(next.run(req).await)
}
