use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub organization_id: Option<i64>,
    pub is_system_admin: bool,
    pub delete_flg: bool,
}

/// Authenticated caller, placed into request extensions by the auth middleware
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: i64,
    pub username: String,
    pub organization_id: Option<i64>,
    pub is_system_admin: bool,
}

impl From<User> for UserContext {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
            organization_id: user.organization_id,
            is_system_admin: user.is_system_admin,
        }
    }
}
