//! Phoenix KPI
//!
//! Experiment KPI settings and the reaction and report queries generated from them.

use sqlx::SqlitePool;
use std::sync::Arc;

pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod router;
pub mod services;
pub mod utils;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use router::build_router;
pub use services::{CasbinService, KpiService, SqliteExperimentRepository};
pub use utils::JwtUtil;

/// Application shared state
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub jwt_util: Arc<JwtUtil>,
    pub casbin_service: Arc<CasbinService>,
    pub kpi_service: Arc<KpiService>,
}
