use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use phoenix_kpi::config::Config;
use phoenix_kpi::services::{CasbinService, KpiService, SqliteExperimentRepository};
use phoenix_kpi::utils::JwtUtil;
use phoenix_kpi::{AppState, build_router, db};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    let registry = tracing_subscriber::registry().with(log_filter);

    // Keeps the non-blocking file writer flushing until shutdown
    let _log_guard = if let Some(log_file) = &config.logging.file {
        let log_path = std::path::Path::new(log_file);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let log_dir = log_path.parent().and_then(|p| p.to_str()).unwrap_or("logs");
        let file_name = log_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("phoenix_kpi.log");
        // Rolling appender adds the date suffix
        let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

        let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
            .with(tracing_subscriber::fmt::layer())
            .init();
        Some(guard)
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
        None
    };

    tracing::info!("Phoenix KPI starting up");
    tracing::info!("Configuration loaded successfully");

    let pool = db::create_pool(&config.database.url).await?;
    tracing::info!("Database pool created successfully");

    let jwt_util = Arc::new(JwtUtil::new(&config.auth.jwt_secret, &config.auth.jwt_expires_in));

    let casbin_service = Arc::new(
        CasbinService::new()
            .await
            .map_err(|e| format!("Failed to initialize Casbin service: {}", e))?,
    );
    casbin_service
        .reload_policies_from_db(&pool)
        .await
        .map_err(|e| format!("Failed to load initial policies: {}", e))?;
    tracing::info!("Casbin policies loaded from database");

    let experiments = Arc::new(SqliteExperimentRepository::new(pool.clone()));
    let kpi_service = Arc::new(KpiService::new(
        pool.clone(),
        experiments,
        Arc::clone(&casbin_service),
        config.hive.clone(),
    ));

    let app_state = Arc::new(AppState {
        db: pool.clone(),
        jwt_util: Arc::clone(&jwt_util),
        casbin_service: Arc::clone(&casbin_service),
        kpi_service,
    });

    let app = build_router(app_state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API documentation available at http://{}/api-docs", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
