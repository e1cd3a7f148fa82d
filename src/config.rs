use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::models::OrganizationSettings;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    pub hive: HiveConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expires_in: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

/// Warehouse names substituted into generated queries
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HiveConfig {
    /// Database used by organizations on the `REGULAR` template type
    pub db_name: String,
    /// Database used by every other template type
    pub secondary_db_name: String,
    pub reaction_table: String,
    pub report_table: String,
}

impl HiveConfig {
    /// Pick the warehouse database for an organization's template type
    pub fn database_for(&self, settings: &OrganizationSettings) -> &str {
        if settings.is_regular() {
            &self.db_name
        } else {
            &self.secondary_db_name
        }
    }
}

/// Command line arguments for configuration overrides
#[derive(Parser, Debug, Clone)]
#[command(name = "phoenix-kpi")]
#[command(version, about = "Phoenix KPI - experiment KPI and query generation service")]
pub struct CommandLineArgs {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Server host (overrides config file)
    #[arg(long, value_name = "HOST")]
    pub server_host: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    /// JWT secret key (overrides config file)
    #[arg(long, value_name = "SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT expiration time (overrides config file, e.g., "24h")
    #[arg(long, value_name = "DURATION")]
    pub jwt_expires_in: Option<String>,

    /// Logging level (overrides config file, e.g., "info,phoenix_kpi=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Primary warehouse database name (overrides config file)
    #[arg(long, value_name = "NAME")]
    pub hive_db_name: Option<String>,

    /// Secondary warehouse database name (overrides config file)
    #[arg(long, value_name = "NAME")]
    pub hive_secondary_db_name: Option<String>,
}

impl Config {
    /// Load configuration with command line, environment variable, and file support
    ///
    /// Loading order (priority from highest to lowest):
    /// 1. Command line arguments
    /// 2. Environment variables (prefixed with APP_), including those from `.env`
    /// 3. Configuration file (config.toml)
    /// 4. Default values
    pub fn load() -> Result<Self, anyhow::Error> {
        // .env only fills variables that are not already set
        dotenvy::dotenv().ok();
        let cli_args = CommandLineArgs::parse();

        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(&cli_args);
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - APP_SERVER_HOST / APP_SERVER_PORT
    /// - APP_DATABASE_URL
    /// - APP_JWT_SECRET / APP_JWT_EXPIRES_IN
    /// - APP_LOG_LEVEL
    /// - APP_HIVE_DB_NAME / APP_HIVE_SECONDARY_DB_NAME
    /// - APP_HIVE_REACTION_TABLE / APP_HIVE_REPORT_TABLE
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("APP_SERVER_HOST") {
            self.server.host = host;
            tracing::info!("Override server.host from env: {}", self.server.host);
        }

        if let Ok(port) = std::env::var("APP_SERVER_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
            tracing::info!("Override server.port from env: {}", self.server.port);
        }

        if let Ok(db_url) = std::env::var("APP_DATABASE_URL") {
            self.database.url = db_url;
            tracing::info!("Override database.url from env");
        }

        if let Ok(secret) = std::env::var("APP_JWT_SECRET") {
            self.auth.jwt_secret = secret;
            tracing::info!("Override auth.jwt_secret from env");
        }

        if let Ok(expires) = std::env::var("APP_JWT_EXPIRES_IN") {
            self.auth.jwt_expires_in = expires;
            tracing::info!("Override auth.jwt_expires_in from env: {}", self.auth.jwt_expires_in);
        }

        if let Ok(level) = std::env::var("APP_LOG_LEVEL") {
            self.logging.level = level;
            tracing::info!("Override logging.level from env: {}", self.logging.level);
        }

        if let Ok(name) = std::env::var("APP_HIVE_DB_NAME") {
            self.hive.db_name = name;
            tracing::info!("Override hive.db_name from env: {}", self.hive.db_name);
        }

        if let Ok(name) = std::env::var("APP_HIVE_SECONDARY_DB_NAME") {
            self.hive.secondary_db_name = name;
            tracing::info!(
                "Override hive.secondary_db_name from env: {}",
                self.hive.secondary_db_name
            );
        }

        if let Ok(table) = std::env::var("APP_HIVE_REACTION_TABLE") {
            self.hive.reaction_table = table;
            tracing::info!("Override hive.reaction_table from env: {}", self.hive.reaction_table);
        }

        if let Ok(table) = std::env::var("APP_HIVE_REPORT_TABLE") {
            self.hive.report_table = table;
            tracing::info!("Override hive.report_table from env: {}", self.hive.report_table);
        }
    }

    /// Apply command line argument overrides (highest priority)
    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(host) = &args.server_host {
            self.server.host = host.clone();
            tracing::info!("Override server.host from CLI: {}", self.server.host);
        }

        if let Some(port) = args.server_port {
            self.server.port = port;
            tracing::info!("Override server.port from CLI: {}", self.server.port);
        }

        if let Some(db_url) = &args.database_url {
            self.database.url = db_url.clone();
            tracing::info!("Override database.url from CLI");
        }

        if let Some(secret) = &args.jwt_secret {
            self.auth.jwt_secret = secret.clone();
            tracing::info!("Override auth.jwt_secret from CLI");
        }

        if let Some(expires) = &args.jwt_expires_in {
            self.auth.jwt_expires_in = expires.clone();
            tracing::info!("Override auth.jwt_expires_in from CLI: {}", self.auth.jwt_expires_in);
        }

        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
            tracing::info!("Override logging.level from CLI: {}", self.logging.level);
        }

        if let Some(name) = &args.hive_db_name {
            self.hive.db_name = name.clone();
            tracing::info!("Override hive.db_name from CLI: {}", self.hive.db_name);
        }

        if let Some(name) = &args.hive_secondary_db_name {
            self.hive.secondary_db_name = name.clone();
            tracing::info!(
                "Override hive.secondary_db_name from CLI: {}",
                self.hive.secondary_db_name
            );
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.auth.jwt_secret == "dev-secret-key-change-in-production" {
            tracing::warn!("WARNING: Using default JWT secret!");
            tracing::warn!("Please set APP_JWT_SECRET environment variable or update config.toml");
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if parse_duration_to_secs(&self.auth.jwt_expires_in).is_err() {
            anyhow::bail!("auth.jwt_expires_in is not a valid duration: {}", self.auth.jwt_expires_in);
        }

        let hive_names = [
            ("hive.db_name", &self.hive.db_name),
            ("hive.secondary_db_name", &self.hive.secondary_db_name),
            ("hive.reaction_table", &self.hive.reaction_table),
            ("hive.report_table", &self.hive.report_table),
        ];
        for (key, value) in hive_names {
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", key);
            }
        }

        Ok(())
    }

    fn find_config_file() -> Option<String> {
        let possible_paths =
            ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
        }
        None
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080 }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite://tmp/phoenix_kpi.db".to_string() }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-secret-key-change-in-production".to_string(),
            jwt_expires_in: "24h".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,phoenix_kpi=debug".to_string(),
            file: Some("logs/phoenix_kpi.log".to_string()),
        }
    }
}

impl Default for HiveConfig {
    fn default() -> Self {
        Self {
            db_name: "regpitari_reports".to_string(),
            secondary_db_name: "secpitari_reports".to_string(),
            reaction_table: "reaction_table".to_string(),
            report_table: "report_table".to_string(),
        }
    }
}

/// Parse "30", "30s", "5m", "24h" or "7d" into seconds
pub(crate) fn parse_duration_to_secs(input: &str) -> Result<u64, String> {
    if let Ok(val) = input.parse::<u64>() {
        return Ok(val);
    }

    let s = input.trim().to_lowercase();
    let (num_str, unit) = s.split_at(s.chars().take_while(|c| c.is_ascii_digit()).count());
    if num_str.is_empty() || unit.is_empty() {
        return Err("missing number or unit".into());
    }
    let n: u64 = num_str.parse().map_err(|_| "invalid number".to_string())?;
    match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => Ok(n),
        "m" | "min" | "mins" | "minute" | "minutes" => Ok(n * 60),
        "h" | "hr" | "hour" | "hours" => Ok(n * 60 * 60),
        "d" | "day" | "days" => Ok(n * 60 * 60 * 24),
        _ => Err(format!("unsupported unit: {}", unit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration_to_secs("45"), Ok(45));
        assert_eq!(parse_duration_to_secs("5m"), Ok(300));
        assert_eq!(parse_duration_to_secs("24h"), Ok(86_400));
        assert!(parse_duration_to_secs("3w").is_err());
        assert!(parse_duration_to_secs("h").is_err());
    }

    fn org_settings(template_type: &str) -> OrganizationSettings {
        OrganizationSettings {
            organization_id: 1,
            template_type: template_type.to_string(),
            reaction_query_template: String::new(),
            reaction_r2d2_query_template: String::new(),
            reaction_ctc_query_template: String::new(),
            report_query_template: String::new(),
        }
    }

    #[test]
    fn test_hive_toml_section() {
        let config: Config = toml::from_str(
            r#"
            [hive]
            db_name = "reports_a"
            secondary_db_name = "reports_b"
            "#,
        )
        .unwrap();

        assert_eq!(config.hive.db_name, "reports_a");
        assert_eq!(config.hive.reaction_table, "reaction_table");
        assert_eq!(config.hive.database_for(&org_settings("REGULAR")), "reports_a");
        assert_eq!(config.hive.database_for(&org_settings("SECONDARY")), "reports_b");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_hive_name() {
        let mut config = Config::default();
        config.hive.report_table = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("hive.report_table"));
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }
}
