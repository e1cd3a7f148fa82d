pub mod casbin_service;
pub mod experiment_repository;
pub mod kpi_compiler;
pub mod kpi_service;

pub use casbin_service::CasbinService;
pub use experiment_repository::{ExperimentSource, SqliteExperimentRepository};
pub use kpi_compiler::CompiledQueries;
pub use kpi_service::KpiService;
