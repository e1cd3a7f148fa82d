pub mod health;
pub mod kpi;
