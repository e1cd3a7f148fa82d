// Test modules

mod casbin_service_test;
pub mod common;
