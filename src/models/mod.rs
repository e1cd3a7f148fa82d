pub mod experiment;
pub mod kpi;
pub mod organization;
pub mod pagination;
pub mod user;

pub use experiment::*;
pub use kpi::*;
pub use organization::*;
pub use pagination::*;
pub use user::*;
