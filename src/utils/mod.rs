pub mod error;
pub mod jwt;
pub mod path_params;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use jwt::JwtUtil;
pub use path_params::parse_path_id;
