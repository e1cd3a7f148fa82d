//! Path parameter helpers shared by handlers

use crate::utils::{ApiError, ApiResult};

/// Parse a numeric id (experiment, project) taken from the URL path
///
/// # Example
/// ```ignore
/// let experiment_id = parse_path_id(&raw_id)?;
/// ```
pub fn parse_path_id(raw: &str) -> ApiResult<i64> {
    raw.trim().parse::<i64>().map_err(|_| {
        ApiError::validation_error(format!("{} is invalid format, ID is always an integer.", raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path_id() {
        assert_eq!(parse_path_id("42").unwrap(), 42);

        let err = parse_path_id("abc").unwrap_err();
        assert_eq!(err.to_string(), "abc is invalid format, ID is always an integer.");
    }
}
