use domain::ValidationFailure;

use crate::error::ApiError;

pub const MAX_LIMIT: i64 = 100;

pub fn default_limit() -> i64 {
    20
}

/// Limit must be within 1..=100 and offset non-negative
pub fn check_pagination(limit: i64, offset: i64) -> Result<(), ApiError> {
    let mut failure = ValidationFailure::new();
    if !(1..=MAX_LIMIT).contains(&limit) {
        failure.push("limit", format!("Limit must be between 1 and {}", MAX_LIMIT));
    }
    if offset < 0 {
        failure.push("offset", "Offset must be >= 0");
    }
    failure.into_result().map_err(ApiError::validation)
}
