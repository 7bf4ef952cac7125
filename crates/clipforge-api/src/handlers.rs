//! Request handlers.

pub mod batches;
pub mod health;
pub mod jobs;
pub mod projects;
pub mod uploads;
pub mod worker;

pub use batches::*;
pub use health::*;
pub use jobs::*;
pub use projects::*;
pub use uploads::*;
pub use worker::*;

use validator::Validate;

use crate::error::{ApiError, ApiResult};

/// Validate a request body, mapping failures to a 400 response.
pub(crate) fn validate_body<T: Validate>(body: &T) -> ApiResult<()> {
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))
}

/// Validate a path identifier to prevent injection into storage keys.
pub(crate) fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub(crate) fn check_id(kind: &str, id: &str) -> ApiResult<()> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!("Invalid {} ID format", kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id("4b1c2d3e-aaaa-bbbb-cccc-111122223333"));
        assert!(is_valid_id("clip_abc123"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("../etc"));
        assert!(!is_valid_id("a/b"));
        assert!(!is_valid_id(&"a".repeat(65)));
    }
}
