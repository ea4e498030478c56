//! Shared-secret extractor for agent and dashboard endpoints.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use fleetwatch_core::error::CoreError;
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Proof that the request carried the configured shared secret.
///
/// Put it before any body extractor so a bad key is rejected before the
/// payload is parsed:
///
/// ```ignore
/// async fn submit(_key: ApiKey, Json(body): Json<MetricsPayload>) -> AppResult<()> { .. }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ApiKey;

impl FromRequestParts<AppState> for ApiKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Core(CoreError::Unauthorized("Missing API key".into())))?;

        if !secrets_match(provided, &state.config.api_secret) {
            return Err(AppError::Core(CoreError::Unauthorized(
                "Invalid API key".into(),
            )));
        }

        Ok(ApiKey)
    }
}

/// Compares fixed-length digests rather than the raw strings.
fn secrets_match(provided: &str, expected: &str) -> bool {
    Sha256::digest(provided.as_bytes()) == Sha256::digest(expected.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digests_compare_by_value() {
        assert!(secrets_match("reformmed-secret-key", "reformmed-secret-key"));
        assert!(!secrets_match("reformmed-secret-ke", "reformmed-secret-key"));
        assert!(!secrets_match("", "reformmed-secret-key"));
    }
}
