//! Bearer token authentication middleware.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;

/// Shared authentication state.
#[derive(Clone, Default)]
pub struct AuthState {
    /// Expected API key. `None` means authentication is disabled.
    pub api_key: Option<Arc<String>>,
}

impl AuthState {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.map(Arc::new),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Constant-time comparison, so response timing does not leak the key.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Axum middleware that validates `Authorization: Bearer <token>`.
pub async fn bearer_auth(State(auth): State<AuthState>, request: Request, next: Next) -> Response {
    let Some(expected_key) = auth.api_key.as_ref() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty());

    match provided {
        None => ApiError::Unauthorized("Missing or malformed Authorization header".to_string())
            .into_response(),
        Some(token) if constant_time_eq(token.as_bytes(), expected_key.as_bytes()) => {
            next.run(request).await
        }
        Some(_) => ApiError::Unauthorized("Invalid API key".to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret2"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_debug_hides_key() {
        let auth = AuthState::new(Some("hunter2".to_string()));
        let rendered = format!("{auth:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(auth.is_enabled());
        assert!(!AuthState::default().is_enabled());
    }
}
