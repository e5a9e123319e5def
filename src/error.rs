use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;

use crate::models::ErrorResponse;

/// GateError
///
/// The error taxonomy of the gatekeeping layer. Every variant maps to a fixed HTTP
/// status and renders as a `{"error": "..."}` JSON body with a human-readable
/// message; internal details never leave the process through the response.
///
/// `AuthenticationRequired` is also produced directly by the gate middleware for
/// protected-API paths, so its message is part of the wire contract.
#[derive(Debug, Error)]
pub enum GateError {
    /// 401. No valid session where one is required.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// 403. The caller is known but lacks the required role or secret.
    #[error("{0}")]
    AuthorizationDenied(String),

    /// 429. A rate-limit bucket is exhausted; `Retry-After` is derived from the
    /// remaining window time.
    #[error("Too many requests. Try again in {} seconds", retry_after_secs(.retry_after))]
    RateLimited { retry_after: Duration },

    /// 400. The request payload failed validation before any work began.
    #[error("{0}")]
    Validation(String),

    /// 404. The referenced account does not exist.
    #[error("{0}")]
    NotFound(String),

    /// 403. The operation conflicts with current state (the bootstrap endpoint
    /// refuses unconditionally once an administrator exists).
    #[error("{0}")]
    Conflict(String),

    /// 500. The deployment is missing configuration this operation depends on.
    #[error("{0}")]
    Misconfigured(&'static str),

    /// 500. An identity/profile backend call failed. The detail is logged, not
    /// returned to the client.
    #[error("Upstream service failure")]
    Upstream(String),
}

impl GateError {
    fn status(&self) -> StatusCode {
        match self {
            GateError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            GateError::AuthorizationDenied(_) | GateError::Conflict(_) => StatusCode::FORBIDDEN,
            GateError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GateError::Validation(_) => StatusCode::BAD_REQUEST,
            GateError::NotFound(_) => StatusCode::NOT_FOUND,
            GateError::Misconfigured(_) | GateError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Seconds for the `Retry-After` header, rounded up so a sub-second remainder does
/// not tell the client to retry immediately.
fn retry_after_secs(retry_after: &Duration) -> u64 {
    retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0)
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        match &self {
            GateError::Upstream(detail) => {
                tracing::error!("upstream failure: {detail}");
            }
            GateError::Misconfigured(detail) => {
                tracing::error!("deployment misconfiguration: {detail}");
            }
            _ => {}
        }

        let status = self.status();
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        let mut response = (status, body).into_response();

        if let GateError::RateLimited { retry_after } = self {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after_secs(&retry_after)),
            );
        }

        response
    }
}
