use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any client
/// (anonymous or logged-in): the liveness probe and the identity flows that create
/// a session in the first place.
///
/// Security Mandate:
/// Every mutation handler in this module consults the rate limiter before doing any
/// work (LOGIN and SIGNUP buckets); these are the brute-forceable surfaces.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        // Returns "ok" immediately to verify the service is running and responsive.
        .route("/health", get(|| async { "ok" }))
        // POST /api/auth/login
        // Password grant against the external identity backend; installs the session
        // cookies on success. Guarded by the LOGIN bucket (5/minute per IP).
        .route("/api/auth/login", post(handlers::login))
        // POST /api/auth/logout
        // Clears the session cookies.
        .route("/api/auth/logout", post(handlers::logout))
        // POST /api/auth/register
        // New account creation and initial profile mirroring. Guarded by the SIGNUP
        // bucket (3/10 minutes per IP); privileged roles in the payload are rejected.
        .route("/api/auth/register", post(handlers::register_user))
}
