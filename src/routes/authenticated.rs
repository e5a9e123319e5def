use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Defines the routes mounted under the guard's protected-API prefixes. The gate
/// middleware has already rejected unauthenticated or suspended callers with a 401
/// by the time a handler here runs, so every handler can rely on the `Principal`
/// extractor succeeding.
///
/// The wider platform mounts its own protected surfaces (profile, notifications,
/// orders) under the same prefixes; this layer only ships the session-introspection
/// endpoint.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // GET /api/me
        // Retrieves the currently authenticated user's profile and session data.
        .route("/api/me", get(handlers::get_me))
}
