use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Admin Router Module
///
/// Defines the administrator lifecycle endpoints, nested under `/api/admin`.
///
/// Access Control:
/// The two routes sit on opposite sides of the guard. `/api/admin/setup` is the one
/// path the guard passes unconditionally: it is protected by the deployment setup
/// secret and the bootstrap state machine, not by a session. `/api/admin/promote`
/// is under the protected-API prefix, so the guard requires an authenticated
/// principal, and the workflow then re-verifies the caller's admin role against the
/// profile system of record before allowing the promotion.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /api/admin/setup
        // Creates the first administrator, gated by the ADMIN_SETUP bucket (3/hour
        // per IP) and refused outright once any administrator exists.
        .route("/setup", post(handlers::bootstrap_admin))
        // POST /api/admin/promote
        // Promotes a further administrator; caller role re-read from the projection.
        .route("/promote", post(handlers::promote_admin))
}
