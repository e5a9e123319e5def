use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    error::GateError,
    models::{Principal, Role},
    session::{apply_cookie_mutations, resolve_session},
};

/// The first-administrator bootstrap endpoint. Protected by a possession secret,
/// not by session role, so the guard lets it through unconditionally.
pub const ADMIN_SETUP_PATH: &str = "/api/admin/setup";

/// Prefix of the administrator pages; failures here redirect (page semantics).
pub const ADMIN_PREFIX: &str = "/admin";

/// Where unauthenticated visitors of admin pages are sent, carrying a `redirect`
/// parameter for post-login continuation.
pub const LOGIN_PATH: &str = "/login";

// API prefixes that require an authenticated session; failures here are JSON 401s
// (API semantics). Note that /api/admin is covered, which also puts the promotion
// endpoint behind authentication; its admin-role check happens in the workflow,
// against the profile system of record.
const PROTECTED_API_PREFIXES: &[&str] = &[
    "/api/me",
    "/api/profile",
    "/api/notifications",
    "/api/orders",
    "/api/admin",
];

/// GuardDecision
///
/// The outcome of classifying a request path against the resolved principal.
/// Observable effects are limited to redirect targets/query parameters and JSON
/// error bodies; there are no other side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Let the request through to whatever handler matches.
    Pass,
    /// 302 to `/login?redirect=<path>` for post-login continuation.
    RedirectToLogin { redirect: String },
    /// 302 to `/?error=<flag>`, consumed by the home page UI.
    RedirectHome { error: &'static str },
    /// 401 JSON `{"error": "Authentication required"}`.
    Unauthenticated,
}

/// classify
///
/// Pure decision function over `(path, principal)`, evaluated in fixed priority
/// order. First match wins, and a path belongs to exactly one category:
/// 1. the bootstrap endpoint passes (possession secret, not session role);
/// 2. admin pages require a non-suspended admin, with redirects on failure;
/// 3. protected API paths require any non-suspended principal, 401 on failure;
/// 4. everything else passes.
///
/// Stateless and idempotent: the same `(path, principal)` always yields the same
/// decision.
pub fn classify(path: &str, principal: Option<&Principal>) -> GuardDecision {
    if path == ADMIN_SETUP_PATH {
        return GuardDecision::Pass;
    }

    if is_under(path, ADMIN_PREFIX) {
        return match principal {
            None => GuardDecision::RedirectToLogin {
                redirect: path.to_string(),
            },
            Some(p) if p.role == Role::Admin && !p.suspended => GuardDecision::Pass,
            Some(_) => GuardDecision::RedirectHome {
                error: "unauthorized",
            },
        };
    }

    if PROTECTED_API_PREFIXES
        .iter()
        .any(|prefix| is_under(path, prefix))
    {
        return match principal {
            Some(p) if !p.suspended => GuardDecision::Pass,
            _ => GuardDecision::Unauthenticated,
        };
    }

    GuardDecision::Pass
}

// Prefix match on whole path segments: "/admin" and "/admin/stats" are under
// "/admin", "/administrator" is not.
fn is_under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

// Static assets bypass the gate entirely (no session resolution, no rotation).
fn is_static_asset(path: &str) -> bool {
    is_under(path, "/assets") || path == "/favicon.ico"
}

/// gate_middleware
///
/// The request-interception point of the access-control layer, applied to the whole
/// router (including unmatched paths, so admin pages without a backend route are
/// still guarded). For each request it resolves the session, classifies the path,
/// and either forwards the request (with the principal stashed in extensions for
/// handlers) or answers directly with a redirect/401 before any handler logic runs.
///
/// Whatever response is produced, the session resolver's cookie mutations are
/// applied to it exactly once: token rotation must reach the client even when the
/// request is being turned away.
pub async fn gate_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if is_static_asset(&path) {
        return next.run(request).await;
    }

    let session = resolve_session(&state, request.headers()).await;
    let decision = classify(&path, session.principal.as_ref());

    let mut response = match decision {
        GuardDecision::Pass => {
            if let Some(principal) = session.principal.clone() {
                request.extensions_mut().insert(principal);
            }
            next.run(request).await
        }
        GuardDecision::RedirectToLogin { redirect } => {
            found(&format!("{LOGIN_PATH}?redirect={redirect}"))
        }
        GuardDecision::RedirectHome { error } => found(&format!("/?error={error}")),
        GuardDecision::Unauthenticated => GateError::AuthenticationRequired.into_response(),
    };

    apply_cookie_mutations(&mut response, &session.cookie_mutations);
    response
}

// A plain 302. axum's Redirect helpers emit 303/307/308, and the contract with the
// frontend fixes 302 for these flows.
fn found(location: &str) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    response
}
