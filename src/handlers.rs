use crate::{
    AppState, bootstrap,
    error::GateError,
    identity::IdentityError,
    models::{
        BootstrapAdminRequest, LoginRequest, MessageResponse, Principal, Profile,
        PromoteAdminRequest, RegisterUserRequest, Role, UserProfile,
    },
    ratelimit::{Decision, RateLimitBucket, client_ip},
    session::{apply_cookie_mutations, clear_session_mutations, session_cookie_mutations},
};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

// --- Handlers ---

/// login
///
/// [Public Route] Exchanges credentials for a session via the external identity
/// backend's password grant, then installs the token pair as HttpOnly cookies.
///
/// *Rate limiting*: Consumes one unit of the LOGIN bucket (5/minute per client IP)
/// before anything else; exhaustion returns 429 with a Retry-After header.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session established", body = MessageResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, GateError> {
    let ip = client_ip(&headers);
    if let Decision::Denied { retry_after } = state.limiter.check(RateLimitBucket::Login, &ip) {
        return Err(GateError::RateLimited { retry_after });
    }

    let tokens = state
        .identity
        .password_login(&payload.email, &payload.password)
        .await
        .map_err(|e| match e {
            // A deliberately generic 401: the response must not disclose whether
            // the email exists.
            IdentityError::Rejected => GateError::AuthenticationRequired,
            IdentityError::Unavailable(detail) => GateError::Upstream(detail),
        })?;

    let mut response = (
        StatusCode::OK,
        Json(MessageResponse {
            message: "Logged in".to_string(),
        }),
    )
        .into_response();
    apply_cookie_mutations(&mut response, &session_cookie_mutations(&tokens));
    Ok(response)
}

/// logout
///
/// [Public Route] Tears the session cookies down. Token revocation on the identity
/// backend is out of scope here; the cleared cookies end the browser session.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Session cleared", body = MessageResponse))
)]
pub async fn logout() -> Response {
    let mut response = (
        StatusCode::OK,
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
        .into_response();
    apply_cookie_mutations(&mut response, &clear_session_mutations());
    response
}

/// register_user
///
/// [Public Route] Handles initial user registration via the external identity
/// backend, then mirrors the account into the local `public.profiles` projection so
/// primary keys stay synchronized between the two stores.
///
/// *Security*: The requested role is restricted to non-privileged values. Accepting
/// a client-supplied "admin" here is exactly the escalation path the bootstrap
/// workflow exists to close.
///
/// *Rate limiting*: Consumes one unit of the SIGNUP bucket (3/10 minutes per IP).
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 200, description = "Registered", body = Profile),
        (status = 400, description = "Rejected payload"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<Json<Profile>, GateError> {
    let ip = client_ip(&headers);
    if let Decision::Denied { retry_after } = state.limiter.check(RateLimitBucket::Signup, &ip) {
        return Err(GateError::RateLimited { retry_after });
    }

    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(GateError::Validation(
            "A valid email address is required".to_string(),
        ));
    }

    let role = payload.role.unwrap_or(Role::Student);
    if !matches!(role, Role::Student | Role::Vendor) {
        return Err(GateError::Validation(
            "Accounts cannot self-register with a privileged role".to_string(),
        ));
    }

    // Step 1: Create the account in the external identity backend.
    let user_id = state
        .identity
        .sign_up(&email, &payload.password)
        .await
        .map_err(|e| match e {
            // E.g. the email already exists or the password is too weak.
            IdentityError::Rejected => {
                GateError::Validation("Registration was rejected by the identity service".to_string())
            }
            IdentityError::Unavailable(detail) => GateError::Upstream(detail),
        })?;

    // Step 2: Create the mirrored profile in our local projection.
    let profile = state
        .repo
        .create_profile(Profile {
            id: user_id,
            email,
            role,
            suspended: false,
        })
        .await
        .ok_or_else(|| {
            GateError::Upstream(format!("profile creation failed for account {user_id}"))
        })?;

    Ok(Json(profile))
}

/// get_me
///
/// [Protected API Route] Provides the authenticated user's profile information.
/// The principal was resolved by the gate middleware; the profile is read again
/// here so the response reflects the projection's current state.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_me(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, GateError> {
    let profile = state
        .repo
        .get_profile(principal.id)
        .await
        .ok_or(GateError::AuthenticationRequired)?;

    Ok(Json(UserProfile {
        id: profile.id,
        email: profile.email,
        role: profile.role,
        suspended: profile.suspended,
        // Using a DiceBear API for stable, unique avatar generation based on UUID.
        avatar_url: Some(format!(
            "https://api.dicebear.com/7.x/avataaars/svg?seed={}",
            profile.id
        )),
    }))
}

/// bootstrap_admin
///
/// [Setup Route] Creates the first administrator. This path is exempted from the
/// session guard (possession of the deployment setup secret is the credential),
/// and the workflow itself enforces the rate limit and the two-branch state
/// machine.
#[utoipa::path(
    post,
    path = "/api/admin/setup",
    request_body = BootstrapAdminRequest,
    responses(
        (status = 200, description = "Administrator created", body = MessageResponse),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Wrong secret, or an administrator already exists"),
        (status = 404, description = "No such account"),
        (status = 429, description = "Too many attempts"),
        (status = 500, description = "Setup secret not configured, or backend failure")
    )
)]
pub async fn bootstrap_admin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<BootstrapAdminRequest>,
) -> Result<Json<MessageResponse>, GateError> {
    let ip = client_ip(&headers);
    bootstrap::bootstrap_first_admin(&state, &ip, payload)
        .await
        .map(Json)
}

/// promote_admin
///
/// [Protected API Route] Promotes a further administrator. The gate middleware
/// guarantees an authenticated principal; the workflow re-verifies the caller's
/// admin role from the profile system of record before touching the target.
#[utoipa::path(
    post,
    path = "/api/admin/promote",
    request_body = PromoteAdminRequest,
    responses(
        (status = 200, description = "Account promoted", body = MessageResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Caller is not an administrator"),
        (status = 404, description = "No such account"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn promote_admin(
    principal: Principal,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PromoteAdminRequest>,
) -> Result<Json<MessageResponse>, GateError> {
    let ip = client_ip(&headers);
    bootstrap::promote_to_admin(&state, &principal, &ip, payload)
        .await
        .map(Json)
}
