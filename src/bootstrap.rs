//! Administrator Bootstrap Workflow.
//!
//! The state machine controlling how privileged accounts come into existence. It
//! has exactly two branches, selected by querying the identity backend live on
//! every call:
//!
//! - **No administrator exists**: the caller proves possession of the deployment
//!   setup secret and names an existing account, which is promoted in both stores.
//! - **An administrator exists**: the bootstrap endpoint refuses unconditionally,
//!   secret or not. Further administrators are created through `promote_to_admin`,
//!   which requires the *caller* to re-verify as admin against the profile
//!   projection at call time.
//!
//! Both operations consume a rate-limit unit before any other work, so denial
//! never leaves partial state behind.

use crate::{
    AppState,
    error::GateError,
    models::{BootstrapAdminRequest, MessageResponse, Principal, PromoteAdminRequest, Role},
    ratelimit::{Decision, RateLimitBucket},
};

/// bootstrap_first_admin
///
/// Creates the first administrator. See the 400/403/404/429/500 mapping on
/// `GateError`; on success both the identity record and the profile projection hold
/// `role=admin` for the target account.
pub async fn bootstrap_first_admin(
    state: &AppState,
    client_ip: &str,
    request: BootstrapAdminRequest,
) -> Result<MessageResponse, GateError> {
    if let Decision::Denied { retry_after } =
        state.limiter.check(RateLimitBucket::AdminSetup, client_ip)
    {
        return Err(GateError::RateLimited { retry_after });
    }

    let email = request.email.trim();
    if email.is_empty() {
        return Err(GateError::Validation(
            "An account email is required".to_string(),
        ));
    }

    // Re-evaluated live on every attempt, never cached: a stale "no admin exists"
    // view would allow a second "first" administrator after the true first admin
    // was created through another path.
    let admin_exists = state
        .identity
        .any_admin_account()
        .await
        .map_err(|e| GateError::Upstream(e.to_string()))?;

    if admin_exists {
        // Refused regardless of secret correctness; promotion is the only path now.
        return Err(GateError::Conflict(
            "An administrator already exists; use the promotion endpoint".to_string(),
        ));
    }

    let Some(configured_secret) = state.config.admin_setup_secret.as_deref() else {
        return Err(GateError::Misconfigured(
            "Administrator setup is not configured for this deployment",
        ));
    };
    if request.setup_secret.as_deref() != Some(configured_secret) {
        return Err(GateError::AuthorizationDenied(
            "Invalid setup secret".to_string(),
        ));
    }

    let profile = state
        .repo
        .get_profile_by_email(email)
        .await
        .ok_or_else(|| GateError::NotFound(format!("No account found for {email}")))?;

    // Two writes, two stores, no transaction: a failure between them leaves the
    // identity record promoted but the projection stale. The failure is surfaced,
    // not masked; reconciliation is an operator action.
    state
        .identity
        .set_account_role(profile.id, Role::Admin)
        .await
        .map_err(|e| GateError::Upstream(e.to_string()))?;
    if !state.repo.set_role(profile.id, Role::Admin).await {
        return Err(GateError::Upstream(format!(
            "profile role update failed for {} after the identity write succeeded",
            profile.id
        )));
    }

    tracing::info!(user_id = %profile.id, "first administrator bootstrapped");
    Ok(MessageResponse {
        message: format!("{email} is now an administrator"),
    })
}

/// promote_to_admin
///
/// Promotes a further administrator. The caller's session principal is deliberately
/// not trusted for the authorization decision: the role is re-read from the profile
/// system of record at call time, resisting forged or stale client claims.
pub async fn promote_to_admin(
    state: &AppState,
    caller: &Principal,
    client_ip: &str,
    request: PromoteAdminRequest,
) -> Result<MessageResponse, GateError> {
    if let Decision::Denied { retry_after } = state.limiter.check(RateLimitBucket::Api, client_ip) {
        return Err(GateError::RateLimited { retry_after });
    }

    let caller_record = state
        .repo
        .get_profile(caller.id)
        .await
        .filter(|record| record.role == Role::Admin && !record.suspended)
        .ok_or_else(|| GateError::AuthorizationDenied("Administrator role required".to_string()))?;

    let target = state
        .repo
        .get_profile(request.user_id)
        .await
        .ok_or_else(|| GateError::NotFound(format!("No account found for {}", request.user_id)))?;

    state
        .identity
        .set_account_role(target.id, Role::Admin)
        .await
        .map_err(|e| GateError::Upstream(e.to_string()))?;
    if !state.repo.set_role(target.id, Role::Admin).await {
        return Err(GateError::Upstream(format!(
            "profile role update failed for {} after the identity write succeeded",
            target.id
        )));
    }

    tracing::info!(admin = %caller_record.id, user_id = %target.id, "account promoted to administrator");
    Ok(MessageResponse {
        message: format!("{} is now an administrator", target.email),
    })
}
