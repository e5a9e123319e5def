use campus_gate::guard::{ADMIN_SETUP_PATH, GuardDecision, classify};
use campus_gate::models::{Principal, Role};
use uuid::Uuid;

fn principal(role: Role) -> Principal {
    Principal {
        id: Uuid::from_u128(1),
        role,
        suspended: false,
    }
}

fn suspended(role: Role) -> Principal {
    Principal {
        id: Uuid::from_u128(2),
        role,
        suspended: true,
    }
}

// --- Category 1: the bootstrap endpoint ---

#[test]
fn test_setup_path_passes_without_principal() {
    // Possession of the setup secret is the credential here, not a session.
    assert_eq!(classify(ADMIN_SETUP_PATH, None), GuardDecision::Pass);
}

#[test]
fn test_setup_path_passes_for_any_role() {
    assert_eq!(
        classify(ADMIN_SETUP_PATH, Some(&principal(Role::Student))),
        GuardDecision::Pass
    );
}

// --- Category 2: admin pages ---

#[test]
fn test_admin_path_without_principal_redirects_to_login() {
    assert_eq!(
        classify("/admin/dashboard", None),
        GuardDecision::RedirectToLogin {
            redirect: "/admin/dashboard".to_string()
        }
    );
}

#[test]
fn test_admin_root_without_principal_redirects_to_login() {
    assert_eq!(
        classify("/admin", None),
        GuardDecision::RedirectToLogin {
            redirect: "/admin".to_string()
        }
    );
}

#[test]
fn test_admin_path_with_wrong_role_redirects_home() {
    for role in [Role::Guest, Role::Student, Role::Vendor, Role::CoAdmin] {
        assert_eq!(
            classify("/admin/dashboard", Some(&principal(role))),
            GuardDecision::RedirectHome {
                error: "unauthorized"
            },
            "role {role} must not reach admin pages"
        );
    }
}

#[test]
fn test_admin_path_with_admin_passes() {
    assert_eq!(
        classify("/admin/dashboard", Some(&principal(Role::Admin))),
        GuardDecision::Pass
    );
}

#[test]
fn test_suspended_admin_is_redirected_home() {
    assert_eq!(
        classify("/admin/dashboard", Some(&suspended(Role::Admin))),
        GuardDecision::RedirectHome {
            error: "unauthorized"
        }
    );
}

#[test]
fn test_admin_prefix_matches_whole_segments_only() {
    // "/administrator-notes" merely shares a string prefix with "/admin".
    assert_eq!(classify("/administrator-notes", None), GuardDecision::Pass);
}

// --- Category 3: protected API paths ---

#[test]
fn test_protected_api_without_principal_is_401() {
    for path in ["/api/me", "/api/profile/settings", "/api/orders/42"] {
        assert_eq!(
            classify(path, None),
            GuardDecision::Unauthenticated,
            "{path} must require authentication"
        );
    }
}

#[test]
fn test_protected_api_with_any_principal_passes() {
    for role in [Role::Guest, Role::Student, Role::Vendor, Role::CoAdmin, Role::Admin] {
        assert_eq!(
            classify("/api/me", Some(&principal(role))),
            GuardDecision::Pass
        );
    }
}

#[test]
fn test_protected_api_rejects_suspended_principal() {
    assert_eq!(
        classify("/api/me", Some(&suspended(Role::Student))),
        GuardDecision::Unauthenticated
    );
}

#[test]
fn test_promotion_endpoint_requires_a_session() {
    // /api/admin is a protected prefix; only the setup path is exempt.
    assert_eq!(classify("/api/admin/promote", None), GuardDecision::Unauthenticated);
    assert_eq!(
        classify("/api/admin/promote", Some(&principal(Role::Student))),
        GuardDecision::Pass
    );
}

// --- Category 4: everything else ---

#[test]
fn test_public_paths_pass() {
    for path in ["/", "/health", "/login", "/api/auth/login", "/listings/7"] {
        assert_eq!(classify(path, None), GuardDecision::Pass, "{path}");
    }
}

#[test]
fn test_classification_is_deterministic() {
    // Same (path, principal) always yields the same decision.
    let p = principal(Role::Student);
    let first = classify("/admin/reports", Some(&p));
    let second = classify("/admin/reports", Some(&p));
    assert_eq!(first, second);
}
