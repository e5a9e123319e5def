use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Access-Control Schemas ---

/// Role
///
/// The fixed set of roles recognized by the platform. The authoritative value lives
/// in the identity backend and is mirrored into the `public.profiles` projection;
/// privileged decisions must always be made against one of those records, never
/// against a value embedded in a session token.
///
/// Serialized in kebab-case ("co-admin") for API and frontend compatibility, and
/// stored as plain TEXT in the profiles table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum Role {
    #[default]
    Guest,
    Student,
    Vendor,
    CoAdmin,
    Admin,
}

impl Role {
    /// The canonical wire/storage spelling of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Student => "student",
            Role::Vendor => "vendor",
            Role::CoAdmin => "co-admin",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role string that matches none of the known values. Reaching this means the
/// profiles table holds data this build does not understand.
#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(String);

// Used by sqlx to decode the TEXT role column (`#[sqlx(try_from = "String")]`).
impl TryFrom<String> for Role {
    type Error = ParseRoleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "guest" => Ok(Role::Guest),
            "student" => Ok(Role::Student),
            "vendor" => Ok(Role::Vendor),
            "co-admin" => Ok(Role::CoAdmin),
            "admin" => Ok(Role::Admin),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

/// Principal
///
/// The resolved identity and role for the current request. Produced per-request by
/// the session resolver (JWT `sub` claim plus a live profile lookup) and stashed in
/// request extensions by the gate middleware; never persisted by this layer.
#[derive(Debug, Clone)]
pub struct Principal {
    /// The unique identifier of the user, shared with the identity backend.
    pub id: Uuid,
    /// The role as currently recorded in the profile projection.
    pub role: Role,
    /// Suspended accounts keep resolving (so cookie rotation still works) but are
    /// rejected by the route guard on protected categories.
    pub suspended: bool,
}

/// Profile
///
/// The profile projection row in `public.profiles`, mirroring the identity backend's
/// account record. This is the system of record consulted for privileged decisions.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Profile {
    // Primary Key, also the key of the corresponding identity backend account.
    pub id: Uuid,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub suspended: bool,
}

/// SessionTokens
///
/// The token pair returned by the identity backend's token endpoint. Both values are
/// written back to the client as HttpOnly cookies by the session layer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// Credentials for the password grant (POST /api/auth/login). The password is only
/// passed through to the external identity backend and never persisted or logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// RegisterUserRequest
///
/// Input payload for the public registration endpoint (POST /api/auth/register).
/// The role is optional and restricted to non-privileged values; requesting an
/// administrative role here is rejected outright.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// BootstrapAdminRequest
///
/// Input payload for creating the first administrator (POST /api/admin/setup).
/// The setup secret is a deployment-wide possession proof, independent of any session.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BootstrapAdminRequest {
    /// Email of the existing account to promote.
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_secret: Option<String>,
}

/// PromoteAdminRequest
///
/// Input payload for promoting a further administrator (POST /api/admin/promote).
/// The caller must hold an authenticated session whose role re-verifies as admin
/// against the profile projection at call time.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PromoteAdminRequest {
    pub user_id: Uuid,
}

/// --- Output Schemas ---

/// MessageResponse
///
/// Generic success envelope for mutation endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

/// ErrorResponse
///
/// The single error envelope produced by the gate layer: a human-readable message,
/// no internal identifiers or stack traces.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ErrorResponse {
    pub error: String,
}

/// UserProfile
///
/// Output schema for the authenticated user's profile (GET /api/me).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub suspended: bool,
    // Dynamic URL for a profile image/avatar.
    pub avatar_url: Option<String>,
}
