use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Role, SessionTokens};

/// IdentityError
///
/// The two failure shapes of the identity backend boundary. The distinction matters
/// to the session resolver: a rejection means the session is dead and its cookies
/// should be cleared, while unavailability is transient and must not log users out.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The backend understood the request and refused it (4xx).
    #[error("identity backend rejected the request")]
    Rejected,
    /// The backend could not be reached or failed internally (transport error, 5xx).
    #[error("identity backend unavailable: {0}")]
    Unavailable(String),
}

/// IdentityService Trait
///
/// Defines the abstract contract for the external identity backend. This mirrors the
/// Repository Abstraction pattern: handlers and the session resolver interact with
/// the identity boundary without knowing the concrete transport (HTTP, Mock, etc.).
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn IdentityService>`) safely shareable across Axum's task boundaries.
#[async_trait]
pub trait IdentityService: Send + Sync {
    // --- Token Grants ---
    /// Exchange email/password for a session token pair.
    async fn password_login(&self, email: &str, password: &str)
    -> Result<SessionTokens, IdentityError>;
    /// Exchange a refresh token for a rotated token pair.
    async fn refresh_session(&self, refresh_token: &str) -> Result<SessionTokens, IdentityError>;

    // --- Account Management ---
    /// Create a new account; returns the canonical account id.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Uuid, IdentityError>;

    /// Whether any account currently holds the admin role.
    ///
    /// Computed live from the backend's account list on every call and never cached:
    /// a stale "no admin exists" view would let a second "first" administrator be
    /// created after the true first admin appeared through another path. The full
    /// scan is unbounded cost as the user base grows; a denormalized existence flag
    /// is the production follow-up.
    async fn any_admin_account(&self) -> Result<bool, IdentityError>;

    /// Write a role onto the identity record (the system of record).
    async fn set_account_role(&self, id: Uuid, role: Role) -> Result<(), IdentityError>;
}

/// IdentityState
///
/// The concrete type used to share the identity boundary across the application state.
pub type IdentityState = Arc<dyn IdentityService>;

// --- The Real Implementation (HTTP, GoTrue-shaped) ---

/// HttpIdentityService
///
/// The concrete implementation backed by a Supabase-style auth service over HTTP.
/// Token grants go through `/auth/v1/token`, registration through `/auth/v1/signup`,
/// and account administration through the service-key-protected `/auth/v1/admin`
/// surface.
pub struct HttpIdentityService {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

// Minimal deserialization targets for the backend's responses.

#[derive(Deserialize)]
struct SignupResponse {
    id: Uuid,
}

#[derive(Deserialize)]
struct AccountRecord {
    #[serde(default)]
    role: Option<String>,
}

#[derive(Deserialize)]
struct AccountList {
    users: Vec<AccountRecord>,
}

impl HttpIdentityService {
    pub fn new(base_url: &str, service_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }

    fn status_error(status: reqwest::StatusCode) -> IdentityError {
        if status.is_server_error() {
            IdentityError::Unavailable(format!("identity backend returned {status}"))
        } else {
            IdentityError::Rejected
        }
    }
}

fn transport_error(err: reqwest::Error) -> IdentityError {
    IdentityError::Unavailable(err.to_string())
}

#[async_trait]
impl IdentityService for HttpIdentityService {
    /// password_login
    ///
    /// The password grant. Invalid credentials are a rejection; everything else that
    /// keeps us from an answer is unavailability.
    async fn password_login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SessionTokens, IdentityError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/token?grant_type=password", self.base_url))
            .header("apikey", &self.service_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(Self::status_error(response.status()));
        }

        response
            .json::<SessionTokens>()
            .await
            .map_err(transport_error)
    }

    /// refresh_session
    ///
    /// The refresh grant. The backend rotates both tokens on success.
    async fn refresh_session(&self, refresh_token: &str) -> Result<SessionTokens, IdentityError> {
        let response = self
            .client
            .post(format!(
                "{}/auth/v1/token?grant_type=refresh_token",
                self.base_url
            ))
            .header("apikey", &self.service_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(Self::status_error(response.status()));
        }

        response
            .json::<SessionTokens>()
            .await
            .map_err(transport_error)
    }

    /// sign_up
    ///
    /// Creates the account in the identity backend and returns its canonical UUID,
    /// which the caller mirrors into the profile projection to keep the primary keys
    /// synchronized.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Uuid, IdentityError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/signup", self.base_url))
            .header("apikey", &self.service_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(Self::status_error(response.status()));
        }

        let created = response
            .json::<SignupResponse>()
            .await
            .map_err(transport_error)?;
        Ok(created.id)
    }

    /// any_admin_account
    ///
    /// Scans the backend's account list for an admin role.
    async fn any_admin_account(&self) -> Result<bool, IdentityError> {
        let response = self
            .client
            .get(format!("{}/auth/v1/admin/users", self.base_url))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(Self::status_error(response.status()));
        }

        let accounts = response
            .json::<AccountList>()
            .await
            .map_err(transport_error)?;
        Ok(accounts
            .users
            .iter()
            .any(|account| account.role.as_deref() == Some(Role::Admin.as_str())))
    }

    /// set_account_role
    ///
    /// Writes the role onto the identity record through the admin API.
    async fn set_account_role(&self, id: Uuid, role: Role) -> Result<(), IdentityError> {
        let response = self
            .client
            .put(format!("{}/auth/v1/admin/users/{id}", self.base_url))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .json(&serde_json::json!({ "role": role.as_str() }))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(Self::status_error(response.status()));
        }

        Ok(())
    }
}

// --- The Mock Implementation (For Unit Tests) ---

/// MockIdentityService
///
/// A mock implementation of `IdentityService` used exclusively for unit and
/// integration testing. This allows session, bootstrap, and end-to-end flows to be
/// exercised without a network connection to the identity backend, isolating the
/// test boundary.
///
/// The knobs are plain public fields, set before the mock is wrapped in an `Arc`.
pub struct MockIdentityService {
    /// Simulates the live admin-existence scan before any writes happen here.
    pub admin_exists: bool,
    /// When true, every operation fails as a transport-level outage.
    pub unavailable: bool,
    /// When true, token grants fail as credential rejections.
    pub reject_credentials: bool,
    /// The token pair handed out by successful grants.
    pub tokens: SessionTokens,
    /// Every role write accepted by the mock, for assertions.
    pub role_writes: Mutex<Vec<(Uuid, Role)>>,
}

impl MockIdentityService {
    pub fn new() -> Self {
        Self {
            admin_exists: false,
            unavailable: false,
            reject_credentials: false,
            tokens: SessionTokens {
                access_token: "mock-access-token".to_string(),
                refresh_token: "mock-refresh-token".to_string(),
            },
            role_writes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_admin() -> Self {
        Self {
            admin_exists: true,
            ..Self::new()
        }
    }

    pub fn new_unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new()
        }
    }

    pub fn new_rejecting() -> Self {
        Self {
            reject_credentials: true,
            ..Self::new()
        }
    }

    /// Snapshot of the role writes recorded so far.
    pub fn recorded_role_writes(&self) -> Vec<(Uuid, Role)> {
        self.role_writes
            .lock()
            .map(|writes| writes.clone())
            .unwrap_or_default()
    }

    fn outage(&self) -> Result<(), IdentityError> {
        if self.unavailable {
            Err(IdentityError::Unavailable(
                "mock outage: simulation requested".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl Default for MockIdentityService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityService for MockIdentityService {
    async fn password_login(
        &self,
        _email: &str,
        _password: &str,
    ) -> Result<SessionTokens, IdentityError> {
        self.outage()?;
        if self.reject_credentials {
            return Err(IdentityError::Rejected);
        }
        Ok(self.tokens.clone())
    }

    async fn refresh_session(&self, _refresh_token: &str) -> Result<SessionTokens, IdentityError> {
        self.outage()?;
        if self.reject_credentials {
            return Err(IdentityError::Rejected);
        }
        Ok(self.tokens.clone())
    }

    async fn sign_up(&self, _email: &str, _password: &str) -> Result<Uuid, IdentityError> {
        self.outage()?;
        Ok(Uuid::new_v4())
    }

    async fn any_admin_account(&self) -> Result<bool, IdentityError> {
        self.outage()?;
        // Role writes recorded against the mock count as live state, so a second
        // bootstrap attempt in the same test observes the first one.
        let promoted = self
            .role_writes
            .lock()
            .map(|writes| writes.iter().any(|(_, role)| *role == Role::Admin))
            .unwrap_or(false);
        Ok(self.admin_exists || promoted)
    }

    async fn set_account_role(&self, id: Uuid, role: Role) -> Result<(), IdentityError> {
        self.outage()?;
        if let Ok(mut writes) = self.role_writes.lock() {
            writes.push((id, role));
        }
        Ok(())
    }
}
