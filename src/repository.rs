use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Profile, Role};

/// ProfileRepository Trait
///
/// Defines the abstract contract for the profile projection store: the local mirror
/// of the identity backend's account records, and the system of record consulted
/// for privileged role decisions. Handlers interact with this trait without knowing
/// the concrete implementation (Postgres, Memory, etc.).
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn ProfileRepository>`) safely shareable across Axum's task boundaries.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    // Resolution during session handling and promotion checks.
    async fn get_profile(&self, id: Uuid) -> Option<Profile>;
    // Bootstrap targets are addressed by email.
    async fn get_profile_by_email(&self, email: &str) -> Option<Profile>;

    // Creates the mirroring profile record after external sign-up success.
    async fn create_profile(&self, profile: Profile) -> Option<Profile>;
    // Role mutation for the projection half of the dual admin write.
    // Returns true only if a row was actually updated.
    async fn set_role(&self, id: Uuid, role: Role) -> bool;
}

/// RepositoryState
///
/// The concrete type used to share the profile store access across the application state.
pub type RepositoryState = Arc<dyn ProfileRepository>;

/// PostgresRepository
///
/// The concrete implementation of the `ProfileRepository` trait, backed by the
/// PostgreSQL `public.profiles` table.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileRepository for PostgresRepository {
    /// get_profile
    ///
    /// Retrieves the profile data (ID, email, role, suspension) needed for session
    /// resolution and authorization. A database error degrades to `None`: sessions
    /// must fail closed, not crash the request pipeline.
    async fn get_profile(&self, id: Uuid) -> Option<Profile> {
        sqlx::query_as::<_, Profile>(
            "SELECT id, email, role, suspended FROM profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_profile error: {:?}", e);
            None
        })
    }

    /// get_profile_by_email
    ///
    /// Case-insensitive email lookup used by the bootstrap workflow.
    async fn get_profile_by_email(&self, email: &str) -> Option<Profile> {
        sqlx::query_as::<_, Profile>(
            "SELECT id, email, role, suspended FROM profiles WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_profile_by_email error: {:?}", e);
            None
        })
    }

    /// create_profile
    ///
    /// Creates the mirroring profile record in `public.profiles` after external
    /// sign-up success, keeping primary keys synchronized with the identity backend.
    async fn create_profile(&self, profile: Profile) -> Option<Profile> {
        sqlx::query_as::<_, Profile>(
            "INSERT INTO profiles (id, email, role, suspended) VALUES ($1, $2, $3, $4) RETURNING id, email, role, suspended",
        )
        .bind(profile.id)
        .bind(&profile.email)
        .bind(profile.role.as_str())
        .bind(profile.suspended)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("create_profile error: {:?}", e);
            None
        })
    }

    /// set_role
    ///
    /// Updates the projection's role column. The caller treats `false` (no row, or a
    /// database error) as a failed write; when it follows a successful identity-side
    /// write the stores are now inconsistent, which the workflow surfaces rather
    /// than masks.
    async fn set_role(&self, id: Uuid, role: Role) -> bool {
        match sqlx::query("UPDATE profiles SET role = $2 WHERE id = $1")
            .bind(id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await
        {
            Ok(result) => result.rows_affected() > 0,
            Err(e) => {
                tracing::error!("set_role error: {:?}", e);
                false
            }
        }
    }
}

/// MemoryProfileRepository
///
/// An in-memory implementation of `ProfileRepository` used for unit and integration
/// testing, and for running the gate layer without a database. Keeps the same
/// observable semantics as the Postgres implementation.
pub struct MemoryProfileRepository {
    profiles: RwLock<HashMap<Uuid, Profile>>,
}

impl MemoryProfileRepository {
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
        }
    }

    /// Pre-populates the store, for test scaffolding.
    pub fn seeded(profiles: Vec<Profile>) -> Self {
        Self {
            profiles: RwLock::new(
                profiles
                    .into_iter()
                    .map(|profile| (profile.id, profile))
                    .collect(),
            ),
        }
    }
}

impl Default for MemoryProfileRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileRepository for MemoryProfileRepository {
    async fn get_profile(&self, id: Uuid) -> Option<Profile> {
        self.profiles.read().await.get(&id).cloned()
    }

    async fn get_profile_by_email(&self, email: &str) -> Option<Profile> {
        self.profiles
            .read()
            .await
            .values()
            .find(|profile| profile.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    async fn create_profile(&self, profile: Profile) -> Option<Profile> {
        let mut profiles = self.profiles.write().await;
        // Mirrors the primary-key constraint of the Postgres table.
        if profiles.contains_key(&profile.id) {
            return None;
        }
        profiles.insert(profile.id, profile.clone());
        Some(profile)
    }

    async fn set_role(&self, id: Uuid, role: Role) -> bool {
        match self.profiles.write().await.get_mut(&id) {
            Some(profile) => {
                profile.role = role;
                true
            }
            None => false,
        }
    }
}
