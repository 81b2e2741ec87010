// The storage trait every backend implements.
//
// The engine receives an `Arc<dyn AuthStore>` at construction and never
// touches storage any other way. Backends report `StoreError`; the engine
// wraps it into `AuthError::Store` at the boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{Connection, Session, User, Verification, VerificationKind};
use crate::error::AuthError;

/// Input for atomic user creation.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    /// Already-hashed password. Plaintext never crosses this boundary.
    /// `None` for accounts onboarded through an external provider.
    pub password_hash: Option<String>,
}

/// Backend failure modes.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("store error: {0}")]
    Other(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Store(err.to_string())
    }
}

/// Persistence operations the engine needs.
///
/// Lookup methods return `Ok(None)` for "not found"; `Err` always means the
/// backend itself failed. All string keys are compared exactly as stored
/// (usernames and emails are lowercased before they get here).
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Create a user, their password row, and an initial session in one
    /// atomic step. Either all three exist afterwards or none do.
    async fn create_user_with_password(
        &self,
        new_user: NewUser,
        session_expiration: DateTime<Utc>,
    ) -> StoreResult<(User, Session)>;

    async fn find_user_by_id(&self, id: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// The stored password hash for a user, if they have one. OAuth-only
    /// accounts do not.
    async fn find_password_hash(&self, user_id: &str) -> StoreResult<Option<String>>;

    async fn create_session(
        &self,
        user_id: &str,
        expiration_date: DateTime<Utc>,
    ) -> StoreResult<Session>;

    /// A session that exists and has not expired as of `now`. Expired rows
    /// are treated as absent; backends may also garbage-collect them here.
    async fn find_live_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Session>>;

    /// Delete a session. Deleting a missing session is not an error.
    async fn delete_session(&self, session_id: &str) -> StoreResult<()>;

    /// Delete every session belonging to a user.
    async fn delete_sessions_for_user(&self, user_id: &str) -> StoreResult<()>;

    /// Insert or replace the verification for (target, kind). At most one
    /// record exists per key; a re-issue supersedes the previous challenge.
    async fn upsert_verification(&self, verification: Verification) -> StoreResult<Verification>;

    async fn find_verification(
        &self,
        target: &str,
        kind: VerificationKind,
    ) -> StoreResult<Option<Verification>>;

    /// Delete the verification for (target, kind). Missing is not an error.
    async fn delete_verification(&self, target: &str, kind: VerificationKind) -> StoreResult<()>;

    async fn create_connection(&self, connection: Connection) -> StoreResult<Connection>;

    async fn find_connection(
        &self,
        provider_name: &str,
        provider_id: &str,
    ) -> StoreResult<Option<Connection>>;

    async fn find_connections_for_user(&self, user_id: &str) -> StoreResult<Vec<Connection>>;
}
