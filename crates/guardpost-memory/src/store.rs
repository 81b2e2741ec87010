// HashMap-backed store.
//
// One lock guards all tables, so `create_user_with_password` is atomic for
// free and uniqueness checks cannot race with inserts.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use guardpost_core::db::{
    AuthStore, Connection, NewUser, Password, Session, StoreError, StoreResult, User, Verification,
    VerificationKind,
};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    passwords: HashMap<String, Password>,
    sessions: HashMap<String, Session>,
    verifications: HashMap<(String, VerificationKind), Verification>,
    connections: HashMap<(String, String), Connection>,
}

/// In-memory `AuthStore` implementation.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users currently stored. Test helper.
    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }

    /// Number of live and expired sessions currently stored. Test helper.
    pub async fn session_count(&self) -> usize {
        self.tables.read().await.sessions.len()
    }

    /// Drop every row.
    pub async fn clear(&self) {
        let mut tables = self.tables.write().await;
        *tables = Tables::default();
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn create_user_with_password(
        &self,
        new_user: NewUser,
        session_expiration: DateTime<Utc>,
    ) -> StoreResult<(User, Session)> {
        let mut tables = self.tables.write().await;

        let username = new_user.username.to_lowercase();
        let email = new_user.email.to_lowercase();
        let taken = tables
            .users
            .values()
            .any(|u| u.username == username || u.email == email);
        if taken {
            return Err(StoreError::UniqueViolation(
                "username or email already taken".into(),
            ));
        }

        let user = User::new(username, email, new_user.name);
        let session = Session::new(&user.id, session_expiration);
        if let Some(hash) = new_user.password_hash {
            tables.passwords.insert(
                user.id.clone(),
                Password {
                    user_id: user.id.clone(),
                    hash,
                },
            );
        }
        tables.sessions.insert(session.id.clone(), session.clone());
        tables.users.insert(user.id.clone(), user.clone());

        Ok((user, session))
    }

    async fn find_user_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_password_hash(&self, user_id: &str) -> StoreResult<Option<String>> {
        let tables = self.tables.read().await;
        Ok(tables.passwords.get(user_id).map(|p| p.hash.clone()))
    }

    async fn create_session(
        &self,
        user_id: &str,
        expiration_date: DateTime<Utc>,
    ) -> StoreResult<Session> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(user_id) {
            return Err(StoreError::Other(format!("no such user: {user_id}")));
        }
        let session = Session::new(user_id, expiration_date);
        tables.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn find_live_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Session>> {
        let mut tables = self.tables.write().await;
        match tables.sessions.get(session_id) {
            Some(session) if session.is_live(now) => Ok(Some(session.clone())),
            Some(_) => {
                // Expired rows are garbage-collected on lookup.
                tables.sessions.remove(session_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete_session(&self, session_id: &str) -> StoreResult<()> {
        self.tables.write().await.sessions.remove(session_id);
        Ok(())
    }

    async fn delete_sessions_for_user(&self, user_id: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.sessions.retain(|_, s| s.user_id != user_id);
        Ok(())
    }

    async fn upsert_verification(&self, verification: Verification) -> StoreResult<Verification> {
        let mut tables = self.tables.write().await;
        let key = (verification.target.clone(), verification.kind);
        tables.verifications.insert(key, verification.clone());
        Ok(verification)
    }

    async fn find_verification(
        &self,
        target: &str,
        kind: VerificationKind,
    ) -> StoreResult<Option<Verification>> {
        let tables = self.tables.read().await;
        Ok(tables.verifications.get(&(target.to_string(), kind)).cloned())
    }

    async fn delete_verification(&self, target: &str, kind: VerificationKind) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.verifications.remove(&(target.to_string(), kind));
        Ok(())
    }

    async fn create_connection(&self, connection: Connection) -> StoreResult<Connection> {
        let mut tables = self.tables.write().await;
        let key = (connection.provider_name.clone(), connection.provider_id.clone());
        if tables.connections.contains_key(&key) {
            return Err(StoreError::UniqueViolation(
                "connection already exists".into(),
            ));
        }
        tables.connections.insert(key, connection.clone());
        Ok(connection)
    }

    async fn find_connection(
        &self,
        provider_name: &str,
        provider_id: &str,
    ) -> StoreResult<Option<Connection>> {
        let tables = self.tables.read().await;
        Ok(tables
            .connections
            .get(&(provider_name.to_string(), provider_id.to_string()))
            .cloned())
    }

    async fn find_connections_for_user(&self, user_id: &str) -> StoreResult<Vec<Connection>> {
        let tables = self.tables.read().await;
        Ok(tables
            .connections
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }
}
