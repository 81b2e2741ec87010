// Persisted data models.
//
// Usernames and emails are stored lowercased; comparisons elsewhere rely on
// that. Timestamps are UTC throughout.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Role assigned at signup. The engine only ever writes the default.
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>, name: Option<String>) -> Self {
        let username: String = username.into();
        let email: String = email.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_lowercase(),
            email: email.to_lowercase(),
            name,
            role: "user".into(),
            created_at: Utc::now(),
        }
    }
}

/// A user's password hash. One-to-one with `User`; the plaintext never
/// appears anywhere in the engine after hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Password {
    pub user_id: String,
    pub hash: String,
}

/// An authenticated session. A session whose `expiration_date` has passed is
/// indistinguishable from a missing one on lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub expiration_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, expiration_date: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            expiration_date,
            created_at: Utc::now(),
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date > now
    }
}

/// What a pending verification challenge proves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationKind {
    /// Email ownership during signup.
    #[serde(rename = "onboarding")]
    Onboarding,
    /// An enabled second factor (the long-lived authenticator secret).
    #[serde(rename = "2fa")]
    TwoFactor,
    /// A second factor being set up but not yet confirmed.
    #[serde(rename = "2fa-verify")]
    TwoFactorSetup,
}

impl VerificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Onboarding => "onboarding",
            Self::TwoFactor => "2fa",
            Self::TwoFactorSetup => "2fa-verify",
        }
    }
}

impl fmt::Display for VerificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A pending verification challenge, unique on (target, kind).
///
/// Carries the full one-time-passcode configuration so a code can be
/// revalidated later without any out-of-band state. `expires_at` is the
/// record's own lifetime and is enforced by the record store, not recomputed
/// by the passcode engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    /// What is being verified: an email address, or a user id for 2FA.
    pub target: String,
    pub kind: VerificationKind,
    /// Base32-encoded shared secret.
    pub secret: String,
    /// Hash algorithm name ("SHA-1", "SHA-256", "SHA-512").
    pub algorithm: String,
    /// Code length in characters.
    pub digits: u32,
    /// Time-step in seconds.
    pub period_seconds: u64,
    /// Output alphabet.
    pub char_set: String,
    /// `None` for challenges that never lapse (an enabled second factor).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Verification {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }
}

/// A link between a local user and an external identity provider account,
/// unique on (provider_name, provider_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub provider_name: String,
    pub provider_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(
        provider_name: impl Into<String>,
        provider_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            provider_name: provider_name.into(),
            provider_id: provider_id.into(),
            user_id: user_id.into(),
            created_at: Utc::now(),
        }
    }
}
