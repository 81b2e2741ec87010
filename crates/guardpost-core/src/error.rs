// Error taxonomy for the authentication engine.
//
// Expected failures (bad credentials, expired codes, conflicts) are modeled as
// typed outcomes in the orchestrator and never travel through `AuthError`.
// `AuthError` is reserved for infrastructure faults: store unreachable, mailer
// failure, crypto misuse, bad configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// User-facing error codes for expected rejections.
///
/// These name the *message* shown to the user, not the internal cause — a bad
/// username and a bad password produce the same code so the response cannot be
/// used to enumerate accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidUsernameOrPassword,
    InvalidCode,
    NotAuthenticated,
    AlreadyAuthenticated,
    UserAlreadyExists,
    ReverificationRequired,
    ProviderNotFound,
    ProviderAuthFailed,
    ConnectionAlreadyLinked,
    TwoFactorNotEnabled,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::InvalidUsernameOrPassword => "Invalid username or password",
            Self::InvalidCode => "Invalid code",
            Self::NotAuthenticated => "You must be logged in to do that",
            Self::AlreadyAuthenticated => "You are already logged in",
            Self::UserAlreadyExists => "A user already exists with this username or email",
            Self::ReverificationRequired => "Please reverify your account before proceeding",
            Self::ProviderNotFound => "Unknown authentication provider",
            Self::ProviderAuthFailed => "There was an error authenticating with the provider",
            Self::ConnectionAlreadyLinked => "This account is already connected",
            Self::TwoFactorNotEnabled => "Two-factor authentication is not enabled",
        };
        write!(f, "{msg}")
    }
}

/// Infrastructure error — the only kind the engine propagates with `?`.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Email delivery error: {0}")]
    Mailer(String),

    #[error("Identity provider error: {0}")]
    Provider(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Unified result type for engine operations.
pub type Result<T> = std::result::Result<T, AuthError>;
