// Engine configuration.
//
// Built once at startup and treated as immutable afterwards. Every TTL and
// policy window the engine consults lives here — call sites never carry their
// own magic numbers.

use serde::{Deserialize, Serialize};

/// Default session lifetime: 30 days.
pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 60 * 60 * 24 * 30;

/// Default lifetime of a pending verification (email code, 2FA setup): 10 minutes.
pub const DEFAULT_VERIFICATION_TTL_SECONDS: i64 = 60 * 10;

/// Default lifetime of the verification cookie: 10 minutes.
pub const DEFAULT_VERIFICATION_COOKIE_MAX_AGE: i64 = 60 * 10;

/// Default lifetime of the redirect cookie carried across a provider hand-off.
pub const DEFAULT_REDIRECT_COOKIE_MAX_AGE: i64 = 60 * 10;

/// Default window after which a sensitive action forces a fresh 2FA proof: 2 hours.
pub const DEFAULT_REVERIFY_WINDOW_SECONDS: i64 = 60 * 60 * 2;

/// Top-level configuration for the authentication engine.
#[derive(Debug, Clone)]
pub struct AuthOptions {
    /// Signing/encryption secrets, newest first. The first secret signs new
    /// cookies; every secret in the list is accepted for verification, which
    /// makes rotation a matter of prepending.
    pub secrets: Vec<String>,

    /// Whether the engine is running in production (controls the cookie
    /// `Secure` flag).
    pub production: bool,

    /// Base URL of the application, used for verification links and provider
    /// redirect URIs (e.g. "https://example.com").
    pub base_url: Option<String>,

    /// Cookie names.
    pub cookies: CookieNames,

    /// Session policy.
    pub session: SessionPolicy,

    /// Verification policy.
    pub verification: VerificationPolicy,
}

/// Names of the three cookies the engine manages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieNames {
    pub session: String,
    pub verification: String,
    pub redirect_to: String,
}

impl Default for CookieNames {
    fn default() -> Self {
        Self {
            session: "gp_session".into(),
            verification: "gp_verification".into(),
            redirect_to: "gp_redirect_to".into(),
        }
    }
}

/// Session lifetime and reverification policy.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    /// Session TTL in seconds.
    pub ttl_seconds: i64,
    /// How stale a second-factor proof may be before a sensitive action
    /// forces a fresh one, in seconds.
    pub reverify_window_seconds: i64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            reverify_window_seconds: DEFAULT_REVERIFY_WINDOW_SECONDS,
        }
    }
}

/// Pending-verification policy and TOTP defaults.
#[derive(Debug, Clone)]
pub struct VerificationPolicy {
    /// How long a pending verification record stays valid, in seconds.
    pub ttl_seconds: i64,
    /// Max-age of the verification cookie, in seconds.
    pub cookie_max_age_seconds: i64,
    /// Max-age of the redirect cookie, in seconds.
    pub redirect_cookie_max_age_seconds: i64,
    /// Number of characters in a generated code.
    pub digits: u32,
    /// TOTP step for authenticator-app codes, in seconds.
    pub totp_period_seconds: u64,
    /// TOTP step for emailed codes, in seconds. Email round-trips are slow,
    /// so the window is the whole TTL.
    pub email_code_period_seconds: u64,
    /// Output alphabet for generated codes.
    pub char_set: String,
    /// Hash algorithm name stored with each record ("SHA-1", "SHA-256", "SHA-512").
    pub algorithm: String,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_VERIFICATION_TTL_SECONDS,
            cookie_max_age_seconds: DEFAULT_VERIFICATION_COOKIE_MAX_AGE,
            redirect_cookie_max_age_seconds: DEFAULT_REDIRECT_COOKIE_MAX_AGE,
            digits: 6,
            totp_period_seconds: 30,
            email_code_period_seconds: DEFAULT_VERIFICATION_TTL_SECONDS as u64,
            char_set: "0123456789".into(),
            algorithm: "SHA-1".into(),
        }
    }
}

impl AuthOptions {
    /// Build options from a single secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secrets: vec![secret.into()],
            production: false,
            base_url: None,
            cookies: CookieNames::default(),
            session: SessionPolicy::default(),
            verification: VerificationPolicy::default(),
        }
    }

    /// Build options from a comma-separated secret list, newest first.
    ///
    /// This is the shape the `SESSION_SECRET` environment variable takes.
    pub fn from_secret_list(secrets: &str) -> crate::error::Result<Self> {
        let parsed: Vec<String> = secrets
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if parsed.is_empty() {
            return Err(crate::error::AuthError::Config(
                "secret list is empty".into(),
            ));
        }
        let mut options = Self::new(parsed[0].clone());
        options.secrets = parsed;
        Ok(options)
    }

    /// The secret used to sign new values.
    pub fn signing_secret(&self) -> &str {
        &self.secrets[0]
    }
}
