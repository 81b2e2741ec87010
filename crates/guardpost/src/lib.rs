// guardpost — an authentication engine for web applications.
//
// Password login with cookie sessions, one-time-code email verification,
// time-based second factors, and external identity provider connections.
// The engine is transport-agnostic: operations take the incoming Cookie
// header and the current time, and hand back typed outcomes plus the
// Set-Cookie headers to emit. Storage, mail delivery, and providers are
// trait objects supplied at construction.

pub mod auth;
pub mod context;
pub mod cookies;
pub mod crypto;
pub mod email;
pub mod oauth;
pub mod verification;

pub use auth::{
    ActiveSession, Auth, AuthRedirect, AuthSuccess, CallbackOutcome, LoginOutcome,
    ResolvedSession, SignupOutcome, VerificationOutcome, sanitize_username,
};
pub use context::{AuthContext, AuthContextBuilder};
pub use cookies::{AuthCookies, ResponseCookies, SessionCookiePayload, VerificationCookiePayload};
pub use email::{EmailMessage, Mailer, MockMailer};
pub use oauth::{GitHubProvider, IdentityProvider, MockProvider, ProviderProfile};

pub use guardpost_core::{AuthError, AuthOptions, ErrorCode, Result};
