// The authentication state machine.
//
// Every operation takes the incoming Cookie header and the current time, and
// returns typed outcomes plus the Set-Cookie headers to emit. Expected
// rejections (bad credentials, bad codes, conflicts) are enum variants, not
// errors; `Err` always means infrastructure trouble.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{info, warn};

use guardpost_core::db::{Connection, NewUser, Session, StoreError, User, VerificationKind};
use guardpost_core::error::Result;

use crate::context::AuthContext;
use crate::cookies::{ResponseCookies, SessionCookiePayload, VerificationCookiePayload};
use crate::crypto::{build_otpauth_uri, hash_password, verify_password};
use crate::crypto::password::verify_against_dummy;
use crate::email::EmailMessage;
use crate::oauth::ProviderProfile;
use crate::verification::{self, Lifetime};

// ─── Outcomes ───────────────────────────────────────────────────────────────

/// A successful authentication: who, which session, and what to set.
pub struct AuthSuccess {
    pub user: User,
    pub session: Session,
    pub response: ResponseCookies,
}

pub enum LoginOutcome {
    Authenticated(AuthSuccess),
    /// Credentials were right but the account has a second factor. The
    /// pending session rides the verification cookie until the code clears.
    TwoFactorRequired(ResponseCookies),
    /// Wrong username or wrong password; the caller cannot tell which.
    InvalidCredentials,
}

pub enum SignupOutcome {
    Authenticated(AuthSuccess),
    UserAlreadyExists,
}

/// The session behind the incoming request, if any.
pub enum ResolvedSession {
    Anonymous,
    /// A cookie was present but its session is gone or expired. The
    /// attached response clears the dead cookie.
    Stale(ResponseCookies),
    Active(ActiveSession),
}

pub struct ActiveSession {
    pub user: User,
    pub session: Session,
    /// When this session last passed a second-factor check.
    pub verified_at: Option<DateTime<Utc>>,
}

pub enum VerificationOutcome {
    /// Code missing, wrong, or past the record's lifetime.
    Invalid,
    /// An onboarding email was proven. The record is consumed and the
    /// verification cookie cleared; the caller may proceed to signup.
    EmailVerified {
        email: String,
        response: ResponseCookies,
    },
    /// A 2FA login challenge passed; the pending session is now the real one.
    TwoFactorPassed(AuthSuccess),
}

pub enum CallbackOutcome {
    /// Signed in through an existing or email-matched connection.
    Authenticated {
        success: AuthSuccess,
        redirect_to: String,
    },
    /// The provider account was already linked to the signed-in user.
    AlreadyConnected {
        redirect_to: String,
        response: ResponseCookies,
    },
    /// The provider account is linked to somebody else.
    ConnectedToOtherAccount {
        redirect_to: String,
        response: ResponseCookies,
    },
    /// New link added to the signed-in account.
    ConnectionAdded {
        redirect_to: String,
        response: ResponseCookies,
    },
    /// No local account matches; the caller should run onboarding.
    Onboarding {
        profile: ProviderProfile,
        suggested_username: String,
        redirect_to: String,
        response: ResponseCookies,
    },
    /// The code exchange failed.
    Failed {
        redirect_to: String,
        response: ResponseCookies,
    },
}

// ─── Engine ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Auth {
    ctx: Arc<AuthContext>,
}

impl Auth {
    pub fn new(ctx: Arc<AuthContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &AuthContext {
        &self.ctx
    }

    fn session_expiration(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + TimeDelta::seconds(self.ctx.options.session.ttl_seconds)
    }

    // ─── Credentials ────────────────────────────────────────────────────────

    /// The user matching these credentials, or `None` for either a missing
    /// account or a wrong password. The missing-account path still burns a
    /// hash so the two are indistinguishable by timing.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>> {
        let username = username.to_lowercase();
        let Some(user) = self.ctx.store.find_user_by_username(&username).await? else {
            verify_against_dummy(password);
            return Ok(None);
        };
        let Some(hash) = self.ctx.store.find_password_hash(&user.id).await? else {
            verify_against_dummy(password);
            return Ok(None);
        };
        if verify_password(password, &hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// Whether this password matches the signed-in user's. Used to gate
    /// password changes and account deletion.
    pub async fn verify_user_password(&self, user_id: &str, password: &str) -> Result<bool> {
        match self.ctx.store.find_password_hash(user_id).await? {
            Some(hash) => verify_password(password, &hash),
            None => {
                verify_against_dummy(password);
                Ok(false)
            }
        }
    }

    // ─── Login / signup / logout ────────────────────────────────────────────

    pub async fn login(
        &self,
        username: &str,
        password: &str,
        remember: bool,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome> {
        let Some(user) = self.verify_credentials(username, password).await? else {
            return Ok(LoginOutcome::InvalidCredentials);
        };

        let session = self
            .ctx
            .store
            .create_session(&user.id, self.session_expiration(now))
            .await?;

        let two_factor = self
            .ctx
            .store
            .find_verification(&user.id, VerificationKind::TwoFactor)
            .await?;

        if two_factor.is_some() {
            let mut response = ResponseCookies::new();
            let mut payload =
                VerificationCookiePayload::new(&user.id, VerificationKind::TwoFactor);
            payload.session_id = Some(session.id.clone());
            payload.remember = Some(remember);
            self.ctx.cookies.set_verification(&mut response, &payload)?;
            info!(user_id = %user.id, "login pending second factor");
            return Ok(LoginOutcome::TwoFactorRequired(response));
        }

        info!(user_id = %user.id, "login");
        Ok(LoginOutcome::Authenticated(self.establish(user, session, remember, None)))
    }

    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
        name: Option<String>,
        remember: bool,
        now: DateTime<Utc>,
    ) -> Result<SignupOutcome> {
        let new_user = NewUser {
            username: username.to_lowercase(),
            email: email.to_lowercase(),
            name,
            password_hash: Some(hash_password(password)?),
        };
        let created = self
            .ctx
            .store
            .create_user_with_password(new_user, self.session_expiration(now))
            .await;
        let (user, session) = match created {
            Ok(pair) => pair,
            Err(StoreError::UniqueViolation(_)) => return Ok(SignupOutcome::UserAlreadyExists),
            Err(e) => return Err(e.into()),
        };
        info!(user_id = %user.id, "signup");
        Ok(SignupOutcome::Authenticated(self.establish(user, session, remember, None)))
    }

    /// Clear the session cookie and delete the session row. The row deletion
    /// is detached: logout must succeed from the user's point of view even if
    /// the store is down, and the signed expiry bounds the orphan's lifetime.
    pub fn logout(&self, cookie_header: &str, now: DateTime<Utc>) -> ResponseCookies {
        let mut response = ResponseCookies::new();
        if let Some(payload) = self.ctx.cookies.read_session(cookie_header, now) {
            let store = self.ctx.store.clone();
            tokio::spawn(async move {
                if let Err(e) = store.delete_session(&payload.session_id).await {
                    warn!(session_id = %payload.session_id, error = %e, "session delete failed on logout");
                }
            });
        }
        self.ctx.cookies.clear_session(&mut response);
        response
    }

    /// Drop every session for a user (password change, account compromise).
    pub async fn logout_everywhere(&self, user_id: &str) -> Result<()> {
        self.ctx.store.delete_sessions_for_user(user_id).await?;
        info!(user_id = %user_id, "all sessions revoked");
        Ok(())
    }

    // ─── Session resolution ─────────────────────────────────────────────────

    pub async fn resolve_session(
        &self,
        cookie_header: &str,
        now: DateTime<Utc>,
    ) -> Result<ResolvedSession> {
        let Some(payload) = self.ctx.cookies.read_session(cookie_header, now) else {
            return Ok(ResolvedSession::Anonymous);
        };
        let session = self
            .ctx
            .store
            .find_live_session(&payload.session_id, now)
            .await?;
        let Some(session) = session else {
            let mut response = ResponseCookies::new();
            self.ctx.cookies.clear_session(&mut response);
            return Ok(ResolvedSession::Stale(response));
        };
        let Some(user) = self.ctx.store.find_user_by_id(&session.user_id).await? else {
            let mut response = ResponseCookies::new();
            self.ctx.cookies.clear_session(&mut response);
            return Ok(ResolvedSession::Stale(response));
        };
        Ok(ResolvedSession::Active(ActiveSession {
            user,
            session,
            verified_at: payload.verified_at,
        }))
    }

    /// The signed-in user, or where to send an anonymous request.
    pub async fn require_user(
        &self,
        cookie_header: &str,
        request_path: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<std::result::Result<ActiveSession, AuthRedirect>> {
        match self.resolve_session(cookie_header, now).await? {
            ResolvedSession::Active(active) => Ok(Ok(active)),
            ResolvedSession::Anonymous => Ok(Err(AuthRedirect {
                location: login_location(request_path),
                response: ResponseCookies::new(),
            })),
            ResolvedSession::Stale(response) => Ok(Err(AuthRedirect {
                location: login_location(request_path),
                response,
            })),
        }
    }

    /// `None` when the request is anonymous; `Some` redirect home otherwise.
    pub async fn require_anonymous(
        &self,
        cookie_header: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthRedirect>> {
        match self.resolve_session(cookie_header, now).await? {
            ResolvedSession::Active(_) => Ok(Some(AuthRedirect {
                location: "/".into(),
                response: ResponseCookies::new(),
            })),
            ResolvedSession::Anonymous | ResolvedSession::Stale(_) => Ok(None),
        }
    }

    /// Whether a sensitive action needs a fresh second-factor proof: the
    /// user has 2FA enabled and the session's last proof is missing or older
    /// than the configured window.
    pub async fn should_reverify(
        &self,
        active: &ActiveSession,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let enabled = self.is_two_factor_enabled(&active.user.id).await?;
        if !enabled {
            return Ok(false);
        }
        let window = TimeDelta::seconds(self.ctx.options.session.reverify_window_seconds);
        Ok(match active.verified_at {
            Some(verified_at) => verified_at + window <= now,
            None => true,
        })
    }

    // ─── Email verification ─────────────────────────────────────────────────

    /// Send a one-time code to an email address and set the verification
    /// cookie that ties the follow-up submission to this challenge.
    pub async fn issue_email_verification(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<ResponseCookies> {
        let email = email.to_lowercase();
        let policy = &self.ctx.options.verification;
        let (_, code) = verification::issue(
            self.ctx.store.as_ref(),
            policy,
            &email,
            VerificationKind::Onboarding,
            policy.email_code_period_seconds,
            Lifetime::Policy,
            now,
        )
        .await?;

        let mut text = format!("Your code is {code}. It expires in 10 minutes.");
        if let Some(base_url) = &self.ctx.options.base_url {
            // The link lands on the same record the typed-in code does.
            text.push_str(&format!(
                "\n\nOr open {base_url}/verify?type={}&target={}&code={code}",
                VerificationKind::Onboarding,
                urlencoding::encode(&email),
            ));
        }
        self.ctx
            .mailer
            .send(EmailMessage {
                to: email.clone(),
                subject: "Here's your verification code".into(),
                text,
                html: None,
            })
            .await?;

        let mut response = ResponseCookies::new();
        let payload = VerificationCookiePayload::new(&email, VerificationKind::Onboarding);
        self.ctx.cookies.set_verification(&mut response, &payload)?;
        info!(email = %email, "verification code issued");
        Ok(response)
    }

    /// Check a code against a named challenge directly. This is the landing
    /// path for emailed links, where no verification cookie is present.
    /// Consumes single-use records the same way the cookie path does.
    pub async fn complete_verification_for(
        &self,
        target: &str,
        kind: VerificationKind,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let consume = kind == VerificationKind::Onboarding;
        verification::check(
            self.ctx.store.as_ref(),
            &target.to_lowercase(),
            kind,
            code,
            now,
            consume,
        )
        .await
    }

    /// Check a submitted code against the challenge the verification cookie
    /// points at.
    pub async fn complete_verification(
        &self,
        cookie_header: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<VerificationOutcome> {
        let Some(payload) = self.ctx.cookies.read_verification(cookie_header) else {
            return Ok(VerificationOutcome::Invalid);
        };

        match payload.kind {
            VerificationKind::Onboarding => {
                let passed = verification::check(
                    self.ctx.store.as_ref(),
                    &payload.target,
                    VerificationKind::Onboarding,
                    code,
                    now,
                    true,
                )
                .await?;
                if !passed {
                    return Ok(VerificationOutcome::Invalid);
                }
                let mut response = ResponseCookies::new();
                self.ctx.cookies.clear_verification(&mut response);
                info!(email = %payload.target, "email verified");
                Ok(VerificationOutcome::EmailVerified {
                    email: payload.target,
                    response,
                })
            }
            VerificationKind::TwoFactor => {
                // The long-lived secret is never consumed.
                let passed = verification::check(
                    self.ctx.store.as_ref(),
                    &payload.target,
                    VerificationKind::TwoFactor,
                    code,
                    now,
                    false,
                )
                .await?;
                if !passed {
                    return Ok(VerificationOutcome::Invalid);
                }
                let Some(session_id) = payload.session_id else {
                    return Ok(VerificationOutcome::Invalid);
                };
                let Some(session) =
                    self.ctx.store.find_live_session(&session_id, now).await?
                else {
                    return Ok(VerificationOutcome::Invalid);
                };
                let Some(user) = self.ctx.store.find_user_by_id(&session.user_id).await? else {
                    return Ok(VerificationOutcome::Invalid);
                };
                let remember = payload.remember.unwrap_or(false);
                let mut success = self.establish(user, session, remember, Some(now));
                self.ctx.cookies.clear_verification(&mut success.response);
                info!(user_id = %success.user.id, "second factor passed");
                Ok(VerificationOutcome::TwoFactorPassed(success))
            }
            // Setup confirmation goes through `confirm_two_factor`, not the
            // cookie flow.
            VerificationKind::TwoFactorSetup => Ok(VerificationOutcome::Invalid),
        }
    }

    // ─── Two-factor management ──────────────────────────────────────────────

    pub async fn is_two_factor_enabled(&self, user_id: &str) -> Result<bool> {
        Ok(self
            .ctx
            .store
            .find_verification(user_id, VerificationKind::TwoFactor)
            .await?
            .is_some())
    }

    /// Start enabling 2FA: create (or supersede) the setup record and return
    /// the otpauth:// URI to show as a QR code.
    pub async fn start_two_factor_setup(
        &self,
        user: &User,
        issuer: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let policy = &self.ctx.options.verification;
        let (record, _) = verification::issue(
            self.ctx.store.as_ref(),
            policy,
            &user.id,
            VerificationKind::TwoFactorSetup,
            policy.totp_period_seconds,
            Lifetime::Policy,
            now,
        )
        .await?;
        Ok(build_otpauth_uri(
            &verification::totp_config(&record),
            issuer,
            &user.email,
        ))
    }

    /// Finish enabling 2FA: prove the authenticator has the secret, then
    /// promote the setup record to the permanent kind.
    pub async fn confirm_two_factor(
        &self,
        user_id: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(setup) = self
            .ctx
            .store
            .find_verification(user_id, VerificationKind::TwoFactorSetup)
            .await?
        else {
            return Ok(false);
        };
        if setup.is_expired(now) {
            verification::revoke(self.ctx.store.as_ref(), user_id, VerificationKind::TwoFactorSetup)
                .await?;
            return Ok(false);
        }
        if !crate::crypto::verify_totp(&verification::totp_config(&setup), code, now)? {
            return Ok(false);
        }

        let mut enabled = setup;
        enabled.kind = VerificationKind::TwoFactor;
        enabled.expires_at = None;
        self.ctx.store.upsert_verification(enabled).await?;
        verification::revoke(self.ctx.store.as_ref(), user_id, VerificationKind::TwoFactorSetup)
            .await?;
        info!(user_id = %user_id, "two-factor enabled");
        Ok(true)
    }

    /// Turn 2FA off. Callers gate this behind `should_reverify`.
    pub async fn disable_two_factor(&self, user_id: &str) -> Result<()> {
        verification::revoke(self.ctx.store.as_ref(), user_id, VerificationKind::TwoFactor)
            .await?;
        info!(user_id = %user_id, "two-factor disabled");
        Ok(())
    }

    // ─── Provider callback ──────────────────────────────────────────────────

    pub async fn handle_provider_callback(
        &self,
        provider_name: &str,
        code: &str,
        redirect_uri: &str,
        cookie_header: &str,
        remember: bool,
        now: DateTime<Utc>,
    ) -> Result<CallbackOutcome> {
        let mut response = ResponseCookies::new();
        let redirect_to = self
            .ctx
            .cookies
            .take_redirect(cookie_header, &mut response)
            .unwrap_or_else(|| "/".to_string());

        let Some(provider) = self.ctx.provider(provider_name) else {
            warn!(provider = %provider_name, "unknown provider");
            return Ok(CallbackOutcome::Failed {
                redirect_to: "/login".into(),
                response,
            });
        };

        let profile = match provider.exchange_code(code, redirect_uri).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(provider = %provider_name, error = %e, "code exchange failed");
                return Ok(CallbackOutcome::Failed {
                    redirect_to: "/login".into(),
                    response,
                });
            }
        };

        let existing = self
            .ctx
            .store
            .find_connection(provider_name, &profile.id)
            .await?;

        // Signed-in: this is a link request, not a login.
        if let ResolvedSession::Active(active) = self.resolve_session(cookie_header, now).await? {
            return Ok(match existing {
                Some(connection) if connection.user_id == active.user.id => {
                    CallbackOutcome::AlreadyConnected {
                        redirect_to: connections_location(),
                        response,
                    }
                }
                Some(_) => CallbackOutcome::ConnectedToOtherAccount {
                    redirect_to: connections_location(),
                    response,
                },
                None => {
                    self.ctx
                        .store
                        .create_connection(Connection::new(
                            provider_name,
                            &profile.id,
                            &active.user.id,
                        ))
                        .await?;
                    info!(user_id = %active.user.id, provider = %provider_name, "connection added");
                    CallbackOutcome::ConnectionAdded {
                        redirect_to: connections_location(),
                        response,
                    }
                }
            });
        }

        // Anonymous: log in through the connection if one exists.
        if let Some(connection) = existing {
            let Some(user) = self.ctx.store.find_user_by_id(&connection.user_id).await? else {
                return Ok(CallbackOutcome::Failed {
                    redirect_to: "/login".into(),
                    response,
                });
            };
            let session = self
                .ctx
                .store
                .create_session(&user.id, self.session_expiration(now))
                .await?;
            let mut success = self.establish(user, session, remember, None);
            merge(&mut success.response, response);
            info!(user_id = %success.user.id, provider = %provider_name, "login via connection");
            return Ok(CallbackOutcome::Authenticated {
                success,
                redirect_to,
            });
        }

        // No connection yet; an account with the same verified email claims it.
        let email = profile.email.to_lowercase();
        if let Some(user) = self.ctx.store.find_user_by_email(&email).await? {
            self.ctx
                .store
                .create_connection(Connection::new(provider_name, &profile.id, &user.id))
                .await?;
            let session = self
                .ctx
                .store
                .create_session(&user.id, self.session_expiration(now))
                .await?;
            let mut success = self.establish(user, session, remember, None);
            merge(&mut success.response, response);
            info!(user_id = %success.user.id, provider = %provider_name, "connection claimed by email match");
            return Ok(CallbackOutcome::Authenticated {
                success,
                redirect_to,
            });
        }

        let suggested_username = sanitize_username(
            profile.username.as_deref().unwrap_or(&email),
        );
        Ok(CallbackOutcome::Onboarding {
            profile,
            suggested_username,
            redirect_to,
            response,
        })
    }

    /// Finish provider onboarding: create the account (no password) with its
    /// connection, and sign in.
    pub async fn signup_with_connection(
        &self,
        provider_name: &str,
        profile: &ProviderProfile,
        username: &str,
        remember: bool,
        now: DateTime<Utc>,
    ) -> Result<SignupOutcome> {
        let new_user = NewUser {
            username: sanitize_username(username),
            email: profile.email.to_lowercase(),
            name: profile.name.clone(),
            password_hash: None,
        };
        let created = self
            .ctx
            .store
            .create_user_with_password(new_user, self.session_expiration(now))
            .await;
        let (user, session) = match created {
            Ok(pair) => pair,
            Err(StoreError::UniqueViolation(_)) => return Ok(SignupOutcome::UserAlreadyExists),
            Err(e) => return Err(e.into()),
        };
        self.ctx
            .store
            .create_connection(Connection::new(provider_name, &profile.id, &user.id))
            .await?;
        info!(user_id = %user.id, provider = %provider_name, "signup via provider");
        Ok(SignupOutcome::Authenticated(self.establish(user, session, remember, None)))
    }

    // ─── Internals ──────────────────────────────────────────────────────────

    fn establish(
        &self,
        user: User,
        session: Session,
        remember: bool,
        verified_at: Option<DateTime<Utc>>,
    ) -> AuthSuccess {
        let payload = SessionCookiePayload {
            session_id: session.id.clone(),
            expires: remember.then_some(session.expiration_date),
            verified_at,
        };
        let mut response = ResponseCookies::new();
        self.ctx.cookies.set_session(&mut response, &payload);
        AuthSuccess {
            user,
            session,
            response,
        }
    }
}

/// Where to bounce an anonymous request, preserving the destination.
pub struct AuthRedirect {
    pub location: String,
    pub response: ResponseCookies,
}

fn login_location(request_path: Option<&str>) -> String {
    match request_path {
        Some(path) if !path.is_empty() => {
            format!("/login?redirectTo={}", urlencoding::encode(path))
        }
        _ => "/login".into(),
    }
}

fn connections_location() -> String {
    "/settings/profile/connections".into()
}

fn merge(into: &mut ResponseCookies, from: ResponseCookies) {
    for header in from.headers() {
        into.push_raw(header.clone());
    }
}

/// Derive a valid username from provider data: letters, digits, and
/// underscores only, lowercased, clamped to 20 characters, padded to at
/// least 3.
pub fn sanitize_username(raw: &str) -> String {
    let mut username: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect::<String>()
        .to_lowercase();
    if username.len() > 20 {
        username.truncate(20);
    }
    while username.len() < 3 {
        username.push('_');
    }
    username
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_username_replaces_and_lowercases() {
        assert_eq!(sanitize_username("Jöhn Döe!!"), "j_hn_d_e__");
        assert_eq!(sanitize_username("kody"), "kody");
        assert_eq!(sanitize_username("UPPER"), "upper");
    }

    #[test]
    fn sanitize_username_clamps_length() {
        let long = "a".repeat(40);
        assert_eq!(sanitize_username(&long).len(), 20);
        assert_eq!(sanitize_username("ab"), "ab_");
        assert_eq!(sanitize_username(""), "___");
    }

    #[test]
    fn login_location_preserves_destination() {
        assert_eq!(login_location(None), "/login");
        assert_eq!(
            login_location(Some("/settings/profile")),
            "/login?redirectTo=%2Fsettings%2Fprofile"
        );
    }
}
