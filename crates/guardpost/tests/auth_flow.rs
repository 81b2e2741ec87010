// End-to-end flows through the engine against the in-memory store.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use guardpost::{
    Auth, AuthContext, AuthOptions, CallbackOutcome, LoginOutcome, MockMailer, MockProvider,
    ProviderProfile, ResolvedSession, SignupOutcome, VerificationOutcome,
};
use guardpost_core::db::AuthStore;
use guardpost_memory::MemoryStore;

struct Harness {
    auth: Auth,
    store: Arc<MemoryStore>,
    mailer: Arc<MockMailer>,
}

fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

fn harness() -> Harness {
    harness_with_provider(MockProvider::new("github"))
}

fn harness_with_provider(provider: MockProvider) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let mailer = Arc::new(MockMailer::new());
    let ctx = AuthContext::builder(AuthOptions::new("test-secret"))
        .store(store.clone())
        .mailer(mailer.clone())
        .provider(Arc::new(provider))
        .build()
        .unwrap();
    Harness {
        auth: Auth::new(ctx),
        store,
        mailer,
    }
}

fn cookie_header(response: &guardpost::ResponseCookies) -> String {
    response
        .headers()
        .iter()
        .filter(|h| !h.contains("Max-Age=0"))
        .map(|h| h.split(';').next().unwrap_or("").to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

async fn signed_up(h: &Harness, username: &str) -> (guardpost::AuthSuccess, String) {
    let outcome = h
        .auth
        .signup(username, &format!("{username}@example.com"), "s3cr3t-pw!", None, true, t0())
        .await
        .unwrap();
    match outcome {
        SignupOutcome::Authenticated(success) => {
            let header = cookie_header(&success.response);
            (success, header)
        }
        SignupOutcome::UserAlreadyExists => panic!("fresh username rejected"),
    }
}

fn code_from_email(text: &str) -> String {
    let rest = text.split("Your code is ").nth(1).expect("code in email");
    rest.chars().take(6).collect()
}

fn github_profile() -> ProviderProfile {
    ProviderProfile {
        id: "99001".into(),
        email: "kody@example.com".into(),
        username: Some("KodyWeb".into()),
        name: Some("Kody".into()),
        image_url: None,
    }
}

// ─── Password login and sessions ────────────────────────────────────────────

#[tokio::test]
async fn signup_login_resolve_roundtrip() {
    let h = harness();
    let (signup, _) = signed_up(&h, "kody").await;
    assert_eq!(signup.user.username, "kody");

    let outcome = h.auth.login("Kody", "s3cr3t-pw!", true, t0()).await.unwrap();
    let LoginOutcome::Authenticated(success) = outcome else {
        panic!("expected authenticated login");
    };
    let header = cookie_header(&success.response);

    let resolved = h.auth.resolve_session(&header, t0()).await.unwrap();
    let ResolvedSession::Active(active) = resolved else {
        panic!("expected active session");
    };
    assert_eq!(active.user.id, signup.user.id);
    assert!(active.verified_at.is_none());
}

#[tokio::test]
async fn wrong_password_and_unknown_user_look_identical() {
    let h = harness();
    signed_up(&h, "kody").await;

    let sessions_before = h.store.session_count().await;
    let wrong_pw = h.auth.login("kody", "not-the-password", true, t0()).await.unwrap();
    let no_user = h.auth.login("nobody", "whatever", true, t0()).await.unwrap();
    assert!(matches!(wrong_pw, LoginOutcome::InvalidCredentials));
    assert!(matches!(no_user, LoginOutcome::InvalidCredentials));
    // A rejected login leaves sessions untouched.
    assert_eq!(h.store.session_count().await, sessions_before);
}

#[tokio::test]
async fn duplicate_signup_rejected() {
    let h = harness();
    signed_up(&h, "kody").await;
    let outcome = h
        .auth
        .signup("kody", "other@example.com", "pw-123456", None, true, t0())
        .await
        .unwrap();
    assert!(matches!(outcome, SignupOutcome::UserAlreadyExists));
}

#[tokio::test]
async fn session_expires_with_ttl() {
    let h = harness();
    let (_, header) = signed_up(&h, "kody").await;

    let later = t0() + TimeDelta::days(31);
    let resolved = h.auth.resolve_session(&header, later).await.unwrap();
    // Past the 30-day TTL the cookie itself is dead.
    assert!(matches!(resolved, ResolvedSession::Anonymous));
}

#[tokio::test]
async fn logout_always_clears_cookie_and_deletes_session() {
    let h = harness();
    let (_, header) = signed_up(&h, "kody").await;
    assert_eq!(h.store.session_count().await, 1);

    let response = h.auth.logout(&header, t0());
    assert!(response.headers().iter().any(|c| c.contains("Max-Age=0")));

    // Deletion is detached; let it run.
    for _ in 0..10 {
        tokio::task::yield_now().await;
        if h.store.session_count().await == 0 {
            break;
        }
    }
    assert_eq!(h.store.session_count().await, 0);

    // Logging out again, with the row already gone, still clears the cookie.
    let again = h.auth.logout(&header, t0());
    assert!(again.headers().iter().any(|c| c.contains("Max-Age=0")));
}

#[tokio::test]
async fn stale_cookie_gets_cleared_on_resolve() {
    let h = harness();
    let (success, header) = signed_up(&h, "kody").await;
    h.store.delete_session(&success.session.id).await.unwrap();

    let resolved = h.auth.resolve_session(&header, t0()).await.unwrap();
    let ResolvedSession::Stale(response) = resolved else {
        panic!("expected stale session");
    };
    assert!(response.headers()[0].contains("Max-Age=0"));
}

#[tokio::test]
async fn require_user_redirects_anonymous_to_login() {
    let h = harness();
    let gate = h
        .auth
        .require_user("", Some("/settings/profile"), t0())
        .await
        .unwrap();
    let redirect = gate.err().expect("anonymous should be redirected");
    assert_eq!(redirect.location, "/login?redirectTo=%2Fsettings%2Fprofile");

    let (_, header) = signed_up(&h, "kody").await;
    assert!(h.auth.require_user(&header, None, t0()).await.unwrap().is_ok());
    let home = h.auth.require_anonymous(&header, t0()).await.unwrap();
    assert_eq!(home.unwrap().location, "/");
}

// ─── Email verification ─────────────────────────────────────────────────────

#[tokio::test]
async fn emailed_code_verifies_and_is_single_use() {
    let h = harness();
    let response = h
        .auth
        .issue_email_verification("Newbie@Example.com", t0())
        .await
        .unwrap();
    let header = cookie_header(&response);

    let email = h.mailer.last().await.expect("verification email sent");
    assert_eq!(email.to, "newbie@example.com");
    let code = code_from_email(&email.text);

    let outcome = h.auth.complete_verification(&header, &code, t0()).await.unwrap();
    let VerificationOutcome::EmailVerified { email, .. } = outcome else {
        panic!("expected verified email");
    };
    assert_eq!(email, "newbie@example.com");

    // The record was consumed with the first success.
    let replay = h.auth.complete_verification(&header, &code, t0()).await.unwrap();
    assert!(matches!(replay, VerificationOutcome::Invalid));
}

#[tokio::test]
async fn emailed_link_resolves_the_same_record() {
    use guardpost_core::db::VerificationKind;

    let h = harness();
    h.auth
        .issue_email_verification("newbie@example.com", t0())
        .await
        .unwrap();
    let code = code_from_email(&h.mailer.last().await.unwrap().text);

    // The link path needs no cookie and consumes the record too.
    assert!(h
        .auth
        .complete_verification_for("Newbie@Example.com", VerificationKind::Onboarding, &code, t0())
        .await
        .unwrap());
    assert!(!h
        .auth
        .complete_verification_for("newbie@example.com", VerificationKind::Onboarding, &code, t0())
        .await
        .unwrap());
}

#[tokio::test]
async fn emailed_code_dies_with_record_not_engine_window() {
    // The email code's time-step equals the record TTL (600s), so the
    // engine's ±1-step skew tolerance alone would accept it past the TTL.
    let h = harness();
    let response = h
        .auth
        .issue_email_verification("newbie@example.com", t0())
        .await
        .unwrap();
    let header = cookie_header(&response);
    let code = code_from_email(&h.mailer.last().await.unwrap().text);

    let just_inside = t0() + TimeDelta::seconds(599);
    let ok = h.auth.complete_verification(&header, &code, just_inside).await.unwrap();
    assert!(matches!(ok, VerificationOutcome::EmailVerified { .. }));

    // Re-issue and let it lapse.
    let response = h
        .auth
        .issue_email_verification("newbie@example.com", t0())
        .await
        .unwrap();
    let header = cookie_header(&response);
    let code = code_from_email(&h.mailer.last().await.unwrap().text);
    let just_outside = t0() + TimeDelta::seconds(601);
    let expired = h.auth.complete_verification(&header, &code, just_outside).await.unwrap();
    assert!(matches!(expired, VerificationOutcome::Invalid));
}

#[tokio::test]
async fn reissued_code_supersedes_the_first() {
    let h = harness();
    let first_response = h
        .auth
        .issue_email_verification("newbie@example.com", t0())
        .await
        .unwrap();
    let first_code = code_from_email(&h.mailer.last().await.unwrap().text);

    h.auth
        .issue_email_verification("newbie@example.com", t0())
        .await
        .unwrap();
    let second_code = code_from_email(&h.mailer.last().await.unwrap().text);

    let header = cookie_header(&first_response);
    if first_code != second_code {
        let stale = h.auth.complete_verification(&header, &first_code, t0()).await.unwrap();
        assert!(matches!(stale, VerificationOutcome::Invalid));
    }
    let fresh = h.auth.complete_verification(&header, &second_code, t0()).await.unwrap();
    assert!(matches!(fresh, VerificationOutcome::EmailVerified { .. }));
}

// ─── Two-factor ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_factor_enable_login_and_reverify_window() {
    let h = harness();
    let (signup, _) = signed_up(&h, "kody").await;
    let user = signup.user;

    // Enable: setup record, prove the authenticator, promote.
    let uri = h.auth.start_two_factor_setup(&user, "Epic Notes", t0()).await.unwrap();
    assert!(uri.starts_with("otpauth://totp/"));
    let secret = uri
        .split("secret=")
        .nth(1)
        .and_then(|s| s.split('&').next())
        .unwrap()
        .to_string();
    let code = totp_code(&secret, t0());
    assert!(h.auth.confirm_two_factor(&user.id, &code, t0()).await.unwrap());
    assert!(h.auth.is_two_factor_enabled(&user.id).await.unwrap());

    // Login now stops at the second factor.
    let outcome = h.auth.login("kody", "s3cr3t-pw!", true, t0()).await.unwrap();
    let LoginOutcome::TwoFactorRequired(challenge) = outcome else {
        panic!("expected a second-factor challenge");
    };
    let challenge_header = cookie_header(&challenge);

    // Wrong code stays unauthenticated.
    let bad = h
        .auth
        .complete_verification(&challenge_header, "000000", t0() + TimeDelta::seconds(1))
        .await
        .unwrap();
    assert!(matches!(bad, VerificationOutcome::Invalid));

    // Right code promotes the pending session.
    let login_time = t0() + TimeDelta::seconds(2);
    let code = totp_code(&secret, login_time);
    let outcome = h
        .auth
        .complete_verification(&challenge_header, &code, login_time)
        .await
        .unwrap();
    let VerificationOutcome::TwoFactorPassed(success) = outcome else {
        panic!("expected second factor to pass");
    };
    let session_header = cookie_header(&success.response);

    // Fresh proof: no reverification needed.
    let resolved = h.auth.resolve_session(&session_header, login_time).await.unwrap();
    let ResolvedSession::Active(active) = resolved else {
        panic!("expected active session");
    };
    assert_eq!(active.verified_at, Some(login_time));
    assert!(!h.auth.should_reverify(&active, login_time).await.unwrap());

    // Past the two-hour window the proof is stale.
    let later = login_time + TimeDelta::hours(2) + TimeDelta::seconds(1);
    assert!(h.auth.should_reverify(&active, later).await.unwrap());

    // Disabling removes the requirement entirely.
    h.auth.disable_two_factor(&user.id).await.unwrap();
    assert!(!h.auth.is_two_factor_enabled(&user.id).await.unwrap());
    assert!(!h.auth.should_reverify(&active, later).await.unwrap());
}

#[tokio::test]
async fn setup_code_does_not_enable_without_confirmation() {
    let h = harness();
    let (signup, _) = signed_up(&h, "kody").await;
    h.auth
        .start_two_factor_setup(&signup.user, "Epic Notes", t0())
        .await
        .unwrap();
    // Setup alone leaves 2FA off and login unchallenged.
    assert!(!h.auth.is_two_factor_enabled(&signup.user.id).await.unwrap());
    let outcome = h.auth.login("kody", "s3cr3t-pw!", true, t0()).await.unwrap();
    assert!(matches!(outcome, LoginOutcome::Authenticated(_)));
}

#[tokio::test]
async fn verify_user_password_gates_sensitive_changes() {
    let h = harness();
    let (signup, _) = signed_up(&h, "kody").await;
    assert!(h.auth.verify_user_password(&signup.user.id, "s3cr3t-pw!").await.unwrap());
    assert!(!h.auth.verify_user_password(&signup.user.id, "nope").await.unwrap());
}

// ─── Provider connections ───────────────────────────────────────────────────

#[tokio::test]
async fn callback_onboards_unknown_account_with_sanitized_username() {
    let h = harness_with_provider(
        MockProvider::new("github").with_profile("good-code", ProviderProfile {
            username: Some("Jöhn Döe!!".into()),
            ..github_profile()
        }),
    );

    let outcome = h
        .auth
        .handle_provider_callback("github", "good-code", "https://app/cb", "", true, t0())
        .await
        .unwrap();
    let CallbackOutcome::Onboarding { profile, suggested_username, .. } = outcome else {
        panic!("expected onboarding hand-off");
    };
    assert_eq!(suggested_username, "j_hn_d_e__");

    let signed = h
        .auth
        .signup_with_connection("github", &profile, &suggested_username, true, t0())
        .await
        .unwrap();
    let SignupOutcome::Authenticated(success) = signed else {
        panic!("expected provider signup to authenticate");
    };
    assert_eq!(success.user.username, "j_hn_d_e__");
    // No password on a provider-onboarded account.
    assert!(!h.auth.verify_user_password(&success.user.id, "anything").await.unwrap());

    // Next callback logs straight in through the stored connection.
    let outcome = h
        .auth
        .handle_provider_callback("github", "good-code", "https://app/cb", "", true, t0())
        .await
        .unwrap();
    assert!(matches!(outcome, CallbackOutcome::Authenticated { .. }));
}

#[tokio::test]
async fn callback_distinguishes_own_and_foreign_connections() {
    let h = harness_with_provider(
        MockProvider::new("github").with_profile("good-code", github_profile()),
    );
    let (_, kody_header) = signed_up(&h, "kody").await;

    // First link from kody's session.
    let outcome = h
        .auth
        .handle_provider_callback("github", "good-code", "https://app/cb", &kody_header, true, t0())
        .await
        .unwrap();
    assert!(matches!(outcome, CallbackOutcome::ConnectionAdded { .. }));

    // Linking the same provider account again is idempotent for kody.
    let outcome = h
        .auth
        .handle_provider_callback("github", "good-code", "https://app/cb", &kody_header, true, t0())
        .await
        .unwrap();
    assert!(matches!(outcome, CallbackOutcome::AlreadyConnected { .. }));

    // A different signed-in user hits the conflict.
    let (_, hannah_header) = signed_up(&h, "hannah").await;
    let outcome = h
        .auth
        .handle_provider_callback("github", "good-code", "https://app/cb", &hannah_header, true, t0())
        .await
        .unwrap();
    assert!(matches!(outcome, CallbackOutcome::ConnectedToOtherAccount { .. }));
}

#[tokio::test]
async fn callback_matches_existing_account_by_email() {
    let h = harness_with_provider(
        MockProvider::new("github").with_profile("good-code", github_profile()),
    );
    // kody already has a password account under the same email.
    signed_up(&h, "kody").await;

    let outcome = h
        .auth
        .handle_provider_callback("github", "good-code", "https://app/cb", "", true, t0())
        .await
        .unwrap();
    let CallbackOutcome::Authenticated { success, .. } = outcome else {
        panic!("expected email match to log in");
    };
    assert_eq!(success.user.username, "kody");
    assert_eq!(h.store.user_count().await, 1);
}

#[tokio::test]
async fn callback_failure_redirects_to_login() {
    let h = harness();
    let outcome = h
        .auth
        .handle_provider_callback("github", "bad-code", "https://app/cb", "", true, t0())
        .await
        .unwrap();
    let CallbackOutcome::Failed { redirect_to, .. } = outcome else {
        panic!("expected failure");
    };
    assert_eq!(redirect_to, "/login");
}

// Recompute a code from the otpauth secret the way an authenticator would.
fn totp_code(secret: &str, now: DateTime<Utc>) -> String {
    let config = guardpost::crypto::TotpConfig {
        secret: secret.to_string(),
        algorithm: "SHA-1".into(),
        digits: 6,
        period_seconds: 30,
        char_set: "0123456789".into(),
    };
    guardpost::crypto::generate_totp(&config, now).unwrap()
}
