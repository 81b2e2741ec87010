// Cookie jar for the three cookies the engine owns: session, verification,
// and redirect-to.
//
// Session and verification cookies are tamper-proofed. The session payload is
// signed (HMAC-SHA256) with the newest secret and verified against every
// configured secret, so rotating secrets never logs anyone out. The payload
// carries its own expiry; a replayed cookie with a doctored Max-Age still dies
// on time because the signed expiry wins. The verification cookie is
// symmetrically encrypted since its contents (who is mid-verification, and
// for what) should not be readable client-side.

pub mod redirect;
pub mod utils;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use guardpost_core::db::VerificationKind;
use guardpost_core::options::AuthOptions;

use crate::crypto::{make_signature, symmetric_decrypt, symmetric_encrypt, verify_signature};
use utils::{parse_cookies, serialize_cookie, CookieAttributes};

/// What the session cookie actually stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookiePayload {
    pub session_id: String,
    /// Absolute expiry. `None` means a browser-session cookie ("remember me"
    /// unchecked), which the browser drops on close.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    /// When the user last proved their second factor, if ever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

/// What the verification cookie stores while a challenge is pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationCookiePayload {
    pub target: String,
    pub kind: VerificationKind,
    /// The session waiting behind a 2FA challenge at login. It only becomes
    /// the session cookie once the code checks out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remember: Option<bool>,
}

impl VerificationCookiePayload {
    pub fn new(target: impl Into<String>, kind: VerificationKind) -> Self {
        Self {
            target: target.into(),
            kind,
            session_id: None,
            remember: None,
        }
    }
}

/// Set-Cookie headers accumulated over one request.
#[derive(Debug, Default)]
pub struct ResponseCookies {
    headers: Vec<String>,
}

impl ResponseCookies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, attrs: &CookieAttributes) {
        self.headers.push(serialize_cookie(name, attrs));
    }

    /// The `Set-Cookie` header values, in the order they were set.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Append an already-serialized `Set-Cookie` header.
    pub fn push_raw(&mut self, header: String) {
        self.headers.push(header);
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// Reads and writes the engine's cookies according to the configured policy.
#[derive(Debug, Clone)]
pub struct AuthCookies {
    options: AuthOptions,
}

impl AuthCookies {
    pub fn new(options: AuthOptions) -> Self {
        Self { options }
    }

    // ─── Session cookie ─────────────────────────────────────────────────────

    pub fn set_session(&self, response: &mut ResponseCookies, payload: &SessionCookiePayload) {
        let value = self.sign_payload(payload);
        let mut attrs =
            CookieAttributes::http_only_lax(value, self.options.production);
        if payload.expires.is_some() {
            attrs = attrs.with_max_age(self.options.session.ttl_seconds);
        }
        response.set(&self.options.cookies.session, &attrs);
    }

    /// The session payload, if the cookie is present, untampered, and not
    /// past its signed expiry.
    pub fn read_session(&self, cookie_header: &str, now: DateTime<Utc>) -> Option<SessionCookiePayload> {
        let cookies = parse_cookies(cookie_header);
        let raw = cookies.get(&self.options.cookies.session)?;
        let payload: SessionCookiePayload = self.unsign_payload(raw)?;
        match payload.expires {
            Some(expires) if expires <= now => None,
            _ => Some(payload),
        }
    }

    pub fn clear_session(&self, response: &mut ResponseCookies) {
        response.set(
            &self.options.cookies.session,
            &CookieAttributes::expired(self.options.production),
        );
    }

    // ─── Verification cookie ────────────────────────────────────────────────

    pub fn set_verification(
        &self,
        response: &mut ResponseCookies,
        payload: &VerificationCookiePayload,
    ) -> guardpost_core::Result<()> {
        let json = serde_json::to_string(payload)
            .map_err(|e| guardpost_core::AuthError::Crypto(format!("cookie encode failed: {e}")))?;
        let value = symmetric_encrypt(self.options.signing_secret(), &json)?;
        let attrs = CookieAttributes::http_only_lax(value, self.options.production)
            .with_max_age(self.options.verification.cookie_max_age_seconds);
        response.set(&self.options.cookies.verification, &attrs);
        Ok(())
    }

    pub fn read_verification(&self, cookie_header: &str) -> Option<VerificationCookiePayload> {
        let cookies = parse_cookies(cookie_header);
        let raw = cookies.get(&self.options.cookies.verification)?;
        for secret in &self.options.secrets {
            if let Ok(json) = symmetric_decrypt(secret, raw) {
                return serde_json::from_str(&json).ok();
            }
        }
        None
    }

    pub fn clear_verification(&self, response: &mut ResponseCookies) {
        response.set(
            &self.options.cookies.verification,
            &CookieAttributes::expired(self.options.production),
        );
    }

    // ─── Signing helpers ────────────────────────────────────────────────────

    fn sign_payload<T: Serialize>(&self, payload: &T) -> String {
        // Serialization of these payload structs cannot fail.
        let json = serde_json::to_string(payload).unwrap_or_default();
        let encoded = URL_SAFE_NO_PAD.encode(json.as_bytes());
        let signature = make_signature(&encoded, self.options.signing_secret())
            .unwrap_or_default();
        format!("{encoded}.{signature}")
    }

    fn unsign_payload<T: for<'de> Deserialize<'de>>(&self, value: &str) -> Option<T> {
        let (encoded, signature) = value.split_once('.')?;
        let verified = self.options.secrets.iter().any(|secret| {
            verify_signature(encoded, secret, signature).unwrap_or(false)
        });
        if !verified {
            return None;
        }
        let json = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        serde_json::from_slice(&json).ok()
    }

    pub(crate) fn options(&self) -> &AuthOptions {
        &self.options
    }
}
