// RFC 6238 time-based one-time passcodes.
//
// Codes are drawn from a configurable alphabet: the truncated 31-bit HOTP
// value is repeatedly divided by the alphabet size, so the default
// "0123456789" alphabet reduces to standard numeric TOTP. Time is always
// passed in explicitly; nothing here reads the clock, which keeps expiry
// policy out of this module entirely.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use guardpost_core::error::{AuthError, Result};

use super::symmetric::constant_time_equal;

/// Full passcode configuration, as persisted with each verification record.
#[derive(Debug, Clone)]
pub struct TotpConfig {
    /// Base32-encoded shared secret.
    pub secret: String,
    /// "SHA-1", "SHA-256", or "SHA-512".
    pub algorithm: String,
    /// Code length in characters.
    pub digits: u32,
    /// Time-step in seconds.
    pub period_seconds: u64,
    /// Output alphabet.
    pub char_set: String,
}

/// Generate the code for the time-step containing `now`.
pub fn generate_totp(config: &TotpConfig, now: DateTime<Utc>) -> Result<String> {
    let counter = counter_for(config, now)?;
    hotp(config, counter)
}

/// Verify a code against the time-step containing `now`, accepting the
/// adjacent step on either side for clock skew.
pub fn verify_totp(config: &TotpConfig, code: &str, now: DateTime<Utc>) -> Result<bool> {
    let counter = counter_for(config, now)?;
    for offset in [0i64, -1, 1] {
        let adjusted = counter as i64 + offset;
        if adjusted < 0 {
            continue;
        }
        let expected = hotp(config, adjusted as u64)?;
        if constant_time_equal(expected.as_bytes(), code.as_bytes()) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn counter_for(config: &TotpConfig, now: DateTime<Utc>) -> Result<u64> {
    if config.period_seconds == 0 {
        return Err(AuthError::Crypto("totp period must be non-zero".into()));
    }
    let timestamp = now.timestamp();
    if timestamp < 0 {
        return Err(AuthError::Crypto("totp time before epoch".into()));
    }
    Ok(timestamp as u64 / config.period_seconds)
}

/// RFC 4226 HOTP with dynamic truncation, then mapped onto the configured
/// alphabet by repeated division.
fn hotp(config: &TotpConfig, counter: u64) -> Result<String> {
    if config.char_set.is_empty() {
        return Err(AuthError::Crypto("totp alphabet is empty".into()));
    }
    let key = base32_decode(&config.secret)
        .ok_or_else(|| AuthError::Crypto("totp secret is not valid base32".into()))?;
    let counter_bytes = counter.to_be_bytes();

    let digest = match config.algorithm.as_str() {
        "SHA-1" => {
            let mut mac = Hmac::<Sha1>::new_from_slice(&key)
                .map_err(|e| AuthError::Crypto(format!("hmac init failed: {e}")))?;
            mac.update(&counter_bytes);
            mac.finalize().into_bytes().to_vec()
        }
        "SHA-256" => {
            let mut mac = Hmac::<Sha256>::new_from_slice(&key)
                .map_err(|e| AuthError::Crypto(format!("hmac init failed: {e}")))?;
            mac.update(&counter_bytes);
            mac.finalize().into_bytes().to_vec()
        }
        "SHA-512" => {
            let mut mac = Hmac::<Sha512>::new_from_slice(&key)
                .map_err(|e| AuthError::Crypto(format!("hmac init failed: {e}")))?;
            mac.update(&counter_bytes);
            mac.finalize().into_bytes().to_vec()
        }
        other => {
            return Err(AuthError::Crypto(format!("unsupported totp algorithm: {other}")));
        }
    };

    let offset = (digest[digest.len() - 1] & 0x0F) as usize;
    let mut value = (((digest[offset] as u32) & 0x7F) << 24)
        | ((digest[offset + 1] as u32) << 16)
        | ((digest[offset + 2] as u32) << 8)
        | (digest[offset + 3] as u32);

    let alphabet: Vec<char> = config.char_set.chars().collect();
    let radix = alphabet.len() as u32;
    let mut code = String::with_capacity(config.digits as usize);
    for _ in 0..config.digits {
        code.insert(0, alphabet[(value % radix) as usize]);
        value /= radix;
    }
    Ok(code)
}

/// Build an otpauth:// URI for authenticator apps.
pub fn build_otpauth_uri(config: &TotpConfig, issuer: &str, account: &str) -> String {
    let encoded_issuer = urlencoding::encode(issuer);
    let encoded_account = urlencoding::encode(account);
    let algorithm = config.algorithm.replace('-', "");
    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm={}&digits={}&period={}",
        encoded_issuer,
        encoded_account,
        config.secret,
        encoded_issuer,
        algorithm,
        config.digits,
        config.period_seconds,
    )
}

const BASE32_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// RFC 4648 base32 encoding without padding.
pub fn base32_encode(data: &[u8]) -> String {
    let mut result = String::new();
    let mut buffer: u64 = 0;
    let mut bits_left = 0;

    for &byte in data {
        buffer = (buffer << 8) | byte as u64;
        bits_left += 8;
        while bits_left >= 5 {
            bits_left -= 5;
            let index = ((buffer >> bits_left) & 0x1F) as usize;
            result.push(BASE32_ALPHABET[index] as char);
        }
    }
    if bits_left > 0 {
        let index = ((buffer << (5 - bits_left)) & 0x1F) as usize;
        result.push(BASE32_ALPHABET[index] as char);
    }
    result
}

/// RFC 4648 base32 decoding. Accepts lowercase and trailing padding;
/// returns `None` on any other character.
pub fn base32_decode(encoded: &str) -> Option<Vec<u8>> {
    let mut result = Vec::new();
    let mut buffer: u64 = 0;
    let mut bits_left = 0;

    for c in encoded.trim_end_matches('=').bytes() {
        let value = BASE32_ALPHABET
            .iter()
            .position(|&a| a == c.to_ascii_uppercase())? as u64;
        buffer = (buffer << 5) | value;
        bits_left += 5;
        if bits_left >= 8 {
            bits_left -= 8;
            result.push(((buffer >> bits_left) & 0xFF) as u8);
        }
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config(period: u64) -> TotpConfig {
        TotpConfig {
            secret: base32_encode(b"12345678901234567890"),
            algorithm: "SHA-1".into(),
            digits: 6,
            period_seconds: period,
            char_set: "0123456789".into(),
        }
    }

    #[test]
    fn base32_roundtrip() {
        assert_eq!(base32_encode(b"Hello"), "JBSWY3DP");
        assert_eq!(base32_encode(b""), "");
        assert_eq!(base32_encode(b"foobar"), "MZXW6YTBOI");
        assert_eq!(base32_decode("MZXW6YTBOI").unwrap(), b"foobar");
        assert_eq!(base32_decode("mzxw6ytboi").unwrap(), b"foobar");
        assert_eq!(base32_decode("MZXW6YTBOI======").unwrap(), b"foobar");
        assert!(base32_decode("not!base32").is_none());
    }

    #[test]
    fn rfc6238_sha1_vector() {
        // RFC 6238 appendix B, T = 59, 8-digit code 94287082.
        let mut cfg = config(30);
        cfg.digits = 8;
        let now = Utc.timestamp_opt(59, 0).unwrap();
        assert_eq!(generate_totp(&cfg, now).unwrap(), "94287082");
    }

    #[test]
    fn generated_code_verifies_in_same_step() {
        let cfg = config(30);
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let code = generate_totp(&cfg, now).unwrap();
        assert_eq!(code.len(), 6);
        assert!(verify_totp(&cfg, &code, now).unwrap());
    }

    #[test]
    fn adjacent_window_accepted_two_windows_rejected() {
        let cfg = config(30);
        let issued = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let code = generate_totp(&cfg, issued).unwrap();
        assert!(verify_totp(&cfg, &code, issued + chrono::TimeDelta::seconds(45)).unwrap());
        assert!(!verify_totp(&cfg, &code, issued + chrono::TimeDelta::seconds(120)).unwrap());
    }

    #[test]
    fn wrong_code_rejected() {
        let cfg = config(30);
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let code = generate_totp(&cfg, now).unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };
        assert!(!verify_totp(&cfg, wrong, now).unwrap());
    }

    #[test]
    fn custom_alphabet() {
        let cfg = TotpConfig {
            char_set: "ABCDEF".into(),
            ..config(30)
        };
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let code = generate_totp(&cfg, now).unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| "ABCDEF".contains(c)));
        assert!(verify_totp(&cfg, &code, now).unwrap());
    }

    #[test]
    fn otpauth_uri_format() {
        let cfg = config(30);
        let uri = build_otpauth_uri(&cfg, "Epic Notes", "kody@example.com");
        assert!(uri.starts_with("otpauth://totp/Epic%20Notes:kody%40example.com?"));
        assert!(uri.contains(&format!("secret={}", cfg.secret)));
        assert!(uri.contains("algorithm=SHA1"));
        assert!(uri.contains("digits=6"));
        assert!(uri.contains("period=30"));
    }

    #[test]
    fn unknown_algorithm_errors() {
        let cfg = TotpConfig {
            algorithm: "MD5".into(),
            ..config(30)
        };
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert!(generate_totp(&cfg, now).is_err());
    }
}
