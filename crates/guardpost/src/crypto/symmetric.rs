// XChaCha20-Poly1305 symmetric encryption with SHA-256 key derivation,
// HMAC-SHA256 signatures, and constant-time comparison.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use hmac::{Hmac, Mac, digest::KeyInit as HmacKeyInit};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use guardpost_core::error::{AuthError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Encrypt data using XChaCha20-Poly1305.
///
/// The key is hashed with SHA-256 to produce the 32-byte cipher key. A random
/// 24-byte nonce is prepended to the ciphertext and the whole thing is
/// hex-encoded for cookie transport.
pub fn symmetric_encrypt(key: &str, data: &str) -> Result<String> {
    use sha2::Digest;
    let key_bytes: [u8; 32] = Sha256::digest(key.as_bytes()).into();

    let cipher = XChaCha20Poly1305::new_from_slice(&key_bytes)
        .map_err(|e| AuthError::Crypto(format!("cipher init failed: {e}")))?;

    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, data.as_bytes())
        .map_err(|e| AuthError::Crypto(format!("encryption failed: {e}")))?;

    let mut result = nonce.to_vec();
    result.extend_from_slice(&ciphertext);
    Ok(hex::encode(result))
}

/// Decrypt data encrypted by `symmetric_encrypt`. Input is hex-encoded
/// (nonce || ciphertext).
pub fn symmetric_decrypt(key: &str, data: &str) -> Result<String> {
    use sha2::Digest;
    let key_bytes: [u8; 32] = Sha256::digest(key.as_bytes()).into();

    let raw = hex::decode(data).map_err(|e| AuthError::Crypto(format!("invalid hex data: {e}")))?;

    if raw.len() < 24 {
        return Err(AuthError::Crypto("ciphertext too short".into()));
    }

    let (nonce_bytes, ciphertext) = raw.split_at(24);
    let nonce = XNonce::from_slice(nonce_bytes);

    let cipher = XChaCha20Poly1305::new_from_slice(&key_bytes)
        .map_err(|e| AuthError::Crypto(format!("cipher init failed: {e}")))?;

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| AuthError::Crypto(format!("decryption failed: {e}")))?;

    String::from_utf8(plaintext).map_err(|e| AuthError::Crypto(format!("invalid utf-8: {e}")))
}

/// HMAC-SHA256 signature over a value, base64url-encoded without padding so
/// it is cookie-safe.
pub fn make_signature(value: &str, secret: &str) -> Result<String> {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let mut mac = <HmacSha256 as HmacKeyInit>::new_from_slice(secret.as_bytes())
        .map_err(|e| AuthError::Crypto(format!("hmac init failed: {e}")))?;

    mac.update(value.as_bytes());
    let result = mac.finalize().into_bytes();
    Ok(URL_SAFE_NO_PAD.encode(result))
}

/// Verify an HMAC-SHA256 signature in constant time.
pub fn verify_signature(value: &str, secret: &str, signature: &str) -> Result<bool> {
    let expected = make_signature(value, secret)?;
    Ok(constant_time_equal(expected.as_bytes(), signature.as_bytes()))
}

/// Compare two byte slices in constant time.
pub fn constant_time_equal(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
