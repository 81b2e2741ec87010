// Password hashing with bcrypt.
//
// Cost 10 matches the original deployment. Verification against a missing
// account runs the hash anyway so response timing does not reveal whether a
// username exists.

use guardpost_core::error::{AuthError, Result};

const BCRYPT_COST: u32 = 10;

/// Hash taken at startup so the timing-leveling path costs the same as a
/// real comparison.
const DUMMY_HASH: &str = "$2b$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy";

pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, BCRYPT_COST)
        .map_err(|e| AuthError::Crypto(format!("password hash failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash)
        .map_err(|e| AuthError::Crypto(format!("password verify failed: {e}")))
}

/// Burn the same work as a real verification. Used when the user does not
/// exist or has no password row.
pub fn verify_against_dummy(password: &str) {
    let _ = bcrypt::verify(password, DUMMY_HASH);
}
