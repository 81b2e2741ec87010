// Verification record lifecycle: issue, check, revoke.
//
// A record is the single source of truth for a pending challenge. Issuing a
// new one for the same (target, kind) supersedes the old challenge outright,
// and an expired record is deleted the moment it is consulted, so a stale
// code can never ride an engine-level skew window past the record's lifetime.

use chrono::{DateTime, TimeDelta, Utc};

use guardpost_core::db::{AuthStore, Verification, VerificationKind};
use guardpost_core::error::Result;
use guardpost_core::options::VerificationPolicy;

use crate::crypto::{base32_encode, generate_random_string, generate_totp, verify_totp, TotpConfig};

/// How the issued record lapses.
#[derive(Debug, Clone, Copy)]
pub enum Lifetime {
    /// Expires after the policy TTL. Email codes and 2FA setup.
    Policy,
    /// Never lapses on its own. An enabled second factor.
    Permanent,
}

pub fn totp_config(record: &Verification) -> TotpConfig {
    TotpConfig {
        secret: record.secret.clone(),
        algorithm: record.algorithm.clone(),
        digits: record.digits,
        period_seconds: record.period_seconds,
        char_set: record.char_set.clone(),
    }
}

/// Create (or supersede) the verification for (target, kind) and return the
/// record together with a code valid right now.
pub async fn issue(
    store: &dyn AuthStore,
    policy: &VerificationPolicy,
    target: &str,
    kind: VerificationKind,
    period_seconds: u64,
    lifetime: Lifetime,
    now: DateTime<Utc>,
) -> Result<(Verification, String)> {
    let secret = base32_encode(generate_random_string(20).as_bytes());
    let record = Verification {
        target: target.to_string(),
        kind,
        secret,
        algorithm: policy.algorithm.clone(),
        digits: policy.digits,
        period_seconds,
        char_set: policy.char_set.clone(),
        expires_at: match lifetime {
            Lifetime::Policy => Some(now + TimeDelta::seconds(policy.ttl_seconds)),
            Lifetime::Permanent => None,
        },
        created_at: now,
    };
    let record = store.upsert_verification(record).await?;
    let code = generate_totp(&totp_config(&record), now)?;
    Ok((record, code))
}

/// Check a code against the stored record.
///
/// Returns `false` when no record exists, the record has lapsed, or the code
/// does not match. `consume` deletes the record on success, which makes the
/// code single-use.
pub async fn check(
    store: &dyn AuthStore,
    target: &str,
    kind: VerificationKind,
    code: &str,
    now: DateTime<Utc>,
    consume: bool,
) -> Result<bool> {
    let Some(record) = store.find_verification(target, kind).await? else {
        return Ok(false);
    };
    if record.is_expired(now) {
        store.delete_verification(target, kind).await?;
        return Ok(false);
    }
    if !verify_totp(&totp_config(&record), code, now)? {
        return Ok(false);
    }
    if consume {
        store.delete_verification(target, kind).await?;
    }
    Ok(true)
}

/// Drop the record without checking anything.
pub async fn revoke(store: &dyn AuthStore, target: &str, kind: VerificationKind) -> Result<()> {
    store.delete_verification(target, kind).await?;
    Ok(())
}
