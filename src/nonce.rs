use rand::Rng;
use subtle::ConstantTimeEq;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use crate::error::NonceError;

/// Number of random bytes in a login nonce.
pub const NONCE_BYTES: usize = 20;

/// Maximum age of an OpenID 2.0 response nonce.
pub const RESPONSE_NONCE_MAX_AGE: Duration = Duration::minutes(1);

/// Length of the timestamp prefix of a response nonce (`2006-01-02T15:04:05Z`).
const TIMESTAMP_LEN: usize = 20;
const MAX_RESPONSE_NONCE_LEN: usize = 256;

/// Generates a cryptographically random login nonce.
///
/// Returns a 40-character lowercase hex string (20 random bytes).
#[must_use]
pub fn generate_nonce() -> String {
    let random_bytes: [u8; NONCE_BYTES] = rand::rng().random();
    hex::encode(random_bytes)
}

/// Compares two nonces in constant time.
#[must_use]
pub fn nonces_match(expected: &str, actual: &str) -> bool {
    expected.as_bytes().ct_eq(actual.as_bytes()).into()
}

/// Checks an OpenID 2.0 `openid.response_nonce` against the current time.
///
/// # Errors
///
/// Returns [`NonceError::Malformed`] if the nonce has the wrong length or does
/// not start with an RFC 3339 UTC timestamp, or [`NonceError::TooOld`] if it
/// was issued more than a minute ago.
pub fn check_response_nonce(nonce: &str) -> Result<OffsetDateTime, NonceError> {
    check_response_nonce_at(nonce, OffsetDateTime::now_utc())
}

/// Same as [`check_response_nonce`] with an explicit clock.
///
/// Reuse within the window is not tracked. A timestamp too close to the end
/// of the representable range is reported as malformed.
///
/// # Errors
///
/// See [`check_response_nonce`].
pub fn check_response_nonce_at(
    nonce: &str,
    now: OffsetDateTime,
) -> Result<OffsetDateTime, NonceError> {
    if nonce.len() < TIMESTAMP_LEN || nonce.len() > MAX_RESPONSE_NONCE_LEN {
        return Err(NonceError::Malformed(nonce.to_string()));
    }
    let timestamp = nonce
        .get(..TIMESTAMP_LEN)
        .ok_or_else(|| NonceError::Malformed(nonce.to_string()))?;
    let issued_at = OffsetDateTime::parse(timestamp, &Rfc3339)
        .map_err(|_| NonceError::Malformed(nonce.to_string()))?;

    let expires_at = issued_at
        .checked_add(RESPONSE_NONCE_MAX_AGE)
        .ok_or_else(|| NonceError::Malformed(nonce.to_string()))?;
    if expires_at < now {
        return Err(NonceError::TooOld { issued_at });
    }
    Ok(issued_at)
}

/// Formats a response nonce issued at `issued_at`, the way providers do.
#[cfg(test)]
pub(crate) fn response_nonce_at(issued_at: OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Zab12cd",
        issued_at.year(),
        u8::from(issued_at.month()),
        issued_at.day(),
        issued_at.hour(),
        issued_at.minute(),
        issued_at.second()
    )
}
