use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Provider-chosen subject identifier (OpenID 2.0 `openid.claimed_id`).
///
/// Opaque: compare it, store it, never parse it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct ClaimedId(pub String);

impl ClaimedId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Email address the provider asserts it has verified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct VerifiedEmail(pub String);

impl VerifiedEmail {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Who the provider vouched for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Principal {
    ClaimedId(ClaimedId),
    Email(VerifiedEmail),
}

impl Principal {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ClaimedId(id) => id.as_str(),
            Self::Email(email) => email.as_str(),
        }
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful verification. Never partially populated.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct VerifiedIdentity {
    pub principal: Principal,
    /// When this engine accepted the assertion.
    pub verified_at: OffsetDateTime,
    /// Token expiry (token flow only).
    pub expires_at: Option<OffsetDateTime>,
}

impl VerifiedIdentity {
    #[must_use]
    pub(crate) fn new(principal: Principal, expires_at: Option<OffsetDateTime>) -> Self {
        Self {
            principal,
            verified_at: OffsetDateTime::now_utc(),
            expires_at,
        }
    }

    /// The verified email, if this identity came from the token flow.
    #[must_use]
    pub fn email(&self) -> Option<&VerifiedEmail> {
        match &self.principal {
            Principal::Email(email) => Some(email),
            Principal::ClaimedId(_) => None,
        }
    }

    /// The claimed identifier, if this identity came from the indirect flow.
    #[must_use]
    pub fn claimed_id(&self) -> Option<&ClaimedId> {
        match &self.principal {
            Principal::ClaimedId(id) => Some(id),
            Principal::Email(_) => None,
        }
    }
}

/// Outbound authentication request for one login attempt.
///
/// Immutable. The nonce is echoed back by the provider; the caller binds it
/// to the browser with a short-lived cookie.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct AuthRequest {
    /// Provider URL to redirect the browser to.
    pub url: String,
    /// Where the provider sends the browser back.
    pub return_to: String,
    /// Scheme and host of `return_to`.
    pub realm: String,
    pub nonce: String,
}
