use time::OffsetDateTime;

/// Everything that can go wrong while building or verifying a login.
///
/// Every variant is terminal for the request that produced it: there is no
/// partial success and nothing is retried.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Bad configuration input (malformed URLs, missing settings, provider
    /// metadata that cannot be fetched at setup).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A field the provider must sign is missing from `openid.signed`.
    #[error("{field} must be signed but isn't")]
    UnsignedField { field: &'static str },

    /// The out-of-band re-verification round trip failed at the network or
    /// protocol level.
    #[error("Verification request failed: {reason}")]
    VerificationRequest { reason: String },

    /// The provider answered the re-verification request negatively.
    #[error("Provider rejected the assertion")]
    AssertionRejected,

    /// The URL the browser hit does not match the asserted `return_to`.
    #[error("{part} doesn't match return_to URL: got {actual:?}, want {expected:?}")]
    ReturnUrlMismatch {
        part: String,
        expected: String,
        actual: String,
    },

    /// The provider's response nonce is malformed or stale.
    #[error("Invalid response nonce: {0}")]
    Nonce(#[from] NonceError),

    /// The nonce echoed by the provider does not match the one bound to the
    /// browser at login time.
    #[error("Nonce does not match the login request")]
    NonceMismatch,

    /// The signed identity token failed verification (signature, issuer,
    /// audience or expiry).
    #[error("Token verification error: {0}")]
    Token(String),

    /// The verified claim set cannot be decoded or lacks a required claim.
    #[error("Claims: {0}")]
    Claims(String),

    /// The provider has not verified the user's email address.
    #[error("Email not verified: {email}")]
    UnverifiedEmail { email: String },

    /// No session cookie on the request.
    #[error("No auth token cookie")]
    NoSession,

    /// The session cookie is present but does not verify.
    #[error("Invalid session: {0}")]
    InvalidSession(#[source] Box<Error>),
}

/// Why a response nonce was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum NonceError {
    #[error("malformed nonce {0:?}")]
    Malformed(String),

    #[error("nonce too old: issued at {issued_at}")]
    TooOld { issued_at: OffsetDateTime },
}

impl Error {
    /// Whether the failure comes from the provider round trip or from setup
    /// rather than from client-supplied input.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        match self {
            Self::VerificationRequest { .. } | Self::Config(_) => true,
            Self::InvalidSession(inner) => inner.is_transport(),
            _ => false,
        }
    }

    pub(crate) fn verification_request(reason: impl std::fmt::Display) -> Self {
        Self::VerificationRequest {
            reason: reason.to_string(),
        }
    }

    pub(crate) fn return_url_mismatch(
        part: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ReturnUrlMismatch {
            part: part.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
