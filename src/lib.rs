#![doc = include_str!("../README.md")]

pub mod cookies;
pub mod error;
pub mod middleware;
pub mod nonce;
#[cfg(feature = "oidc")]
pub mod oidc;
#[cfg(feature = "openid20")]
pub mod openid20;
#[cfg(feature = "oidc")]
pub mod session;
pub mod types;
pub mod urls;

// Re-exports for convenient access
pub use error::{Error, NonceError};
#[cfg(feature = "oidc")]
pub use oidc::{JwksVerifier, OidcAuth, OidcConfig, Provider, TokenVerifier, VerifiedClaims};
#[cfg(feature = "openid20")]
pub use openid20::{OpenId20Auth, OpenId20Config};
#[cfg(feature = "oidc")]
pub use session::SessionCodec;
pub use types::{AuthRequest, ClaimedId, Principal, VerifiedEmail, VerifiedIdentity};
