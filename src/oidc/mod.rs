//! OpenID Connect implicit ID-token flow.
//!
//! The provider posts an `id_token` back to the callback. The token's
//! signature, issuer, audience and expiry are checked by a [`TokenVerifier`],
//! then the `email_verified` claim must be `true` and the `nonce` claim must
//! equal the one bound to the browser at login.

mod config;
mod provider;
mod verifier;

use std::sync::Arc;

use serde::Deserialize;
use time::OffsetDateTime;

pub use config::OidcConfig;
pub use provider::Provider;
use verifier::TokenVerifierDyn;
pub use verifier::{JwksVerifier, TokenVerifier, VerifiedClaims};

use crate::error::Error;
use crate::nonce;
use crate::session::SessionCodec;
use crate::types::{AuthRequest, Principal, VerifiedEmail, VerifiedIdentity};
use crate::urls;

/// Claims this crate reads out of a verified ID token.
#[derive(Debug, Deserialize)]
struct EmailClaims {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    nonce: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
}

/// A verified ID token whose email the provider vouches for.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct TokenAssertion {
    pub email: VerifiedEmail,
    /// The `nonce` claim, if the token carries one.
    pub nonce: Option<String>,
    pub expires_at: Option<OffsetDateTime>,
}

struct Inner {
    config: OidcConfig,
    authorization_endpoint: String,
    realm: String,
    verifier: Box<dyn TokenVerifierDyn>,
}

/// ID-token login flow for one provider.
///
/// Cheap to clone; share one instance across handlers.
#[derive(Clone)]
pub struct OidcAuth {
    inner: Arc<Inner>,
}

impl OidcAuth {
    /// Assemble the flow from provider metadata and a token verifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `redirect_uri` has no host.
    pub fn new(
        config: OidcConfig,
        provider: &Provider,
        verifier: impl TokenVerifier,
    ) -> Result<Self, Error> {
        let realm = urls::realm_of(&config.redirect_uri)?;
        Ok(Self {
            inner: Arc::new(Inner {
                authorization_endpoint: provider.authorization_endpoint().to_string(),
                realm,
                config,
                verifier: Box::new(verifier),
            }),
        })
    }

    /// Discover the provider and fetch its signing keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if discovery or the key fetch fails.
    pub async fn discover(config: OidcConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;
        let provider = Provider::discover(&http, &config.issuer).await?;
        let verifier = JwksVerifier::new(&provider, http).await?;
        tracing::info!(
            issuer = %provider.issuer(),
            client_id = %config.client_id,
            "OpenID Connect login configured"
        );
        Self::new(config, &provider, verifier)
    }

    /// Configuration this flow was built from.
    #[must_use]
    pub fn config(&self) -> &OidcConfig {
        &self.inner.config
    }

    /// Build the provider redirect for a new login attempt.
    #[must_use]
    pub fn authorization_request(&self) -> AuthRequest {
        let config = &self.inner.config;
        let nonce = nonce::generate_nonce();
        let scope = config.scopes.join(" ");
        let url = urls::append_query(
            &self.inner.authorization_endpoint,
            [
                ("response_type", "id_token"),
                ("client_id", config.client_id.as_str()),
                ("redirect_uri", config.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("nonce", nonce.as_str()),
            ],
        );

        AuthRequest {
            url,
            return_to: config.redirect_uri.to_string(),
            realm: self.inner.realm.clone(),
            nonce,
        }
    }

    /// Verify an ID token and require a provider-verified email.
    ///
    /// `skip_expiry` is set when re-checking a stored session token, whose
    /// lifetime is governed by the session cookie rather than `exp`.
    ///
    /// # Errors
    ///
    /// - [`Error::Token`] if the signature, issuer, audience or expiry check fails
    /// - [`Error::Claims`] if the claims cannot be decoded or carry no email
    /// - [`Error::UnverifiedEmail`] if `email_verified` is not `true`
    pub async fn verify_token(
        &self,
        token: &str,
        skip_expiry: bool,
    ) -> Result<TokenAssertion, Error> {
        let claims = self
            .inner
            .verifier
            .verify_dyn(token, &self.inner.config.client_id, skip_expiry)
            .await?;
        let claims: EmailClaims = serde_json::from_value(claims.into_json())
            .map_err(|e| Error::Claims(e.to_string()))?;

        let email = claims
            .email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| Error::Claims("token has no email claim".into()))?;
        if !claims.email_verified {
            return Err(Error::UnverifiedEmail { email });
        }

        Ok(TokenAssertion {
            email: VerifiedEmail(email),
            nonce: claims.nonce,
            expires_at: claims
                .exp
                .and_then(|exp| OffsetDateTime::from_unix_timestamp(exp).ok()),
        })
    }

    /// Finish a login: verify the posted token and bind it to the nonce
    /// cookie set by [`authorization_request`](Self::authorization_request).
    ///
    /// # Errors
    ///
    /// Everything [`verify_token`](Self::verify_token) returns, plus
    /// [`Error::NonceMismatch`] if either nonce is missing or they differ.
    pub async fn complete_login(
        &self,
        token: &str,
        nonce_cookie: Option<&str>,
    ) -> Result<VerifiedIdentity, Error> {
        let assertion = self.verify_token(token, false).await?;
        match (assertion.nonce.as_deref(), nonce_cookie) {
            (Some(claimed), Some(expected)) if nonce::nonces_match(expected, claimed) => {}
            _ => return Err(Error::NonceMismatch),
        }

        tracing::info!(email = %assertion.email, "ID token login verified");
        Ok(VerifiedIdentity::new(
            Principal::Email(assertion.email),
            assertion.expires_at,
        ))
    }

    /// Session cookie handling backed by this flow's verifier.
    #[must_use]
    pub fn session(&self) -> SessionCodec<'_> {
        SessionCodec::new(self)
    }
}
