use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{JwkSet, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde_json::Value as JsonValue;
use url::Url;

use super::provider::Provider;
use crate::error::Error;

/// Unknown `kid`s trigger at most one JWKS refetch per interval.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Claims of a token whose signature, issuer and audience checked out.
#[derive(Debug, Clone)]
pub struct VerifiedClaims {
    inner: JsonValue,
}

impl VerifiedClaims {
    #[must_use]
    pub fn new(inner: JsonValue) -> Self {
        Self { inner }
    }

    /// Gets a claim value by key.
    #[must_use]
    pub fn get_claim(&self, key: &str) -> Option<&JsonValue> {
        self.inner.get(key)
    }

    /// Gets the inner JSON value.
    #[must_use]
    pub fn as_json(&self) -> &JsonValue {
        &self.inner
    }

    #[must_use]
    pub fn into_json(self) -> JsonValue {
        self.inner
    }
}

/// Signed identity token verification.
///
/// Implementations check the signature, the issuer, the audience and, unless
/// `skip_expiry` is set, the expiry.
///
/// # Example
///
/// ```rust,ignore
/// impl TokenVerifier for MyVerifier {
///     async fn verify(
///         &self,
///         token: &str,
///         audience: &str,
///         skip_expiry: bool,
///     ) -> Result<VerifiedClaims, Error> {
///         let claims = self.inner.check(token, audience, !skip_expiry).await?;
///         Ok(VerifiedClaims::new(claims))
///     }
/// }
/// ```
pub trait TokenVerifier: Send + Sync + 'static {
    fn verify(
        &self,
        token: &str,
        audience: &str,
        skip_expiry: bool,
    ) -> impl Future<Output = Result<VerifiedClaims, Error>> + Send;
}

/// Object-safe wrapper for `TokenVerifier` (needed for `Box<dyn>`).
pub(crate) trait TokenVerifierDyn: Send + Sync {
    fn verify_dyn<'a>(
        &'a self,
        token: &'a str,
        audience: &'a str,
        skip_expiry: bool,
    ) -> Pin<Box<dyn Future<Output = Result<VerifiedClaims, Error>> + Send + 'a>>;
}

impl<T: TokenVerifier> TokenVerifierDyn for T {
    fn verify_dyn<'a>(
        &'a self,
        token: &'a str,
        audience: &'a str,
        skip_expiry: bool,
    ) -> Pin<Box<dyn Future<Output = Result<VerifiedClaims, Error>> + Send + 'a>> {
        Box::pin(self.verify(token, audience, skip_expiry))
    }
}

#[derive(Default)]
struct KeySet {
    keyed: HashMap<String, DecodingKey>,
    unkeyed: Vec<DecodingKey>,
    fetched_at: Option<Instant>,
}

impl KeySet {
    fn from_jwks(jwks: &JwkSet) -> Self {
        let mut keys = Self {
            fetched_at: Some(Instant::now()),
            ..Self::default()
        };
        for jwk in &jwks.keys {
            if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
                continue;
            }
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => match &jwk.common.key_id {
                    Some(kid) if !kid.is_empty() => {
                        keys.keyed.insert(kid.clone(), key);
                    }
                    _ => keys.unkeyed.push(key),
                },
                Err(e) => tracing::debug!(error = %e, "Skipping unusable JWK"),
            }
        }
        keys
    }

    fn lookup(&self, kid: Option<&str>) -> Option<DecodingKey> {
        match kid {
            Some(kid) => self.keyed.get(kid).cloned(),
            None if self.keyed.len() + self.unkeyed.len() == 1 => self
                .unkeyed
                .first()
                .or_else(|| self.keyed.values().next())
                .cloned(),
            None => None,
        }
    }

    fn refresh_due(&self) -> bool {
        self.fetched_at
            .is_none_or(|at| at.elapsed() >= MIN_REFRESH_INTERVAL)
    }
}

/// [`TokenVerifier`] backed by the provider's JSON Web Key Set.
pub struct JwksVerifier {
    issuer: String,
    jwks_uri: Option<Url>,
    http: reqwest::Client,
    algorithms: Vec<Algorithm>,
    keys: RwLock<KeySet>,
}

impl JwksVerifier {
    /// Fetch the provider's keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the key set cannot be fetched or parsed.
    pub async fn new(provider: &Provider, http: reqwest::Client) -> Result<Self, Error> {
        let keys = fetch_keys(&http, provider.jwks_uri())
            .await
            .map_err(|e| Error::Config(format!("jwks: {e}")))?;
        Ok(Self {
            issuer: provider.issuer().to_string(),
            jwks_uri: Some(provider.jwks_uri().clone()),
            http,
            algorithms: vec![Algorithm::RS256],
            keys: RwLock::new(keys),
        })
    }

    /// Verify against a fixed set of `(kid, key)` pairs; never refetches.
    #[must_use]
    pub fn with_keys(
        issuer: impl Into<String>,
        keys: impl IntoIterator<Item = (Option<String>, DecodingKey)>,
    ) -> Self {
        let mut set = KeySet::default();
        for (kid, key) in keys {
            match kid {
                Some(kid) => {
                    set.keyed.insert(kid, key);
                }
                None => set.unkeyed.push(key),
            }
        }
        Self {
            issuer: issuer.into(),
            jwks_uri: None,
            http: reqwest::Client::new(),
            algorithms: vec![Algorithm::RS256],
            keys: RwLock::new(set),
        }
    }

    /// Accepted signing algorithms (default `RS256`).
    #[must_use]
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = algorithms;
        self
    }

    fn lookup(&self, kid: Option<&str>) -> Result<Option<DecodingKey>, Error> {
        let keys = self
            .keys
            .read()
            .map_err(|_| Error::Token("key cache poisoned".into()))?;
        Ok(keys.lookup(kid))
    }

    /// Refetch the key set, at most once per [`MIN_REFRESH_INTERVAL`].
    /// Returns `false` if no refresh was due.
    async fn refresh(&self) -> Result<bool, Error> {
        let Some(jwks_uri) = &self.jwks_uri else {
            return Ok(false);
        };
        {
            // claim the refresh slot before fetching; failed fetches count too
            let mut keys = self
                .keys
                .write()
                .map_err(|_| Error::Token("key cache poisoned".into()))?;
            if !keys.refresh_due() {
                return Ok(false);
            }
            keys.fetched_at = Some(Instant::now());
        }

        let fresh = fetch_keys(&self.http, jwks_uri).await.map_err(|e| {
            tracing::warn!(jwks_uri = %jwks_uri, error = %e, "Provider key refresh failed");
            Error::Token(format!("jwks refresh: {e}"))
        })?;
        let mut keys = self
            .keys
            .write()
            .map_err(|_| Error::Token("key cache poisoned".into()))?;
        *keys = fresh;
        tracing::debug!(jwks_uri = %jwks_uri, "Refreshed provider keys");
        Ok(true)
    }
}

impl TokenVerifier for JwksVerifier {
    async fn verify(
        &self,
        token: &str,
        audience: &str,
        skip_expiry: bool,
    ) -> Result<VerifiedClaims, Error> {
        let header = decode_header(token).map_err(|e| Error::Token(e.to_string()))?;
        if !self.algorithms.contains(&header.alg) {
            return Err(Error::Token(format!(
                "unsupported signing algorithm {:?}",
                header.alg
            )));
        }

        let kid = header.kid.as_deref();
        let key = match self.lookup(kid)? {
            Some(key) => key,
            None if self.refresh().await? => self
                .lookup(kid)?
                .ok_or_else(|| Error::Token("no matching key for token kid".into()))?,
            None => return Err(Error::Token("no matching key for token kid".into())),
        };

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[audience]);
        validation.validate_exp = !skip_expiry;

        let data =
            decode::<JsonValue>(token, &key, &validation).map_err(|e| Error::Token(e.to_string()))?;
        Ok(VerifiedClaims { inner: data.claims })
    }
}

async fn fetch_keys(http: &reqwest::Client, jwks_uri: &Url) -> Result<KeySet, reqwest::Error> {
    let jwks: JwkSet = http
        .get(jwks_uri.clone())
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(KeySet::from_jwks(&jwks))
}
