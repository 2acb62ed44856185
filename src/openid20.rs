//! OpenID 2.0 indirect flow.
//!
//! The provider redirects the browser back with signed assertion parameters.
//! An assertion is accepted only after four gates pass, in order:
//!
//! 1. every field that must be signed is listed in `openid.signed`;
//! 2. the provider itself confirms the assertion (`check_authentication`);
//! 3. the URL the browser hit matches the asserted `openid.return_to`;
//! 4. `openid.response_nonce` is at most a minute old.
//!
//! Two steps of the OpenID 2.0 protocol are skipped on purpose:
//!
//! - response nonces are not checked for reuse, only for age.
//! - the claimed identifier is not re-discovered. The re-verification request
//!   goes to `openid.op_endpoint` as found in the (signed) response.

use std::time::Duration as StdDuration;

use time::Duration;
use url::Url;

use crate::error::Error;
use crate::nonce;
use crate::types::{AuthRequest, ClaimedId, Principal, VerifiedIdentity};
use crate::urls::{self, CallbackParams};

/// OpenID 2.0 namespace.
pub const OPENID_NS: &str = "http://specs.openid.net/auth/2.0";
const IDENTIFIER_SELECT: &str = "http://specs.openid.net/auth/2.0/identifier_select";
const SREG_NS: &str = "http://openid.net/extensions/sreg/1.1";
const CHECK_AUTHENTICATION: &str = "check_authentication";

/// Fields the provider must always sign.
static REQUIRED_SIGNED: [&str; 4] = ["op_endpoint", "return_to", "response_nonce", "assoc_handle"];
/// Fields the provider must sign whenever they are present.
static SIGNED_IF_PRESENT: [&str; 2] = ["claimed_id", "identity"];

/// OpenID 2.0 provider configuration.
///
/// ```rust,ignore
/// let config = OpenId20Config::new(
///     "https://steamcommunity.com/openid/login",
///     "https://example.com/auth",
/// )?;
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OpenId20Config {
    pub(crate) endpoint: String,
    pub(crate) return_to: Url,
    pub(crate) realm: String,
    pub(crate) login_path: String,
    pub(crate) nonce_param: String,
    pub(crate) nonce_ttl: Duration,
    pub(crate) timeout: StdDuration,
}

impl OpenId20Config {
    /// Create a configuration for `endpoint`, returning users to `return_to`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either URL is malformed.
    pub fn new(endpoint: &str, return_to: &str) -> Result<Self, Error> {
        urls::parse_config_url("endpoint", endpoint)?;
        let return_to = urls::parse_config_url("return_to", return_to)?;
        let realm = urls::realm_of(&return_to)?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            return_to,
            realm,
            login_path: "/auth/openid/login".into(),
            nonce_param: "login_nonce".into(),
            nonce_ttl: Duration::hours(1),
            timeout: StdDuration::from_secs(10),
        })
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `OPENID20_ENDPOINT`: provider login endpoint
    /// - `OPENID20_RETURN_TO`: URL the provider redirects back to
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is missing or malformed.
    pub fn from_env() -> Result<Self, Error> {
        let endpoint = std::env::var("OPENID20_ENDPOINT")
            .map_err(|_| Error::Config("OPENID20_ENDPOINT is required".into()))?;
        let return_to = std::env::var("OPENID20_RETURN_TO")
            .map_err(|_| Error::Config("OPENID20_RETURN_TO is required".into()))?;
        Self::new(&endpoint, &return_to)
    }

    /// Route that starts a login (default `/auth/openid/login`).
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Query parameter carrying the login nonce in `return_to` (default `login_nonce`).
    #[must_use]
    pub fn with_nonce_param(mut self, name: impl Into<String>) -> Self {
        self.nonce_param = name.into();
        self
    }

    /// Max-age of the login nonce cookie (default 1 hour).
    #[must_use]
    pub fn with_nonce_ttl(mut self, ttl: Duration) -> Self {
        self.nonce_ttl = ttl;
        self
    }

    /// Timeout of the `check_authentication` round trip (default 10 s).
    #[must_use]
    pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Provider login endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// URL the provider sends the browser back to.
    #[must_use]
    pub fn return_to(&self) -> &Url {
        &self.return_to
    }

    /// Scheme and host of `return_to`.
    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Login route path.
    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Name of the login nonce query parameter.
    #[must_use]
    pub fn nonce_param(&self) -> &str {
        &self.nonce_param
    }

    /// Login nonce cookie max-age.
    #[must_use]
    pub fn nonce_ttl(&self) -> Duration {
        self.nonce_ttl
    }
}

/// OpenID 2.0 login helper: builds redirects and verifies assertions.
#[derive(Debug, Clone)]
pub struct OpenId20Auth {
    config: OpenId20Config,
    http: reqwest::Client,
}

impl OpenId20Auth {
    /// Create the flow with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be built.
    pub fn new(config: OpenId20Config) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;
        Ok(Self { config, http })
    }

    /// Use a custom HTTP client for the re-verification round trip.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Configuration this flow was built from.
    #[must_use]
    pub fn config(&self) -> &OpenId20Config {
        &self.config
    }

    /// Build the provider redirect for a new login attempt.
    ///
    /// A fresh nonce is appended to `return_to`; bind it to the browser with
    /// a cookie and pass it back to [`verify_with_nonce`](Self::verify_with_nonce).
    #[must_use]
    pub fn authorization_request(&self) -> AuthRequest {
        let nonce = nonce::generate_nonce();
        let mut return_to = self.config.return_to.clone();
        return_to
            .query_pairs_mut()
            .append_pair(&self.config.nonce_param, &nonce);
        let return_to = String::from(return_to);

        let url = urls::append_query(
            &self.config.endpoint,
            [
                ("openid.ns", OPENID_NS),
                ("openid.mode", "checkid_setup"),
                ("openid.return_to", return_to.as_str()),
                ("openid.realm", self.config.realm.as_str()),
                ("openid.claimed_id", IDENTIFIER_SELECT),
                ("openid.identity", IDENTIFIER_SELECT),
                ("openid.ns.sreg", SREG_NS),
            ],
        );

        AuthRequest {
            url,
            return_to,
            realm: self.config.realm.clone(),
            nonce,
        }
    }

    /// Verify the provider's redirect back to us.
    ///
    /// `request_uri` is the path and query the browser requested, e.g.
    /// `/auth?openid.ns=...`. Returns the asserted `openid.claimed_id`.
    ///
    /// # Errors
    ///
    /// Fails with the error of the first gate that does not pass.
    pub async fn verify(&self, request_uri: &str) -> Result<VerifiedIdentity, Error> {
        let current = Url::parse(&format!("{}{request_uri}", self.config.realm)).map_err(|_| {
            Error::return_url_mismatch("request URL", self.config.return_to.as_str(), request_uri)
        })?;
        let params = CallbackParams::from_url(&current);

        verify_signed_fields(&params)?;
        tracing::debug!("openid.signed covers all required fields");
        verify_signature(&self.http, &params).await?;
        tracing::debug!("provider confirmed the assertion");
        verify_return_to(&current, &params)?;
        tracing::debug!("return_to matches the request URL");
        let response_nonce = params.get("openid.response_nonce").unwrap_or_default();
        nonce::check_response_nonce(response_nonce)?;
        tracing::debug!("response nonce is fresh");

        let claimed_id = params
            .get("openid.claimed_id")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Claims("missing openid.claimed_id".into()))?;

        Ok(VerifiedIdentity::new(
            Principal::ClaimedId(ClaimedId::from(claimed_id.to_string())),
            None,
        ))
    }

    /// [`verify`](Self::verify), then check that the login nonce echoed in
    /// `return_to` matches the one bound to the browser.
    ///
    /// # Errors
    ///
    /// Fails like [`verify`](Self::verify), or with [`Error::NonceMismatch`].
    pub async fn verify_with_nonce(
        &self,
        request_uri: &str,
        expected_nonce: Option<&str>,
    ) -> Result<VerifiedIdentity, Error> {
        let identity = self.verify(request_uri).await?;

        let echoed = Url::parse(&format!("{}{request_uri}", self.config.realm))
            .ok()
            .and_then(|url| {
                CallbackParams::from_url(&url)
                    .get(&self.config.nonce_param)
                    .map(str::to_string)
            });
        match (expected_nonce, echoed.as_deref()) {
            (Some(expected), Some(echoed)) if nonce::nonces_match(expected, echoed) => {
                Ok(identity)
            }
            _ => Err(Error::NonceMismatch),
        }
    }
}

/// Gate 1: the provider signed every field it must sign.
fn verify_signed_fields(params: &CallbackParams) -> Result<(), Error> {
    let signed: Vec<&str> = params
        .get("openid.signed")
        .unwrap_or_default()
        .split(',')
        .collect();

    let present = |field: &str| {
        params
            .get(&format!("openid.{field}"))
            .is_some_and(|v| !v.is_empty())
    };
    let required = REQUIRED_SIGNED
        .iter()
        .chain(SIGNED_IF_PRESENT.iter().filter(|field| present(field)))
        .copied();

    for field in required {
        if !signed.contains(&field) {
            return Err(Error::UnsignedField { field });
        }
    }
    Ok(())
}

/// Gate 2: ask the provider to confirm the assertion.
///
/// All response parameters are sent back verbatim except `openid.mode`.
async fn verify_signature(http: &reqwest::Client, params: &CallbackParams) -> Result<(), Error> {
    let endpoint = params
        .get("openid.op_endpoint")
        .filter(|e| !e.is_empty())
        .ok_or_else(|| Error::verification_request("missing openid.op_endpoint"))?;

    let mut form = vec![("openid.mode", CHECK_AUTHENTICATION)];
    form.extend(params.iter().filter(|(k, _)| *k != "openid.mode"));

    let response = http
        .post(endpoint)
        .form(&form)
        .send()
        .await
        .map_err(Error::verification_request)?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::verification_request(format!(
            "{endpoint} returned {status}"
        )));
    }
    let body = response
        .text()
        .await
        .map_err(Error::verification_request)?;

    let mut is_valid = false;
    let mut is_invalid = false;
    let mut ns_valid = false;
    for line in body.lines() {
        match line.split_once(':') {
            Some(("is_valid", "true")) => is_valid = true,
            Some(("is_valid", "false")) => is_invalid = true,
            Some(("ns", value)) => ns_valid |= value == OPENID_NS,
            _ => {}
        }
    }

    match (ns_valid, is_valid, is_invalid) {
        (true, true, _) => Ok(()),
        (true, false, true) => Err(Error::AssertionRejected),
        _ => Err(Error::verification_request(
            "could not parse check_authentication reply",
        )),
    }
}

/// Gate 3: the browser really landed on the asserted `return_to`.
fn verify_return_to(current: &Url, params: &CallbackParams) -> Result<(), Error> {
    let asserted = params.get("openid.return_to").unwrap_or_default();
    let return_to = Url::parse(asserted)
        .map_err(|_| Error::return_url_mismatch("return_to", asserted, current.as_str()))?;

    if current.scheme() != return_to.scheme() {
        return Err(Error::return_url_mismatch(
            "scheme",
            return_to.scheme(),
            current.scheme(),
        ));
    }
    if current.host_str() != return_to.host_str() || current.port() != return_to.port() {
        return Err(Error::return_url_mismatch(
            "host",
            host_and_port(&return_to),
            host_and_port(current),
        ));
    }
    if current.path() != return_to.path() {
        return Err(Error::return_url_mismatch(
            "path",
            return_to.path(),
            current.path(),
        ));
    }

    // any param in return_to must also be present in the request
    let wanted = CallbackParams::from_url(&return_to);
    for (key, _) in wanted.iter() {
        let want = wanted.get(key).unwrap_or_default();
        let got = params.get(key).unwrap_or_default();
        if got != want {
            return Err(Error::return_url_mismatch(
                format!("query param {key}"),
                want,
                got,
            ));
        }
    }
    Ok(())
}

fn host_and_port(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    }
}
