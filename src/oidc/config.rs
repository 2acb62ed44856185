use std::time::Duration as StdDuration;

use time::Duration;
use url::Url;

use crate::error::Error;

/// OpenID Connect ID-token flow configuration.
///
/// Required fields are constructor parameters, so there are no runtime "missing field" errors.
///
/// ```rust,ignore
/// use openid_session::oidc::OidcConfig;
///
/// let config = OidcConfig::new(
///     "https://accounts.google.com".parse()?,
///     "xxx.apps.googleusercontent.com",
///     "https://my-app.com/auth/callback".parse()?,
/// );
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OidcConfig {
    pub(crate) issuer: Url,
    pub(crate) client_id: String,
    pub(crate) redirect_uri: Url,
    pub(crate) scopes: Vec<String>,
    pub(crate) login_path: String,
    pub(crate) logout_path: String,
    pub(crate) login_redirect: String,
    pub(crate) session_ttl: Duration,
    pub(crate) nonce_ttl: Duration,
    pub(crate) timeout: StdDuration,
}

impl OidcConfig {
    /// Create a new configuration.
    ///
    /// The callback route is served at the path of `redirect_uri`; register
    /// that exact URI with the provider.
    #[must_use]
    pub fn new(issuer: Url, client_id: impl Into<String>, redirect_uri: Url) -> Self {
        Self {
            issuer,
            client_id: client_id.into(),
            redirect_uri,
            scopes: vec!["openid".into(), "email".into()],
            login_path: "/auth/login".into(),
            logout_path: "/auth/logout".into(),
            login_redirect: "/".into(),
            session_ttl: Duration::days(365),
            nonce_ttl: Duration::hours(1),
            timeout: StdDuration::from_secs(10),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `OIDC_ISSUER`: provider issuer URL
    /// - `OIDC_CLIENT_ID`: client ID registered with the provider
    /// - `OIDC_REDIRECT_URI`: callback URI (must be a valid URL)
    ///
    /// # Optional env vars
    /// - `OIDC_SCOPES`: Comma-separated scopes
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required env vars are missing or URLs are invalid.
    pub fn from_env() -> Result<Self, Error> {
        let issuer = std::env::var("OIDC_ISSUER")
            .map_err(|_| Error::Config("OIDC_ISSUER is required".into()))?;
        let issuer: Url = issuer
            .parse()
            .map_err(|e| Error::Config(format!("OIDC_ISSUER: {e}")))?;
        let client_id = std::env::var("OIDC_CLIENT_ID")
            .map_err(|_| Error::Config("OIDC_CLIENT_ID is required".into()))?;
        let redirect_uri = std::env::var("OIDC_REDIRECT_URI")
            .map_err(|_| Error::Config("OIDC_REDIRECT_URI is required".into()))?;
        let redirect_uri: Url = redirect_uri
            .parse()
            .map_err(|e| Error::Config(format!("OIDC_REDIRECT_URI: {e}")))?;

        let mut config = Self::new(issuer, client_id, redirect_uri);
        if let Ok(scopes) = std::env::var("OIDC_SCOPES") {
            config =
                config.with_scopes(scopes.split(',').map(|s| s.trim().to_string()).collect());
        }
        Ok(config)
    }

    /// Override the requested scopes (default: `["openid", "email"]`).
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Route that starts a login (default `/auth/login`).
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Route that ends the session (default `/auth/logout`).
    #[must_use]
    pub fn with_logout_path(mut self, path: impl Into<String>) -> Self {
        self.logout_path = path.into();
        self
    }

    /// Where the browser lands after a successful login (default `/`).
    #[must_use]
    pub fn with_login_redirect(mut self, path: impl Into<String>) -> Self {
        self.login_redirect = path.into();
        self
    }

    /// Max-age of the session cookie (default 365 days).
    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Max-age of the login nonce cookie (default 1 hour).
    #[must_use]
    pub fn with_nonce_ttl(mut self, ttl: Duration) -> Self {
        self.nonce_ttl = ttl;
        self
    }

    /// Timeout for discovery and key fetches (default 10 s).
    #[must_use]
    pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Provider issuer URL.
    #[must_use]
    pub fn issuer(&self) -> &Url {
        &self.issuer
    }

    /// Client ID, also the expected token audience.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Callback URI registered with the provider.
    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// Path of the callback route (the path of `redirect_uri`).
    #[must_use]
    pub fn callback_path(&self) -> &str {
        self.redirect_uri.path()
    }

    /// Requested scopes.
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Login route path.
    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Logout route path.
    #[must_use]
    pub fn logout_path(&self) -> &str {
        &self.logout_path
    }

    /// Post-login redirect target.
    #[must_use]
    pub fn login_redirect(&self) -> &str {
        &self.login_redirect
    }

    /// Session cookie max-age.
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Login nonce cookie max-age.
    #[must_use]
    pub fn nonce_ttl(&self) -> Duration {
        self.nonce_ttl
    }

    /// Outbound HTTP timeout.
    #[must_use]
    pub fn timeout(&self) -> StdDuration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> OidcConfig {
        OidcConfig::new(
            "https://accounts.example".parse().unwrap(),
            "my-app",
            "https://my-app.com/auth/callback".parse().unwrap(),
        )
    }

    #[test]
    fn test_config_defaults() {
        let config = test_config();

        assert_eq!(config.client_id(), "my-app");
        assert_eq!(config.callback_path(), "/auth/callback");
        assert_eq!(config.scopes(), &["openid", "email"]);
        assert_eq!(config.login_path(), "/auth/login");
        assert_eq!(config.login_redirect(), "/");
        assert_eq!(config.session_ttl(), Duration::days(365));
        assert_eq!(config.nonce_ttl(), Duration::hours(1));
    }

    #[test]
    fn test_config_with_overrides() {
        let config = test_config()
            .with_scopes(vec!["openid".into()])
            .with_login_path("/login")
            .with_login_redirect("/home")
            .with_session_ttl(Duration::days(30));

        assert_eq!(config.scopes(), &["openid"]);
        assert_eq!(config.login_path(), "/login");
        assert_eq!(config.login_redirect(), "/home");
        assert_eq!(config.session_ttl(), Duration::days(30));
    }
}
