use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::Cookie;

use crate::cookies::{self, AUTH_TOKEN_COOKIE};
use crate::error::Error;
use crate::oidc::OidcAuth;
use crate::types::{Principal, VerifiedIdentity};

/// Stateless session: the raw ID token lives in `__Host-AuthToken` and is
/// re-verified on every request.
///
/// The token's own `exp` is ignored on reload; the cookie's max-age bounds
/// the session instead.
#[derive(Clone, Copy)]
pub struct SessionCodec<'a> {
    auth: &'a OidcAuth,
}

impl<'a> SessionCodec<'a> {
    pub(crate) fn new(auth: &'a OidcAuth) -> Self {
        Self { auth }
    }

    /// Session cookie carrying `token`.
    #[must_use]
    pub fn store(&self, token: &str) -> Cookie<'static> {
        cookies::auth_cookie(
            AUTH_TOKEN_COOKIE,
            token.to_string(),
            self.auth.config().session_ttl(),
        )
    }

    /// Re-verify the session cookie.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSession`] if there is no cookie and
    /// [`Error::InvalidSession`] wrapping the cause if it does not verify.
    pub async fn load(&self, jar: &CookieJar) -> Result<VerifiedIdentity, Error> {
        let token = cookies::cookie_value(jar, AUTH_TOKEN_COOKIE).ok_or(Error::NoSession)?;
        let assertion = self
            .auth
            .verify_token(&token, true)
            .await
            .map_err(|e| Error::InvalidSession(Box::new(e)))?;
        Ok(VerifiedIdentity::new(
            Principal::Email(assertion.email),
            assertion.expires_at,
        ))
    }

    /// Cookie that logs the browser out.
    #[must_use]
    pub fn clear(&self) -> Cookie<'static> {
        cookies::removal_cookie(AUTH_TOKEN_COOKIE)
    }
}
