#[cfg(feature = "oidc")]
use std::convert::Infallible;
use std::ops::Deref;

#[cfg(feature = "oidc")]
use axum::extract::OptionalFromRequestParts;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;

use super::error::AuthError;
#[cfg(feature = "openid20")]
use crate::cookies;
#[cfg(feature = "oidc")]
use crate::error::Error;
use crate::types::VerifiedIdentity;

/// Logged-in user of the ID-token flow, re-verified from the session cookie.
///
/// Rejection redirects to the login route.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected(SessionUser(user): SessionUser) -> impl IntoResponse {
///     format!("Hello, {}", user.principal)
/// }
///
/// // Optional: accessible to both authenticated and anonymous users
/// async fn public(user: Option<SessionUser>) -> impl IntoResponse {
///     match user {
///         Some(u) => format!("Hello, {}", u.principal),
///         None => "Hello, guest".to_string(),
///     }
/// }
/// ```
#[cfg(feature = "oidc")]
#[derive(Debug, Clone)]
pub struct SessionUser(pub VerifiedIdentity);

#[cfg(feature = "oidc")]
impl<S> FromRequestParts<S> for SessionUser
where
    crate::oidc::OidcAuth: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = crate::oidc::OidcAuth::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);

        match auth.session().load(&jar).await {
            Ok(identity) => Ok(Self(identity)),
            Err(Error::NoSession) => {
                tracing::debug!("No session cookie");
                Err(AuthError::login_required(auth.config().login_path()))
            }
            Err(e) => {
                tracing::info!(error = %e, "Discarding invalid session");
                Err(AuthError::login_required(auth.config().login_path()))
            }
        }
    }
}

#[cfg(feature = "oidc")]
impl<S> OptionalFromRequestParts<S> for SessionUser
where
    crate::oidc::OidcAuth: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(<Self as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .ok())
    }
}

/// Identity asserted by an OpenID 2.0 provider on its redirect back to
/// `return_to`.
///
/// Use it as the extractor of the `return_to` route. Runs every verification
/// gate on the request URI and checks the login nonce against its cookie.
/// The nonce cookie is single-use: the handler should answer with
/// [`clear_openid_nonce`](crate::cookies::clear_openid_nonce).
///
/// ```rust,ignore
/// async fn returned(
///     OpenIdAssertion(identity): OpenIdAssertion,
///     jar: CookieJar,
/// ) -> (CookieJar, String) {
///     (jar.add(cookies::clear_openid_nonce()), identity.principal.to_string())
/// }
/// ```
#[cfg(feature = "openid20")]
#[derive(Debug, Clone)]
pub struct OpenIdAssertion(pub VerifiedIdentity);

#[cfg(feature = "openid20")]
impl<S> FromRequestParts<S> for OpenIdAssertion
where
    crate::openid20::OpenId20Auth: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = crate::openid20::OpenId20Auth::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        let expected = cookies::cookie_value(&jar, cookies::OPENID_NONCE_COOKIE);
        let request_uri = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path(), |pq| pq.as_str());

        let identity = auth
            .verify_with_nonce(request_uri, expected.as_deref())
            .await?;
        tracing::info!(claimed_id = %identity.principal, "OpenID 2.0 login verified");
        Ok(Self(identity))
    }
}

#[cfg(feature = "oidc")]
impl Deref for SessionUser {
    type Target = VerifiedIdentity;

    fn deref(&self) -> &VerifiedIdentity {
        &self.0
    }
}

#[cfg(feature = "openid20")]
impl Deref for OpenIdAssertion {
    type Target = VerifiedIdentity;

    fn deref(&self) -> &VerifiedIdentity {
        &self.0
    }
}
