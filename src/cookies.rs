use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Anti-CSRF nonce cookie of the ID-token flow.
pub const AUTH_NONCE_COOKIE: &str = "__Host-AuthNonce";
/// Session cookie holding the raw ID token.
pub const AUTH_TOKEN_COOKIE: &str = "__Host-AuthToken";
/// Anti-CSRF nonce cookie of the OpenID 2.0 flow.
pub const OPENID_NONCE_COOKIE: &str = "__Host-OpenIdNonce";

/// Build a `Secure`, `HttpOnly`, `SameSite=Strict` cookie scoped to `/`.
///
/// The `__Host-` names above require exactly these attributes.
#[cfg(feature = "oidc")]
pub(crate) fn auth_cookie(name: &'static str, value: String, max_age: Duration) -> Cookie<'static> {
    host_cookie(name, value, max_age, SameSite::Strict)
}

/// Nonce cookie of the OpenID 2.0 flow.
///
/// `SameSite=Lax`: it has to ride along on the provider's cross-site
/// redirect back to `return_to`.
#[cfg(feature = "openid20")]
pub(crate) fn openid_nonce_cookie(value: String, max_age: Duration) -> Cookie<'static> {
    host_cookie(OPENID_NONCE_COOKIE, value, max_age, SameSite::Lax)
}

/// Deletes the OpenID 2.0 nonce cookie.
///
/// The `return_to` handler should send this once
/// [`OpenIdAssertion`](crate::middleware::OpenIdAssertion) has accepted the
/// login, so the nonce cannot bind a second assertion.
#[cfg(feature = "openid20")]
#[must_use]
pub fn clear_openid_nonce() -> Cookie<'static> {
    host_cookie(
        OPENID_NONCE_COOKIE,
        String::new(),
        Duration::seconds(-1),
        SameSite::Lax,
    )
}

#[cfg(any(feature = "oidc", feature = "openid20"))]
fn host_cookie(
    name: &'static str,
    value: String,
    max_age: Duration,
    same_site: SameSite,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(true)
        .same_site(same_site)
        .path("/")
        .max_age(max_age)
        .build()
}

/// Overwrite a cookie with an empty value and a negative max-age.
#[cfg(feature = "oidc")]
pub(crate) fn removal_cookie(name: &'static str) -> Cookie<'static> {
    auth_cookie(name, String::new(), Duration::seconds(-1))
}

/// Non-empty value of a cookie.
pub(crate) fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
