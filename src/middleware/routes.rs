#[cfg(feature = "oidc")]
use axum::Form;
use axum::Router;
use axum::extract::State;
#[cfg(feature = "oidc")]
use axum::response::Html;
use axum::response::Redirect;
use axum::routing::get;
use axum_extra::extract::CookieJar;
#[cfg(feature = "oidc")]
use serde::Deserialize;

#[cfg(feature = "oidc")]
use super::error::AuthError;
use crate::cookies;
#[cfg(feature = "oidc")]
use crate::cookies::{AUTH_NONCE_COOKIE, AUTH_TOKEN_COOKIE};
#[cfg(feature = "oidc")]
use crate::oidc::OidcAuth;
#[cfg(feature = "openid20")]
use crate::openid20::OpenId20Auth;

/// Routes of the ID-token flow: login, callback (GET relay page and POST) and
/// logout, at the paths configured in [`OidcConfig`](crate::oidc::OidcConfig).
#[cfg(feature = "oidc")]
pub fn oidc_routes<S>(auth: OidcAuth) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let config = auth.config().clone();
    Router::new()
        .route(config.login_path(), get(oidc_login))
        .route(
            config.callback_path(),
            get(relay_page).post(oidc_callback),
        )
        .route(config.logout_path(), get(logout).post(logout))
        .with_state(auth)
}

/// Login route of the OpenID 2.0 flow.
///
/// The `return_to` route is the application's own; guard it with the
/// [`OpenIdAssertion`](super::OpenIdAssertion) extractor.
#[cfg(feature = "openid20")]
pub fn openid20_routes<S>(auth: OpenId20Auth) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let login_path = auth.config().login_path().to_string();
    Router::new()
        .route(&login_path, get(openid20_login))
        .with_state(auth)
}

// ── Login ──────────────────────────────────────────────────────────

#[cfg(feature = "oidc")]
async fn oidc_login(State(auth): State<OidcAuth>, jar: CookieJar) -> (CookieJar, Redirect) {
    let request = auth.authorization_request();
    let jar = jar
        .add(cookies::removal_cookie(AUTH_TOKEN_COOKIE))
        .add(cookies::auth_cookie(
            AUTH_NONCE_COOKIE,
            request.nonce,
            auth.config().nonce_ttl(),
        ));

    tracing::debug!("Redirecting to identity provider");
    (jar, Redirect::to(&request.url))
}

#[cfg(feature = "openid20")]
async fn openid20_login(
    State(auth): State<OpenId20Auth>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let request = auth.authorization_request();
    let jar = jar.add(cookies::openid_nonce_cookie(
        request.nonce,
        auth.config().nonce_ttl(),
    ));

    tracing::debug!(return_to = %request.return_to, "Redirecting to OpenID 2.0 provider");
    (jar, Redirect::to(&request.url))
}

// ── Callback ───────────────────────────────────────────────────────

/// The provider returns the token in the URL fragment, which never reaches
/// the server; this page posts it back.
#[cfg(feature = "oidc")]
async fn relay_page(State(auth): State<OidcAuth>) -> Html<String> {
    let action = serde_json::to_string(auth.config().callback_path())
        .unwrap_or_else(|_| "\"/\"".into())
        .replace('<', "\\u003c");
    Html(format!(
        r"<html><body><script>
let params = new URLSearchParams(window.location.hash.substring(1));
let form = document.createElement('form');
form.method = 'POST';
form.action = {action};
let input = document.createElement('input');
input.type = 'hidden';
input.name = 'id_token';
input.value = params.get('id_token') || '';
form.appendChild(input);
document.body.appendChild(form);
form.submit();
</script></body></html>"
    ))
}

#[cfg(feature = "oidc")]
#[derive(Deserialize)]
struct TokenForm {
    #[serde(default)]
    id_token: String,
}

#[cfg(feature = "oidc")]
async fn oidc_callback(
    State(auth): State<OidcAuth>,
    jar: CookieJar,
    Form(form): Form<TokenForm>,
) -> Result<(CookieJar, Redirect), AuthError> {
    let nonce = cookies::cookie_value(&jar, AUTH_NONCE_COOKIE);
    auth.complete_login(&form.id_token, nonce.as_deref()).await?;

    let jar = jar
        .add(cookies::removal_cookie(AUTH_NONCE_COOKIE))
        .add(auth.session().store(&form.id_token));

    Ok((jar, Redirect::to(auth.config().login_redirect())))
}

// ── Logout ─────────────────────────────────────────────────────────

#[cfg(feature = "oidc")]
async fn logout(State(auth): State<OidcAuth>, jar: CookieJar) -> (CookieJar, Redirect) {
    tracing::debug!("Clearing session");
    (jar.add(auth.session().clear()), Redirect::to("/"))
}
