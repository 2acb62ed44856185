use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, Response, StatusCode};
use axum::routing::get;
use axum_extra::extract::CookieJar;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, encode};
use openid_session::cookies;
use openid_session::middleware::{OpenIdAssertion, SessionUser, oidc_routes, openid20_routes};
use openid_session::{JwksVerifier, OidcAuth, OidcConfig, OpenId20Auth, OpenId20Config, Provider};
use serde_json::json;
use time::OffsetDateTime;
use tower::ServiceExt;
use url::form_urlencoded;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &[u8] = b"router-test-secret-0123456789abcdef";
const ISSUER: &str = "https://accounts.example";
const CLIENT_ID: &str = "client-123";

fn oidc_auth() -> OidcAuth {
    let config = OidcConfig::new(
        ISSUER.parse().unwrap(),
        CLIENT_ID,
        "https://app.example/auth/callback".parse().unwrap(),
    );
    let provider = Provider::new(
        ISSUER,
        "https://accounts.example/authorize",
        "https://accounts.example/jwks".parse().unwrap(),
    );
    let verifier =
        JwksVerifier::with_keys(ISSUER, [(Some("k1".into()), DecodingKey::from_secret(SECRET))])
            .with_algorithms(vec![Algorithm::HS256]);
    OidcAuth::new(config, &provider, verifier).unwrap()
}

fn id_token(nonce: &str) -> String {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let claims = json!({
        "iss": ISSUER,
        "aud": CLIENT_ID,
        "sub": "1234",
        "email": "a@example.com",
        "email_verified": true,
        "nonce": nonce,
        "iat": now,
        "exp": now + 3600,
    });
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some("k1".into());
    encode(&header, &claims, &EncodingKey::from_secret(SECRET)).unwrap()
}

async fn me(user: SessionUser) -> String {
    user.principal.to_string()
}

fn oidc_app() -> Router {
    let auth = oidc_auth();
    Router::new()
        .route("/me", get(me))
        .merge(oidc_routes(auth.clone()))
        .with_state(auth)
}

fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn callback_post(token: &str, cookie: Option<&str>) -> Request<Body> {
    let mut request = Request::post("/auth/callback")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        request = request.header(COOKIE, cookie);
    }
    request.body(Body::from(format!("id_token={token}"))).unwrap()
}

// ── ID-token flow ──────────────────────────────────────────────────

#[tokio::test]
async fn login_sets_nonce_cookie_and_redirects() {
    let response = oidc_app()
        .oneshot(Request::get("/auth/login").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()[LOCATION].to_str().unwrap().to_string();
    assert!(location.starts_with("https://accounts.example/authorize?response_type=id_token"));

    let cookies = set_cookies(&response);
    let nonce_cookie = cookies
        .iter()
        .find(|c| c.starts_with("__Host-AuthNonce="))
        .expect("nonce cookie");
    let nonce = nonce_cookie
        .trim_start_matches("__Host-AuthNonce=")
        .split(';')
        .next()
        .unwrap();
    assert_eq!(nonce.len(), 40);
    assert!(location.contains(&format!("nonce={nonce}")));
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with("__Host-AuthToken=;") && c.contains("Max-Age=-1"))
    );
}

#[tokio::test]
async fn callback_get_serves_relay_page() {
    let response = oidc_app()
        .oneshot(Request::get("/auth/callback").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("form.action = \"/auth/callback\";"));
    assert!(body.contains("params.get('id_token')"));
}

#[tokio::test]
async fn callback_post_starts_session() {
    let token = id_token("n-1");
    let response = oidc_app()
        .oneshot(callback_post(&token, Some("__Host-AuthNonce=n-1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/");
    let cookies = set_cookies(&response);
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with(&format!("__Host-AuthToken={token};")))
    );
    assert!(cookies.iter().any(|c| c.starts_with("__Host-AuthNonce=;")));
}

#[tokio::test]
async fn callback_post_without_nonce_cookie_is_denied() {
    let response = oidc_app()
        .oneshot(callback_post(&id_token("n-1"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(set_cookies(&response).is_empty());
    assert_eq!(body_string(response).await, "Access denied");
}

#[tokio::test]
async fn callback_post_with_other_nonce_is_denied() {
    let response = oidc_app()
        .oneshot(callback_post(&id_token("n-1"), Some("__Host-AuthNonce=n-2")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn session_user_requires_cookie() {
    let response = oidc_app()
        .oneshot(Request::get("/me").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/auth/login");

    let response = oidc_app()
        .oneshot(
            Request::get("/me")
                .header(COOKIE, format!("__Host-AuthToken={}", id_token("n-1")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "a@example.com");
}

#[tokio::test]
async fn invalid_session_redirects_to_login() {
    let response = oidc_app()
        .oneshot(
            Request::get("/me")
                .header(COOKIE, "__Host-AuthToken=garbage")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/auth/login");
}

#[tokio::test]
async fn logout_clears_session() {
    let response = oidc_app()
        .oneshot(
            Request::post("/auth/logout")
                .header(COOKIE, format!("__Host-AuthToken={}", id_token("n-1")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/");
    assert!(
        set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("__Host-AuthToken=;") && c.contains("Max-Age=-1"))
    );
}

// ── OpenID 2.0 flow ────────────────────────────────────────────────

async fn returned(
    OpenIdAssertion(identity): OpenIdAssertion,
    jar: CookieJar,
) -> (CookieJar, String) {
    (jar.add(cookies::clear_openid_nonce()), identity.principal.to_string())
}

fn openid20_app() -> Router {
    openid20_app_for("https://steam.example/openid/login")
}

fn openid20_app_for(endpoint: &str) -> Router {
    let config = OpenId20Config::new(endpoint, "https://app.example/cb").unwrap();
    let auth = OpenId20Auth::new(config).unwrap();
    Router::new()
        .route("/cb", get(returned))
        .merge(openid20_routes(auth.clone()))
        .with_state(auth)
}

#[tokio::test]
async fn openid20_login_binds_nonce() {
    let response = openid20_app()
        .oneshot(Request::get("/auth/openid/login").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()[LOCATION].to_str().unwrap().to_string();
    assert!(location.starts_with("https://steam.example/openid/login?"));
    assert!(location.contains("openid.mode=checkid_setup"));
    assert!(location.contains("openid.return_to=https%3A%2F%2Fapp.example%2Fcb"));
    assert!(location.contains("openid.realm=https%3A%2F%2Fapp.example"));

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    let nonce = cookies[0]
        .strip_prefix("__Host-OpenIdNonce=")
        .and_then(|rest| rest.split(';').next())
        .unwrap();
    assert!(location.contains(&format!("login_nonce%3D{nonce}")));
    assert!(cookies[0].contains("SameSite=Lax"));
}

#[tokio::test]
async fn openid20_return_without_assertion_is_denied() {
    let response = openid20_app()
        .oneshot(Request::get("/cb?login_nonce=abc").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_string(response).await, "Access denied");
}

#[tokio::test]
async fn openid20_return_verifies_and_clears_nonce() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("ns:http://specs.openid.net/auth/2.0\nis_valid:true\n"),
        )
        .expect(1)
        .mount(&server)
        .await;
    let op_endpoint = format!("{}/op", server.uri());

    let now = OffsetDateTime::now_utc();
    let response_nonce = format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Zq1",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
    );
    let login_nonce = "0123456789abcdef0123";
    let return_to = format!("https://app.example/cb?login_nonce={login_nonce}");
    let claimed_id = "https://steam.example/openid/id/7656";
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs([
            ("login_nonce", login_nonce),
            ("openid.ns", "http://specs.openid.net/auth/2.0"),
            ("openid.mode", "id_res"),
            ("openid.op_endpoint", op_endpoint.as_str()),
            ("openid.claimed_id", claimed_id),
            ("openid.identity", claimed_id),
            ("openid.return_to", return_to.as_str()),
            ("openid.response_nonce", response_nonce.as_str()),
            ("openid.assoc_handle", "1234567890"),
            (
                "openid.signed",
                "signed,op_endpoint,claimed_id,identity,return_to,response_nonce,assoc_handle",
            ),
            ("openid.sig", "c2lnbmF0dXJl"),
        ])
        .finish();

    let response = openid20_app_for(&op_endpoint)
        .oneshot(
            Request::get(format!("/cb?{query}"))
                .header(COOKIE, format!("__Host-OpenIdNonce={login_nonce}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("__Host-OpenIdNonce=;") && c.contains("Max-Age=-1"))
    );
    assert_eq!(body_string(response).await, claimed_id);
}
