//! Plug-and-play login routes and extractors for Axum.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use axum::extract::FromRef;
//! use openid_session::middleware::{SessionUser, oidc_routes};
//! use openid_session::oidc::{OidcAuth, OidcConfig};
//!
//! #[derive(Clone, FromRef)]
//! struct AppState {
//!     auth: OidcAuth,
//! }
//!
//! // 1. Discover the provider once at startup
//! let auth = OidcAuth::discover(OidcConfig::from_env()?).await?;
//!
//! // 2. Mount the login, callback and logout routes
//! let app = axum::Router::new()
//!     .route("/", axum::routing::get(home))
//!     .merge(oidc_routes(auth.clone()))
//!     .with_state(AppState { auth });
//!
//! // 3. Take `SessionUser` in handlers that need a login
//! async fn home(user: SessionUser) -> String {
//!     format!("Hello, {}", user.principal)
//! }
//! ```
//!
//! The OpenID 2.0 flow works the same way with [`openid20_routes`] and the
//! [`OpenIdAssertion`] extractor on the `return_to` route.

mod error;
mod extractor;
mod routes;

pub use error::AuthError;
#[cfg(feature = "openid20")]
pub use extractor::OpenIdAssertion;
#[cfg(feature = "oidc")]
pub use extractor::SessionUser;
#[cfg(feature = "oidc")]
pub use routes::oidc_routes;
#[cfg(feature = "openid20")]
pub use routes::openid20_routes;
