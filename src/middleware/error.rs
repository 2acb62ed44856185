use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};

use crate::error::Error;

/// Authentication errors for the middleware layer.
///
/// Response bodies are generic; the cause is logged.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No usable session: send the browser to the login route.
    #[error("Login required")]
    LoginRequired { login_path: String },

    /// Verification failed.
    #[error(transparent)]
    Verification(#[from] Error),
}

impl AuthError {
    pub(crate) fn login_required(login_path: impl Into<String>) -> Self {
        Self::LoginRequired {
            login_path: login_path.into(),
        }
    }

    /// HTTP status this error answers with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::LoginRequired { .. } => StatusCode::SEE_OTHER,
            Self::Verification(Error::Config(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Verification(e) if e.is_transport() => StatusCode::BAD_GATEWAY,
            Self::Verification(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::LoginRequired { login_path } => Redirect::to(&login_path).into_response(),
            Self::Verification(e) => {
                match status {
                    StatusCode::FORBIDDEN => tracing::warn!(error = %e, "Login rejected"),
                    _ => tracing::error!(error = %e, "Login verification fault"),
                }
                let body = match status {
                    StatusCode::FORBIDDEN => "Access denied",
                    StatusCode::BAD_GATEWAY => "Identity provider unavailable",
                    _ => "Internal error",
                };
                (status, body).into_response()
            }
        }
    }
}
