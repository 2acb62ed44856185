use serde::Deserialize;
use url::Url;

use crate::error::Error;

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    #[serde(default)]
    issuer: String,
    #[serde(default)]
    authorization_endpoint: String,
    #[serde(default)]
    jwks_uri: String,
}

/// Identity provider metadata.
///
/// Fetched once at startup by [`Provider::discover`] and owned by the caller.
#[derive(Debug, Clone)]
pub struct Provider {
    issuer: String,
    authorization_endpoint: String,
    jwks_uri: Url,
}

impl Provider {
    /// Build provider metadata by hand, without discovery.
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        authorization_endpoint: impl Into<String>,
        jwks_uri: Url,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            authorization_endpoint: authorization_endpoint.into(),
            jwks_uri,
        }
    }

    /// Fetch `<issuer>/.well-known/openid-configuration`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document cannot be fetched, lacks a
    /// mandatory field, or advertises a different issuer.
    pub async fn discover(http: &reqwest::Client, issuer: &Url) -> Result<Self, Error> {
        let issuer = issuer.as_str().trim_end_matches('/');
        let well_known = format!("{issuer}/.well-known/openid-configuration");

        let response = http
            .get(&well_known)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Config(format!("discovery: {e}")))?;
        let doc: DiscoveryDocument = response
            .json()
            .await
            .map_err(|e| Error::Config(format!("discovery document: {e}")))?;

        if doc.authorization_endpoint.trim().is_empty() || doc.jwks_uri.trim().is_empty() {
            return Err(Error::Config(
                "discovery document is missing mandatory fields".into(),
            ));
        }
        if doc.issuer.trim_end_matches('/') != issuer {
            return Err(Error::Config(format!(
                "issuer did not match: expected {issuer:?}, got {:?}",
                doc.issuer
            )));
        }
        let jwks_uri: Url = doc
            .jwks_uri
            .parse()
            .map_err(|e| Error::Config(format!("jwks_uri: {e}")))?;

        tracing::debug!(issuer = %doc.issuer, "Discovered identity provider");

        Ok(Self {
            issuer: doc.issuer,
            authorization_endpoint: doc.authorization_endpoint,
            jwks_uri,
        })
    }

    /// Issuer exactly as the provider writes it into `iss`.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn authorization_endpoint(&self) -> &str {
        &self.authorization_endpoint
    }

    #[must_use]
    pub fn jwks_uri(&self) -> &Url {
        &self.jwks_uri
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn serve_discovery(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn discover_reads_metadata() {
        let server = MockServer::start().await;
        let issuer = server.uri();
        serve_discovery(
            &server,
            json!({
                "issuer": issuer,
                "authorization_endpoint": format!("{issuer}/authorize"),
                "jwks_uri": format!("{issuer}/jwks"),
            }),
        )
        .await;

        let provider = Provider::discover(&reqwest::Client::new(), &issuer.parse().unwrap())
            .await
            .unwrap();
        assert_eq!(provider.issuer(), issuer);
        assert_eq!(provider.authorization_endpoint(), format!("{issuer}/authorize"));
        assert_eq!(provider.jwks_uri().as_str(), format!("{issuer}/jwks"));
    }

    #[tokio::test]
    async fn discover_rejects_foreign_issuer() {
        let server = MockServer::start().await;
        let issuer = server.uri();
        serve_discovery(
            &server,
            json!({
                "issuer": "https://evil.example",
                "authorization_endpoint": format!("{issuer}/authorize"),
                "jwks_uri": format!("{issuer}/jwks"),
            }),
        )
        .await;

        let err = Provider::discover(&reqwest::Client::new(), &issuer.parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn discover_requires_mandatory_fields() {
        let server = MockServer::start().await;
        let issuer = server.uri();
        serve_discovery(&server, json!({ "issuer": issuer })).await;

        let err = Provider::discover(&reqwest::Client::new(), &issuer.parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn discover_fails_without_document() {
        let server = MockServer::start().await;
        let err = Provider::discover(&reqwest::Client::new(), &server.uri().parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
