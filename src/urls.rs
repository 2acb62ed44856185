use url::Url;
use url::form_urlencoded;

use crate::error::Error;

/// Parses an absolute URL given as configuration.
///
/// # Errors
///
/// Returns [`Error::Config`] naming `what` if the URL is malformed or has no host.
pub fn parse_config_url(what: &str, value: &str) -> Result<Url, Error> {
    let url = Url::parse(value).map_err(|e| Error::Config(format!("{what}: {e}")))?;
    if url.host_str().is_none() {
        return Err(Error::Config(format!("{what}: URL has no host")));
    }
    Ok(url)
}

/// Scheme and host (with explicit port, if any) of a URL, with path and
/// query stripped. `https://app.example/cb?x=1` yields `https://app.example`.
///
/// # Errors
///
/// Returns [`Error::Config`] if the URL has no host.
pub fn realm_of(url: &Url) -> Result<String, Error> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::Config(format!("{url}: URL has no host")))?;
    Ok(match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    })
}

/// Appends form-encoded parameters to an endpoint, using `&` if the endpoint
/// already carries a query string and `?` otherwise.
///
/// The endpoint itself is kept verbatim.
#[must_use]
pub fn append_query<'a, I>(endpoint: &str, params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!("{endpoint}{separator}{query}")
}

/// Raw query or form parameters returned by a provider.
///
/// Untrusted input. Keys may repeat; lookups return the first value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pairs: Vec<(String, String)>,
}

impl CallbackParams {
    /// Decodes an `application/x-www-form-urlencoded` string.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        Self {
            pairs: form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        }
    }

    /// Collects the query parameters of a URL.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        Self {
            pairs: url.query_pairs().into_owned().collect(),
        }
    }

    /// First value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All pairs in their original order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CallbackParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
