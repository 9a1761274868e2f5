use crate::error::{Result, ScanError};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// A normalized absolute http(s) URL. The fragment is always stripped; every
/// other component is kept as the `url` crate parsed it, including the order
/// of query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resource(Url);

impl Resource {
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", input, e)))?;
        Self::from_url(url)
    }

    pub fn from_url(mut url: Url) -> Result<Self> {
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ScanError::InvalidUrl(format!(
                    "unsupported scheme '{}' in {}",
                    other, url
                )));
            }
        }
        if url.host_str().is_none() {
            return Err(ScanError::InvalidUrl(format!("missing host in {}", url)));
        }
        url.set_fragment(None);
        Ok(Self(url))
    }

    /// Resolve an href found on this page. Returns `None` for empty,
    /// fragment-only and non-navigational (`javascript:`, `mailto:`, ...)
    /// references.
    pub fn join(&self, href: &str) -> Option<Self> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return None;
        }
        let lower = href.to_ascii_lowercase();
        if ["javascript:", "mailto:", "tel:", "data:"]
            .iter()
            .any(|scheme| lower.starts_with(scheme))
        {
            return None;
        }
        let resolved = self.0.join(href).ok()?;
        Self::from_url(resolved).ok()
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    pub fn port(&self) -> Option<u16> {
        self.0.port_or_known_default()
    }

    /// Query parameters in document order. Repeated names are kept.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Same resource with the query replaced by `pairs` (urlencoded).
    pub fn with_query(&self, pairs: &[(String, String)]) -> Self {
        let mut url = self.0.clone();
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
        Self(url)
    }

    /// Same resource without its query string.
    pub fn without_query(&self) -> Self {
        let mut url = self.0.clone();
        url.set_query(None);
        Self(url)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl TryFrom<String> for Resource {
    type Error = ScanError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Resource> for String {
    fn from(value: Resource) -> Self {
        value.0.into()
    }
}

/// Normalize a URL string: parse it and drop the fragment.
pub fn normalize(input: &str) -> Result<String> {
    Resource::parse(input).map(String::from)
}
