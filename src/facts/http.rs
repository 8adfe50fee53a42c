//! Small pieces shared by the API clients.

use crate::Result;
use bytes::Bytes;
use ohno::{IntoAppError, app_err};
use serde::de::DeserializeOwned;
use url::Url;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("tech-metrics/", env!("CARGO_PKG_VERSION"));

/// A response worth looking at: either a body or a definitive "not found".
#[derive(Debug)]
pub enum Reply {
    Body(Bytes),
    NotFound,
}

impl Reply {
    /// Decode the body as JSON, mapping "not found" to `None`.
    pub fn decode<T: DeserializeOwned>(self, url: &Url) -> Result<Option<T>> {
        match self {
            Self::NotFound => Ok(None),
            Self::Body(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .into_app_err_with(|| format!("parsing response from {url}")),
        }
    }
}

/// Parse a configured base URL.
pub fn parse_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url).into_app_err_with(|| format!("invalid base URL '{base_url}'"))?;
    if url.cannot_be_a_base() {
        return Err(app_err!("invalid base URL '{base_url}': cannot be a base"));
    }

    Ok(url)
}

/// Append percent-encoded path segments and query pairs to `base`.
pub fn endpoint(base: &Url, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
    let mut url = base.clone();

    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| app_err!("invalid base URL '{base}': cannot be a base"))?;
        let _ = path.pop_if_empty().extend(segments);
    }

    if !query.is_empty() {
        let _ = url.query_pairs_mut().extend_pairs(query);
    }

    Ok(url)
}
