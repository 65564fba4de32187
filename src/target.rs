//! The root URL being mirrored.

use url::Url;

use crate::error::MirrorError;

/// Parsed root URL of a mirror run.
///
/// Every path discovered during the run is resolved against this target's
/// scheme and host, so only same-origin resources are ever requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorTarget {
    url: Url,
}

impl MirrorTarget {
    /// Parses `input`, normalizing an empty path to `/`.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::InvalidTarget`] if the input is not an absolute
    /// http(s) URL with a host.
    pub fn parse(input: &str) -> Result<Self, MirrorError> {
        let invalid = |reason: String| MirrorError::InvalidTarget {
            url: input.to_string(),
            reason,
        };

        let mut url = Url::parse(input).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme `{}`", url.scheme())));
        }
        if url.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }
        if url.path().is_empty() {
            url.set_path("/");
        }
        url.set_fragment(None);

        Ok(Self { url })
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// `scheme://host[:port]` without a trailing slash.
    pub fn origin(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{}://{}:{port}", self.scheme(), self.host()),
            None => format!("{}://{}", self.scheme(), self.host()),
        }
    }

    /// URL pattern matching every request to this origin.
    pub fn origin_pattern(&self) -> String {
        format!("{}/*", self.origin())
    }

    /// Resolves a path-only reference into an absolute same-origin URL.
    pub fn resolve(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.origin())
        } else {
            format!("{}/{path}", self.origin())
        }
    }

    /// Whether `url` is the root document of this target. Path and query
    /// must both match; the fragment is ignored.
    pub fn is_root(&self, url: &Url) -> bool {
        url.path() == self.path() && url.query() == self.url.query()
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}
