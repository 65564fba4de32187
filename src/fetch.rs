//! HTTP transport behind a small capability trait.

use async_trait::async_trait;
use reqwest::{
    Method, StatusCode,
    header::{
        ACCEPT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HOST, HeaderMap, HeaderValue, USER_AGENT,
    },
    redirect,
};

use crate::{
    config::MirrorConfig,
    decode::ContentEnvelope,
    error::{FetchError, MirrorError},
};

/// Encodings advertised to servers; exactly the ones the decoder handles.
const ACCEPTED_ENCODINGS: &str = "gzip, br";

/// A response exactly as the server sent it.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl FetchedResource {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn into_envelope(self) -> ContentEnvelope {
        ContentEnvelope::from_headers(self.body, &self.headers)
    }
}

/// An outgoing request: a plain GET for discovered links, or a copy of what
/// the browser asked for when requests are intercepted.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// Anything that can perform a [`FetchRequest`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn send(&self, request: FetchRequest) -> Result<FetchedResource, FetchError>;

    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError> {
        self.send(FetchRequest::get(url)).await
    }
}

/// Headers forwarded upstream for `request`.
///
/// Accept-Encoding and the framing headers always come from the client.
/// The caller's User-Agent is dropped when the client carries its own.
fn upstream_headers(mut headers: HeaderMap, override_user_agent: bool) -> HeaderMap {
    for name in [ACCEPT_ENCODING, CONTENT_LENGTH, HOST] {
        headers.remove(name);
    }
    if override_user_agent {
        headers.remove(USER_AGENT);
    }
    headers
}

/// [`Fetcher`] backed by reqwest.
///
/// Redirects are not followed and bodies are not decompressed: the mirror
/// stores the literal response at the requested path and decodes it itself.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    override_user_agent: bool,
}

impl HttpFetcher {
    /// Builds a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::HttpClient`] if the TLS backend cannot be
    /// initialized.
    pub fn new(config: &MirrorConfig) -> Result<Self, MirrorError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static(ACCEPTED_ENCODINGS));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(redirect::Policy::none())
            .no_gzip()
            .no_brotli()
            .no_deflate()
            .timeout(config.request_timeout);
        if !config.user_agent.is_empty() {
            builder = builder.user_agent(config.user_agent.clone());
        }

        let client = builder.build().map_err(MirrorError::HttpClient)?;
        Ok(Self {
            client,
            override_user_agent: !config.user_agent.is_empty(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn send(&self, request: FetchRequest) -> Result<FetchedResource, FetchError> {
        let FetchRequest {
            url,
            method,
            headers,
            body,
        } = request;
        let url = url.as_str();

        let mut builder = self
            .client
            .request(method, url)
            .headers(upstream_headers(headers, self.override_user_agent));
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let response = builder.send().await.map_err(|e| FetchError::new(url, e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::new(url, e))?;

        Ok(FetchedResource {
            url: url.to_string(),
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string, header, method, path},
    };

    use super::*;

    fn config(user_agent: &str) -> MirrorConfig {
        MirrorConfig {
            user_agent: user_agent.to_string(),
            ..MirrorConfig::default()
        }
    }

    #[test]
    fn test_upstream_headers_drop_client_owned() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, zstd"));
        headers.insert(USER_AGENT, HeaderValue::from_static("HeadlessChrome"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("3"));
        headers.insert("cookie", HeaderValue::from_static("session=1"));

        let forwarded = upstream_headers(headers.clone(), true);
        assert!(forwarded.get(ACCEPT_ENCODING).is_none());
        assert!(forwarded.get(USER_AGENT).is_none());
        assert!(forwarded.get(CONTENT_LENGTH).is_none());
        assert_eq!(forwarded.get("cookie").unwrap(), "session=1");

        let kept = upstream_headers(headers, false);
        assert_eq!(kept.get(USER_AGENT).unwrap(), "HeadlessChrome");
    }

    #[tokio::test]
    async fn test_send_forwards_method_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/search"))
            .and(header("cookie", "session=1"))
            .and(header("user-agent", "mirror-test"))
            .and(body_string("q=shoes"))
            .respond_with(ResponseTemplate::new(201).set_body_string("{\"hits\":0}"))
            .expect(1)
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("session=1"));
        headers.insert(USER_AGENT, HeaderValue::from_static("HeadlessChrome"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, zstd"));
        let request = FetchRequest {
            url: format!("{}/api/search", server.uri()),
            method: Method::POST,
            headers,
            body: Some(b"q=shoes".to_vec()),
        };

        let fetcher = HttpFetcher::new(&config("mirror-test")).unwrap();
        let resource = fetcher.send(request).await.unwrap();

        assert_eq!(resource.status, StatusCode::CREATED);
        assert_eq!(resource.body, b"{\"hits\":0}");
    }
}
