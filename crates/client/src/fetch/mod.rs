//! Upstream HTTP fetch for the interception layer's network fallback.
//!
//! The client is a transparent passthrough: upstream statuses are returned
//! as-is (a 404 from the origin is a response, not a client error). Only
//! transport failures, oversized bodies, and unparseable requests surface
//! as errors.

pub mod url;

use bytes::Bytes;
use reqwest::{Client, Method, StatusCode, Url, header};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use squall_core::{Error, Fetch, FetchedResource, ResourceRequest};

pub use self::url::{UrlError, canonicalize, resolve};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "squall/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "squall/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

/// Response from one upstream fetch.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code, whatever the upstream said
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
    /// Response headers
    pub headers: header::HeaderMap,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

/// Upstream HTTP client.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Perform one upstream request, forwarding the caller's headers.
    ///
    /// Respects the configured timeout, redirect, and byte limits.
    pub async fn get(&self, request: &ResourceRequest) -> Result<FetchResponse, Error> {
        let start = Instant::now();
        let url = canonicalize(&request.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::InvalidInput(format!("bad method token: {}", request.method)))?;

        let mut builder = self.http.request(method, url.as_str());
        for (name, value) in &request.headers {
            match (
                header::HeaderName::from_bytes(name.as_bytes()),
                header::HeaderValue::from_str(value),
            ) {
                (Ok(n), Ok(v)) => builder = builder.header(n, v),
                _ => tracing::debug!(header = %name, "dropping unforwardable request header"),
            }
        }

        let response = builder.send().await.map_err(classify_transport)?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::HttpError(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                bytes.len(),
                self.config.max_bytes
            )));
        }

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} -> {} {} in {}ms ({} bytes)",
            url,
            final_url,
            status.as_u16(),
            fetch_ms,
            bytes.len()
        );

        Ok(FetchResponse { url, final_url, status, content_type, bytes, headers, fetch_ms })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Fetch for FetchClient {
    async fn fetch(&self, request: &ResourceRequest) -> Result<FetchedResource, Error> {
        let response = self.get(request).await?;
        Ok(FetchedResource {
            url: response.url.to_string(),
            final_url: response.final_url.to_string(),
            status: response.status.as_u16(),
            content_type: response.content_type,
            headers: header_pairs(&response.headers),
            body: response.bytes.to_vec(),
            fetch_ms: response.fetch_ms,
        })
    }
}

/// Map a reqwest transport error onto the shared taxonomy.
fn classify_transport(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(err.to_string())
    } else if err.is_connect() {
        Error::NetworkUnreachable(err.to_string())
    } else {
        Error::HttpError(format!("network error: {}", err))
    }
}

/// Flatten a header map into name/value string pairs, dropping values that
/// are not valid UTF-8.
fn header_pairs(headers: &header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "squall/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        let client = FetchClient::new(FetchConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_get_rejects_bad_url() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let request = ResourceRequest::get("");
        let err = client.get(&request).await.unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_get_rejects_bad_method() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let mut request = ResourceRequest::get("http://127.0.0.1:1/");
        request.method = "G E T".to_string();
        let err = client.get(&request).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_header_pairs() {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/html"));
        headers.insert("etag", header::HeaderValue::from_static("\"abc\""));

        let pairs = header_pairs(&headers);
        assert!(pairs.contains(&("content-type".to_string(), "text/html".to_string())));
        assert!(pairs.contains(&("etag".to_string(), "\"abc\"".to_string())));
    }
}
