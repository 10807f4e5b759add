//! Document retrieval for Everscroll.
//!
//! One public entry point: a [`Fetcher`] retrieves the next unit of
//! content as a parsed document. The HTTP implementation validates the
//! address, streams the body under a byte cap, and falls back to an
//! alternate transport exactly once when the primary client fails at the
//! network level. Engine tests drive the pipeline with scripted fetchers
//! instead.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tokio::time::timeout;
use url::Url;

use everscroll_dom::Dom;

/// A fetched, parsed unit of content.
#[derive(Debug)]
pub struct FetchedDocument {
    /// Final address after redirects.
    pub final_url: Url,
    /// Document title, if the markup carried one.
    pub title: Option<String>,
    /// Parsed document tree.
    pub dom: Dom,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to parse URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("scheme '{0}' not allowed; only http and https are supported")]
    InvalidScheme(String),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("response exceeded {limit} bytes")]
    TooLarge { limit: usize },
    #[error("unsupported content type '{0}'")]
    UnsupportedContentType(String),
}

impl FetchError {
    /// Whether a later trigger may reasonably retry the same address.
    #[must_use]
    pub fn retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Status(code) => *code >= 500,
            Self::InvalidUrl { .. }
            | Self::InvalidScheme(_)
            | Self::TooLarge { .. }
            | Self::UnsupportedContentType(_) => false,
        }
    }
}

/// Retrieval seam between the engine and the network.
pub trait Fetcher {
    fn fetch(
        &self,
        url: &Url,
    ) -> impl Future<Output = Result<FetchedDocument, FetchError>> + Send;
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub max_body_bytes: usize,
    pub max_redirects: usize,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("everscroll/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(15),
            max_body_bytes: 8 * 1024 * 1024,
            max_redirects: 5,
        }
    }
}

/// `reqwest`-backed fetcher with a one-shot fallback transport.
///
/// The primary client follows redirects and negotiates compression; the
/// fallback is a plainer client (no redirects, fresh connection pool)
/// used once per fetch when the primary fails before producing a
/// response. Anything past that is surfaced to the append pipeline.
#[derive(Debug)]
pub struct HttpFetcher {
    primary: reqwest::Client,
    fallback: reqwest::Client,
    config: HttpFetcherConfig,
}

impl HttpFetcher {
    pub fn new(config: HttpFetcherConfig) -> Result<Self, FetchError> {
        let primary = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(config.timeout)
            .build()
            .map_err(FetchError::Network)?;
        let fallback = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(0)
            .timeout(config.timeout)
            .build()
            .map_err(FetchError::Network)?;
        Ok(Self {
            primary,
            fallback,
            config,
        })
    }

    async fn fetch_with(
        &self,
        client: &reqwest::Client,
        url: &Url,
    ) -> Result<FetchedDocument, FetchError> {
        let response = timeout(self.config.timeout, client.get(url.clone()).send())
            .await
            .map_err(|_| FetchError::Timeout(self.config.timeout))?
            .map_err(FetchError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        if let Some(content_type) = response.headers().get(CONTENT_TYPE) {
            let value = content_type.to_str().unwrap_or("").to_ascii_lowercase();
            let essence = value.split(';').next().unwrap_or("").trim().to_string();
            if !matches!(essence.as_str(), "" | "text/html" | "application/xhtml+xml") {
                return Err(FetchError::UnsupportedContentType(essence));
            }
        }

        let final_url = response.url().clone();
        let body = self.read_capped(response).await?;
        let dom = Dom::parse_document(&body);
        let title = dom.title();
        Ok(FetchedDocument {
            final_url,
            title,
            dom,
        })
    }

    /// Stream the body, aborting once the byte cap is exceeded.
    async fn read_capped(&self, response: reqwest::Response) -> Result<String, FetchError> {
        let limit = self.config.max_body_bytes;
        let mut bytes: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(FetchError::Network)?;
            if bytes.len() + chunk.len() > limit {
                return Err(FetchError::TooLarge { limit });
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Parse and validate an address for fetching.
pub fn parse_target(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw.trim()).map_err(|e| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidScheme(other.to_string())),
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        match self.fetch_with(&self.primary, url).await {
            Ok(doc) => Ok(doc),
            Err(err @ (FetchError::Network(_) | FetchError::Timeout(_))) => {
                tracing::warn!(%url, error = %err, "primary transport failed, trying fallback");
                self.fetch_with(&self.fallback, url).await
            }
            Err(err) => Err(err),
        }
    }
}
