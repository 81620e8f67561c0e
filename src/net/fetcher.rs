//! Network fetch seam and the reqwest-backed implementation.

use std::time::Duration;

use reqwest::{Client, Method};
use tracing::debug;

use crate::models::{ShellRequest, ShellResponse};

use super::FetchError;

/// HTTP request timeout in seconds.
/// The resolution policy itself has no deadline; bounding the transport
/// keeps one hung fetch from stalling its request forever.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Network I/O seam for the worker.
///
/// One call performs one request and returns the fully buffered response.
/// Transport failures map to `FetchError`; HTTP error statuses come back
/// as ordinary responses for the caller to interpret.
#[allow(async_fn_in_trait)]
pub trait Fetch {
    async fn fetch(&self, request: &ShellRequest) -> Result<ShellResponse, FetchError>;
}

/// Reqwest-backed fetcher.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, request: &ShellRequest) -> Result<ShellResponse, FetchError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| FetchError::InvalidMethod(request.method.clone()))?;

        let response = self
            .client
            .request(method, request.url.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    FetchError::Connection(e.to_string())
                } else {
                    FetchError::Network(e)
                }
            })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(url = %request.url, status, bytes = body.len(), "fetched");

        Ok(ShellResponse::new(status, headers, body))
    }
}
