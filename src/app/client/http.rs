//! Rate-limited HTTP transport
//!
//! Issues a single GET per transfer attempt and hands the response body back
//! as a byte stream. Retrying is left to the caller (an explicit redownload).

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::Client;
use url::Url;

use super::config::ClientConfig;
use super::{ByteStream, Transport};
use crate::errors::{ClientError, ClientResult, FetchError, FetchResult};

type DirectRateLimiter = RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>;

/// HTTP transport backed by reqwest
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    rate_limiter: DirectRateLimiter,
}

impl HttpTransport {
    /// Creates a transport with the default client configuration
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the reqwest client cannot be built
    pub fn new() -> ClientResult<Self> {
        Self::with_config(&ClientConfig::default())
    }

    /// Creates a transport from the given configuration
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the client cannot be built or the rate limit is zero
    pub fn with_config(config: &ClientConfig) -> ClientResult<Self> {
        let client = config.build_http_client()?;
        Self::with_client(client, config.rate_limit_rps)
    }

    /// Creates a transport around an existing reqwest client
    pub fn with_client(client: Client, rate_limit_rps: u32) -> ClientResult<Self> {
        let rate_limiter = Self::build_rate_limiter(rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
        })
    }

    fn build_rate_limiter(rate_limit_rps: u32) -> ClientResult<DirectRateLimiter> {
        let rps = NonZeroU32::new(rate_limit_rps).ok_or(ClientError::InvalidRateLimit)?;
        Ok(RateLimiter::direct(Quota::per_second(rps)))
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> FetchResult<ByteStream> {
        // Spread bursts of new fetches
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
            .await;

        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "Server rejected request");
            return Err(FetchError::ServerError {
                status: status.as_u16(),
            });
        }

        tracing::debug!(
            url = %url,
            content_length = ?response.content_length(),
            "Response headers received"
        );

        let content_length = response.content_length();
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(FetchError::from));

        Ok(ByteStream::new(stream.boxed(), content_length))
    }
}
