//! Network transport for fetch tasks
//!
//! The registry never talks to the network directly. Each transfer attempt asks
//! a [`Transport`] for the body of a URL and streams it into temporary storage.
//!
//! - `config`: HTTP client configuration and building
//! - `http`: the default reqwest-backed transport with rate limiting

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use url::Url;

use crate::errors::FetchResult;

pub mod config;
pub mod http;

pub use config::ClientConfig;
pub use http::HttpTransport;

/// Performs `GET(url)` and yields the response body
///
/// Implementations classify failures into [`crate::errors::FetchError`]. They
/// must not retry on their own and must tolerate the returned stream being
/// dropped mid-transfer, which is how cancellation reaches them.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug + 'static {
    /// Start a transfer and return the body as a stream of chunks
    async fn get(&self, url: &Url) -> FetchResult<ByteStream>;
}

/// Response body of a single transfer
pub struct ByteStream {
    inner: BoxStream<'static, FetchResult<Bytes>>,
    content_length: Option<u64>,
}

impl ByteStream {
    /// Wrap a boxed chunk stream with an optional announced length
    pub fn new(inner: BoxStream<'static, FetchResult<Bytes>>, content_length: Option<u64>) -> Self {
        Self {
            inner,
            content_length,
        }
    }

    /// Build a stream from chunks already in memory
    pub fn from_chunks(chunks: Vec<Bytes>) -> Self {
        let total = chunks.iter().map(|c| c.len() as u64).sum();
        Self::new(stream::iter(chunks.into_iter().map(Ok)).boxed(), Some(total))
    }

    /// Length announced by the server, if any
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }
}

impl Stream for ByteStream {
    type Item = FetchResult<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}
