use reqwest::Client;
use reqwest::header::HeaderMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::AcquisitionError;

/// Response of a completed whole-body fetch
#[derive(Debug)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// HTTP fetcher for remote archives
///
/// Reports response headers as soon as they arrive, before the body is
/// streamed in.
pub struct HttpFetcher {
    client: Client,
    timeout: Option<Duration>,
    transferred_bytes: AtomicU64,
}

impl HttpFetcher {
    /// Create a new fetcher. `timeout` bounds the whole request, body included.
    pub fn new(timeout: Option<Duration>) -> Result<Self, AcquisitionError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(AcquisitionError::Transport)?;

        Ok(Self {
            client,
            timeout,
            transferred_bytes: AtomicU64::new(0),
        })
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// Fetch `url` completely.
    ///
    /// `on_headers` is called exactly once, with the status and headers, before
    /// any body chunk is read. A non-success status is reported only after the
    /// body completed, mirroring how a browser request settles.
    pub async fn fetch<F>(
        &self,
        url: &str,
        on_headers: F,
    ) -> Result<FetchResponse, AcquisitionError>
    where
        F: FnOnce(u16, &HeaderMap) + Send,
    {
        let mut resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        on_headers(status.as_u16(), resp.headers());
        let headers = resp.headers().clone();

        let mut body = Vec::with_capacity(resp.content_length().unwrap_or(0) as usize);
        while let Some(chunk) = resp.chunk().await.map_err(|e| self.classify(e))? {
            body.extend_from_slice(&chunk);
            self.transferred_bytes
                .fetch_add(chunk.len() as u64, Ordering::Relaxed);
        }

        if !status.is_success() {
            return Err(AcquisitionError::Status(status.as_u16()));
        }

        tracing::debug!(url, status = status.as_u16(), bytes = body.len(), "Fetched archive");

        Ok(FetchResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }

    fn classify(&self, e: reqwest::Error) -> AcquisitionError {
        match self.timeout {
            Some(timeout) if e.is_timeout() => AcquisitionError::Timeout(timeout),
            _ => AcquisitionError::Transport(e),
        }
    }
}
