//! HTTP client for fetching origin resources.

use color_eyre::{eyre::eyre, Result};
use reqwest::header::ACCEPT;
use std::collections::BTreeMap;
use std::time::Duration;

use super::types::{Request, Snapshot};

/// Thin wrapper around reqwest for fetching resources from the origin.
#[derive(Clone)]
pub struct HttpClient {
  client: reqwest::Client,
}

impl HttpClient {
  pub fn new(timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }

  /// Perform the network fetch for a request.
  ///
  /// A resolved response (any status, including 4xx/5xx) is a network
  /// success; only transport-level failures are errors.
  pub async fn fetch(&self, request: &Request) -> Result<LiveResponse> {
    let mut builder = self.client.get(request.url.clone());
    if let Some(accept) = &request.accept {
      builder = builder.header(ACCEPT, accept);
    }

    let inner = builder
      .send()
      .await
      .map_err(|e| eyre!("Network fetch failed for {}: {}", request.url, e))?;

    Ok(LiveResponse { inner })
  }
}

/// A live network response.
///
/// The body stream can be read once; capturing consumes the response and
/// buffers it into an immutable `Snapshot`. The move makes the single-read
/// constraint explicit: a response that has been captured is gone.
pub struct LiveResponse {
  inner: reqwest::Response,
}

impl LiveResponse {
  /// Capture a durable snapshot of this response, consuming it.
  pub async fn capture(self) -> Result<Snapshot> {
    let status = self.inner.status().as_u16();

    let headers: BTreeMap<String, String> = self
      .inner
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();

    let url = self.inner.url().clone();
    let body = self
      .inner
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read response body from {}: {}", url, e))?
      .to_vec();

    Ok(Snapshot {
      status,
      headers,
      body,
    })
  }
}
