//! Request and response types shared by the fetch pipeline.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use url::Url;

/// An intercepted request: the URL plus the parts of the header set the
/// controller actually inspects. Requests are host-provided and read-only;
/// the controller never mutates them.
#[derive(Debug, Clone)]
pub struct Request {
  pub url: Url,
  pub method: String,
  /// The `Accept` header, if the client sent one.
  pub accept: Option<String>,
}

impl Request {
  /// Create a GET request (the only method the controller caches).
  pub fn get(url: Url) -> Self {
    Self {
      url,
      method: "GET".to_string(),
      accept: None,
    }
  }

  pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
    self.accept = Some(accept.into());
    self
  }

  /// Cache identity of this request.
  pub fn key(&self) -> RequestKey {
    RequestKey::new(&self.method, &self.url)
  }
}

/// Identity of a request for cache lookups: method plus full URL.
///
/// Hashed to a stable, fixed-length key for storage; the readable form is
/// kept alongside for logs and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestKey {
  hash: String,
  description: String,
}

impl RequestKey {
  pub fn new(method: &str, url: &Url) -> Self {
    let description = format!("{} {}", method, url);

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(description.as_bytes());
    let hash = hex::encode(hasher.finalize());

    Self { hash, description }
  }

  pub fn hash(&self) -> &str {
    &self.hash
  }

  pub fn describe(&self) -> &str {
    &self.description
  }
}

/// An immutable capture of a response at the moment it was cached.
///
/// Once stored, a snapshot is independent of the live response it was
/// captured from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
  pub status: u16,
  pub headers: BTreeMap<String, String>,
  pub body: Vec<u8>,
}
