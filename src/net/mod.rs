//! Network boundary: request/response types and the origin HTTP client.

mod client;
mod types;

pub use client::{HttpClient, LiveResponse};
pub use types::{Request, RequestKey, Snapshot};
