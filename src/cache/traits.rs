//! Core types and the storage trait for the cache namespaces.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use std::future::Future;
use std::sync::Arc;

use crate::net::{RequestKey, Snapshot};

/// The named durable namespaces the controller writes to.
///
/// `offline` holds the single offline fallback document, `parties` holds
/// opportunistically cached party pages, `static` holds assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Namespace {
  Offline,
  Parties,
  Static,
}

impl Namespace {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Offline => "offline",
      Self::Parties => "parties",
      Self::Static => "static",
    }
  }
}

/// A snapshot together with when it was stored.
#[derive(Debug, Clone)]
pub struct CachedSnapshot {
  pub snapshot: Snapshot,
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
///
/// A miss is `Ok(None)`, not an error; `Err` means the backend itself
/// failed. `put` overwrites whole snapshots atomically, so the last
/// successful write for a key wins and readers never see a torn entry.
pub trait CacheStore: Send + Sync {
  /// Look up a snapshot by request key.
  fn get(&self, namespace: Namespace, key: &RequestKey) -> Result<Option<CachedSnapshot>>;

  /// Store a snapshot under a request key, replacing any previous entry.
  fn put(&self, namespace: Namespace, key: &RequestKey, snapshot: &Snapshot) -> Result<()>;
}

// The backend is picked at runtime in main, behind a box.
impl<T: CacheStore + ?Sized> CacheStore for Box<T> {
  fn get(&self, namespace: Namespace, key: &RequestKey) -> Result<Option<CachedSnapshot>> {
    (**self).get(namespace, key)
  }

  fn put(&self, namespace: Namespace, key: &RequestKey, snapshot: &Snapshot) -> Result<()> {
    (**self).put(namespace, key, snapshot)
  }
}

/// The set of namespaces over one shared storage backend.
///
/// Opening the same namespace twice yields handles over the same underlying
/// store, so writes through either handle are visible through the other.
pub struct CacheSet<S: CacheStore> {
  storage: Arc<S>,
}

impl<S: CacheStore> CacheSet<S> {
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
    }
  }

  /// Open a namespace, creating it on first use.
  pub fn namespace(&self, namespace: Namespace) -> NamespaceHandle<S> {
    NamespaceHandle {
      storage: Arc::clone(&self.storage),
      namespace,
    }
  }
}

impl<S: CacheStore> Clone for CacheSet<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
    }
  }
}

/// A handle onto one namespace of the shared store.
pub struct NamespaceHandle<S: CacheStore> {
  storage: Arc<S>,
  namespace: Namespace,
}

impl<S: CacheStore> NamespaceHandle<S> {
  pub fn name(&self) -> &'static str {
    self.namespace.as_str()
  }

  pub fn get(&self, key: &RequestKey) -> Result<Option<CachedSnapshot>> {
    self.storage.get(self.namespace, key)
  }

  pub fn put(&self, key: &RequestKey, snapshot: &Snapshot) -> Result<()> {
    self.storage.put(self.namespace, key, snapshot)
  }

  /// Fetch a fixed resource and store it in this namespace in one step.
  ///
  /// Used at install time for the offline document. Both a failing fetch
  /// and a failing write propagate, so the caller can fail installation.
  pub async fn add_fixed<F, Fut>(&self, key: &RequestKey, fetcher: F) -> Result<()>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Snapshot>>,
  {
    let snapshot = fetcher().await?;
    self.put(key, &snapshot)
  }
}

impl<S: CacheStore> Clone for NamespaceHandle<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      namespace: self.namespace,
    }
  }
}
