//! The offline cache controller: install and fetch handling.

mod classify;
mod strategy;

pub use classify::{classify, RequestClass};

use color_eyre::Result;
use tracing::warn;

use crate::cache::{CacheSet, CacheStore, Namespace};
use crate::config::Config;
use crate::net::{HttpClient, Request, Snapshot};

/// The controller for one origin: wires the cache namespaces to the network
/// client and routes each request to its strategy.
pub struct OfflineWorker<S: CacheStore> {
  caches: CacheSet<S>,
  client: HttpClient,
  /// The fixed request the offline document is installed and looked up under.
  offline_request: Request,
}

impl<S: CacheStore> OfflineWorker<S> {
  pub fn new(config: &Config, caches: CacheSet<S>) -> Result<Self> {
    let client = HttpClient::new(config.network.timeout())?;
    let offline_request = Request::get(config.site.offline_url()?);

    Ok(Self {
      caches,
      client,
      offline_request,
    })
  }

  /// Install step: fetch the offline document into the `offline` namespace.
  ///
  /// The install event must not complete until this resolves; any failure
  /// propagates so installation fails and the host can retry.
  pub async fn install(&self) -> Result<()> {
    let offline = self.caches.namespace(Namespace::Offline);
    let client = self.client.clone();
    let request = self.offline_request.clone();

    offline
      .add_fixed(&self.offline_request.key(), move || async move {
        client.fetch(&request).await?.capture().await
      })
      .await
  }

  /// Install, but accept a previously installed offline document when the
  /// refresh fails. This keeps cached pages servable on an offline start.
  pub async fn ensure_installed(&self) -> Result<()> {
    match self.install().await {
      Ok(()) => Ok(()),
      Err(err) => {
        let offline = self.caches.namespace(Namespace::Offline);
        if offline.get(&self.offline_request.key())?.is_some() {
          warn!(error = %err, "offline document refresh failed, keeping the cached copy");
          Ok(())
        } else {
          Err(err)
        }
      }
    }
  }

  /// Handle one intercepted request: classify, then run its strategy.
  pub async fn handle_fetch(&self, request: &Request) -> Result<Option<Snapshot>> {
    let key = request.key();
    let offline_key = self.offline_request.key();

    let client = self.client.clone();
    let network_request = request.clone();
    let fetcher = move || async move { client.fetch(&network_request).await?.capture().await };

    match classify(request) {
      RequestClass::GenericPage => {
        strategy::serve_generic_page(
          &self.caches.namespace(Namespace::Offline),
          &offline_key,
          fetcher,
        )
        .await
      }
      RequestClass::PartyPage => {
        strategy::serve_party_page(
          &self.caches.namespace(Namespace::Parties),
          &self.caches.namespace(Namespace::Offline),
          &key,
          &offline_key,
          fetcher,
        )
        .await
      }
      RequestClass::StaticAsset => {
        strategy::serve_static_asset(&self.caches.namespace(Namespace::Static), &key, fetcher)
          .await
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::MemoryStorage;
  use crate::config::{Config, SiteConfig};

  /// An origin nothing listens on, so every network fetch fails fast.
  fn unreachable_config() -> Config {
    Config {
      site: SiteConfig {
        origin: "http://127.0.0.1:9".to_string(),
        offline_document: "offline.html".to_string(),
      },
      cache: Default::default(),
      network: Default::default(),
    }
  }

  #[tokio::test]
  async fn test_install_failure_leaves_offline_namespace_empty() {
    let config = unreachable_config();
    let caches = CacheSet::new(MemoryStorage::new());
    let worker = OfflineWorker::new(&config, caches.clone()).unwrap();

    assert!(worker.install().await.is_err());

    let offline_key = Request::get(config.site.offline_url().unwrap()).key();
    assert!(caches
      .namespace(Namespace::Offline)
      .get(&offline_key)
      .unwrap()
      .is_none());
  }

  /// Caches holding the offline document, as a completed install leaves them.
  fn seeded_caches(config: &Config) -> CacheSet<MemoryStorage> {
    let caches = CacheSet::new(MemoryStorage::new());
    let offline_key = Request::get(config.site.offline_url().unwrap()).key();
    caches
      .namespace(Namespace::Offline)
      .put(
        &offline_key,
        &Snapshot {
          status: 200,
          headers: Default::default(),
          body: b"offline notice".to_vec(),
        },
      )
      .unwrap();
    caches
  }

  #[tokio::test]
  async fn test_ensure_installed_reuses_cached_offline_document() {
    let config = unreachable_config();
    let worker = OfflineWorker::new(&config, seeded_caches(&config)).unwrap();

    // Strict install fails on the unreachable origin, but the prior copy
    // keeps the worker servable.
    assert!(worker.install().await.is_err());
    assert!(worker.ensure_installed().await.is_ok());
  }

  #[tokio::test]
  async fn test_ensure_installed_without_cached_document_fails() {
    let config = unreachable_config();
    let worker = OfflineWorker::new(&config, CacheSet::new(MemoryStorage::new())).unwrap();

    assert!(worker.ensure_installed().await.is_err());
  }

  #[tokio::test]
  async fn test_fetch_offline_with_seeded_cache() {
    let config = unreachable_config();
    let worker = OfflineWorker::new(&config, seeded_caches(&config)).unwrap();

    let request = Request::get("http://127.0.0.1:9/somewhere".parse().unwrap())
      .with_accept("text/html");
    let served = worker.handle_fetch(&request).await.unwrap().unwrap();
    assert_eq!(served.body, b"offline notice");
  }

  #[tokio::test]
  async fn test_fetch_offline_asset_is_absent() {
    let config = unreachable_config();
    let worker = OfflineWorker::new(&config, CacheSet::new(MemoryStorage::new())).unwrap();

    let request = Request::get("http://127.0.0.1:9/main.css".parse().unwrap());
    assert!(worker.handle_fetch(&request).await.unwrap().is_none());
  }
}
