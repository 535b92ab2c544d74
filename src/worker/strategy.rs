//! Per-class fetch strategies.
//!
//! Each strategy is the full state machine for one request: try the network,
//! then fall back per the class table. Strategies take namespace handles and
//! a fetcher closure, so they are testable without any host runtime or real
//! network.
//!
//! Outcome meaning: `Ok(Some(..))` is a response to serve, `Ok(None)` means
//! every fallback is exhausted and the host surfaces its own failure, `Err`
//! is a cache-layer failure. Network failures never escape as `Err`.

use color_eyre::Result;
use std::future::Future;
use tracing::{debug, warn};

use crate::cache::{CacheStore, NamespaceHandle};
use crate::net::{RequestKey, Snapshot};

/// Generic page: network, else the offline document. Nothing is cached on
/// success since generic pages have no useful cached substitute.
pub async fn serve_generic_page<S, F, Fut>(
  offline: &NamespaceHandle<S>,
  offline_key: &RequestKey,
  fetcher: F,
) -> Result<Option<Snapshot>>
where
  S: CacheStore,
  F: FnOnce() -> Fut,
  Fut: Future<Output = Result<Snapshot>>,
{
  match fetcher().await {
    Ok(snapshot) => Ok(Some(snapshot)),
    Err(err) => {
      debug!(error = %err, "network failed for page, serving offline document");
      offline_fallback(offline, offline_key)
    }
  }
}

/// Party page: network with opportunistic caching, else the last cached
/// version of this exact page, else the offline document.
///
/// A cache miss falls through to the offline document the same as a failed
/// lookup, so a never-visited party still gets the offline notice.
pub async fn serve_party_page<S, F, Fut>(
  parties: &NamespaceHandle<S>,
  offline: &NamespaceHandle<S>,
  key: &RequestKey,
  offline_key: &RequestKey,
  fetcher: F,
) -> Result<Option<Snapshot>>
where
  S: CacheStore,
  F: FnOnce() -> Fut,
  Fut: Future<Output = Result<Snapshot>>,
{
  match fetcher().await {
    Ok(snapshot) => {
      store_opportunistic(parties, key, &snapshot);
      Ok(Some(snapshot))
    }
    Err(err) => {
      debug!(request = key.describe(), error = %err, "network failed for party page");
      match parties.get(key) {
        Ok(Some(cached)) => {
          debug!(request = key.describe(), "serving cached party page");
          Ok(Some(cached.snapshot))
        }
        Ok(None) => offline_fallback(offline, offline_key),
        Err(err) => {
          warn!(request = key.describe(), error = %err, "party cache lookup failed");
          offline_fallback(offline, offline_key)
        }
      }
    }
  }
}

/// Static asset: network with opportunistic caching, else the last cached
/// copy of this exact asset. No offline-document fallback; an asset with no
/// cached copy stays absent.
pub async fn serve_static_asset<S, F, Fut>(
  assets: &NamespaceHandle<S>,
  key: &RequestKey,
  fetcher: F,
) -> Result<Option<Snapshot>>
where
  S: CacheStore,
  F: FnOnce() -> Fut,
  Fut: Future<Output = Result<Snapshot>>,
{
  match fetcher().await {
    Ok(snapshot) => {
      store_opportunistic(assets, key, &snapshot);
      Ok(Some(snapshot))
    }
    Err(err) => {
      debug!(request = key.describe(), error = %err, "network failed for asset, trying cache");
      Ok(assets.get(key)?.map(|cached| cached.snapshot))
    }
  }
}

/// Cache a successful response without letting a write failure break the
/// response path.
fn store_opportunistic<S: CacheStore>(
  namespace: &NamespaceHandle<S>,
  key: &RequestKey,
  snapshot: &Snapshot,
) {
  if let Err(err) = namespace.put(key, snapshot) {
    warn!(
      cache = namespace.name(),
      request = key.describe(),
      error = %err,
      "failed to cache response"
    );
  }
}

fn offline_fallback<S: CacheStore>(
  offline: &NamespaceHandle<S>,
  offline_key: &RequestKey,
) -> Result<Option<Snapshot>> {
  Ok(offline.get(offline_key)?.map(|cached| cached.snapshot))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSet, MemoryStorage, Namespace};
  use color_eyre::eyre::eyre;
  use std::collections::BTreeMap;
  use std::time::Duration;
  use url::Url;

  fn key(path: &str) -> RequestKey {
    let url = Url::parse("https://party.example").unwrap().join(path).unwrap();
    RequestKey::new("GET", &url)
  }

  fn snapshot(body: &str) -> Snapshot {
    Snapshot {
      status: 200,
      headers: BTreeMap::new(),
      body: body.as_bytes().to_vec(),
    }
  }

  async fn network_down() -> Result<Snapshot> {
    Err(eyre!("network unreachable"))
  }

  fn caches() -> CacheSet<MemoryStorage> {
    CacheSet::new(MemoryStorage::new())
  }

  /// Seed the offline namespace the way install does.
  fn seed_offline(caches: &CacheSet<MemoryStorage>) -> RequestKey {
    let offline_key = key("/offline.html");
    caches
      .namespace(Namespace::Offline)
      .put(&offline_key, &snapshot("<h1>you are offline</h1>"))
      .unwrap();
    offline_key
  }

  #[tokio::test]
  async fn test_generic_page_online_is_not_cached() {
    let caches = caches();
    let offline_key = seed_offline(&caches);
    let offline = caches.namespace(Namespace::Offline);

    let body = snapshot("<h1>about</h1>");
    let served = serve_generic_page(&offline, &offline_key, move || async move { Ok(body) })
      .await
      .unwrap()
      .unwrap();
    assert_eq!(served.body, b"<h1>about</h1>");

    // Only the offline document lives in the offline namespace.
    assert!(offline.get(&key("/about")).unwrap().is_none());
  }

  #[tokio::test]
  async fn test_generic_page_offline_serves_offline_document() {
    let caches = caches();
    let offline_key = seed_offline(&caches);
    let offline = caches.namespace(Namespace::Offline);

    // Any generic URL gets the same offline document.
    for _ in 0..2 {
      let served = serve_generic_page(&offline, &offline_key, network_down)
        .await
        .unwrap()
        .unwrap();
      assert_eq!(served.body, b"<h1>you are offline</h1>");
    }
  }

  #[tokio::test]
  async fn test_generic_page_offline_without_install_is_absent() {
    let caches = caches();
    let offline = caches.namespace(Namespace::Offline);

    let served = serve_generic_page(&offline, &key("/offline.html"), network_down)
      .await
      .unwrap();
    assert!(served.is_none());
  }

  #[tokio::test]
  async fn test_party_page_visited_online_then_served_offline() {
    let caches = caches();
    let offline_key = seed_offline(&caches);
    let parties = caches.namespace(Namespace::Parties);
    let offline = caches.namespace(Namespace::Offline);
    let party_key = key("/party/abc123");

    let body = snapshot("<h1>party abc123</h1>");
    serve_party_page(&parties, &offline, &party_key, &offline_key, move || async move {
      Ok(body)
    })
    .await
    .unwrap();

    // Network goes away; the exact page comes back from cache.
    let served = serve_party_page(&parties, &offline, &party_key, &offline_key, network_down)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(served.body, b"<h1>party abc123</h1>");
  }

  #[tokio::test]
  async fn test_unvisited_party_page_falls_through_to_offline_document() {
    let caches = caches();
    let offline_key = seed_offline(&caches);
    let parties = caches.namespace(Namespace::Parties);
    let offline = caches.namespace(Namespace::Offline);

    let served = serve_party_page(
      &parties,
      &offline,
      &key("/party/neverseen"),
      &offline_key,
      network_down,
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(served.body, b"<h1>you are offline</h1>");
  }

  #[tokio::test]
  async fn test_unvisited_party_page_without_install_is_absent() {
    let caches = caches();
    let parties = caches.namespace(Namespace::Parties);
    let offline = caches.namespace(Namespace::Offline);

    let served = serve_party_page(
      &parties,
      &offline,
      &key("/party/neverseen"),
      &key("/offline.html"),
      network_down,
    )
    .await
    .unwrap();
    assert!(served.is_none());
  }

  #[tokio::test]
  async fn test_static_asset_round_trip_exact_bytes() {
    let caches = caches();
    let assets = caches.namespace(Namespace::Static);
    let asset_key = key("/main.css");

    let body = snapshot("body { background: teal }");
    serve_static_asset(&assets, &asset_key, move || async move { Ok(body) })
      .await
      .unwrap();

    let served = serve_static_asset(&assets, &asset_key, network_down)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(served.body, b"body { background: teal }");
  }

  #[tokio::test]
  async fn test_static_asset_never_fetched_stays_absent() {
    let caches = caches();
    let assets = caches.namespace(Namespace::Static);

    let served = serve_static_asset(&assets, &key("/missing.js"), network_down)
      .await
      .unwrap();
    assert!(served.is_none());
  }

  #[tokio::test]
  async fn test_concurrent_writes_last_completion_wins() {
    let caches = caches();
    let assets = caches.namespace(Namespace::Static);
    let asset_key = key("/app.js");

    let slow = snapshot("slow but last");
    let fast = snapshot("fast but first");

    let slow_request = serve_static_asset(&assets, &asset_key, move || async move {
      tokio::time::sleep(Duration::from_millis(100)).await;
      Ok(slow)
    });
    let fast_request = serve_static_asset(&assets, &asset_key, move || async move {
      tokio::time::sleep(Duration::from_millis(10)).await;
      Ok(fast)
    });

    let (slow_served, fast_served) = futures::join!(slow_request, fast_request);
    assert!(slow_served.unwrap().is_some());
    assert!(fast_served.unwrap().is_some());

    // Whichever response completed last is the one stored, intact.
    let cached = assets.get(&asset_key).unwrap().unwrap();
    assert_eq!(cached.snapshot.body, b"slow but last");
  }
}
