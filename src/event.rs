//! Host boundary: the event adapter between a host runtime and the worker.
//!
//! The host delivers `Install` and `Fetch` events over a channel; outcomes
//! come back over per-event oneshot replies. Fetch events run as independent
//! tasks so their network and cache steps interleave, while the install
//! reply is only sent once the whole install chain has resolved.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::cache::CacheStore;
use crate::net::{Request, Snapshot};
use crate::worker::OfflineWorker;

/// Events the host runtime dispatches to the worker.
#[derive(Debug)]
pub enum WorkerEvent {
  /// Install lifecycle event; the reply is held until install finishes.
  Install {
    /// Accept a previously installed offline document if the refresh fails.
    reuse_cached: bool,
    done: oneshot::Sender<Result<()>>,
  },
  /// An intercepted fetch.
  Fetch {
    request: Request,
    respond: oneshot::Sender<Result<Option<Snapshot>>>,
  },
}

/// Sending half of the worker's event channel.
#[derive(Clone)]
pub struct WorkerHandle {
  tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl WorkerHandle {
  /// Dispatch the install event and wait for the install chain to resolve.
  pub async fn install(&self) -> Result<()> {
    self.dispatch_install(false).await
  }

  /// Like [`Self::install`], but a failed refresh is fine as long as a prior
  /// install left the offline document in place.
  pub async fn ensure_installed(&self) -> Result<()> {
    self.dispatch_install(true).await
  }

  async fn dispatch_install(&self, reuse_cached: bool) -> Result<()> {
    let (done, rx) = oneshot::channel();
    self
      .tx
      .send(WorkerEvent::Install { reuse_cached, done })
      .map_err(|_| eyre!("Worker stopped"))?;
    rx.await.map_err(|_| eyre!("Worker dropped install event"))?
  }

  /// Dispatch a fetch event and wait for its outcome.
  pub async fn fetch(&self, request: Request) -> Result<Option<Snapshot>> {
    let (respond, rx) = oneshot::channel();
    self
      .tx
      .send(WorkerEvent::Fetch { request, respond })
      .map_err(|_| eyre!("Worker stopped"))?;
    rx.await.map_err(|_| eyre!("Worker dropped fetch event"))?
  }
}

/// Spawn the worker's event loop and return the handle the host sends
/// events through. The loop ends when every handle is dropped.
pub fn spawn_worker<S>(worker: OfflineWorker<S>) -> WorkerHandle
where
  S: CacheStore + 'static,
{
  let (tx, mut rx) = mpsc::unbounded_channel();

  tokio::spawn(async move {
    let worker = Arc::new(worker);
    while let Some(event) = rx.recv().await {
      match event {
        WorkerEvent::Install { reuse_cached, done } => {
          // Awaited in place: the install event is not finished until the
          // chain resolves or rejects.
          let outcome = if reuse_cached {
            worker.ensure_installed().await
          } else {
            worker.install().await
          };
          let _ = done.send(outcome);
        }
        WorkerEvent::Fetch { request, respond } => {
          let worker = Arc::clone(&worker);
          tokio::spawn(async move {
            let _ = respond.send(worker.handle_fetch(&request).await);
          });
        }
      }
    }
  });

  WorkerHandle { tx }
}
