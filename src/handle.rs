// src/handle.rs

//! Public handle to a running loader.
//!
//! [`Loader::spawn`] starts the runtime on the current tokio runtime and
//! returns a cheap, cloneable handle. Every method is a message to the
//! runtime task; the handle itself holds no queue state.
//!
//! When the last clone of a handle is dropped the loader behaves as if
//! [`Loader::finish`] had been called.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::engine::{CoreRuntime, ItemHandle, LoaderEvent, Runtime, RuntimeOptions};
use crate::errors::{LazyloadError, Result};
use crate::fetch::ResourceFetcher;
use crate::materialize::MaterializerBackend;
use crate::queue::QueueSnapshot;
use crate::settings::LoadOptions;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
struct Sender {
    tx: mpsc::Sender<LoaderEvent>,
    /// Never sent on; the runtime watches for it closing.
    _alive: oneshot::Sender<()>,
}

/// Handle used to submit load requests to a running loader.
#[derive(Debug, Clone)]
pub struct Loader {
    sender: Arc<Sender>,
}

impl Loader {
    /// Start a loader.
    ///
    /// `build_materializer` receives the runtime's event sender, which the
    /// materializer uses to report per-item outcomes.
    pub fn spawn<F, M, B>(
        fetcher: F,
        build_materializer: B,
        options: RuntimeOptions,
    ) -> (Loader, JoinHandle<Result<()>>)
    where
        F: ResourceFetcher,
        M: MaterializerBackend + 'static,
        B: FnOnce(mpsc::Sender<LoaderEvent>) -> M,
    {
        let (tx, rx) = mpsc::channel::<LoaderEvent>(EVENT_CHANNEL_CAPACITY);
        let (alive, handles_gone) = oneshot::channel();
        let materializer = build_materializer(tx.clone());

        let core = CoreRuntime::new(&options);
        let runtime = Runtime::new(
            core,
            rx,
            tx.clone(),
            handles_gone,
            Arc::new(fetcher),
            materializer,
        );
        let task = tokio::spawn(runtime.run());

        let loader = Loader {
            sender: Arc::new(Sender { tx, _alive: alive }),
        };
        (loader, task)
    }

    async fn send(&self, event: LoaderEvent) -> Result<()> {
        self.sender
            .tx
            .send(event)
            .await
            .map_err(|e| LazyloadError::ChannelClosed(format!("loader runtime stopped: {e}")))
    }

    /// Submit a request; returns its handle once the runtime admitted it.
    pub async fn submit(&self, options: LoadOptions) -> Result<ItemHandle> {
        let (reply, rx) = oneshot::channel();
        self.send(LoaderEvent::Submit {
            options,
            reply: Some(reply),
        })
        .await?;
        rx.await
            .map_err(|_| LazyloadError::ChannelClosed("loader runtime dropped submission".into()))
    }

    /// Replace the defaults later submissions resolve against.
    pub async fn set_defaults(&self, options: LoadOptions) -> Result<()> {
        self.send(LoaderEvent::SetDefaults { options }).await
    }

    /// No more submissions follow; the runtime exits once all are resolved.
    pub async fn finish(&self) -> Result<()> {
        self.send(LoaderEvent::Finish).await
    }

    /// Stop immediately, abandoning unresolved items.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(LoaderEvent::ShutdownRequested).await
    }

    pub async fn snapshot(&self) -> Result<QueueSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(LoaderEvent::Snapshot { reply }).await?;
        rx.await
            .map_err(|_| LazyloadError::ChannelClosed("loader runtime dropped snapshot request".into()))
    }
}
