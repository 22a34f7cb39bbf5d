//! Synchronizer actor: linearized event handling via MPSC serialization.
//!
//! Every engine notification, surface signal, and paint report goes through
//! one channel to a single task that owns the [`EventSynchronizer`]. The task
//! also sleeps until the synchronizer's next timer deadline, so the debounce
//! and the interceptor safety timeout fire without any host involvement.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use swipelink_core::logging::init_subscriber;
use swipelink_settings::get_settings;
use swipelink_sync::{
    ConversationSource, DebugSnapshot, EngineCapabilities, EngineEvent, EventSynchronizer,
    OutgoingRequest, RenderSurface, SurfaceSignal,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::RuntimeError;

const CHANNEL_CAPACITY: usize = 256;

/// Work sent to the synchronizer task.
enum Command {
    Notify(EngineEvent),
    Surface(SurfaceSignal),
    Painted,
    Intercept(OutgoingRequest, oneshot::Sender<()>),
    RequestConsumed,
    Snapshot(oneshot::Sender<DebugSnapshot>),
}

/// Cloneable handle to a running synchronizer task.
#[derive(Clone, Debug)]
pub struct SyncHandle {
    tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
}

impl SyncHandle {
    async fn send(&self, command: Command) -> Result<(), RuntimeError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Deliver an engine notification.
    pub async fn notify(&self, event: EngineEvent) -> Result<(), RuntimeError> {
        self.send(Command::Notify(event)).await
    }

    /// Decode and deliver a raw engine notification.
    ///
    /// Returns `Ok(false)` when the name or payload is not recognized.
    pub async fn notify_raw(&self, name: &str, payload: &Value) -> Result<bool, RuntimeError> {
        match EngineEvent::from_raw(name, payload) {
            Some(event) => self.notify(event).await.map(|()| true),
            None => {
                debug!(name, "ignored unrecognized notification");
                Ok(false)
            }
        }
    }

    /// Deliver a rendering-surface signal.
    pub async fn surface(&self, signal: SurfaceSignal) -> Result<(), RuntimeError> {
        self.send(Command::Surface(signal)).await
    }

    /// Report that the host finished a paint.
    pub async fn painted(&self) -> Result<(), RuntimeError> {
        self.send(Command::Painted).await
    }

    /// Patch an outgoing request. Resolves once the patch (if any) is applied,
    /// so the caller can dispatch the request right after.
    pub async fn intercept(&self, request: OutgoingRequest) -> Result<(), RuntimeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Intercept(request, reply_tx)).await?;
        reply_rx.await.map_err(|_| RuntimeError::WorkerExited)
    }

    /// Report that the request's consumer is done with the input record.
    pub async fn request_consumed(&self) -> Result<(), RuntimeError> {
        self.send(Command::RequestConsumed).await
    }

    /// Diagnostic view of the synchronizer state, after every command sent
    /// before this one was processed.
    pub async fn snapshot(&self) -> Result<DebugSnapshot, RuntimeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Snapshot(reply_tx)).await?;
        reply_rx.await.map_err(|_| RuntimeError::WorkerExited)
    }

    /// Ask the task to stop. Commands still queued are dropped.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the task has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A spawned synchronizer task.
pub struct SyncRuntime {
    handle: SyncHandle,
    worker: JoinHandle<()>,
}

impl SyncRuntime {
    /// Start `sync` and spawn the task that drives it.
    pub fn spawn(mut sync: EventSynchronizer) -> Self {
        sync.start();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(sync_worker(sync, rx, cancel.clone()));
        Self {
            handle: SyncHandle { tx, cancel },
            worker,
        }
    }

    /// Install the log subscriber at the level the global settings select,
    /// then build a synchronizer and spawn it.
    pub fn from_settings(
        source: Arc<dyn ConversationSource>,
        surface: Arc<dyn RenderSurface>,
        capabilities: &EngineCapabilities,
    ) -> Self {
        let settings = get_settings();
        init_subscriber(settings.log_level());
        Self::spawn(EventSynchronizer::new(source, surface, capabilities))
    }

    /// Handle for sending commands.
    pub fn handle(&self) -> SyncHandle {
        self.handle.clone()
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(self) -> Result<(), RuntimeError> {
        self.handle.cancel();
        self.worker.await.map_err(|_| RuntimeError::WorkerExited)
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

fn apply(sync: &mut EventSynchronizer, command: Command) {
    match command {
        Command::Notify(event) => sync.handle(&event, now()),
        Command::Surface(signal) => sync.surface_signal(signal, now()),
        Command::Painted => sync.painted(now()),
        Command::Intercept(request, reply) => {
            sync.intercept(&request, now());
            let _ = reply.send(());
        }
        Command::RequestConsumed => sync.request_consumed(),
        Command::Snapshot(reply) => {
            let _ = reply.send(sync.debug_snapshot());
        }
    }
}

/// Background task that owns the synchronizer.
async fn sync_worker(
    mut sync: EventSynchronizer,
    mut rx: mpsc::Receiver<Command>,
    cancel: CancellationToken,
) {
    loop {
        let deadline = sync.next_deadline();
        tokio::select! {
            () = cancel.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => apply(&mut sync, command),
                None => break,
            },
            () = sleep_until(deadline) => sync.poll_timers(now()),
        }
    }
    rx.close();
    debug!("sync worker stopped");
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
