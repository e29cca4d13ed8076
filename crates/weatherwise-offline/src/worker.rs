//! Background worker owning the offline cache lifecycle.
//!
//! Runs in its own task and talks to presentation contexts only through
//! typed messages: a control channel in, a broadcast of sync events out.
//! The worker never re-fetches weather data itself; on a sync signal it
//! notifies subscribers and leaves the refresh to the presentation layer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::cache::ResourceCache;

/// Lifecycle of the worker: installing the app shell, waiting to take over,
/// then active (old generations purged).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Waiting,
    Active,
}

/// Control messages accepted by the worker. This is the whole contract;
/// there are no other message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Force immediate activation instead of waiting.
    SkipWaiting,
    /// Connectivity was restored; notify contexts that a sync happened.
    SyncRequested,
    /// Periodic wake signal.
    PeriodicSync,
}

/// Events broadcast to subscribed presentation contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerEvent {
    /// A background sync completed; the presentation layer should refresh.
    SyncWeather,
}

const EVENT_CHANNEL_CAPACITY: usize = 16;

pub struct Worker {
    cache: Arc<ResourceCache>,
    state: WorkerState,
    events: broadcast::Sender<WorkerEvent>,
}

impl Worker {
    pub fn new(cache: Arc<ResourceCache>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            cache,
            state: WorkerState::Installing,
            events,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Subscribe a presentation context to worker events.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.events.subscribe()
    }

    /// Install phase: precache the app shell, then wait.
    pub async fn install(&mut self, assets: &[String]) -> Result<(), crate::cache::OfflineError> {
        self.cache.install(assets).await?;
        self.state = WorkerState::Waiting;
        tracing::info!("Offline worker installed, waiting for activation");
        Ok(())
    }

    /// Activate: purge old cache generations and take over.
    pub fn activate(&mut self) {
        match self.cache.activate() {
            Ok(purged) => {
                for generation in purged {
                    tracing::info!("Purged old cache generation {}", generation);
                }
            }
            Err(e) => tracing::warn!("Cache cleanup during activation failed: {}", e),
        }
        self.state = WorkerState::Active;
    }

    /// Dispatch one control message.
    pub fn handle_message(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::SkipWaiting => {
                if self.state != WorkerState::Active {
                    tracing::info!("Skip-waiting requested, activating now");
                    self.activate();
                }
            }
            ControlMessage::SyncRequested | ControlMessage::PeriodicSync => {
                // Notify only; the actual refresh is delegated back to the
                // presentation layer.
                if self.events.send(WorkerEvent::SyncWeather).is_err() {
                    tracing::debug!("No presentation contexts subscribed for sync event");
                }
            }
        }
    }

    /// Drive the worker from a control channel until all senders are gone.
    pub async fn run(mut self, mut control: mpsc::Receiver<ControlMessage>) {
        while let Some(message) = control.recv().await {
            self.handle_message(message);
        }
        tracing::debug!("Offline worker control channel closed, shutting down");
    }
}
