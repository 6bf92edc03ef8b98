//! Event loop that owns the client registry.
//!
//! Socket tasks, the file watcher and the file reader all talk to the hub
//! through one channel of [`HubEvent`]s. The registry is only ever touched from
//! inside [`Hub::handle`], so no locking is needed.

use crate::registry::{ClientRegistry, ConnectionHandle, ConnectionId};
use crate::watcher::FileReadError;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Sending side of the hub channel
pub type HubSender = mpsc::UnboundedSender<HubEvent>;

/// Who a file read is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTarget {
    Everyone,
    One(ConnectionId),
}

/// Request for the reader task to load the watched file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub target: ReadTarget,
}

/// Everything the hub reacts to
#[derive(Debug)]
pub enum HubEvent {
    Connected {
        id: ConnectionId,
        handle: ConnectionHandle,
    },
    Disconnected {
        id: ConnectionId,
    },
    MessageReceived {
        id: ConnectionId,
        text: String,
    },
    FileChanged,
    FileLoaded {
        target: ReadTarget,
        result: Result<Bytes, FileReadError>,
    },
    Shutdown,
}

/// Counters kept by the hub
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    pub connections_total: u64,
    pub file_changes: u64,
    pub broadcasts: u64,
    pub payloads_delivered: u64,
    pub read_failures: u64,
}

pub struct Hub {
    registry: ClientRegistry,
    events: mpsc::UnboundedReceiver<HubEvent>,
    reads: mpsc::UnboundedSender<ReadRequest>,
    stats: HubStats,
}

impl Hub {
    pub fn new(
        events: mpsc::UnboundedReceiver<HubEvent>,
        reads: mpsc::UnboundedSender<ReadRequest>,
    ) -> Self {
        Self {
            registry: ClientRegistry::new(),
            events,
            reads,
            stats: HubStats::default(),
        }
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn stats(&self) -> HubStats {
        self.stats
    }

    /// Consume events until `Shutdown` arrives or every sender is gone
    pub async fn run(mut self) -> HubStats {
        info!("Hub started");
        while let Some(event) = self.events.recv().await {
            if !self.handle(event) {
                break;
            }
        }
        info!(
            "Hub stopped after {} connections and {} broadcasts",
            self.stats.connections_total, self.stats.broadcasts
        );
        self.stats
    }

    /// Apply one event. Returns `false` when the loop should stop.
    pub fn handle(&mut self, event: HubEvent) -> bool {
        match event {
            HubEvent::Connected { id, handle } => {
                info!("Viewer connected: {} ({:?})", id, handle.peer());
                self.registry.register(id, handle);
                self.stats.connections_total += 1;
                self.request_read(ReadTarget::One(id));
            }
            HubEvent::Disconnected { id } => {
                if self.registry.unregister(id).is_some() {
                    info!(
                        "Viewer disconnected: {} ({} remaining)",
                        id,
                        self.registry.len()
                    );
                }
            }
            HubEvent::MessageReceived { id, text } => {
                info!("Message from {}: {}", id, text);
            }
            HubEvent::FileChanged => {
                self.stats.file_changes += 1;
                debug!("Watched file changed, requesting read");
                self.request_read(ReadTarget::Everyone);
            }
            HubEvent::FileLoaded { target, result } => match result {
                Ok(payload) => self.deliver(target, payload),
                Err(e) => {
                    self.stats.read_failures += 1;
                    warn!("{}", e);
                }
            },
            HubEvent::Shutdown => {
                info!("Hub shutting down");
                return false;
            }
        }
        true
    }

    fn request_read(&self, target: ReadTarget) {
        if self.reads.send(ReadRequest { target }).is_err() {
            error!("File reader has stopped; cannot serve {:?}", target);
        }
    }

    fn deliver(&mut self, target: ReadTarget, payload: Bytes) {
        match target {
            ReadTarget::Everyone => {
                let report = self.registry.broadcast(&payload);
                self.stats.broadcasts += 1;
                self.stats.payloads_delivered += report.delivered as u64;
                info!(
                    "Broadcast {} bytes to {} viewers ({} skipped)",
                    payload.len(),
                    report.delivered,
                    report.skipped
                );
            }
            ReadTarget::One(id) => {
                if self.registry.send_to_one(id, &payload) {
                    self.stats.payloads_delivered += 1;
                    debug!("Sent {} bytes to new viewer {}", payload.len(), id);
                } else {
                    debug!("Viewer {} left before its initial payload", id);
                }
            }
        }
    }
}
