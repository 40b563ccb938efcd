//! Live viewer connections and the hub task that fans chord updates out to
//! them.
//!
//! The registry is owned by a single hub task. Everything else talks to it
//! through [`HubHandle`], whose commands travel over one ordered channel, so
//! each viewer sees broadcasts in the order they were issued.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broadcast::ChordPayload;

pub type ConnectionId = u64;

/// Delivery side of a viewer connection. Sending fails once the viewer's
/// session has gone away.
pub type PayloadSender = mpsc::UnboundedSender<Arc<ChordPayload>>;
pub type PayloadReceiver = mpsc::UnboundedReceiver<Arc<ChordPayload>>;

/// Lifecycle of one viewer session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    /// Moves along `Connecting -> Open -> Closed`, or straight from
    /// `Connecting` to `Closed`. Returns whether the move was allowed.
    pub fn transition(&mut self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        let allowed = matches!(
            (*self, next),
            (Connecting, Open) | (Connecting, Closed) | (Open, Closed)
        );
        if allowed {
            *self = next;
        }
        allowed
    }

    /// Only open connections are registered for broadcasts.
    pub fn receives_broadcasts(self) -> bool {
        self == ConnectionState::Open
    }
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, PayloadSender>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: ConnectionId, sender: PayloadSender) {
        self.connections.insert(id, sender);
    }

    /// Removing an unknown id is a no-op; returns whether anything was removed.
    pub fn unregister(&mut self, id: ConnectionId) -> bool {
        self.connections.remove(&id).is_some()
    }

    /// Sends `payload` to every connection, dropping the ones that fail.
    /// Returns how many connections accepted it.
    pub fn broadcast(&mut self, payload: &Arc<ChordPayload>) -> usize {
        let before = self.connections.len();
        self.connections.retain(|id, sender| match sender.send(payload.clone()) {
            Ok(()) => true,
            Err(_) => {
                debug!(id, "send failed, dropping connection");
                false
            }
        });
        let delivered = self.connections.len();
        if delivered < before {
            info!(dropped = before - delivered, "removed broken connections");
        }
        delivered
    }

    /// Drops every sender, which ends each viewer's session.
    pub fn close_all(&mut self) {
        self.connections.clear();
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[derive(Debug)]
enum HubCommand {
    Register {
        id: ConnectionId,
        sender: PayloadSender,
    },
    Unregister(ConnectionId),
    Broadcast(Arc<ChordPayload>),
    Count(oneshot::Sender<usize>),
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
    next_id: Arc<AtomicU64>,
}

impl HubHandle {
    /// Registers a new viewer and returns its id along with the receiving
    /// end of its payload queue.
    pub fn register(&self) -> (ConnectionId, PayloadReceiver) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.send(HubCommand::Register { id, sender });
        (id, receiver)
    }

    pub fn unregister(&self, id: ConnectionId) {
        self.send(HubCommand::Unregister(id));
    }

    pub fn broadcast(&self, payload: Arc<ChordPayload>) {
        self.send(HubCommand::Broadcast(payload));
    }

    /// Number of registered viewers once every earlier command has been
    /// handled; 0 if the hub has stopped.
    pub async fn viewer_count(&self) -> usize {
        let (reply, count) = oneshot::channel();
        self.send(HubCommand::Count(reply));
        count.await.unwrap_or(0)
    }

    /// Closes all connections and stops the hub task.
    pub fn shutdown(&self) {
        self.send(HubCommand::Shutdown);
    }

    fn send(&self, command: HubCommand) {
        if self.commands.send(command).is_err() {
            debug!("hub is no longer running");
        }
    }
}

pub fn spawn_hub() -> (HubHandle, JoinHandle<()>) {
    let (commands, receiver) = mpsc::unbounded_channel();
    let handle = HubHandle {
        commands,
        next_id: Arc::new(AtomicU64::new(1)),
    };
    let task = tokio::spawn(run_hub(receiver));
    (handle, task)
}

async fn run_hub(mut commands: mpsc::UnboundedReceiver<HubCommand>) {
    let mut registry = ConnectionRegistry::new();
    while let Some(command) = commands.recv().await {
        match command {
            HubCommand::Register { id, sender } => {
                registry.register(id, sender);
                info!(id, viewers = registry.len(), "viewer connected");
            }
            HubCommand::Unregister(id) => {
                if registry.unregister(id) {
                    info!(id, viewers = registry.len(), "viewer disconnected");
                }
            }
            HubCommand::Broadcast(payload) => {
                let delivered = registry.broadcast(&payload);
                debug!(seq = payload.seq, delivered, "fan-out complete");
            }
            HubCommand::Count(reply) => {
                let _ = reply.send(registry.len());
            }
            HubCommand::Shutdown => break,
        }
    }
    if !registry.is_empty() {
        warn!(viewers = registry.len(), "closing viewer connections");
    }
    registry.close_all();
    info!("hub stopped");
}
