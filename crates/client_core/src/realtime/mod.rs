//! Realtime capability: a connection factory and the handle it hands to the session store.

use std::sync::Arc;

use shared::{domain::UserId, protocol::ServerEvent};
use tokio::sync::broadcast;

pub mod engine_io;
mod socket_io;

pub use socket_io::{SocketIoConnection, SocketIoConnector};

/// Handshake query sent with every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub user_id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    Connected,
    Server(ServerEvent),
    ConnectError(String),
    Disconnected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

pub trait RealtimeConnection: Send + Sync {
    fn user_id(&self) -> &UserId;
    fn status(&self) -> ConnectionStatus;
    /// Each receiver is one listener; dropping it deregisters.
    fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent>;
    fn disconnect(&self);
}

/// Starts a connection attempt and returns its handle immediately. Connection
/// failures surface as [`RealtimeEvent::ConnectError`] on the handle.
pub trait RealtimeConnector: Send + Sync {
    fn connect(&self, params: ConnectParams) -> Arc<dyn RealtimeConnection>;
}

/// Used when no realtime endpoint is configured; every connection is born closed.
pub struct MissingRealtimeConnector;

struct ClosedConnection {
    user_id: UserId,
    events: broadcast::Sender<RealtimeEvent>,
}

impl RealtimeConnection for ClosedConnection {
    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    fn status(&self) -> ConnectionStatus {
        ConnectionStatus::Disconnected
    }

    fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.events.subscribe()
    }

    fn disconnect(&self) {}
}

impl RealtimeConnector for MissingRealtimeConnector {
    fn connect(&self, params: ConnectParams) -> Arc<dyn RealtimeConnection> {
        let (events, _) = broadcast::channel(1);
        Arc::new(ClosedConnection {
            user_id: params.user_id,
            events,
        })
    }
}
