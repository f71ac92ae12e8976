use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use shared::{domain::UserId, protocol::ServerEvent};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use super::{
    engine_io::{decode_frame, Packet},
    ConnectParams, ConnectionStatus, RealtimeConnection, RealtimeConnector, RealtimeEvent,
};
use crate::error::{ClientError, Result};

const EVENT_BUFFER: usize = 256;

pub struct SocketIoConnector {
    socket_url: Url,
}

impl SocketIoConnector {
    pub fn new(socket_url: &str) -> Result<Self> {
        let socket_url = Url::parse(socket_url)
            .map_err(|err| ClientError::Config(format!("invalid socket url: {err}")))?;
        match socket_url.scheme() {
            "http" | "https" | "ws" | "wss" => Ok(Self { socket_url }),
            other => Err(ClientError::Config(format!(
                "socket url must use http(s) or ws(s), got {other}"
            ))),
        }
    }

    pub fn endpoint(&self, params: &ConnectParams) -> String {
        let mut url = self.socket_url.clone();
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        let _ = url.set_scheme(scheme);
        url.set_path("/socket.io/");
        url.query_pairs_mut()
            .clear()
            .append_pair("EIO", "4")
            .append_pair("transport", "websocket")
            .append_pair("userId", params.user_id.as_str())
            .append_pair("name", &params.name);
        url.to_string()
    }
}

impl RealtimeConnector for SocketIoConnector {
    fn connect(&self, params: ConnectParams) -> Arc<dyn RealtimeConnection> {
        let endpoint = self.endpoint(&params);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (status, _) = watch::channel(ConnectionStatus::Connecting);
        let (commands, command_rx) = mpsc::unbounded_channel();
        let status = Arc::new(status);

        info!(user_id = %params.user_id, "realtime: connecting");
        tokio::spawn(drive(
            endpoint,
            events.clone(),
            Arc::clone(&status),
            command_rx,
        ));

        Arc::new(SocketIoConnection {
            user_id: params.user_id,
            events,
            status,
            commands,
        })
    }
}

enum DriverCommand {
    Disconnect,
}

pub struct SocketIoConnection {
    user_id: UserId,
    events: broadcast::Sender<RealtimeEvent>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    /// Dropping the handle closes this channel, which the driver treats as a disconnect.
    commands: mpsc::UnboundedSender<DriverCommand>,
}

impl RealtimeConnection for SocketIoConnection {
    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.events.subscribe()
    }

    fn disconnect(&self) {
        let _ = self.commands.send(DriverCommand::Disconnect);
        self.status.send_replace(ConnectionStatus::Disconnected);
    }
}

async fn drive(
    endpoint: String,
    events: broadcast::Sender<RealtimeEvent>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    mut commands: mpsc::UnboundedReceiver<DriverCommand>,
) {
    let ws_stream = tokio::select! {
        connected = connect_async(&endpoint) => match connected {
            Ok((ws_stream, _)) => ws_stream,
            Err(err) => {
                warn!("realtime: connect failed: {err}");
                status.send_replace(ConnectionStatus::Disconnected);
                let _ = events.send(RealtimeEvent::ConnectError(err.to_string()));
                return;
            }
        },
        _ = commands.recv() => {
            status.send_replace(ConnectionStatus::Disconnected);
            let _ = events.send(RealtimeEvent::Disconnected("client disconnect".into()));
            return;
        }
    };
    let (mut writer, mut reader) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            _ = commands.recv() => {
                let _ = writer.send(Message::Text(Packet::Disconnect.encode())).await;
                let _ = writer.close().await;
                break "client disconnect".to_string();
            }
            frame = reader.next() => match frame {
                Some(Ok(Message::Text(text))) => match decode_frame(&text) {
                    Ok(Packet::Open(handshake)) => {
                        debug!(sid = %handshake.sid, "realtime: transport open");
                        if let Err(err) = writer.send(Message::Text(Packet::Connect.encode())).await {
                            break format!("failed to join namespace: {err}");
                        }
                    }
                    Ok(Packet::Ping) => {
                        if let Err(err) = writer.send(Message::Text(Packet::Pong.encode())).await {
                            break format!("failed to answer ping: {err}");
                        }
                    }
                    Ok(Packet::Connect) => {
                        info!("realtime: connected");
                        status.send_replace(ConnectionStatus::Connected);
                        let _ = events.send(RealtimeEvent::Connected);
                    }
                    Ok(Packet::ConnectError(message)) => {
                        warn!("realtime: connect rejected: {message}");
                        let _ = events.send(RealtimeEvent::ConnectError(message.clone()));
                        break message;
                    }
                    Ok(Packet::Event { name, payload }) => match ServerEvent::decode(&name, payload) {
                        Ok(event) => {
                            let _ = events.send(RealtimeEvent::Server(event));
                        }
                        Err(err) => debug!("realtime: dropping event: {err}"),
                    },
                    Ok(Packet::Disconnect) => break "server disconnect".to_string(),
                    Ok(Packet::Close) => break "transport close".to_string(),
                    Ok(_) => {}
                    Err(err) => warn!("realtime: dropping frame: {err}"),
                },
                Some(Ok(Message::Close(_))) | None => break "transport close".to_string(),
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!("realtime: websocket receive failed: {err}");
                    break format!("transport error: {err}");
                }
            }
        }
    };

    info!(%reason, "realtime: disconnected");
    status.send_replace(ConnectionStatus::Disconnected);
    let _ = events.send(RealtimeEvent::Disconnected(reason));
}

#[cfg(test)]
#[path = "../tests/socket_io_tests.rs"]
mod tests;
