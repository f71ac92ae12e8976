//! Text-frame codec for socket.io v5 packets carried over Engine.IO v4 websocket frames.
//!
//! An Engine.IO frame is a one-digit packet type followed by its data. Type `4`
//! (message) wraps a socket.io packet, again led by a one-digit type, an optional
//! `/namespace,` prefix, an optional ack id and a JSON body.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(OpenHandshake),
    Close,
    Ping,
    Pong,
    Noop,
    /// Namespace connect, or its acknowledgement from the server.
    Connect,
    Disconnect,
    Event { name: String, payload: Value },
    ConnectError(String),
    /// Acks, binary packets and upgrade probes; the client has no use for them.
    Unsupported(String),
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("unknown packet type {0:?}")]
    UnknownType(char),
    #[error("invalid packet json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("malformed event packet: {0}")]
    MalformedEvent(String),
}

impl Packet {
    pub fn encode(&self) -> String {
        match self {
            Packet::Close => "1".to_string(),
            Packet::Ping => "2".to_string(),
            Packet::Pong => "3".to_string(),
            Packet::Noop => "6".to_string(),
            Packet::Connect => "40".to_string(),
            Packet::Disconnect => "41".to_string(),
            Packet::Event { name, payload } => {
                format!("42{}", Value::Array(vec![Value::String(name.clone()), payload.clone()]))
            }
            Packet::ConnectError(message) => {
                format!("44{}", serde_json::json!({ "message": message }))
            }
            Packet::Open(handshake) => format!(
                "0{}",
                serde_json::json!({
                    "sid": handshake.sid,
                    "pingInterval": handshake.ping_interval,
                    "pingTimeout": handshake.ping_timeout,
                })
            ),
            Packet::Unsupported(raw) => raw.clone(),
        }
    }
}

pub fn decode_frame(frame: &str) -> Result<Packet, FrameError> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or(FrameError::Empty)?;
    let rest = chars.as_str();
    match kind {
        '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_socket_packet(rest),
        '5' | '6' => Ok(Packet::Noop),
        other => Err(FrameError::UnknownType(other)),
    }
}

fn decode_socket_packet(packet: &str) -> Result<Packet, FrameError> {
    let mut chars = packet.chars();
    let kind = chars.next().ok_or(FrameError::Empty)?;
    let body = strip_ack_id(strip_namespace(chars.as_str()));
    match kind {
        '0' => Ok(Packet::Connect),
        '1' => Ok(Packet::Disconnect),
        '2' => decode_event(body),
        '4' => Ok(Packet::ConnectError(connect_error_message(body))),
        '3' | '5' | '6' => Ok(Packet::Unsupported(packet.to_string())),
        other => Err(FrameError::UnknownType(other)),
    }
}

fn strip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        match body.find(',') {
            Some(idx) => &body[idx + 1..],
            None => "",
        }
    } else {
        body
    }
}

fn strip_ack_id(body: &str) -> &str {
    body.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn decode_event(body: &str) -> Result<Packet, FrameError> {
    let value: Value = serde_json::from_str(body)?;
    let Value::Array(mut items) = value else {
        return Err(FrameError::MalformedEvent(body.to_string()));
    };
    if items.is_empty() {
        return Err(FrameError::MalformedEvent(body.to_string()));
    }
    let Value::String(name) = items.remove(0) else {
        return Err(FrameError::MalformedEvent(body.to_string()));
    };
    let payload = if items.is_empty() {
        Value::Null
    } else {
        items.remove(0)
    };
    Ok(Packet::Event { name, payload })
}

fn connect_error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("connection refused")
            .to_string(),
        Ok(Value::String(message)) => message,
        _ => "connection refused".to_string(),
    }
}

#[cfg(test)]
#[path = "../tests/engine_io_tests.rs"]
mod tests;
