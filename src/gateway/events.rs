use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AuthError;

/// Close codes sent with the server's close frame.
pub mod close_code {
    pub const AUTH_FAILED: u16 = 4004;
    pub const SESSION_SUPERSEDED: u16 = 4010;
}

/// Envelopes the server writes to a connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    AuthSuccess {
        user_id: String,
    },
    AuthError {
        message: String,
    },
    Message {
        user_id: String,
        data: Value,
        timestamp: String,
    },
}

impl ServerEvent {
    pub fn message(user_id: &str, data: Value, sent_at: DateTime<Utc>) -> Self {
        ServerEvent::Message {
            user_id: user_id.to_string(),
            data,
            timestamp: iso_timestamp(sent_at),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_value(self).unwrap_or_default().to_string()
    }
}

/// Server-originated push used by the notification hooks; `kind` becomes the
/// envelope's `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
    pub timestamp: String,
}

impl Notification {
    pub fn new(kind: &str, data: Value, sent_at: DateTime<Utc>) -> Self {
        Self {
            kind: kind.to_string(),
            data,
            timestamp: iso_timestamp(sent_at),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_value(self).unwrap_or_default().to_string()
    }
}

pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Shape of the handshake frame. The credential may sit at the top level or
/// under `data`.
#[derive(Debug, Deserialize)]
struct AuthFrame {
    #[serde(rename = "type")]
    kind: String,
    token: Option<Value>,
    data: Option<Value>,
}

/// Extract the credential from the first frame of a connection.
pub fn parse_auth_frame(text: &str) -> Result<String, AuthError> {
    let frame: AuthFrame = serde_json::from_str(text).map_err(|_| AuthError::Malformed)?;
    if frame.kind != "auth" {
        return Err(AuthError::Malformed);
    }

    let token = frame
        .token
        .or_else(|| frame.data.and_then(|d| d.get("token").cloned()));
    match token {
        Some(Value::String(token)) if !token.trim().is_empty() => Ok(token),
        _ => Err(AuthError::MissingToken),
    }
}

/// Payload carried by a post-auth frame: its `data` field when present,
/// otherwise the whole object. `None` for anything that is not a JSON object.
pub fn parse_chat_payload(text: &str) -> Option<Value> {
    let mut frame: Map<String, Value> = serde_json::from_str(text).ok()?;
    match frame.remove("data") {
        Some(data) => Some(data),
        None => Some(Value::Object(frame)),
    }
}
