use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{LifecyclePhase, ProtocolError};

/// Message posted from the worker to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Progress text for the host's loading UI.
    Status {
        /// Human-readable progress message.
        msg: String,
    },
    /// Initial document snapshot. Posted exactly once.
    Render {
        /// Serialized documents keyed by document id.
        docs_json: Value,
        /// Render-items descriptor.
        render_items: Value,
        /// Root model ids.
        root_ids: Value,
    },
    /// Runtime-originated document change.
    Patch {
        /// Document patch (`{"events": [...]}`).
        patch: Value,
        /// Binary buffers referenced by the patch, base64 on the wire.
        #[serde(default, with = "buffers_base64")]
        buffers: Vec<Vec<u8>>,
        /// Generated message id.
        #[serde(default)]
        msg_id: String,
    },
    /// Acknowledges one host patch; the host may send the next.
    Idle,
    /// Terminal bootstrap failure.
    Error {
        /// Phase that failed.
        phase: LifecyclePhase,
        /// Failure description.
        msg: String,
    },
}

impl OutboundMessage {
    /// Create a status message.
    pub fn status(msg: impl Into<String>) -> Self {
        Self::Status { msg: msg.into() }
    }

    /// Create an error message for the given phase.
    pub fn error(phase: LifecyclePhase, msg: impl Into<String>) -> Self {
        Self::Error {
            phase,
            msg: msg.into(),
        }
    }

    /// Message type tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Render { .. } => "render",
            Self::Patch { .. } => "patch",
            Self::Idle => "idle",
            Self::Error { .. } => "error",
        }
    }

    /// Encode as a single JSON line (no trailing newline).
    pub fn to_json_line(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

/// Message posted from the host to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// The host finished its initial paint.
    Rendered,
    /// Host-originated document patch, JSON-encoded.
    Patch {
        /// Encoded patch. Empty when the host omitted it.
        #[serde(default, deserialize_with = "string_or_json")]
        patch: String,
    },
    /// Location/state delta, JSON-encoded.
    Location {
        /// Encoded location object.
        #[serde(default, deserialize_with = "string_or_json")]
        location: String,
    },
}

impl InboundMessage {
    /// Decode a host message from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let message = serde_json::from_str(text).map_err(ProtocolError::Decode)?;
        Ok(message)
    }

    /// Message type tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rendered => "rendered",
            Self::Patch { .. } => "patch",
            Self::Location { .. } => "location",
        }
    }
}

/// Accept either a JSON string or an inline JSON value (re-encoded).
fn string_or_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

/// Encode buffer bytes as base64.
pub fn encode_buffer_base64(buffer: &[u8]) -> String {
    general_purpose::STANDARD.encode(buffer)
}

/// Decode a base64 buffer to bytes.
pub fn decode_buffer_base64(value: &str) -> Result<Vec<u8>, ProtocolError> {
    general_purpose::STANDARD
        .decode(value)
        .map_err(|err| ProtocolError::InvalidBuffer(err.to_string()))
}

mod buffers_base64 {
    use super::{decode_buffer_base64, encode_buffer_base64};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(buffers: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(buffers.iter().map(|buffer| encode_buffer_base64(buffer)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .iter()
            .map(|value| decode_buffer_base64(value).map_err(serde::de::Error::custom))
            .collect()
    }
}
