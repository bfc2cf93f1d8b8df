//! # docsync-protocol
//!
//! Message schema exchanged between a docsync worker and its host page.
//!
//! Every message is a JSON object with a `type` tag:
//!
//! | direction     | type       | fields                                  |
//! |---------------|------------|-----------------------------------------|
//! | worker → host | `status`   | `msg`                                   |
//! | worker → host | `render`   | `docs_json`, `render_items`, `root_ids` |
//! | worker → host | `patch`    | `patch`, `buffers`, `msg_id`            |
//! | worker → host | `idle`     |                                         |
//! | worker → host | `error`    | `phase`, `msg`                          |
//! | host → worker | `rendered` |                                         |
//! | host → worker | `patch`    | `patch` (JSON-encoded string)           |
//! | host → worker | `location` | `location` (JSON-encoded string)        |
//!
//! ## Example
//!
//! ```ignore
//! use docsync_protocol::{InboundMessage, OutboundMessage};
//!
//! let line = OutboundMessage::status("Executing code").to_json_line()?;
//! let inbound = InboundMessage::from_json(r#"{"type":"rendered"}"#)?;
//! ```

mod message;
mod phase;

pub use message::{decode_buffer_base64, encode_buffer_base64, InboundMessage, OutboundMessage};
pub use phase::LifecyclePhase;

use thiserror::Error;

/// Errors from encoding or decoding protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The host message is not valid JSON or has an unknown `type`.
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    /// A worker message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// A buffer is not valid base64.
    #[error("invalid buffer: {0}")]
    InvalidBuffer(String),
}
