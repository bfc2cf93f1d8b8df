use docsync_protocol::{LifecyclePhase, OutboundMessage};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::runtime::RenderPayload;
use crate::{Error, Result};

/// Sending half of the worker → host channel.
///
/// All clones share one "render posted" flag, so patches offered before the
/// render message are dropped instead of reaching the host.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<OutboundMessage>,
    rendered: Arc<AtomicBool>,
}

impl Outbox {
    /// Wrap an existing sender.
    pub fn new(tx: mpsc::UnboundedSender<OutboundMessage>) -> Self {
        Self {
            tx,
            rendered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create an outbox together with the receiver the host side drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Post a progress message.
    pub fn status(&self, msg: impl Into<String>) -> Result<()> {
        self.post(OutboundMessage::status(msg))
    }

    /// Post the render payload. Fails if it was already posted.
    pub fn render(&self, payload: RenderPayload) -> Result<()> {
        if self.rendered.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyRendered);
        }
        self.post(OutboundMessage::Render {
            docs_json: payload.docs_json,
            render_items: payload.render_items,
            root_ids: payload.root_ids,
        })
    }

    /// Acknowledge one host patch.
    pub fn idle(&self) -> Result<()> {
        self.post(OutboundMessage::Idle)
    }

    /// Post a terminal bootstrap failure.
    pub fn error(&self, phase: LifecyclePhase, msg: impl Into<String>) -> Result<()> {
        self.post(OutboundMessage::error(phase, msg))
    }

    /// Whether the render message has been posted.
    pub fn is_rendered(&self) -> bool {
        self.rendered.load(Ordering::SeqCst)
    }

    /// Create the patch callback handed to the runtime.
    pub fn patch_sink(&self) -> PatchSink {
        PatchSink {
            outbox: self.clone(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }

    fn post(&self, message: OutboundMessage) -> Result<()> {
        let kind = message.kind();
        self.tx
            .send(message)
            .map_err(|_| Error::ChannelClosed(format!("outbound channel ({} message)", kind)))
    }
}

/// Host callback injected into the runtime at construction.
///
/// Each accepted patch gets a fresh `patch-<n>` message id.
#[derive(Debug, Clone)]
pub struct PatchSink {
    outbox: Outbox,
    counter: Arc<AtomicU64>,
}

impl PatchSink {
    /// Forward a patch to the host.
    ///
    /// Returns the generated message id, or `None` when the render message
    /// has not been posted yet and the patch was dropped.
    pub fn send(&self, patch: Value, buffers: Vec<Vec<u8>>) -> Result<Option<String>> {
        if !self.outbox.is_rendered() {
            tracing::warn!("Dropping patch offered before render");
            return Ok(None);
        }

        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let msg_id = format!("patch-{}", seq);
        self.outbox.post(OutboundMessage::Patch {
            patch,
            buffers,
            msg_id: msg_id.clone(),
        })?;
        Ok(Some(msg_id))
    }
}
