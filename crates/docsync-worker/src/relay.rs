//! Steady-state message relay.
//!
//! After the render message the worker hands its runtime to a [`Relay`],
//! which processes host messages strictly one at a time, in arrival order.

use docsync_protocol::InboundMessage;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::outbox::Outbox;
use crate::runtime::{LocationUpdate, Runtime};
use crate::{Error, Result};

/// Relay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Render was posted; the host has not confirmed it yet.
    AwaitingRendered,
    /// Runtime changes are forwarded to the host.
    Linked,
}

/// Duplex handler between the host and a bootstrapped runtime.
pub struct Relay<R> {
    runtime: R,
    outbox: Outbox,
    state: RelayState,
}

impl<R: Runtime> Relay<R> {
    /// Wrap a runtime whose render payload has been posted.
    pub fn new(runtime: R, outbox: Outbox) -> Self {
        Self {
            runtime,
            outbox,
            state: RelayState::AwaitingRendered,
        }
    }

    /// Current state.
    pub fn state(&self) -> RelayState {
        self.state
    }

    /// The runtime.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Mutable access to the runtime.
    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    /// Handle one host message.
    ///
    /// A patch is always acknowledged with `Idle`, even when applying it
    /// fails; the failure is returned after the acknowledgement.
    pub async fn handle(&mut self, message: InboundMessage) -> Result<()> {
        match message {
            InboundMessage::Rendered => self.on_rendered().await,
            InboundMessage::Patch { patch } => {
                let result = self.on_patch(&patch).await;
                self.outbox.idle()?;
                result
            }
            InboundMessage::Location { location } => self.on_location(&location).await,
        }
    }

    /// Process messages until the host side closes.
    ///
    /// Handling errors are logged and skipped; only a closed outbound
    /// channel stops the loop early.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<InboundMessage>) -> Result<()> {
        while let Some(message) = inbound.recv().await {
            let kind = message.kind();
            match self.handle(message).await {
                Ok(()) => tracing::debug!("Handled {} message", kind),
                Err(Error::ChannelClosed(reason)) => {
                    tracing::info!("Host went away: {}", reason);
                    return Ok(());
                }
                Err(err) => tracing::warn!("Failed to handle {} message: {}", kind, err),
            }
        }
        tracing::info!("Inbound channel closed, relay stopping");
        Ok(())
    }

    async fn on_rendered(&mut self) -> Result<()> {
        if self.state == RelayState::Linked {
            tracing::warn!("Ignoring duplicate rendered message");
            return Ok(());
        }
        self.runtime.link().await?;
        self.state = RelayState::Linked;
        tracing::info!("Host rendered the document, forwarding changes");
        Ok(())
    }

    async fn on_patch(&mut self, patch: &str) -> Result<()> {
        if patch.trim().is_empty() {
            return Err(Error::PatchDecode("empty patch payload".to_string()));
        }
        let patch: Value =
            serde_json::from_str(patch).map_err(|e| Error::PatchDecode(e.to_string()))?;
        self.runtime.apply_patch(patch).await
    }

    async fn on_location(&mut self, location: &str) -> Result<()> {
        let update: Map<String, Value> = serde_json::from_str(location)
            .map_err(|e| Error::LocationMerge(format!("location is not a JSON object: {}", e)))?;

        match self.runtime.update_location(update).await? {
            LocationUpdate::Applied(keys) => {
                tracing::debug!("Location updated: {:?}", keys);
            }
            LocationUpdate::Unavailable => {
                tracing::debug!("Document has no location, ignoring update");
            }
        }
        Ok(())
    }
}
