use docsync_bundle::{ApplicationDescriptor, PackageSpec};
use serde_json::{Map, Value};

use crate::outbox::PatchSink;
use crate::Result;

/// Artifacts the application hands back for the initial render.
///
/// The worker forwards them verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPayload {
    /// Serialized documents keyed by document id.
    pub docs_json: Value,
    /// Render-items descriptor.
    pub render_items: Value,
    /// Root model ids.
    pub root_ids: Value,
}

/// Outcome of a location update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationUpdate {
    /// Keys that were merged.
    Applied(Vec<String>),
    /// The document exposes no location.
    Unavailable,
}

/// Acquires a runtime.
///
/// The host callback is injected here, at construction, rather than bound
/// into the runtime afterwards.
#[allow(async_fn_in_trait)]
pub trait RuntimeLoader {
    /// Runtime produced by this loader.
    type Runtime: Runtime;

    /// Label shown in the loading status.
    fn label(&self) -> &str;

    /// Acquire and initialize the runtime.
    async fn load(self, sink: PatchSink) -> Result<Self::Runtime>;
}

/// An initialized runtime hosting the application and its document.
///
/// Calls never overlap: the worker awaits each one before issuing the next.
#[allow(async_fn_in_trait)]
pub trait Runtime {
    /// Install one package.
    async fn install(&mut self, package: &PackageSpec) -> Result<()>;

    /// Run the application and capture its render artifacts.
    async fn execute(&mut self, application: &ApplicationDescriptor) -> Result<RenderPayload>;

    /// Start forwarding runtime-originated document changes to the sink.
    async fn link(&mut self) -> Result<()>;

    /// Apply a host-originated patch.
    async fn apply_patch(&mut self, patch: Value) -> Result<()>;

    /// Merge a location delta into the document's location.
    async fn update_location(&mut self, update: Map<String, Value>) -> Result<LocationUpdate>;
}
