//! # docsync-worker
//!
//! Bootstrap worker and document-sync relay.
//!
//! A worker moves through fixed phases: it loads a runtime, installs the
//! manifest's packages one at a time, executes the application, and posts a
//! single render message. It then relays messages between the runtime's
//! [`DocumentState`] and the host:
//!
//! - runtime-originated document changes go out as patches once the host
//!   confirms the render;
//! - host patches are applied without echoing them back, each acknowledged
//!   with `idle`;
//! - location updates are merged into the document's [`Location`].
//!
//! ## Example
//!
//! ```ignore
//! use docsync_bundle::WorkerManifest;
//! use docsync_worker::{application, ApplicationRegistry, DirectorySource, NativeLoader};
//!
//! let manifest = WorkerManifest::from_toml(include_bytes!("../bundle/worker.toml"))?;
//! let registry = ApplicationRegistry::new().with("app", application::from_fn(|doc, _ctx| {
//!     doc.set_title("Hello", docsync_worker::Setter::Runtime);
//!     Ok(())
//! }));
//! let loader = NativeLoader::new(DirectorySource::new("wheels"), registry);
//!
//! docsync_worker::serve(manifest, loader, tokio::io::stdin(), tokio::io::stdout()).await?;
//! ```

pub mod application;
mod document;
mod error;
mod location;
mod native;
mod outbox;
mod packages;
mod relay;
mod runtime;
mod source;
mod transport;
mod worker;

pub use application::{Application, ApplicationContext, ApplicationRegistry};
pub use document::{
    DocumentEvent, DocumentPatch, DocumentState, Model, ModelId, ModelRef, Setter, WatchCallback,
    BUFFER_REF_KEY,
};
pub use error::{Error, Result};
pub use location::{Location, ReadonlyGuard, LOCATION_FIELDS};
pub use native::{NativeLoader, NativeRuntime};
pub use outbox::{Outbox, PatchSink};
pub use packages::{Environment, InstallOutcome, InstalledPackage};
pub use relay::{Relay, RelayState};
pub use runtime::{LocationUpdate, RenderPayload, Runtime, RuntimeLoader};
pub use source::{DirectorySource, HttpSource, MemorySource, PackageSource, DEFAULT_INDEX_URL};
pub use transport::{read_inbound, serve, write_outbound, INBOUND_QUEUE};
pub use worker::{Worker, EXECUTING_STATUS};
