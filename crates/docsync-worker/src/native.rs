use docsync_bundle::{ApplicationDescriptor, PackageSpec};
use serde_json::{Map, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::application::{ApplicationContext, ApplicationRegistry};
use crate::document::{panic_message, DocumentState, Setter};
use crate::location::Location;
use crate::outbox::PatchSink;
use crate::packages::{Environment, InstallOutcome};
use crate::runtime::{LocationUpdate, RenderPayload, Runtime, RuntimeLoader};
use crate::source::PackageSource;
use crate::{Error, Result};

static DOCUMENT_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Loader for the in-process runtime.
pub struct NativeLoader<S> {
    label: String,
    source: S,
    registry: ApplicationRegistry,
}

impl<S: PackageSource> NativeLoader<S> {
    /// Create a loader fetching packages from `source`.
    pub fn new(source: S, registry: ApplicationRegistry) -> Self {
        Self {
            label: "native runtime".to_string(),
            source,
            registry,
        }
    }

    /// Override the label shown while loading.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl<S: PackageSource> RuntimeLoader for NativeLoader<S> {
    type Runtime = NativeRuntime<S>;

    fn label(&self) -> &str {
        &self.label
    }

    async fn load(self, sink: PatchSink) -> Result<NativeRuntime<S>> {
        if self.registry.is_empty() {
            return Err(Error::RuntimeAcquisition(
                "no applications registered".to_string(),
            ));
        }
        tracing::debug!("Native runtime ready with applications {:?}", self.registry);

        Ok(NativeRuntime {
            source: self.source,
            registry: self.registry,
            environment: Environment::new(),
            document: None,
            sink,
        })
    }
}

/// In-process runtime: package environment, applications and the document.
pub struct NativeRuntime<S> {
    source: S,
    registry: ApplicationRegistry,
    environment: Environment,
    document: Option<DocumentState>,
    sink: PatchSink,
}

impl<S> NativeRuntime<S> {
    /// Installed packages.
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// The document, once the application has run.
    pub fn document(&self) -> Option<&DocumentState> {
        self.document.as_ref()
    }

    /// Mutable access to the document, once the application has run.
    pub fn document_mut(&mut self) -> Option<&mut DocumentState> {
        self.document.as_mut()
    }

    fn require_document(&mut self) -> Result<&mut DocumentState> {
        self.document
            .as_mut()
            .ok_or_else(|| Error::PatchApply("application has not been executed".to_string()))
    }
}

impl<S: PackageSource> Runtime for NativeRuntime<S> {
    async fn install(&mut self, package: &PackageSpec) -> Result<()> {
        let bytes = self.source.fetch(package).await?;
        match self.environment.install(package, &bytes)? {
            InstallOutcome::Installed => {
                tracing::info!("Installed {} ({} bytes)", package.locator, bytes.len())
            }
            InstallOutcome::AlreadyPresent => {
                tracing::debug!("{} already installed", package.locator)
            }
        }
        Ok(())
    }

    async fn execute(&mut self, application: &ApplicationDescriptor) -> Result<RenderPayload> {
        if self.document.is_some() {
            return Err(Error::ScriptExecution(
                "application has already been executed".to_string(),
            ));
        }

        let app = self.registry.get(&application.entry).ok_or_else(|| {
            Error::ScriptExecution(format!("unknown entry point '{}'", application.entry))
        })?;

        let missing: Vec<&str> = application
            .requires
            .iter()
            .map(String::as_str)
            .filter(|name| !self.environment.is_installed(name))
            .collect();
        if !missing.is_empty() {
            return Err(Error::ScriptExecution(format!(
                "required packages not installed: {}",
                missing.join(", ")
            )));
        }

        let seq = DOCUMENT_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut doc = DocumentState::new(format!("doc-{}", seq));
        if application.location {
            doc.set_location(Some(Location::default()));
        }

        let ctx = ApplicationContext::new(application, &self.environment);
        let outcome = catch_unwind(AssertUnwindSafe(|| app.build(&mut doc, &ctx)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(Error::ScriptExecution(err.to_string())),
            Err(panic) => {
                return Err(Error::ScriptExecution(format!(
                    "application panicked: {}",
                    panic_message(panic.as_ref())
                )));
            }
        }

        let payload = render_payload(&doc);
        self.document = Some(doc);
        Ok(payload)
    }

    async fn link(&mut self) -> Result<()> {
        let sink = self.sink.clone();
        self.require_document()?.link(sink);
        Ok(())
    }

    async fn apply_patch(&mut self, patch: Value) -> Result<()> {
        self.require_document()?
            .apply_json_patch(&patch, Setter::Host)
    }

    async fn update_location(&mut self, update: Map<String, Value>) -> Result<LocationUpdate> {
        match self.require_document()?.location_mut() {
            Some(location) => Ok(LocationUpdate::Applied(location.merge(&update)?)),
            None => Ok(LocationUpdate::Unavailable),
        }
    }
}

fn render_payload(doc: &DocumentState) -> RenderPayload {
    let root_ids: Vec<Value> = doc
        .root_ids()
        .iter()
        .map(|id| Value::String(id.clone()))
        .collect();

    let mut docs_json = Map::new();
    docs_json.insert(doc.id().to_string(), doc.to_json());

    let mut roots = Map::new();
    for id in doc.root_ids() {
        roots.insert(id.clone(), Value::String(format!("el-{}", id)));
    }

    let mut item = Map::new();
    item.insert("docid".to_string(), Value::String(doc.id().to_string()));
    item.insert("roots".to_string(), Value::Object(roots));
    item.insert("root_ids".to_string(), Value::Array(root_ids.clone()));

    RenderPayload {
        docs_json: Value::Object(docs_json),
        render_items: Value::Array(vec![Value::Object(item)]),
        root_ids: Value::Array(root_ids),
    }
}
