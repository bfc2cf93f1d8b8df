use docsync_bundle::ApplicationDescriptor;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

use crate::document::DocumentState;
use crate::packages::{Environment, InstalledPackage};
use crate::Result;

/// An application the runtime can execute.
///
/// The runtime treats it as opaque: it hands over an empty document and
/// renders whatever the application built.
pub trait Application: Send {
    /// Populate the document: add roots, register watchers.
    fn build(&self, doc: &mut DocumentState, ctx: &ApplicationContext<'_>) -> Result<()>;
}

/// Capabilities visible to an application while it builds.
pub struct ApplicationContext<'a> {
    descriptor: &'a ApplicationDescriptor,
    environment: &'a Environment,
}

impl<'a> ApplicationContext<'a> {
    pub(crate) fn new(descriptor: &'a ApplicationDescriptor, environment: &'a Environment) -> Self {
        Self {
            descriptor,
            environment,
        }
    }

    /// Descriptor the application was started from.
    pub fn descriptor(&self) -> &ApplicationDescriptor {
        self.descriptor
    }

    /// Decode a binding from the descriptor.
    pub fn binding<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        Ok(self.descriptor.binding(key)?)
    }

    /// Look up an installed package by name.
    pub fn package(&self, name: &str) -> Option<&InstalledPackage> {
        self.environment.get(name)
    }
}

/// Adapter turning a closure into an [`Application`].
pub struct FnApplication<F>(F);

/// Wrap a closure as an application.
pub fn from_fn<F>(build: F) -> FnApplication<F>
where
    F: Fn(&mut DocumentState, &ApplicationContext<'_>) -> Result<()> + Send,
{
    FnApplication(build)
}

impl<F> Application for FnApplication<F>
where
    F: Fn(&mut DocumentState, &ApplicationContext<'_>) -> Result<()> + Send,
{
    fn build(&self, doc: &mut DocumentState, ctx: &ApplicationContext<'_>) -> Result<()> {
        (self.0)(doc, ctx)
    }
}

/// Applications addressable by entry-point name.
#[derive(Default)]
pub struct ApplicationRegistry {
    applications: BTreeMap<String, Box<dyn Application>>,
}

impl ApplicationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an application, replacing any previous one under `entry`.
    pub fn register(&mut self, entry: impl Into<String>, application: impl Application + 'static) {
        self.applications.insert(entry.into(), Box::new(application));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, entry: impl Into<String>, application: impl Application + 'static) -> Self {
        self.register(entry, application);
        self
    }

    /// Look up an application.
    pub fn get(&self, entry: &str) -> Option<&dyn Application> {
        self.applications.get(entry).map(|app| app.as_ref())
    }

    /// Registered entry points.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.applications.keys().map(String::as_str)
    }

    /// Number of registered applications.
    pub fn len(&self) -> usize {
        self.applications.len()
    }

    /// Whether no application is registered.
    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }
}

impl std::fmt::Debug for ApplicationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries()).finish()
    }
}
