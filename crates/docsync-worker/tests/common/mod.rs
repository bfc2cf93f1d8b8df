#![allow(dead_code)]

use docsync_bundle::{ApplicationDescriptor, PackageSpec, WheelBuilder, WorkerManifest};
use docsync_protocol::OutboundMessage;
use docsync_worker::application::{self, ApplicationContext};
use docsync_worker::{
    ApplicationRegistry, DocumentState, MemorySource, NativeLoader, Outbox, Relay, Setter,
    Worker,
};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc::UnboundedReceiver;

pub type NativeRelay = Relay<docsync_worker::NativeRuntime<MemorySource>>;

pub fn wheel_locator(name: &str, version: &str) -> String {
    WheelBuilder::new(name, version).file_name()
}

/// A manifest installing `packages` (name, version) and running `entry`.
pub fn manifest(entry: &str, packages: &[(&str, &str)]) -> WorkerManifest {
    packages
        .iter()
        .fold(
            WorkerManifest::new("test-worker", ApplicationDescriptor::new(entry)),
            |manifest, (name, version)| {
                manifest.with_package(PackageSpec::new(wheel_locator(name, version)))
            },
        )
}

/// A source serving a wheel for every (name, version).
pub fn source(packages: &[(&str, &str)]) -> MemorySource {
    packages.iter().fold(MemorySource::new(), |source, (name, version)| {
        let builder = WheelBuilder::new(*name, *version);
        source.with(builder.file_name(), builder.to_bytes().unwrap())
    })
}

pub fn attrs(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

/// Editor root whose value is upper-cased into a result root.
pub fn build_mirror(doc: &mut DocumentState, _ctx: &ApplicationContext<'_>) -> docsync_worker::Result<()> {
    doc.set_title("Mirror", Setter::Runtime);
    let editor = doc.add_root("TextInput", attrs(json!({"value": ""})), Setter::Runtime);
    let result = doc.add_root("Markdown", attrs(json!({"object": ""})), Setter::Runtime);

    doc.watch(&editor, "value", move |doc, new| {
        let text = new.as_str().unwrap_or_default().to_uppercase();
        doc.set_attr(&result, "object", json!(text), Setter::Runtime)?;
        Ok(())
    });
    Ok(())
}

pub fn registry() -> ApplicationRegistry {
    ApplicationRegistry::new().with("mirror", application::from_fn(build_mirror))
}

pub fn loader(packages: &[(&str, &str)]) -> NativeLoader<MemorySource> {
    NativeLoader::new(source(packages), registry())
}

/// Bootstrap the mirror application and drain everything posted so far.
pub async fn bootstrapped_mirror() -> (NativeRelay, UnboundedReceiver<OutboundMessage>) {
    let packages = [("pkgA", "1.0")];
    let (outbox, mut rx) = Outbox::channel();
    let mut worker = Worker::new(manifest("mirror", &packages), outbox);

    let relay = worker.bootstrap(loader(&packages)).await.unwrap();
    let posted = drain(&mut rx);
    assert_eq!(posted.last().map(OutboundMessage::kind), Some("render"));
    (relay, rx)
}

pub fn drain(rx: &mut UnboundedReceiver<OutboundMessage>) -> Vec<OutboundMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}

pub fn statuses(messages: &[OutboundMessage]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|message| match message {
            OutboundMessage::Status { msg } => Some(msg.clone()),
            _ => None,
        })
        .collect()
}

/// Ids of the editor and result roots, in that order.
pub fn mirror_roots(relay: &NativeRelay) -> (String, String) {
    let doc = relay.runtime().document().unwrap();
    (doc.root_ids()[0].clone(), doc.root_ids()[1].clone())
}
