//! Runtime-side document model.
//!
//! A [`DocumentState`] holds the models of the application's view. Every
//! mutation carries a [`Setter`] naming its origin. Once linked to a
//! [`PatchSink`], changes made by the runtime are batched per dispatch cycle
//! and forwarded to the host as patches; host-originated changes never are.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::location::Location;
use crate::outbox::PatchSink;
use crate::{Error, Result};

/// Events handled in one dispatch cycle before watchers stop running.
const MAX_CASCADE: usize = 1024;

/// JSON key marking a reference to a binary buffer.
pub const BUFFER_REF_KEY: &str = "__buffer__";

/// Identifier of a model within a document.
pub type ModelId = String;

/// Origin of a document change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setter {
    /// Applied from a host patch.
    Host,
    /// Made by the application inside the runtime.
    Runtime,
}

/// A model: a typed bag of attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Model id.
    pub id: ModelId,
    /// Model type name, e.g. `TextInput`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Attribute values.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Reference to a model by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    /// Referenced model id.
    pub id: ModelId,
}

/// A single change to the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DocumentEvent {
    /// An attribute of a model changed.
    ModelChanged {
        model: ModelRef,
        attr: String,
        new: Value,
    },
    /// A root model was added.
    RootAdded { model: Model },
    /// A root model was removed.
    RootRemoved { model: ModelRef },
    /// The document title changed.
    TitleChanged { title: String },
}

/// Wire form of a patch: `{"events": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentPatch {
    /// Events, applied in order.
    #[serde(default)]
    pub events: Vec<DocumentEvent>,
}

/// Callback run after an attribute changes.
pub type WatchCallback = Box<dyn FnMut(&mut DocumentState, &Value) -> Result<()> + Send>;

struct Watch {
    model: ModelId,
    attr: String,
    callback: WatchCallback,
}

/// The document owned by a runtime instance.
pub struct DocumentState {
    id: String,
    title: String,
    roots: Vec<ModelId>,
    models: BTreeMap<ModelId, Model>,
    buffers: BTreeMap<String, Vec<u8>>,
    location: Option<Location>,
    watchers: Vec<Watch>,
    link: Option<PatchSink>,
    queue: VecDeque<(DocumentEvent, Setter)>,
    dispatching: bool,
    next_id: u64,
}

impl std::fmt::Debug for DocumentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentState")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("roots", &self.roots)
            .field("models", &self.models.len())
            .field("watchers", &self.watchers.len())
            .field("linked", &self.link.is_some())
            .finish()
    }
}

impl DocumentState {
    /// Create an empty document.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            roots: Vec::new(),
            models: BTreeMap::new(),
            buffers: BTreeMap::new(),
            location: None,
            watchers: Vec::new(),
            link: None,
            queue: VecDeque::new(),
            dispatching: false,
            next_id: 1,
        }
    }

    /// Document id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Document title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Ids of the root models, in insertion order.
    pub fn root_ids(&self) -> &[ModelId] {
        &self.roots
    }

    /// Look up a model.
    pub fn model(&self, id: &str) -> Option<&Model> {
        self.models.get(id)
    }

    /// Read an attribute.
    pub fn get_attr(&self, id: &str, attr: &str) -> Option<&Value> {
        self.models.get(id).and_then(|model| model.attributes.get(attr))
    }

    /// Bytes of a stored buffer.
    pub fn buffer(&self, id: &str) -> Option<&[u8]> {
        self.buffers.get(id).map(Vec::as_slice)
    }

    /// Location sub-object, if the document exposes one.
    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// Mutable location sub-object.
    pub fn location_mut(&mut self) -> Option<&mut Location> {
        self.location.as_mut()
    }

    /// Expose (or remove) the location sub-object.
    pub fn set_location(&mut self, location: Option<Location>) {
        self.location = location;
    }

    /// Whether runtime changes are forwarded to a host.
    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }

    /// Forward runtime-originated changes through `sink` from now on.
    pub fn link(&mut self, sink: PatchSink) {
        self.link = Some(sink);
    }

    /// Change the title.
    pub fn set_title(&mut self, title: impl Into<String>, setter: Setter) {
        let title = title.into();
        if title == self.title {
            return;
        }
        self.title = title.clone();
        self.emit(DocumentEvent::TitleChanged { title }, setter);
    }

    /// Add a model that is not a root (e.g. a child referenced by a root).
    pub fn add_model(&mut self, kind: impl Into<String>, attributes: Map<String, Value>) -> ModelId {
        let id = self.allocate_id();
        self.models.insert(
            id.clone(),
            Model {
                id: id.clone(),
                kind: kind.into(),
                attributes,
            },
        );
        id
    }

    /// Add a root model.
    pub fn add_root(
        &mut self,
        kind: impl Into<String>,
        attributes: Map<String, Value>,
        setter: Setter,
    ) -> ModelId {
        let id = self.allocate_id();
        let model = Model {
            id: id.clone(),
            kind: kind.into(),
            attributes,
        };
        self.insert_root(model.clone());
        self.emit(DocumentEvent::RootAdded { model }, setter);
        id
    }

    /// Remove a root model.
    pub fn remove_root(&mut self, id: &str, setter: Setter) -> Result<()> {
        if !self.roots.iter().any(|root| root == id) {
            return Err(Error::PatchApply(format!("unknown root model '{}'", id)));
        }
        self.roots.retain(|root| root != id);
        self.models.remove(id);
        self.emit(
            DocumentEvent::RootRemoved {
                model: ModelRef { id: id.to_string() },
            },
            setter,
        );
        Ok(())
    }

    /// Set an attribute. Returns `false` when the value was unchanged.
    pub fn set_attr(
        &mut self,
        id: &str,
        attr: &str,
        value: Value,
        setter: Setter,
    ) -> Result<bool> {
        let model = self
            .models
            .get_mut(id)
            .ok_or_else(|| Error::PatchApply(format!("unknown model '{}'", id)))?;

        if model.attributes.get(attr) == Some(&value) {
            return Ok(false);
        }
        model.attributes.insert(attr.to_string(), value.clone());

        self.emit(
            DocumentEvent::ModelChanged {
                model: ModelRef { id: id.to_string() },
                attr: attr.to_string(),
                new: value,
            },
            setter,
        );
        Ok(true)
    }

    /// Store binary data as an attribute; the patch carries the bytes as a buffer.
    ///
    /// Returns the buffer id.
    pub fn set_binary(
        &mut self,
        id: &str,
        attr: &str,
        data: Vec<u8>,
        setter: Setter,
    ) -> Result<String> {
        if !self.models.contains_key(id) {
            return Err(Error::PatchApply(format!("unknown model '{}'", id)));
        }
        let buffer_id = format!("buf-{}", self.next_id);
        self.next_id += 1;
        self.buffers.insert(buffer_id.clone(), data);
        self.set_attr(id, attr, json!({ BUFFER_REF_KEY: buffer_id }), setter)?;
        Ok(buffer_id)
    }

    /// Run `callback` whenever `attr` of model `id` changes, whatever the origin.
    ///
    /// Changes the callback makes are runtime-originated.
    pub fn watch<F>(&mut self, id: &str, attr: &str, callback: F)
    where
        F: FnMut(&mut DocumentState, &Value) -> Result<()> + Send + 'static,
    {
        self.watchers.push(Watch {
            model: id.to_string(),
            attr: attr.to_string(),
            callback: Box::new(callback),
        });
    }

    /// Apply a JSON patch. All events are validated before any is applied.
    ///
    /// Watchers run only after every event of the patch has been applied.
    pub fn apply_json_patch(&mut self, patch: &Value, setter: Setter) -> Result<()> {
        let patch: DocumentPatch = serde_json::from_value(patch.clone())
            .map_err(|e| Error::PatchDecode(format!("malformed document patch: {}", e)))?;
        self.validate_patch(&patch)?;

        let nested = self.dispatching;
        self.dispatching = true;
        let result = self.apply_events(patch.events, setter);
        if !nested {
            self.dispatch();
        }
        result
    }

    /// Serialize the document for the render payload.
    pub fn to_json(&self) -> Value {
        let references: Vec<&Model> = self.models.values().collect();
        json!({
            "title": self.title,
            "roots": {
                "root_ids": self.roots,
                "references": references,
            },
        })
    }

    fn apply_events(&mut self, events: Vec<DocumentEvent>, setter: Setter) -> Result<()> {
        for event in events {
            match event {
                DocumentEvent::ModelChanged { model, attr, new } => {
                    self.set_attr(&model.id, &attr, new, setter)?;
                }
                DocumentEvent::RootAdded { model } => {
                    self.insert_root(model.clone());
                    self.emit(DocumentEvent::RootAdded { model }, setter);
                }
                DocumentEvent::RootRemoved { model } => {
                    self.remove_root(&model.id, setter)?;
                }
                DocumentEvent::TitleChanged { title } => {
                    self.set_title(title, setter);
                }
            }
        }
        Ok(())
    }

    fn validate_patch(&self, patch: &DocumentPatch) -> Result<()> {
        let mut known: HashSet<&str> = self.models.keys().map(String::as_str).collect();
        let mut roots: HashSet<&str> = self.roots.iter().map(String::as_str).collect();

        for event in &patch.events {
            match event {
                DocumentEvent::ModelChanged { model, .. } => {
                    if !known.contains(model.id.as_str()) {
                        return Err(Error::PatchApply(format!("unknown model '{}'", model.id)));
                    }
                }
                DocumentEvent::RootAdded { model } => {
                    if !known.insert(model.id.as_str()) {
                        return Err(Error::PatchApply(format!(
                            "model '{}' already exists",
                            model.id
                        )));
                    }
                    roots.insert(model.id.as_str());
                }
                DocumentEvent::RootRemoved { model } => {
                    if !roots.remove(model.id.as_str()) {
                        return Err(Error::PatchApply(format!(
                            "unknown root model '{}'",
                            model.id
                        )));
                    }
                    known.remove(model.id.as_str());
                }
                DocumentEvent::TitleChanged { .. } => {}
            }
        }
        Ok(())
    }

    fn insert_root(&mut self, model: Model) {
        self.roots.push(model.id.clone());
        self.models.insert(model.id.clone(), model);
    }

    fn allocate_id(&mut self) -> ModelId {
        loop {
            let id = format!("m{}", self.next_id);
            self.next_id += 1;
            if !self.models.contains_key(&id) {
                return id;
            }
        }
    }

    fn emit(&mut self, event: DocumentEvent, setter: Setter) {
        self.queue.push_back((event, setter));
        if !self.dispatching {
            self.dispatch();
        }
    }

    /// Drain the event queue: run watchers, then forward runtime events as
    /// one patch.
    ///
    /// Past [`MAX_CASCADE`] events watchers stop running, but every queued
    /// runtime event is still forwarded so the host does not drift.
    fn dispatch(&mut self) {
        self.dispatching = true;
        let mut outgoing = Vec::new();
        let mut handled = 0;
        let mut skipped: BTreeSet<ModelId> = BTreeSet::new();

        while let Some((event, setter)) = self.queue.pop_front() {
            handled += 1;

            let changed = match &event {
                DocumentEvent::ModelChanged { model, attr, new } => {
                    Some((model.id.clone(), attr.clone(), new.clone()))
                }
                _ => None,
            };

            if setter == Setter::Runtime {
                outgoing.push(event);
            }

            if let Some((model, attr, new)) = changed {
                if handled > MAX_CASCADE {
                    skipped.insert(model);
                } else {
                    self.run_watchers(&model, &attr, &new);
                }
            }
        }

        if !skipped.is_empty() {
            tracing::error!(
                "Watcher cascade exceeded {} events; watchers not run for models {:?}",
                MAX_CASCADE,
                skipped
            );
        }

        self.dispatching = false;
        self.forward(outgoing);
    }

    fn run_watchers(&mut self, model: &str, attr: &str, new: &Value) {
        let mut watchers = std::mem::take(&mut self.watchers);
        for watch in watchers
            .iter_mut()
            .filter(|watch| watch.model == model && watch.attr == attr)
        {
            let outcome = catch_unwind(AssertUnwindSafe(|| (watch.callback)(self, new)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::warn!("Watcher on {}.{} failed: {}", model, attr, err),
                Err(panic) => tracing::warn!(
                    "Watcher on {}.{} panicked: {}",
                    model,
                    attr,
                    panic_message(panic.as_ref())
                ),
            }
        }
        // Keep watchers registered from inside callbacks.
        watchers.append(&mut self.watchers);
        self.watchers = watchers;
    }

    fn forward(&self, events: Vec<DocumentEvent>) {
        let Some(sink) = &self.link else {
            return;
        };
        if events.is_empty() {
            return;
        }

        let buffers = self.referenced_buffers(&events);
        let patch = match serde_json::to_value(DocumentPatch { events }) {
            Ok(patch) => patch,
            Err(err) => {
                tracing::error!("Failed to serialize document patch: {}", err);
                return;
            }
        };

        match sink.send(patch, buffers) {
            Ok(Some(msg_id)) => tracing::debug!("Forwarded document patch {}", msg_id),
            Ok(None) => {}
            Err(err) => tracing::warn!("Failed to forward document patch: {}", err),
        }
    }

    fn referenced_buffers(&self, events: &[DocumentEvent]) -> Vec<Vec<u8>> {
        let mut seen = HashSet::new();
        let mut buffers = Vec::new();
        for event in events {
            if let DocumentEvent::ModelChanged { new, .. } = event {
                let buffer_id = new.get(BUFFER_REF_KEY).and_then(Value::as_str);
                if let Some(buffer_id) = buffer_id {
                    if seen.insert(buffer_id) {
                        if let Some(data) = self.buffers.get(buffer_id) {
                            buffers.push(data.clone());
                        }
                    }
                }
            }
        }
        buffers
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::Outbox;
    use crate::runtime::RenderPayload;
    use docsync_protocol::OutboundMessage;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn attrs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn linked_document() -> (DocumentState, UnboundedReceiver<OutboundMessage>) {
        let (outbox, mut rx) = Outbox::channel();
        outbox
            .render(RenderPayload {
                docs_json: json!({}),
                render_items: json!([]),
                root_ids: json!([]),
            })
            .unwrap();
        assert_eq!(rx.try_recv().unwrap().kind(), "render");

        let mut doc = DocumentState::new("doc-test");
        doc.link(outbox.patch_sink());
        (doc, rx)
    }

    fn next_patch(rx: &mut UnboundedReceiver<OutboundMessage>) -> (Value, Vec<Vec<u8>>) {
        match rx.try_recv().unwrap() {
            OutboundMessage::Patch { patch, buffers, .. } => (patch, buffers),
            other => panic!("expected patch, got {:?}", other),
        }
    }

    #[test]
    fn test_runtime_change_is_forwarded() {
        let (mut doc, mut rx) = linked_document();
        let input = doc.add_root("TextInput", attrs(json!({"value": ""})), Setter::Host);

        assert!(doc
            .set_attr(&input, "value", json!("hello"), Setter::Runtime)
            .unwrap());

        let (patch, buffers) = next_patch(&mut rx);
        assert!(buffers.is_empty());
        assert_eq!(
            patch,
            json!({"events": [{"kind": "ModelChanged", "model": {"id": input}, "attr": "value", "new": "hello"}]})
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_host_change_is_not_forwarded() {
        let (mut doc, mut rx) = linked_document();
        let input = doc.add_root("TextInput", attrs(json!({"value": ""})), Setter::Host);

        doc.set_attr(&input, "value", json!("typed"), Setter::Host)
            .unwrap();

        assert!(rx.try_recv().is_err());
        assert_eq!(doc.get_attr(&input, "value"), Some(&json!("typed")));
    }

    #[test]
    fn test_unchanged_value_emits_nothing() {
        let (mut doc, mut rx) = linked_document();
        let input = doc.add_root("TextInput", attrs(json!({"value": "same"})), Setter::Host);

        assert!(!doc
            .set_attr(&input, "value", json!("same"), Setter::Runtime)
            .unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_watcher_changes_are_batched_and_forwarded() {
        let (mut doc, mut rx) = linked_document();
        let input = doc.add_root("TextInput", attrs(json!({"value": ""})), Setter::Host);
        let output = doc.add_root("Markdown", attrs(json!({"object": ""})), Setter::Host);

        let target = output.clone();
        doc.watch(&input, "value", move |doc, new| {
            let text = new.as_str().unwrap_or_default().to_uppercase();
            doc.set_attr(&target, "object", json!(text), Setter::Runtime)?;
            Ok(())
        });

        doc.set_attr(&input, "value", json!("abc"), Setter::Host)
            .unwrap();

        let (patch, _) = next_patch(&mut rx);
        let events = patch["events"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["model"]["id"], json!(output));
        assert_eq!(events[0]["new"], json!("ABC"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unlinked_document_does_not_forward() {
        let mut doc = DocumentState::new("doc-unlinked");
        let input = doc.add_root("TextInput", Map::new(), Setter::Runtime);
        doc.set_attr(&input, "value", json!(1), Setter::Runtime)
            .unwrap();
        assert!(!doc.is_linked());
        assert_eq!(doc.root_ids(), &[input]);
    }

    #[test]
    fn test_patch_is_all_or_nothing() {
        let mut doc = DocumentState::new("doc-atomic");
        let input = doc.add_root("TextInput", attrs(json!({"value": "a"})), Setter::Host);

        let patch = json!({"events": [
            {"kind": "ModelChanged", "model": {"id": input}, "attr": "value", "new": "b"},
            {"kind": "ModelChanged", "model": {"id": "missing"}, "attr": "value", "new": "c"},
        ]});

        let err = doc.apply_json_patch(&patch, Setter::Host).unwrap_err();
        assert!(matches!(err, Error::PatchApply(_)));
        assert_eq!(doc.get_attr(&input, "value"), Some(&json!("a")));
    }

    #[test]
    fn test_patch_adds_and_removes_roots() {
        let mut doc = DocumentState::new("doc-roots");
        let patch = json!({"events": [
            {"kind": "RootAdded", "model": {"id": "host-1", "type": "Div", "attributes": {"text": "hi"}}},
            {"kind": "ModelChanged", "model": {"id": "host-1"}, "attr": "text", "new": "there"},
            {"kind": "TitleChanged", "title": "Renamed"},
        ]});
        doc.apply_json_patch(&patch, Setter::Host).unwrap();

        assert_eq!(doc.root_ids(), &["host-1".to_string()]);
        assert_eq!(doc.get_attr("host-1", "text"), Some(&json!("there")));
        assert_eq!(doc.title(), "Renamed");

        let remove = json!({"events": [{"kind": "RootRemoved", "model": {"id": "host-1"}}]});
        doc.apply_json_patch(&remove, Setter::Host).unwrap();
        assert!(doc.root_ids().is_empty());
        assert!(doc.model("host-1").is_none());
    }

    #[test]
    fn test_malformed_patch_structure() {
        let mut doc = DocumentState::new("doc-bad");
        let err = doc
            .apply_json_patch(&json!({"events": [{"kind": "Explode"}]}), Setter::Host)
            .unwrap_err();
        assert!(matches!(err, Error::PatchDecode(_)));
    }

    #[test]
    fn test_binary_attribute_travels_as_buffer() {
        let (mut doc, mut rx) = linked_document();
        let image = doc.add_root("Image", Map::new(), Setter::Host);

        let buffer_id = doc
            .set_binary(&image, "data", vec![1, 2, 3], Setter::Runtime)
            .unwrap();

        let (patch, buffers) = next_patch(&mut rx);
        assert_eq!(buffers, vec![vec![1, 2, 3]]);
        assert_eq!(patch["events"][0]["new"], json!({BUFFER_REF_KEY: buffer_id}));
        assert_eq!(doc.buffer(&buffer_id), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn test_to_json_lists_roots_and_references() {
        let mut doc = DocumentState::new("doc-json");
        doc.set_title("Demo", Setter::Runtime);
        let child = doc.add_model("Div", attrs(json!({"text": "child"})));
        let root = doc.add_root("Column", attrs(json!({"children": [{"id": child}]})), Setter::Runtime);

        let value = doc.to_json();
        assert_eq!(value["title"], "Demo");
        assert_eq!(value["roots"]["root_ids"], json!([root]));
        assert_eq!(value["roots"]["references"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_watchers_run_after_whole_patch_applied() {
        let mut doc = DocumentState::new("doc-deferred");
        let a = doc.add_root("TextInput", attrs(json!({"value": ""})), Setter::Runtime);
        let b = doc.add_root("TextInput", attrs(json!({"value": ""})), Setter::Runtime);

        let target = b.clone();
        doc.watch(&a, "value", move |doc, _new| doc.remove_root(&target, Setter::Runtime));

        let patch = json!({"events": [
            {"kind": "ModelChanged", "model": {"id": a}, "attr": "value", "new": "x"},
            {"kind": "ModelChanged", "model": {"id": b}, "attr": "value", "new": "y"},
        ]});
        doc.apply_json_patch(&patch, Setter::Host).unwrap();

        assert_eq!(doc.get_attr(&a, "value"), Some(&json!("x")));
        assert!(doc.model(&b).is_none());
        assert_eq!(doc.root_ids(), &[a]);
    }

    #[test]
    fn test_panicking_watcher_leaves_document_usable() {
        let (mut doc, mut rx) = linked_document();
        let input = doc.add_root("TextInput", attrs(json!({"value": ""})), Setter::Host);
        let output = doc.add_root("Markdown", attrs(json!({"object": ""})), Setter::Host);

        let target = output.clone();
        doc.watch(&input, "value", move |doc, new| {
            let text = new.as_str().expect("string value");
            doc.set_attr(&target, "object", json!(text), Setter::Runtime)?;
            Ok(())
        });

        let bad = json!({"events": [
            {"kind": "ModelChanged", "model": {"id": input}, "attr": "value", "new": 5}
        ]});
        doc.apply_json_patch(&bad, Setter::Host).unwrap();
        assert_eq!(doc.get_attr(&input, "value"), Some(&json!(5)));
        assert!(rx.try_recv().is_err());

        doc.set_attr(&input, "value", json!("ok"), Setter::Host)
            .unwrap();
        let (patch, _) = next_patch(&mut rx);
        assert_eq!(patch["events"][0]["model"]["id"], json!(output));
        assert_eq!(patch["events"][0]["new"], json!("ok"));
    }

    #[test]
    fn test_runaway_cascade_still_forwards_every_change() {
        let (mut doc, mut rx) = linked_document();
        let a = doc.add_root("Counter", attrs(json!({"value": 0})), Setter::Host);
        let b = doc.add_root("Counter", attrs(json!({"value": 0})), Setter::Host);

        let (to_b, to_a) = (b.clone(), a.clone());
        doc.watch(&a, "value", move |doc, new| {
            let next = new.as_i64().unwrap_or_default() + 1;
            doc.set_attr(&to_b, "value", json!(next), Setter::Runtime)?;
            Ok(())
        });
        doc.watch(&b, "value", move |doc, new| {
            let next = new.as_i64().unwrap_or_default() + 1;
            doc.set_attr(&to_a, "value", json!(next), Setter::Runtime)?;
            Ok(())
        });

        doc.set_attr(&a, "value", json!(1), Setter::Host).unwrap();

        let (patch, _) = next_patch(&mut rx);
        let events = patch["events"].as_array().unwrap();
        assert!(events.len() >= MAX_CASCADE);
        for id in [&a, &b] {
            let last = events
                .iter()
                .rev()
                .find(|event| event["model"]["id"] == json!(id))
                .unwrap();
            assert_eq!(Some(&last["new"]), doc.get_attr(id, "value"));
        }
        assert!(rx.try_recv().is_err());
    }
}
