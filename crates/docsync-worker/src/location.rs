use serde::Serialize;
use serde_json::{Map, Value};
use std::ops::{Deref, DerefMut};

use crate::{Error, Result};

/// Field names a location update may touch.
pub const LOCATION_FIELDS: [&str; 8] = [
    "href", "hostname", "pathname", "protocol", "port", "search", "hash", "reload",
];

/// Browser location mirrored into the document.
///
/// Fields are read-only outside of an [`Location::edit_readonly`] scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub href: String,
    pub hostname: String,
    pub pathname: String,
    pub protocol: String,
    pub port: String,
    pub search: String,
    pub hash: String,
    pub reload: bool,
    #[serde(skip)]
    readonly: bool,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            href: String::new(),
            hostname: String::new(),
            pathname: String::new(),
            protocol: String::new(),
            port: String::new(),
            search: String::new(),
            hash: String::new(),
            reload: false,
            readonly: true,
        }
    }
}

impl Location {
    /// Whether `key` is a recognized location field.
    pub fn is_param(key: &str) -> bool {
        LOCATION_FIELDS.contains(&key)
    }

    /// Whether writes are currently rejected.
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Read a field as JSON.
    pub fn get(&self, key: &str) -> Option<Value> {
        let value = match key {
            "href" => Value::from(self.href.as_str()),
            "hostname" => Value::from(self.hostname.as_str()),
            "pathname" => Value::from(self.pathname.as_str()),
            "protocol" => Value::from(self.protocol.as_str()),
            "port" => Value::from(self.port.as_str()),
            "search" => Value::from(self.search.as_str()),
            "hash" => Value::from(self.hash.as_str()),
            "reload" => Value::from(self.reload),
            _ => return None,
        };
        Some(value)
    }

    /// Write a single field. Fails while read-only or on a type mismatch.
    pub fn set(&mut self, key: &str, value: &Value) -> Result<()> {
        if self.readonly {
            return Err(Error::LocationMerge(format!(
                "location is read-only (field '{}')",
                key
            )));
        }

        if key == "reload" {
            self.reload = value
                .as_bool()
                .ok_or_else(|| type_mismatch(key, "a boolean", value))?;
            return Ok(());
        }

        let text = value
            .as_str()
            .ok_or_else(|| type_mismatch(key, "a string", value))?
            .to_string();
        match key {
            "href" => self.href = text,
            "hostname" => self.hostname = text,
            "pathname" => self.pathname = text,
            "protocol" => self.protocol = text,
            "port" => self.port = text,
            "search" => self.search = text,
            "hash" => self.hash = text,
            _ => {
                return Err(Error::LocationMerge(format!(
                    "unknown location field '{}'",
                    key
                )))
            }
        }
        Ok(())
    }

    /// Lift the read-only flag until the returned guard is dropped.
    pub fn edit_readonly(&mut self) -> ReadonlyGuard<'_> {
        let previous = self.readonly;
        self.readonly = false;
        ReadonlyGuard {
            location: self,
            previous,
        }
    }

    /// Merge the recognized keys of `update`; unknown keys are dropped.
    ///
    /// The merge is all-or-nothing. Returns the keys that were applied.
    pub fn merge(&mut self, update: &Map<String, Value>) -> Result<Vec<String>> {
        let mut guard = self.edit_readonly();
        let snapshot = guard.clone();

        let mut applied = Vec::new();
        for (key, value) in update.iter().filter(|(key, _)| Self::is_param(key)) {
            if let Err(err) = guard.set(key, value) {
                guard.restore_fields(snapshot);
                return Err(err);
            }
            applied.push(key.clone());
        }

        Ok(applied)
    }

    fn restore_fields(&mut self, snapshot: Location) {
        let readonly = self.readonly;
        *self = snapshot;
        self.readonly = readonly;
    }
}

fn type_mismatch(key: &str, expected: &str, value: &Value) -> Error {
    Error::LocationMerge(format!(
        "field '{}' expects {}, got {}",
        key, expected, value
    ))
}

/// Scope in which a [`Location`] is writable.
///
/// Dropping the guard restores the previous read-only flag, including on
/// early return and unwinding.
pub struct ReadonlyGuard<'a> {
    location: &'a mut Location,
    previous: bool,
}

impl Deref for ReadonlyGuard<'_> {
    type Target = Location;

    fn deref(&self) -> &Location {
        self.location
    }
}

impl DerefMut for ReadonlyGuard<'_> {
    fn deref_mut(&mut self) -> &mut Location {
        self.location
    }
}

impl Drop for ReadonlyGuard<'_> {
    fn drop(&mut self) {
        self.location.readonly = self.previous;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_merge_filters_unknown_keys() {
        let mut location = Location::default();
        let applied = location
            .merge(&update(json!({"pathname": "/app", "zoom": 9})))
            .unwrap();

        assert_eq!(applied, vec!["pathname".to_string()]);
        assert_eq!(location.pathname, "/app");
        assert_eq!(location.get("zoom"), None);
        assert!(location.is_readonly());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut location = Location::default();
        let delta = update(json!({"hash": "#top", "search": "?q=1", "z": 9}));

        location.merge(&delta).unwrap();
        let once = location.clone();
        location.merge(&delta).unwrap();

        assert_eq!(location, once);
        assert!(location.is_readonly());
    }

    #[test]
    fn test_failed_merge_restores_guard_and_fields() {
        let mut location = Location::default();
        location
            .merge(&update(json!({"pathname": "/before"})))
            .unwrap();

        let err = location
            .merge(&update(json!({"pathname": "/after", "reload": "yes"})))
            .unwrap_err();

        assert!(matches!(err, Error::LocationMerge(_)));
        assert_eq!(location.pathname, "/before");
        assert!(!location.reload);
        assert!(location.is_readonly());
    }

    #[test]
    fn test_direct_write_rejected_while_readonly() {
        let mut location = Location::default();
        assert!(location.set("href", &json!("https://example.com")).is_err());

        {
            let mut guard = location.edit_readonly();
            guard.set("href", &json!("https://example.com")).unwrap();
            assert!(!guard.is_readonly());
        }

        assert!(location.is_readonly());
        assert_eq!(location.href, "https://example.com");
    }

    #[test]
    fn test_guard_preserves_writable_state() {
        let mut location = Location::default();
        {
            let _outer = location.edit_readonly();
        }
        let mut guard = location.edit_readonly();
        {
            let inner = guard.edit_readonly();
            assert!(!inner.is_readonly());
        }
        assert!(!guard.is_readonly());
        drop(guard);
        assert!(location.is_readonly());
    }

    #[test]
    fn test_guard_restored_on_unwind() {
        let mut location = Location::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = location.edit_readonly();
            panic!("merge failed");
        }));
        assert!(result.is_err());
        assert!(location.is_readonly());
    }
}
