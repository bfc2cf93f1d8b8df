use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::wheel::parse_digest;

fn default_runtime() -> String {
    "native".to_string()
}

fn default_true() -> bool {
    true
}

/// The `[worker]` section of the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSection {
    /// Worker name, used in logs.
    pub name: String,
    /// Label of the runtime, shown in the loading status.
    #[serde(default = "default_runtime")]
    pub runtime: String,
}

/// One `[[packages]]` entry: an installable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    /// URL, wheel path, or `name==version` requirement.
    pub locator: String,
    /// Expected content digest (`blake3:<hex>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// How a package locator should be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageLocator<'a> {
    /// Direct `http(s)` URL to a wheel.
    Url(&'a str),
    /// Filesystem path to a wheel.
    Path(&'a str),
    /// Index requirement, `name` or `name==version`.
    Requirement {
        /// Distribution name.
        name: &'a str,
        /// Pinned version, if any.
        version: Option<&'a str>,
    },
}

impl PackageSpec {
    /// Create a spec without an expected digest.
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            hash: None,
        }
    }

    /// Attach an expected content digest.
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// Short name shown in progress messages.
    ///
    /// `https://host/dist/bokeh-2.4.3-py3-none-any.whl` becomes `bokeh`;
    /// a requirement such as `refactor==0.6.0` is shown as-is.
    pub fn display_name(&self) -> &str {
        let file = self.locator.rsplit('/').next().unwrap_or(&self.locator);
        file.split('-').next().unwrap_or(file)
    }

    /// Classify the locator.
    pub fn locator(&self) -> PackageLocator<'_> {
        let locator = self.locator.trim();
        if locator.starts_with("http://") || locator.starts_with("https://") {
            PackageLocator::Url(locator)
        } else if locator.ends_with(".whl") {
            PackageLocator::Path(locator)
        } else {
            match locator.split_once("==") {
                Some((name, version)) => PackageLocator::Requirement {
                    name: name.trim(),
                    version: Some(version.trim()),
                },
                None => PackageLocator::Requirement {
                    name: locator,
                    version: None,
                },
            }
        }
    }

    /// File name of a URL or path locator.
    pub fn file_name(&self) -> Option<&str> {
        match self.locator() {
            PackageLocator::Url(url) => url
                .split(['?', '#'])
                .next()
                .and_then(|path| path.rsplit('/').next()),
            PackageLocator::Path(path) => path.rsplit(['/', '\\']).next(),
            PackageLocator::Requirement { .. } => None,
        }
    }
}

/// The `[application]` section: the entry point and its capability bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationDescriptor {
    /// Name the application is registered under.
    pub entry: String,
    /// Packages that must be installed before the application runs.
    #[serde(default)]
    pub requires: Vec<String>,
    /// Whether the document exposes a location object.
    #[serde(default = "default_true")]
    pub location: bool,
    /// Free-form bindings handed to the application.
    #[serde(default)]
    pub bindings: BTreeMap<String, serde_json::Value>,
}

impl ApplicationDescriptor {
    /// Create a descriptor for the given entry point.
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            requires: Vec::new(),
            location: true,
            bindings: BTreeMap::new(),
        }
    }

    /// Decode a binding into a typed value.
    pub fn binding<T: DeserializeOwned>(&self, key: &str) -> crate::Result<Option<T>> {
        match self.bindings.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }
}

/// Complete build-time configuration of a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerManifest {
    /// Worker section.
    pub worker: WorkerSection,
    /// Packages, installed in declaration order.
    #[serde(default)]
    pub packages: Vec<PackageSpec>,
    /// Application section.
    pub application: ApplicationDescriptor,
}

impl WorkerManifest {
    /// Create a manifest with no packages.
    pub fn new(name: impl Into<String>, application: ApplicationDescriptor) -> Self {
        Self {
            worker: WorkerSection {
                name: name.into(),
                runtime: default_runtime(),
            },
            packages: Vec::new(),
            application,
        }
    }

    /// Append a package to the install list.
    pub fn with_package(mut self, package: PackageSpec) -> Self {
        self.packages.push(package);
        self
    }

    /// Parse and validate a manifest from TOML bytes.
    pub fn from_toml(data: &[u8]) -> crate::Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|e| crate::Error::ManifestError(format!("Invalid UTF-8: {}", e)))?;
        let manifest: Self =
            toml::from_str(text).map_err(|e| crate::Error::TomlError(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Serialize the manifest back to TOML.
    pub fn to_toml(&self) -> crate::Result<String> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::TomlError(e.to_string()))
    }

    /// Check structural constraints not expressed by the schema.
    pub fn validate(&self) -> crate::Result<()> {
        if self.worker.name.trim().is_empty() {
            return Err(crate::Error::ManifestError(
                "worker.name cannot be empty".to_string(),
            ));
        }
        if self.application.entry.trim().is_empty() {
            return Err(crate::Error::ManifestError(
                "application.entry cannot be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for package in &self.packages {
            if package.locator.trim().is_empty() {
                return Err(crate::Error::ManifestError(
                    "package locator cannot be empty".to_string(),
                ));
            }
            if !seen.insert(package.locator.as_str()) {
                return Err(crate::Error::ManifestError(format!(
                    "duplicate package locator: {}",
                    package.locator
                )));
            }
            if let Some(hash) = &package.hash {
                parse_digest(hash)?;
            }
        }

        Ok(())
    }
}
