use chrono::{DateTime, Utc};
use docsync_bundle::{normalize_name, verify_digest, PackageSpec, Wheel};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{Error, Result};

/// A package recorded in a runtime environment.
#[derive(Debug, Clone, Serialize)]
pub struct InstalledPackage {
    /// Distribution name from the wheel metadata.
    pub name: String,
    /// Installed version.
    pub version: String,
    /// Content digest of the wheel.
    pub digest: String,
    /// Number of files in the wheel.
    pub files: usize,
    /// Locator the package was installed from.
    pub locator: String,
    /// Install time.
    pub installed_at: DateTime<Utc>,
}

/// Result of installing a wheel into an [`Environment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Newly installed.
    Installed,
    /// The same name, version and content was already present.
    AlreadyPresent,
}

/// Installed packages keyed by normalized name.
#[derive(Debug, Default)]
pub struct Environment {
    packages: BTreeMap<String, InstalledPackage>,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify and record a fetched wheel.
    pub fn install(&mut self, spec: &PackageSpec, bytes: &[u8]) -> Result<InstallOutcome> {
        if let Some(expected) = &spec.hash {
            verify_digest(bytes, expected).map_err(|e| Error::install(&spec.locator, e))?;
        }

        let wheel = Wheel::from_bytes(bytes).map_err(|e| Error::install(&spec.locator, e))?;
        let key = wheel.normalized_name();

        if let Some(existing) = self.packages.get(&key) {
            if existing.version != wheel.version() {
                return Err(Error::install(
                    &spec.locator,
                    format!(
                        "conflicts with installed {} {}",
                        existing.name, existing.version
                    ),
                ));
            }
            if existing.digest == wheel.digest() {
                return Ok(InstallOutcome::AlreadyPresent);
            }
            return Err(Error::install(
                &spec.locator,
                format!(
                    "{} {} is already installed with different content",
                    existing.name, existing.version
                ),
            ));
        }

        self.packages.insert(
            key,
            InstalledPackage {
                name: wheel.name().to_string(),
                version: wheel.version().to_string(),
                digest: wheel.digest().to_string(),
                files: wheel.files().len(),
                locator: spec.locator.clone(),
                installed_at: Utc::now(),
            },
        );
        Ok(InstallOutcome::Installed)
    }

    /// Look up a package by (unnormalized) name.
    pub fn get(&self, name: &str) -> Option<&InstalledPackage> {
        self.packages.get(&normalize_name(name))
    }

    /// Whether a package is installed.
    pub fn is_installed(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Installed packages, ordered by normalized name.
    pub fn iter(&self) -> impl Iterator<Item = &InstalledPackage> {
        self.packages.values()
    }

    /// Number of installed packages.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether nothing is installed.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
