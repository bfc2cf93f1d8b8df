//! Where package bytes come from.

use docsync_bundle::{compare_versions, PackageLocator, PackageSpec, WheelFilename};
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Default JSON index (PyPI's JSON API).
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/pypi";

/// Fetches the raw bytes of a package.
#[allow(async_fn_in_trait)]
pub trait PackageSource {
    /// Fetch the wheel for `package`.
    async fn fetch(&self, package: &PackageSpec) -> Result<Vec<u8>>;
}

/// Wheels served from a local directory.
///
/// URL locators resolve to their file name inside the directory, relative
/// paths are joined to it, and requirements match wheel file names.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Serve wheels from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory being served.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, package: &PackageSpec) -> Result<PathBuf> {
        match package.locator() {
            PackageLocator::Url(_) => {
                let file_name = package
                    .file_name()
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| Error::install(&package.locator, "URL has no file name"))?;
                Ok(self.root.join(file_name))
            }
            PackageLocator::Path(path) => {
                let path = Path::new(path);
                if path.is_absolute() {
                    Ok(path.to_path_buf())
                } else {
                    Ok(self.root.join(path))
                }
            }
            PackageLocator::Requirement { name, version } => {
                self.find_wheel(name, version).map_err(|e| match e {
                    Error::Io(io) => Error::install(&package.locator, io),
                    other => other,
                })?
                .ok_or_else(|| {
                    Error::install(
                        &package.locator,
                        format!("no matching wheel in {}", self.root.display()),
                    )
                })
            }
        }
    }

    fn find_wheel(&self, name: &str, version: Option<&str>) -> Result<Option<PathBuf>> {
        let mut best: Option<(WheelFilename, PathBuf)> = None;
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some(wheel) = WheelFilename::parse(&file_name) else {
                continue;
            };
            if !wheel.matches(name, version) {
                continue;
            }
            // Highest version wins; ties go to the later path.
            let newer = match &best {
                None => true,
                Some((current, path)) => {
                    match compare_versions(&wheel.version, &current.version) {
                        Ordering::Greater => true,
                        Ordering::Equal => entry.path() > *path,
                        Ordering::Less => false,
                    }
                }
            };
            if newer {
                best = Some((wheel, entry.path()));
            }
        }
        Ok(best.map(|(_, path)| path))
    }
}

impl PackageSource for DirectorySource {
    async fn fetch(&self, package: &PackageSpec) -> Result<Vec<u8>> {
        let path = self.resolve(package)?;
        tracing::debug!("Reading {} from {}", package.locator, path.display());
        tokio::fs::read(&path)
            .await
            .map_err(|e| Error::install(&package.locator, format!("{}: {}", path.display(), e)))
    }
}

#[derive(Debug, Deserialize)]
struct IndexRelease {
    urls: Vec<IndexFile>,
}

#[derive(Debug, Deserialize)]
struct IndexFile {
    filename: String,
    url: String,
    packagetype: String,
}

/// URL of the first pure Python wheel among a release's files.
fn select_wheel(files: Vec<IndexFile>) -> Option<String> {
    files
        .into_iter()
        .find(|file| {
            file.packagetype == "bdist_wheel"
                && WheelFilename::parse(&file.filename)
                    .map_or(false, |wheel| wheel.tag.ends_with("none-any"))
        })
        .map(|file| file.url)
}

/// Wheels fetched over HTTP.
///
/// Requirements are resolved through a PyPI-style JSON index; only pure
/// Python (`none-any`) wheels are selected.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    index_url: String,
}

impl HttpSource {
    /// Create a source using [`DEFAULT_INDEX_URL`].
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("docsync-worker/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            index_url: DEFAULT_INDEX_URL.to_string(),
        })
    }

    /// Use a different JSON index.
    pub fn with_index_url(mut self, index_url: impl Into<String>) -> Self {
        self.index_url = index_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn resolve_requirement(&self, name: &str, version: Option<&str>) -> Result<String> {
        let url = match version {
            Some(version) => format!("{}/{}/{}/json", self.index_url, name, version),
            None => format!("{}/{}/json", self.index_url, name),
        };
        tracing::debug!("Resolving {} via {}", name, url);

        let release: IndexRelease = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        select_wheel(release.urls)
            .ok_or_else(|| Error::Http(format!("no pure-Python wheel published for {}", name)))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

impl PackageSource for HttpSource {
    async fn fetch(&self, package: &PackageSpec) -> Result<Vec<u8>> {
        let result = match package.locator() {
            PackageLocator::Url(url) => self.download(url).await,
            PackageLocator::Requirement { name, version } => {
                match self.resolve_requirement(name, version).await {
                    Ok(url) => self.download(&url).await,
                    Err(err) => Err(err),
                }
            }
            PackageLocator::Path(_) => Err(Error::Http(
                "path locators cannot be fetched over HTTP".to_string(),
            )),
        };
        result.map_err(|e| Error::install(&package.locator, e))
    }
}

/// Wheels held in memory, keyed by locator.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    packages: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for `locator`.
    pub fn insert(&mut self, locator: impl Into<String>, bytes: Vec<u8>) {
        self.packages.insert(locator.into(), bytes);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, locator: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(locator, bytes);
        self
    }
}

impl PackageSource for MemorySource {
    async fn fetch(&self, package: &PackageSpec) -> Result<Vec<u8>> {
        self.packages
            .get(&package.locator)
            .cloned()
            .ok_or_else(|| Error::install(&package.locator, "not available"))
    }
}
