//! # docsync-bundle
//!
//! Build-time configuration and package archives for docsync workers.
//!
//! This crate provides:
//! - `worker.toml` parsing and validation (package list + application descriptor)
//! - Wheel archive reading (name/version metadata, file listing)
//! - BLAKE3 content digests for package verification
//! - A wheel builder for packaging tools and tests
//!
//! ## Example
//!
//! ```ignore
//! use docsync_bundle::{Wheel, WheelBuilder, WorkerManifest};
//!
//! let manifest = WorkerManifest::from_toml(include_bytes!("worker.toml"))?;
//! for package in &manifest.packages {
//!     println!("{} -> {}", package.display_name(), package.locator);
//! }
//!
//! let bytes = WheelBuilder::new("pkg-a", "1.0").to_bytes()?;
//! let wheel = Wheel::from_bytes(&bytes)?;
//! assert_eq!(wheel.version(), "1.0");
//! ```

mod builder;
mod error;
mod manifest;
mod wheel;

pub use builder::WheelBuilder;
pub use error::{Error, Result};
pub use manifest::{
    ApplicationDescriptor, PackageLocator, PackageSpec, WorkerManifest, WorkerSection,
};
pub use wheel::{
    compare_versions, compute_digest, normalize_name, parse_digest, verify_digest, Wheel, WheelFilename,
};
