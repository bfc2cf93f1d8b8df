use thiserror::Error;

/// Errors that can occur when reading worker manifests and wheel archives.
#[derive(Debug, Error)]
pub enum Error {
    /// The wheel archive is malformed.
    #[error("invalid wheel: {0}")]
    InvalidWheel(String),

    /// A required entry is missing from the wheel.
    #[error("missing required entry: {0}")]
    MissingEntry(String),

    /// Error parsing or validating the manifest.
    #[error("manifest error: {0}")]
    ManifestError(String),

    /// Content digest did not match the expected value.
    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch {
        /// Digest declared in the manifest.
        expected: String,
        /// Digest computed from the fetched bytes.
        actual: String,
    },

    /// The digest string is not `blake3:<64-char-hex>`.
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    /// Error from the zip library.
    #[error("zip error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    /// I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("toml parsing error: {0}")]
    TomlError(String),

    /// JSON parsing error.
    #[error("json parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type for docsync-bundle operations.
pub type Result<T> = std::result::Result<T, Error>;
