use docsync_protocol::LifecyclePhase;
use thiserror::Error;

/// Errors from the worker bootstrap and relay.
#[derive(Error, Debug)]
pub enum Error {
    /// The runtime could not be acquired.
    #[error("Runtime acquisition failed: {0}")]
    RuntimeAcquisition(String),

    /// A package failed to install.
    #[error("Failed to install {package}: {reason}")]
    PackageInstall {
        /// Locator of the failing package.
        package: String,
        /// Failure description.
        reason: String,
    },

    /// The application failed to run.
    #[error("Script execution failed: {0}")]
    ScriptExecution(String),

    /// A host patch is not valid JSON.
    #[error("Patch decode error: {0}")]
    PatchDecode(String),

    /// A host patch could not be applied to the document.
    #[error("Patch apply error: {0}")]
    PatchApply(String),

    /// A location update could not be merged.
    #[error("Location merge error: {0}")]
    LocationMerge(String),

    /// Attempted a non-forward lifecycle transition.
    #[error("Invalid phase transition: {from} -> {to}")]
    PhaseTransition {
        /// Current phase.
        from: LifecyclePhase,
        /// Requested phase.
        to: LifecyclePhase,
    },

    /// The render message was already posted.
    #[error("Render already posted")]
    AlreadyRendered,

    /// Error from the docsync-bundle crate.
    #[error("Bundle error: {0}")]
    Bundle(#[from] docsync_bundle::Error),

    /// Wire-level encoding or decoding error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] docsync_protocol::ProtocolError),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The host side of a channel has gone away.
    #[error("Channel closed: {0}")]
    ChannelClosed(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err.to_string())
    }
}

impl Error {
    /// Wrap an error as an install failure of `package`.
    pub fn install(package: &str, reason: impl std::fmt::Display) -> Self {
        Error::PackageInstall {
            package: package.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for docsync-worker operations.
pub type Result<T> = std::result::Result<T, Error>;
