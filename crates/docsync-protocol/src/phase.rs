use serde::{Deserialize, Serialize};
use std::fmt;

/// Setup phase of a worker. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// Nothing has started yet.
    Uninitialized,
    /// Acquiring the runtime.
    LoadingRuntime,
    /// Installing declared packages.
    InstallingPackages,
    /// Running the application.
    Executing,
    /// Render posted; relaying messages.
    Ready,
}

impl LifecyclePhase {
    /// The phase that follows this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Uninitialized => Some(Self::LoadingRuntime),
            Self::LoadingRuntime => Some(Self::InstallingPackages),
            Self::InstallingPackages => Some(Self::Executing),
            Self::Executing => Some(Self::Ready),
            Self::Ready => None,
        }
    }

    /// Whether `next` is the immediate successor of this phase.
    pub fn can_advance_to(self, next: Self) -> bool {
        self.next() == Some(next)
    }

    /// Wire name of the phase.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::LoadingRuntime => "loading_runtime",
            Self::InstallingPackages => "installing_packages",
            Self::Executing => "executing",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
