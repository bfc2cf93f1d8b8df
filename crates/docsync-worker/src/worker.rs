use docsync_bundle::WorkerManifest;
use docsync_protocol::{InboundMessage, LifecyclePhase};
use tokio::sync::mpsc;

use crate::outbox::Outbox;
use crate::relay::Relay;
use crate::runtime::{Runtime, RuntimeLoader};
use crate::{Error, Result};

/// Status posted right before the application runs.
pub const EXECUTING_STATUS: &str = "Executing code";

/// Drives one worker instance: bootstrap, then relay.
pub struct Worker {
    manifest: WorkerManifest,
    outbox: Outbox,
    phase: LifecyclePhase,
}

impl Worker {
    /// Create a worker for `manifest` posting to `outbox`.
    pub fn new(manifest: WorkerManifest, outbox: Outbox) -> Self {
        Self {
            manifest,
            outbox,
            phase: LifecyclePhase::Uninitialized,
        }
    }

    /// Manifest being bootstrapped.
    pub fn manifest(&self) -> &WorkerManifest {
        &self.manifest
    }

    /// Current phase.
    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// Move to the next phase. Only the immediate successor is accepted.
    pub fn advance(&mut self, next: LifecyclePhase) -> Result<()> {
        if !self.phase.can_advance_to(next) {
            return Err(Error::PhaseTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!("Worker phase {} -> {}", self.phase, next);
        self.phase = next;
        Ok(())
    }

    /// Load the runtime, install packages, execute the application and post
    /// the render payload.
    ///
    /// On failure a terminal error message naming the failed phase is posted
    /// and nothing else follows.
    pub async fn bootstrap<L: RuntimeLoader>(&mut self, loader: L) -> Result<Relay<L::Runtime>> {
        if self.phase != LifecyclePhase::Uninitialized {
            return Err(Error::PhaseTransition {
                from: self.phase,
                to: LifecyclePhase::LoadingRuntime,
            });
        }

        match self.try_bootstrap(loader).await {
            Ok(relay) => Ok(relay),
            Err(err) => {
                tracing::error!("Worker bootstrap failed during {}: {}", self.phase, err);
                if let Err(post_err) = self.outbox.error(self.phase, err.to_string()) {
                    tracing::warn!("Could not report bootstrap failure: {}", post_err);
                }
                Err(err)
            }
        }
    }

    /// Bootstrap, then relay `inbound` until the host goes away.
    pub async fn run<L: RuntimeLoader>(
        mut self,
        loader: L,
        inbound: mpsc::Receiver<InboundMessage>,
    ) -> Result<()> {
        let relay = self.bootstrap(loader).await?;
        tracing::info!("Worker ready for document {}", self.manifest.worker.name);
        relay.run(inbound).await
    }

    async fn try_bootstrap<L: RuntimeLoader>(&mut self, loader: L) -> Result<Relay<L::Runtime>> {
        self.advance(LifecyclePhase::LoadingRuntime)?;
        self.outbox.status(format!("Loading {}", loader.label()))?;
        let mut runtime = loader.load(self.outbox.patch_sink()).await?;

        self.advance(LifecyclePhase::InstallingPackages)?;
        for package in &self.manifest.packages {
            self.outbox
                .status(format!("Installing {}", package.display_name()))?;
            runtime.install(package).await?;
        }

        self.advance(LifecyclePhase::Executing)?;
        self.outbox.status(EXECUTING_STATUS)?;
        let payload = runtime.execute(&self.manifest.application).await?;

        self.outbox.render(payload)?;
        self.advance(LifecyclePhase::Ready)?;
        Ok(Relay::new(runtime, self.outbox.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_bundle::{ApplicationDescriptor, WorkerManifest};

    fn worker() -> Worker {
        let (outbox, _rx) = Outbox::channel();
        let manifest = WorkerManifest::new("demo", ApplicationDescriptor::new("app"));
        Worker::new(manifest, outbox)
    }

    #[test]
    fn test_phases_advance_in_order() {
        let mut worker = worker();
        assert_eq!(worker.phase(), LifecyclePhase::Uninitialized);

        worker.advance(LifecyclePhase::LoadingRuntime).unwrap();
        worker.advance(LifecyclePhase::InstallingPackages).unwrap();
        worker.advance(LifecyclePhase::Executing).unwrap();
        worker.advance(LifecyclePhase::Ready).unwrap();
        assert_eq!(worker.phase(), LifecyclePhase::Ready);
    }

    #[test]
    fn test_backward_and_skipping_transitions_rejected() {
        let mut worker = worker();
        assert!(matches!(
            worker.advance(LifecyclePhase::Executing),
            Err(Error::PhaseTransition { .. })
        ));

        worker.advance(LifecyclePhase::LoadingRuntime).unwrap();
        assert!(worker.advance(LifecyclePhase::LoadingRuntime).is_err());
        assert!(worker.advance(LifecyclePhase::Uninitialized).is_err());
        assert_eq!(worker.phase(), LifecyclePhase::LoadingRuntime);
    }
}
