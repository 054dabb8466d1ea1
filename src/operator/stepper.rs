use kube::ResourceExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::cluster::ClusterReader;
use super::controls::{ControlContext, ReadinessStatus};
use super::stage::Stage;
use crate::controller::Error;
use crate::crd::NodeFeatureDiscovery;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No instance bound yet.
    Idle,
    Stepping,
    Converged,
    /// The last step hit a not-ready resource or an error.
    Blocked,
}

/// Walks the shared stage list for one managed instance.
///
/// The stages are read-only and shared by every stepper; the cursor and the
/// bound instance belong to this stepper alone.
pub struct Stepper {
    stages: Arc<[Stage]>,
    instance: Option<Arc<NodeFeatureDiscovery>>,
    cursor: usize,
    blocked: bool,
}

impl Stepper {
    pub fn new(stages: Arc<[Stage]>) -> Stepper {
        Stepper {
            stages,
            instance: None,
            cursor: 0,
            blocked: false,
        }
    }

    /// Binds `instance` and rewinds to the first stage.
    pub fn initialize(&mut self, instance: Arc<NodeFeatureDiscovery>) {
        self.instance = Some(instance);
        self.cursor = 0;
        self.blocked = false;
    }

    /// Runs every control of the current stage in order, stopping at the first
    /// one that is not ready or fails. The cursor only advances when all of them
    /// report ready.
    pub async fn step(
        &mut self,
        cluster: &Arc<dyn ClusterReader>,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let instance = self.instance.clone().ok_or(Error::StepperNotInitialized)?;
        let stages = Arc::clone(&self.stages);
        let stage = stages.get(self.cursor).ok_or(Error::StepperConverged)?;

        let ctx = ControlContext {
            cluster: Arc::clone(cluster),
            instance,
        };

        debug!(
            "Stepping stage {} ({} controls) for {}",
            stage.name,
            stage.controls.len(),
            ctx.instance.name_any()
        );

        for control in &stage.controls {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled),
                r = (control.check)(&ctx, &stage.bundle) => r,
            };

            match result {
                Ok(ReadinessStatus::Ready) => {}
                Ok(ReadinessStatus::NotReady) => {
                    self.blocked = true;
                    return Err(Error::ResourceNotReady {
                        stage: stage.name.clone(),
                        kind: control.kind.as_str(),
                    });
                }
                Err(e) => {
                    self.blocked = true;
                    return Err(e);
                }
            };
        }

        self.cursor += 1;
        info!("Stage {} is ready", stage.name);
        Ok(())
    }

    pub fn is_converged(&self) -> bool {
        self.cursor == self.stages.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn phase(&self) -> Phase {
        if self.instance.is_none() {
            Phase::Idle
        } else if self.blocked {
            Phase::Blocked
        } else if self.is_converged() {
            Phase::Converged
        } else {
            Phase::Stepping
        }
    }
}
