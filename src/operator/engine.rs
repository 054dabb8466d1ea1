use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::info;

use super::stage::Stage;
use super::stepper::Stepper;
use crate::controller::Error;

/// Identity of a managed instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> ObjectKey {
        ObjectKey {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn from_resource<T: kube::ResourceExt>(resource: &T) -> ObjectKey {
        ObjectKey::new(resource.namespace().unwrap_or_default(), resource.name_any())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Holds the stage list, built once from the manifest directories on first use,
/// and one stepper per managed instance.
pub struct Engine {
    stage_dirs: Vec<PathBuf>,
    stages: OnceCell<Arc<[Stage]>>,
    steppers: Mutex<HashMap<ObjectKey, Arc<Mutex<Stepper>>>>,
}

impl Engine {
    pub fn new(stage_dirs: Vec<PathBuf>) -> Engine {
        Engine {
            stage_dirs,
            stages: OnceCell::new(),
            steppers: Mutex::new(HashMap::new()),
        }
    }

    /// An engine whose stages are already built.
    #[cfg(test)]
    pub fn with_stages(stages: Vec<Stage>) -> Engine {
        Engine {
            stage_dirs: Vec::new(),
            stages: OnceCell::new_with(Some(stages.into())),
            steppers: Mutex::new(HashMap::new()),
        }
    }

    /// Builds the stages on first call. A failed build is not cached, so the
    /// next caller retries it.
    pub async fn stages(&self) -> Result<Arc<[Stage]>, Error> {
        let stages = self
            .stages
            .get_or_try_init(|| async {
                // Manifest reads are blocking and happen once per process.
                let dirs = self.stage_dirs.clone();
                let stages = tokio::task::spawn_blocking(move || {
                    dirs.iter()
                        .map(|dir| {
                            info!("Loading stage from {}", dir.display());
                            Stage::build(dir)
                        })
                        .collect::<Result<Vec<_>, Error>>()
                })
                .await??;
                Ok::<Arc<[Stage]>, Error>(stages.into())
            })
            .await?;
        Ok(Arc::clone(stages))
    }

    /// The stepper for `key`, created on the first reconcile of that instance.
    pub async fn stepper(&self, key: &ObjectKey) -> Result<Arc<Mutex<Stepper>>, Error> {
        let stages = self.stages().await?;
        let mut steppers = self.steppers.lock().await;
        let stepper = steppers
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Stepper::new(stages))));
        Ok(Arc::clone(stepper))
    }

    /// Drops the stepper of an instance that no longer exists.
    pub async fn forget(&self, key: &ObjectKey) {
        if self.steppers.lock().await.remove(key).is_some() {
            info!("Released stepper for {}", key);
        }
    }

    pub async fn tracked(&self) -> usize {
        self.steppers.lock().await.len()
    }
}
