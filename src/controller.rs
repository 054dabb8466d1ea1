use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{ConfigMap, Pod, Service, ServiceAccount};
use kube::core::ResourceExt;
use kube::runtime::controller::{self, Action};
use kube::runtime::reflector::ObjectRef;
use kube::{Api, Client};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use futures::StreamExt;
use kube::runtime::{controller::Controller, watcher, Config};

use crate::crd::NodeFeatureDiscovery;
use crate::operator::{ClusterReader, Engine, KubeCluster, ObjectKey};

#[derive(Debug, Error)]
pub enum Error {
    #[error("KubeRequestFailed: {0}")]
    Kube(#[from] kube::Error),
    #[error("UnableToSerializeObject: {0}")]
    UnableToSerializeObject(#[from] serde_json::Error),
    #[error("UnableToReadManifest {}: {source}", .path.display())]
    UnableToReadManifest {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("UnableToDecodeManifest {}: {source}", .path.display())]
    UnableToDecodeManifest {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("ManifestMissingName: {}", .0.display())]
    ManifestMissingName(PathBuf),
    #[error("ResourceNotReady: {kind} in stage {stage}")]
    ResourceNotReady { stage: String, kind: &'static str },
    #[error("ResourceMissingFromBundle: {0}")]
    ResourceMissingFromBundle(&'static str),
    #[error("StepperNotInitialized")]
    StepperNotInitialized,
    #[error("StepperConverged")]
    StepperConverged,
    #[error("Cancelled")]
    Cancelled,
    #[error("StageBuildAborted: {0}")]
    StageBuildAborted(#[from] tokio::task::JoinError),
}

/// How a reconcile that did not fail ended. Neither outcome is requeued; every
/// `Err` from [`reconcile_request`] is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Every stage reported ready.
    Converged,
    /// The instance is gone. Owned resources are left to garbage collection.
    Deleted,
}

#[derive(Clone, Debug)]
pub struct ReconcileConfig {
    pub not_ready_requeue: Duration,
    pub error_requeue: Duration,
    pub reconcile_timeout: Duration,
}

pub struct Context {
    pub cluster: Arc<dyn ClusterReader>,
    pub engine: Engine,
    pub config: ReconcileConfig,
}

/// Fetches the instance behind `key` and steps its stages until all of them are
/// ready or one of them is not.
pub async fn reconcile_request(
    ctx: &Context,
    key: &ObjectKey,
    cancel: &CancellationToken,
) -> Result<Outcome, Error> {
    info!("Fetching NodeFeatureDiscovery {}", key);
    let fetched = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        r = ctx.cluster.get_instance(&key.namespace, &key.name) => r,
    };

    let instance = match fetched {
        Ok(Some(instance)) => instance,
        Ok(None) => {
            info!("NodeFeatureDiscovery {} has been deleted", key);
            ctx.engine.forget(key).await;
            return Ok(Outcome::Deleted);
        }
        Err(e) => {
            warn!("Unable to read NodeFeatureDiscovery {}: {}", key, e);
            return Err(e);
        }
    };

    let stepper = ctx.engine.stepper(key).await?;
    let mut stepper = stepper.lock().await;
    stepper.initialize(Arc::new(instance));

    while !stepper.is_converged() {
        if let Err(e) = stepper.step(&ctx.cluster, cancel).await {
            debug!(
                "{} stopped at stage {} ({:?})",
                key,
                stepper.cursor(),
                stepper.phase()
            );
            return Err(e);
        }
    }

    info!("NodeFeatureDiscovery {} converged", key);
    Ok(Outcome::Converged)
}

async fn reconcile(nfd: Arc<NodeFeatureDiscovery>, ctx: Arc<Context>) -> Result<Action, Error> {
    let key = ObjectKey::from_resource(nfd.as_ref());
    let cancel = CancellationToken::new();

    // On the deadline the token is cancelled and the request unwinds through
    // its own cancellation checks.
    let request = reconcile_request(&ctx, &key, &cancel);
    tokio::pin!(request);
    let result = tokio::select! {
        r = &mut request => r,
        _ = tokio::time::sleep(ctx.config.reconcile_timeout) => {
            warn!("Reconcile of {} timed out", key);
            cancel.cancel();
            request.await
        }
    };

    match result? {
        Outcome::Converged => Ok(Action::await_change()),
        Outcome::Deleted => {
            info!("{} instances still tracked", ctx.engine.tracked().await);
            Ok(Action::await_change())
        }
    }
}

/// Not-ready resources and timeouts are part of normal convergence and are
/// retried quickly. Anything else waits for the longer error delay.
fn error_policy(nfd: Arc<NodeFeatureDiscovery>, error: &Error, ctx: Arc<Context>) -> Action {
    match error {
        Error::ResourceNotReady { .. } | Error::Cancelled => {
            info!("{} not ready yet: {}", nfd.name_any(), error);
            Action::requeue(ctx.config.not_ready_requeue)
        }
        Error::Kube(_) => {
            warn!("{} reconcile interrupted: {}", nfd.name_any(), error);
            Action::requeue(ctx.config.error_requeue)
        }
        _ => {
            error!("{} reconcile failed: {}", nfd.name_any(), error);
            Action::requeue(ctx.config.error_requeue)
        }
    }
}

/// Logs what the controller stream yields. The controller never calls
/// `reconcile` for an object that left its store, so deleted instances are
/// released here.
async fn handle_controller_event(
    ctx: &Context,
    res: Result<
        (ObjectRef<NodeFeatureDiscovery>, Action),
        controller::Error<Error, watcher::Error>,
    >,
) {
    match res {
        Ok((o, a)) => {
            info!("reconcile {} complete for {:?}", o.name, a);
        }
        Err(e) => match e {
            controller::Error::ObjectNotFound(obj_ref) => {
                let key = ObjectKey::new(obj_ref.namespace.unwrap_or_default(), obj_ref.name);
                info!("NodeFeatureDiscovery {} is gone", key);
                ctx.engine.forget(&key).await;
            }
            controller::Error::ReconcilerFailed(err, obj_ref) => {
                debug!("reconcile of {} failed: {}", obj_ref.name, err)
            }
            controller::Error::QueueError(queue_error) => match queue_error {
                watcher::Error::WatchError(watch_error) => {
                    if watch_error.code != 410 && watch_error.reason != *"Expired" {
                        warn!("reconcile failed: {:?}", watch_error)
                    };
                }
                _ => warn!("reconcile failed: {:?}", queue_error),
            },
            _ => warn!("reconcile failed: {:?}", e),
        },
    }
}

pub async fn run(
    stage_dirs: Vec<PathBuf>,
    config: ReconcileConfig,
    concurrency: u16,
) -> Result<(), Error> {
    let client = Client::try_default().await?;
    let api: Api<NodeFeatureDiscovery> = Api::all(client.clone());

    let context = Arc::new(Context {
        cluster: Arc::new(KubeCluster::new(client.clone())),
        engine: Engine::new(stage_dirs),
        config,
    });

    let controller_config = Config::default().concurrency(concurrency);

    Controller::new(api, watcher::Config::default())
        .owns(
            Api::<DaemonSet>::all(client.clone()),
            watcher::Config::default(),
        )
        .owns(Api::<Service>::all(client.clone()), watcher::Config::default())
        .owns(
            Api::<ServiceAccount>::all(client.clone()),
            watcher::Config::default(),
        )
        .owns(Api::<Pod>::all(client.clone()), watcher::Config::default())
        .owns(Api::<ConfigMap>::all(client), watcher::Config::default())
        .with_config(controller_config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, context.clone())
        .for_each(|res| {
            let context = context.clone();
            async move { handle_controller_event(&context, res).await }
        })
        .await;

    info!("Controller terminated");

    Ok(())
}
