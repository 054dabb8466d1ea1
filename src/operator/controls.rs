use futures::future::BoxFuture;
use futures::FutureExt;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::Pod;
use kube::core::ObjectMeta;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info};

use super::cluster::ClusterReader;
use super::manifest::ResourceKind;
use super::resources::ResourceBundle;
use crate::controller::Error;
use crate::crd::NodeFeatureDiscovery;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadinessStatus {
    Ready,
    NotReady,
}

impl From<bool> for ReadinessStatus {
    fn from(ready: bool) -> Self {
        if ready {
            ReadinessStatus::Ready
        } else {
            ReadinessStatus::NotReady
        }
    }
}

/// What a control function sees: the cluster and the instance being reconciled.
pub struct ControlContext {
    pub cluster: Arc<dyn ClusterReader>,
    pub instance: Arc<NodeFeatureDiscovery>,
}

impl ControlContext {
    /// Namespace to look a namespaced resource up in. The manifest's own namespace wins,
    /// otherwise the resource lives next to the managed instance.
    pub fn namespace_for(&self, meta: &ObjectMeta) -> String {
        meta.namespace
            .clone()
            .or_else(|| self.instance.namespace())
            .unwrap_or_default()
    }
}

pub type ControlFn = for<'a> fn(
    &'a ControlContext,
    &'a ResourceBundle,
) -> BoxFuture<'a, Result<ReadinessStatus, Error>>;

/// A readiness check bound to one decoded resource of the stage's bundle.
#[derive(Clone, Copy)]
pub struct Control {
    pub kind: ResourceKind,
    pub check: ControlFn,
}

impl Control {
    pub fn for_kind(kind: ResourceKind) -> Control {
        let check: ControlFn = match kind {
            ResourceKind::Namespace => namespace,
            ResourceKind::ServiceAccount => service_account,
            ResourceKind::Role => role,
            ResourceKind::RoleBinding => role_binding,
            ResourceKind::ClusterRole => cluster_role,
            ResourceKind::ClusterRoleBinding => cluster_role_binding,
            ResourceKind::ConfigMap => config_map,
            ResourceKind::DaemonSet => daemon_set,
            ResourceKind::Pod => pod,
            ResourceKind::Service => service,
            ResourceKind::SecurityContextConstraints => security_context_constraints,
        };
        Control { kind, check }
    }
}

impl std::fmt::Debug for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Control").field("kind", &self.kind).finish()
    }
}

fn required<T>(resource: Option<&T>, kind: ResourceKind) -> Result<&T, Error> {
    resource.ok_or(Error::ResourceMissingFromBundle(kind.as_str()))
}

fn namespace<'a>(
    ctx: &'a ControlContext,
    res: &'a ResourceBundle,
) -> BoxFuture<'a, Result<ReadinessStatus, Error>> {
    async move {
        let obj = required(res.namespace.as_ref(), ResourceKind::Namespace)?;
        let found = ctx.cluster.get_namespace(&obj.name_any()).await?;
        Ok(ReadinessStatus::from(found.is_some()))
    }
    .boxed()
}

fn service_account<'a>(
    ctx: &'a ControlContext,
    res: &'a ResourceBundle,
) -> BoxFuture<'a, Result<ReadinessStatus, Error>> {
    async move {
        let obj = required(res.service_account.as_ref(), ResourceKind::ServiceAccount)?;
        let found = ctx
            .cluster
            .get_service_account(&ctx.namespace_for(&obj.metadata), &obj.name_any())
            .await?;
        Ok(ReadinessStatus::from(found.is_some()))
    }
    .boxed()
}

fn role<'a>(
    ctx: &'a ControlContext,
    res: &'a ResourceBundle,
) -> BoxFuture<'a, Result<ReadinessStatus, Error>> {
    async move {
        let obj = required(res.role.as_ref(), ResourceKind::Role)?;
        let found = ctx
            .cluster
            .get_role(&ctx.namespace_for(&obj.metadata), &obj.name_any())
            .await?;
        Ok(ReadinessStatus::from(found.is_some()))
    }
    .boxed()
}

fn role_binding<'a>(
    ctx: &'a ControlContext,
    res: &'a ResourceBundle,
) -> BoxFuture<'a, Result<ReadinessStatus, Error>> {
    async move {
        let obj = required(res.role_binding.as_ref(), ResourceKind::RoleBinding)?;
        let found = ctx
            .cluster
            .get_role_binding(&ctx.namespace_for(&obj.metadata), &obj.name_any())
            .await?;
        Ok(ReadinessStatus::from(found.is_some()))
    }
    .boxed()
}

fn cluster_role<'a>(
    ctx: &'a ControlContext,
    res: &'a ResourceBundle,
) -> BoxFuture<'a, Result<ReadinessStatus, Error>> {
    async move {
        let obj = required(res.cluster_role.as_ref(), ResourceKind::ClusterRole)?;
        let found = ctx.cluster.get_cluster_role(&obj.name_any()).await?;
        Ok(ReadinessStatus::from(found.is_some()))
    }
    .boxed()
}

fn cluster_role_binding<'a>(
    ctx: &'a ControlContext,
    res: &'a ResourceBundle,
) -> BoxFuture<'a, Result<ReadinessStatus, Error>> {
    async move {
        let obj = required(
            res.cluster_role_binding.as_ref(),
            ResourceKind::ClusterRoleBinding,
        )?;
        let found = ctx.cluster.get_cluster_role_binding(&obj.name_any()).await?;
        Ok(ReadinessStatus::from(found.is_some()))
    }
    .boxed()
}

fn config_map<'a>(
    ctx: &'a ControlContext,
    res: &'a ResourceBundle,
) -> BoxFuture<'a, Result<ReadinessStatus, Error>> {
    async move {
        let obj = required(res.config_map.as_ref(), ResourceKind::ConfigMap)?;
        let found = ctx
            .cluster
            .get_config_map(&ctx.namespace_for(&obj.metadata), &obj.name_any())
            .await?;
        Ok(ReadinessStatus::from(found.is_some()))
    }
    .boxed()
}

fn service<'a>(
    ctx: &'a ControlContext,
    res: &'a ResourceBundle,
) -> BoxFuture<'a, Result<ReadinessStatus, Error>> {
    async move {
        let obj = required(res.service.as_ref(), ResourceKind::Service)?;
        let found = ctx
            .cluster
            .get_service(&ctx.namespace_for(&obj.metadata), &obj.name_any())
            .await?;
        Ok(ReadinessStatus::from(found.is_some()))
    }
    .boxed()
}

fn security_context_constraints<'a>(
    ctx: &'a ControlContext,
    res: &'a ResourceBundle,
) -> BoxFuture<'a, Result<ReadinessStatus, Error>> {
    async move {
        let obj = required(
            res.security_context_constraints.as_ref(),
            ResourceKind::SecurityContextConstraints,
        )?;
        let found = ctx
            .cluster
            .get_security_context_constraints(&obj.name_any())
            .await?;
        Ok(ReadinessStatus::from(found.is_some()))
    }
    .boxed()
}

fn daemon_set<'a>(
    ctx: &'a ControlContext,
    res: &'a ResourceBundle,
) -> BoxFuture<'a, Result<ReadinessStatus, Error>> {
    async move {
        let obj = required(res.daemon_set.as_ref(), ResourceKind::DaemonSet)?;
        let found = ctx
            .cluster
            .get_daemon_set(&ctx.namespace_for(&obj.metadata), &obj.name_any())
            .await?;
        Ok(daemon_set_status(found.as_ref()))
    }
    .boxed()
}

fn pod<'a>(
    ctx: &'a ControlContext,
    res: &'a ResourceBundle,
) -> BoxFuture<'a, Result<ReadinessStatus, Error>> {
    async move {
        let obj = required(res.pod.as_ref(), ResourceKind::Pod)?;
        let found = ctx
            .cluster
            .get_pod(&ctx.namespace_for(&obj.metadata), &obj.name_any())
            .await?;
        Ok(pod_status(found.as_ref()))
    }
    .boxed()
}

/// A DaemonSet with nothing to schedule counts as ready.
pub fn daemon_set_status(live: Option<&DaemonSet>) -> ReadinessStatus {
    let Some(ds) = live else {
        return ReadinessStatus::NotReady;
    };
    let Some(status) = ds.status.as_ref() else {
        debug!("DaemonSet {} has no status yet", ds.name_any());
        return ReadinessStatus::NotReady;
    };

    if status.desired_number_scheduled == 0 {
        info!("DaemonSet {} has no nodes to schedule on", ds.name_any());
        return ReadinessStatus::Ready;
    }
    if status.number_ready < status.desired_number_scheduled {
        debug!(
            "DaemonSet {} has {}/{} pods ready",
            ds.name_any(),
            status.number_ready,
            status.desired_number_scheduled
        );
        return ReadinessStatus::NotReady;
    }
    if status.number_unavailable.unwrap_or(0) > 0 {
        return ReadinessStatus::NotReady;
    }
    ReadinessStatus::Ready
}

pub fn pod_status(live: Option<&Pod>) -> ReadinessStatus {
    let ready = live
        .and_then(|p| p.status.as_ref())
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false);
    ready.into()
}
