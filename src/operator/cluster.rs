use async_trait::async_trait;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Pod, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;

use crate::controller::Error;
use crate::crd::NodeFeatureDiscovery;

/// Read-only view of the cluster used by the reconciler.
///
/// Every getter returns `Ok(None)` when the object does not exist, so callers can
/// tell "not created yet" apart from a failed request.
#[async_trait]
pub trait ClusterReader: Send + Sync {
    async fn get_instance(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<NodeFeatureDiscovery>, Error>;

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error>;

    async fn get_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceAccount>, Error>;

    async fn get_role(&self, namespace: &str, name: &str) -> Result<Option<Role>, Error>;

    async fn get_role_binding(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<RoleBinding>, Error>;

    async fn get_cluster_role(&self, name: &str) -> Result<Option<ClusterRole>, Error>;

    async fn get_cluster_role_binding(
        &self,
        name: &str,
    ) -> Result<Option<ClusterRoleBinding>, Error>;

    async fn get_config_map(&self, namespace: &str, name: &str)
        -> Result<Option<ConfigMap>, Error>;

    async fn get_daemon_set(&self, namespace: &str, name: &str)
        -> Result<Option<DaemonSet>, Error>;

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, Error>;

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, Error>;

    async fn get_security_context_constraints(
        &self,
        name: &str,
    ) -> Result<Option<DynamicObject>, Error>;
}

pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> KubeCluster {
        KubeCluster { client }
    }
}

async fn perform_get<T>(client: Client, name: &str, namespace: &str) -> Result<Option<T>, Error>
where
    T: Clone + DeserializeOwned + Debug,
    T: Resource<Scope = NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
{
    let api: Api<T> = Api::namespaced(client, namespace);
    let result = api.get_opt(name).await?;
    Ok(result)
}

async fn perform_cluster_get<T>(client: Client, name: &str) -> Result<Option<T>, Error>
where
    T: Clone + DeserializeOwned + Debug,
    T: Resource<Scope = ClusterResourceScope>,
    <T as Resource>::DynamicType: Default,
{
    let api: Api<T> = Api::all(client);
    let result = api.get_opt(name).await?;
    Ok(result)
}

#[async_trait]
impl ClusterReader for KubeCluster {
    async fn get_instance(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<NodeFeatureDiscovery>, Error> {
        perform_get(self.client.clone(), name, namespace).await
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error> {
        perform_cluster_get(self.client.clone(), name).await
    }

    async fn get_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceAccount>, Error> {
        perform_get(self.client.clone(), name, namespace).await
    }

    async fn get_role(&self, namespace: &str, name: &str) -> Result<Option<Role>, Error> {
        perform_get(self.client.clone(), name, namespace).await
    }

    async fn get_role_binding(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<RoleBinding>, Error> {
        perform_get(self.client.clone(), name, namespace).await
    }

    async fn get_cluster_role(&self, name: &str) -> Result<Option<ClusterRole>, Error> {
        perform_cluster_get(self.client.clone(), name).await
    }

    async fn get_cluster_role_binding(
        &self,
        name: &str,
    ) -> Result<Option<ClusterRoleBinding>, Error> {
        perform_cluster_get(self.client.clone(), name).await
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>, Error> {
        perform_get(self.client.clone(), name, namespace).await
    }

    async fn get_daemon_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DaemonSet>, Error> {
        perform_get(self.client.clone(), name, namespace).await
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, Error> {
        perform_get(self.client.clone(), name, namespace).await
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, Error> {
        perform_get(self.client.clone(), name, namespace).await
    }

    async fn get_security_context_constraints(
        &self,
        name: &str,
    ) -> Result<Option<DynamicObject>, Error> {
        // OpenShift-only type, so there is no k8s-openapi struct for it.
        let gvk = GroupVersionKind::gvk("security.openshift.io", "v1", "SecurityContextConstraints");
        let resource = ApiResource::from_gvk_with_plural(&gvk, "securitycontextconstraints");
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource);
        let result = api.get_opt(name).await?;
        Ok(result)
    }
}
