use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Pod, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use kube::core::DynamicObject;

use super::manifest::{Manifest, ResourceKind};

/// At most one resource of each supported kind, as decoded from one stage directory.
/// Kinds that did not appear in the directory stay `None`.
#[derive(Clone, Debug, Default)]
pub struct ResourceBundle {
    pub namespace: Option<Namespace>,
    pub service_account: Option<ServiceAccount>,
    pub role: Option<Role>,
    pub role_binding: Option<RoleBinding>,
    pub cluster_role: Option<ClusterRole>,
    pub cluster_role_binding: Option<ClusterRoleBinding>,
    pub config_map: Option<ConfigMap>,
    pub daemon_set: Option<DaemonSet>,
    pub pod: Option<Pod>,
    pub service: Option<Service>,
    pub security_context_constraints: Option<DynamicObject>,
}

impl ResourceBundle {
    /// Stores the manifest in its kind's slot. A second manifest of the same kind replaces the first.
    pub fn insert(&mut self, manifest: Manifest) -> ResourceKind {
        let kind = manifest.kind();
        match manifest {
            Manifest::Namespace(r) => self.namespace = Some(r),
            Manifest::ServiceAccount(r) => self.service_account = Some(r),
            Manifest::Role(r) => self.role = Some(r),
            Manifest::RoleBinding(r) => self.role_binding = Some(r),
            Manifest::ClusterRole(r) => self.cluster_role = Some(r),
            Manifest::ClusterRoleBinding(r) => self.cluster_role_binding = Some(r),
            Manifest::ConfigMap(r) => self.config_map = Some(r),
            Manifest::DaemonSet(r) => self.daemon_set = Some(r),
            Manifest::Pod(r) => self.pod = Some(r),
            Manifest::Service(r) => self.service = Some(r),
            Manifest::SecurityContextConstraints(r) => self.security_context_constraints = Some(r),
        };
        kind
    }
}
