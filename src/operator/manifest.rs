use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Pod, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use kube::core::{DynamicObject, ObjectMeta};
use serde::Deserialize;
use std::fmt;

/// Kinds the operator knows how to decode and check for readiness.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Namespace,
    ServiceAccount,
    Role,
    RoleBinding,
    ClusterRole,
    ClusterRoleBinding,
    ConfigMap,
    DaemonSet,
    Pod,
    Service,
    SecurityContextConstraints,
}

impl ResourceKind {
    pub fn from_label(label: &str) -> Option<ResourceKind> {
        let kind = match label {
            "Namespace" => ResourceKind::Namespace,
            "ServiceAccount" => ResourceKind::ServiceAccount,
            "Role" => ResourceKind::Role,
            "RoleBinding" => ResourceKind::RoleBinding,
            "ClusterRole" => ResourceKind::ClusterRole,
            "ClusterRoleBinding" => ResourceKind::ClusterRoleBinding,
            "ConfigMap" => ResourceKind::ConfigMap,
            "DaemonSet" => ResourceKind::DaemonSet,
            "Pod" => ResourceKind::Pod,
            "Service" => ResourceKind::Service,
            "SecurityContextConstraints" => ResourceKind::SecurityContextConstraints,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Namespace => "Namespace",
            ResourceKind::ServiceAccount => "ServiceAccount",
            ResourceKind::Role => "Role",
            ResourceKind::RoleBinding => "RoleBinding",
            ResourceKind::ClusterRole => "ClusterRole",
            ResourceKind::ClusterRoleBinding => "ClusterRoleBinding",
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::DaemonSet => "DaemonSet",
            ResourceKind::Pod => "Pod",
            ResourceKind::Service => "Service",
            ResourceKind::SecurityContextConstraints => "SecurityContextConstraints",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A manifest decoded into its typed resource.
#[derive(Clone, Debug)]
pub enum Manifest {
    Namespace(Namespace),
    ServiceAccount(ServiceAccount),
    Role(Role),
    RoleBinding(RoleBinding),
    ClusterRole(ClusterRole),
    ClusterRoleBinding(ClusterRoleBinding),
    ConfigMap(ConfigMap),
    DaemonSet(DaemonSet),
    Pod(Pod),
    Service(Service),
    SecurityContextConstraints(DynamicObject),
}

impl Manifest {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Manifest::Namespace(_) => ResourceKind::Namespace,
            Manifest::ServiceAccount(_) => ResourceKind::ServiceAccount,
            Manifest::Role(_) => ResourceKind::Role,
            Manifest::RoleBinding(_) => ResourceKind::RoleBinding,
            Manifest::ClusterRole(_) => ResourceKind::ClusterRole,
            Manifest::ClusterRoleBinding(_) => ResourceKind::ClusterRoleBinding,
            Manifest::ConfigMap(_) => ResourceKind::ConfigMap,
            Manifest::DaemonSet(_) => ResourceKind::DaemonSet,
            Manifest::Pod(_) => ResourceKind::Pod,
            Manifest::Service(_) => ResourceKind::Service,
            Manifest::SecurityContextConstraints(_) => ResourceKind::SecurityContextConstraints,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Manifest::Namespace(r) => &r.metadata,
            Manifest::ServiceAccount(r) => &r.metadata,
            Manifest::Role(r) => &r.metadata,
            Manifest::RoleBinding(r) => &r.metadata,
            Manifest::ClusterRole(r) => &r.metadata,
            Manifest::ClusterRoleBinding(r) => &r.metadata,
            Manifest::ConfigMap(r) => &r.metadata,
            Manifest::DaemonSet(r) => &r.metadata,
            Manifest::Pod(r) => &r.metadata,
            Manifest::Service(r) => &r.metadata,
            Manifest::SecurityContextConstraints(r) => &r.metadata,
        }
    }
}

#[derive(Debug)]
pub enum Decoded {
    Resource(Manifest),
    /// The root `kind` did not name a supported resource. Carries the label as found.
    Unrecognized(String),
}

/// Only the root-level type metadata; everything else in the document is ignored.
#[derive(Deserialize)]
struct TypeProbe {
    #[serde(default)]
    kind: String,
}

pub fn decode(raw: &[u8]) -> Result<Decoded, serde_yaml::Error> {
    let probe: TypeProbe = serde_yaml::from_slice(raw)?;
    let kind = match ResourceKind::from_label(&probe.kind) {
        Some(kind) => kind,
        None => return Ok(Decoded::Unrecognized(probe.kind)),
    };

    let manifest = match kind {
        ResourceKind::Namespace => Manifest::Namespace(serde_yaml::from_slice(raw)?),
        ResourceKind::ServiceAccount => Manifest::ServiceAccount(serde_yaml::from_slice(raw)?),
        ResourceKind::Role => Manifest::Role(serde_yaml::from_slice(raw)?),
        ResourceKind::RoleBinding => Manifest::RoleBinding(serde_yaml::from_slice(raw)?),
        ResourceKind::ClusterRole => Manifest::ClusterRole(serde_yaml::from_slice(raw)?),
        ResourceKind::ClusterRoleBinding => {
            Manifest::ClusterRoleBinding(serde_yaml::from_slice(raw)?)
        }
        ResourceKind::ConfigMap => Manifest::ConfigMap(serde_yaml::from_slice(raw)?),
        ResourceKind::DaemonSet => Manifest::DaemonSet(serde_yaml::from_slice(raw)?),
        ResourceKind::Pod => Manifest::Pod(serde_yaml::from_slice(raw)?),
        ResourceKind::Service => Manifest::Service(serde_yaml::from_slice(raw)?),
        ResourceKind::SecurityContextConstraints => {
            Manifest::SecurityContextConstraints(serde_yaml::from_slice(raw)?)
        }
    };
    Ok(Decoded::Resource(manifest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_daemon_set() {
        let raw = br#"
apiVersion: apps/v1
kind: DaemonSet
metadata:
  name: nfd-worker
  namespace: node-feature-discovery
spec:
  selector:
    matchLabels:
      app: nfd-worker
  template:
    metadata:
      labels:
        app: nfd-worker
    spec:
      containers:
        - name: nfd-worker
          image: nfd:latest
"#;
        match decode(raw).unwrap() {
            Decoded::Resource(Manifest::DaemonSet(ds)) => {
                assert_eq!(ds.metadata.name.as_deref(), Some("nfd-worker"));
                assert_eq!(
                    ds.metadata.namespace.as_deref(),
                    Some("node-feature-discovery")
                );
            }
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn kind_comes_from_document_root_only() {
        // A nested `kind:` and a commented one must not be picked up.
        let raw = br#"
# kind: DaemonSet
apiVersion: rbac.authorization.k8s.io/v1
kind: RoleBinding
metadata:
  name: nfd-worker
roleRef:
  apiGroup: rbac.authorization.k8s.io
  kind: Role
  name: nfd-worker
subjects:
  - kind: ServiceAccount
    name: nfd-worker
"#;
        let decoded = decode(raw).unwrap();
        match decoded {
            Decoded::Resource(m) => assert_eq!(m.kind(), ResourceKind::RoleBinding),
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn unsupported_kind_is_not_an_error() {
        let raw = b"apiVersion: example.com/v1\nkind: Frobnicator\nmetadata:\n  name: x\n";
        match decode(raw).unwrap() {
            Decoded::Unrecognized(kind) => assert_eq!(kind, "Frobnicator"),
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn missing_kind_is_unrecognized() {
        let raw = b"apiVersion: v1\nmetadata:\n  name: x\n";
        match decode(raw).unwrap() {
            Decoded::Unrecognized(kind) => assert!(kind.is_empty()),
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn schema_mismatch_is_a_decode_error() {
        let raw = b"apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: x\ndata: [1, 2, 3]\n";
        assert!(decode(raw).is_err());
    }

    #[test]
    fn security_context_constraints_decode_dynamically() {
        let raw = br#"
apiVersion: security.openshift.io/v1
kind: SecurityContextConstraints
metadata:
  name: nfd-worker
allowHostNetwork: true
"#;
        match decode(raw).unwrap() {
            Decoded::Resource(Manifest::SecurityContextConstraints(scc)) => {
                assert_eq!(scc.metadata.name.as_deref(), Some("nfd-worker"));
                assert_eq!(scc.data["allowHostNetwork"], serde_json::json!(true));
            }
            other => panic!("unexpected decode result: {:?}", other),
        }
    }
}
