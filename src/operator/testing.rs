//! In-memory `ClusterReader` for unit tests.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Pod, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use kube::core::DynamicObject;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use super::cluster::ClusterReader;
use super::manifest::{decode, Decoded};
use super::stage::Stage;
use crate::controller::Error;
use crate::crd::{NodeFeatureDiscovery, NodeFeatureDiscoverySpec};

pub fn instance(namespace: &str, name: &str) -> NodeFeatureDiscovery {
    let mut nfd = NodeFeatureDiscovery::new(name, NodeFeatureDiscoverySpec::default());
    nfd.metadata.namespace = Some(namespace.into());
    nfd
}

/// Builds a stage straight from manifest text, bypassing the filesystem.
pub fn stage(name: &str, manifests: &[&str]) -> Stage {
    let decoded = manifests
        .iter()
        .map(|m| match decode(m.as_bytes()).unwrap() {
            Decoded::Resource(manifest) => manifest,
            Decoded::Unrecognized(kind) => panic!("unsupported kind in test manifest: {}", kind),
        })
        .collect::<Vec<_>>();
    Stage::from_manifests(name, decoded)
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a subscriber that records info-level output and returns it
/// alongside the result.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
    (result, logs)
}

/// Objects are stored as JSON under `Kind/namespace/name` (namespace empty for
/// cluster-scoped kinds). Every lookup is recorded in call order.
#[derive(Default)]
pub struct FakeCluster {
    objects: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<String>>,
    instance_error: Mutex<Option<u16>>,
    instance_stalled: Mutex<bool>,
}

impl FakeCluster {
    pub fn insert(&self, kind: &str, namespace: Option<&str>, name: &str, object: Value) {
        let key = format!("{}/{}/{}", kind, namespace.unwrap_or_default(), name);
        self.objects.lock().unwrap().insert(key, object);
    }

    pub fn insert_instance(&self, nfd: &NodeFeatureDiscovery) {
        let namespace = nfd.metadata.namespace.clone().unwrap_or_default();
        let name = nfd.metadata.name.clone().unwrap_or_default();
        self.insert(
            "NodeFeatureDiscovery",
            Some(&namespace),
            &name,
            serde_json::to_value(nfd).unwrap(),
        );
    }

    /// Makes every instance fetch fail with an API error carrying `code`.
    pub fn fail_instance_fetch(&self, code: u16) {
        *self.instance_error.lock().unwrap() = Some(code);
    }

    /// Makes every instance fetch hang forever.
    pub fn stall_instance_fetch(&self) {
        *self.instance_stalled.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn lookup<T: DeserializeOwned>(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<T>, Error> {
        let key = format!("{}/{}/{}", kind, namespace, name);
        self.calls.lock().unwrap().push(key.clone());
        match self.objects.lock().unwrap().get(&key) {
            Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ClusterReader for FakeCluster {
    async fn get_instance(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<NodeFeatureDiscovery>, Error> {
        let stalled = *self.instance_stalled.lock().unwrap();
        if stalled {
            futures::future::pending::<()>().await;
        }
        if let Some(code) = *self.instance_error.lock().unwrap() {
            return Err(Error::Kube(kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".into(),
                message: "injected failure".into(),
                reason: "InternalError".into(),
                code,
            })));
        }
        self.lookup("NodeFeatureDiscovery", namespace, name)
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error> {
        self.lookup("Namespace", "", name)
    }

    async fn get_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceAccount>, Error> {
        self.lookup("ServiceAccount", namespace, name)
    }

    async fn get_role(&self, namespace: &str, name: &str) -> Result<Option<Role>, Error> {
        self.lookup("Role", namespace, name)
    }

    async fn get_role_binding(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<RoleBinding>, Error> {
        self.lookup("RoleBinding", namespace, name)
    }

    async fn get_cluster_role(&self, name: &str) -> Result<Option<ClusterRole>, Error> {
        self.lookup("ClusterRole", "", name)
    }

    async fn get_cluster_role_binding(
        &self,
        name: &str,
    ) -> Result<Option<ClusterRoleBinding>, Error> {
        self.lookup("ClusterRoleBinding", "", name)
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>, Error> {
        self.lookup("ConfigMap", namespace, name)
    }

    async fn get_daemon_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DaemonSet>, Error> {
        self.lookup("DaemonSet", namespace, name)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, Error> {
        self.lookup("Pod", namespace, name)
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, Error> {
        self.lookup("Service", namespace, name)
    }

    async fn get_security_context_constraints(
        &self,
        name: &str,
    ) -> Result<Option<DynamicObject>, Error> {
        self.lookup("SecurityContextConstraints", "", name)
    }
}
