use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct OperandSpec {
    pub namespace: Option<String>,
    pub image: Option<String>,
    pub image_pull_policy: Option<String>,
    pub service_port: Option<i32>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapSpec {
    pub config_data: Option<String>,
}

/// Desired state of a node-feature-discovery deployment. The operand
/// manifests themselves are read from the operator's assets directory.
#[derive(CustomResource, Serialize, Deserialize, Clone, PartialEq, Debug, JsonSchema, Default)]
#[kube(group = "nfd.kubernetes.io", version = "v1", kind = "NodeFeatureDiscovery")]
#[kube(plural = "nodefeaturediscoveries", shortname = "nfd", namespaced)]
#[serde(rename_all = "camelCase")]
pub struct NodeFeatureDiscoverySpec {
    pub operand: Option<OperandSpec>,
    pub instance: Option<String>,
    pub extra_label_ns: Option<Vec<String>>,
    pub worker_config: Option<ConfigMapSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn crd_is_namespaced_under_nfd_group() {
        let crd = NodeFeatureDiscovery::crd();
        assert_eq!(crd.spec.group, "nfd.kubernetes.io");
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(crd.spec.names.kind, "NodeFeatureDiscovery");
        assert_eq!(crd.spec.names.plural, "nodefeaturediscoveries");
    }

    #[test]
    fn spec_uses_camel_case_on_the_wire() {
        let spec: NodeFeatureDiscoverySpec = serde_json::from_value(serde_json::json!({
            "operand": { "image": "nfd:v0.10", "servicePort": 12000 },
            "extraLabelNs": ["example.com"],
            "workerConfig": { "configData": "core: {}" }
        }))
        .unwrap();
        let operand = spec.operand.unwrap();
        assert_eq!(operand.service_port, Some(12000));
        assert_eq!(operand.image.as_deref(), Some("nfd:v0.10"));
        assert_eq!(spec.extra_label_ns, Some(vec!["example.com".to_string()]));
        assert_eq!(
            spec.worker_config.unwrap().config_data.as_deref(),
            Some("core: {}")
        );
    }
}
