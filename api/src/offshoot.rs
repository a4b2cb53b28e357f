//! Offshoot holds the templates users provide for the pods and services a database owns.

use k8s_openapi::api::core::v1 as core;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::Labels;

/// PartialObjectMeta is the subset of object metadata templates may set.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartialObjectMeta {
    /// Labels merged into the generated object's labels.
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
    /// Annotations merged into the generated object's annotations.
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub annotations: Labels,
}

/// PodTemplateSpec describes the pods the database workload creates.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PodTemplateSpec {
    /// Metadata applied to every pod.
    #[serde(default)]
    pub metadata: PartialObjectMeta,
    /// Specification of the pods.
    #[serde(default)]
    pub spec: PodSpec,
}

/// PodSpec is the user-tunable part of a pod specification.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// Containers merged over the generated containers by name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<core::Container>,
    /// Init containers merged over the generated init containers by name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init_containers: Vec<core::Container>,
    /// Extra volumes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<core::Volume>,
    /// Node selector for scheduling.
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub node_selector: Labels,
    /// Service account the pods run as.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
    /// Pod level security options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_context: Option<core::PodSecurityContext>,
    /// Scheduling constraints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity: Option<core::Affinity>,
    /// Tolerations for node taints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<core::Toleration>,
    /// Image pull secrets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_pull_secrets: Vec<core::LocalObjectReference>,
    /// Priority class of the pods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_class_name: Option<String>,
    /// Grace period for pod termination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination_grace_period_seconds: Option<i64>,
    /// PodPlacementPolicy references a placement policy object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_placement_policy: Option<core::LocalObjectReference>,
}

impl PodSpec {
    /// Returns the container named `name`, if any.
    pub fn container(&self, name: &str) -> Option<&core::Container> {
        get_container_by_name(&self.containers, name)
    }

    /// Returns the init container named `name`, if any.
    pub fn init_container(&self, name: &str) -> Option<&core::Container> {
        get_container_by_name(&self.init_containers, name)
    }
}

/// Returns the container named `name` in `containers`.
pub fn get_container_by_name<'a>(
    containers: &'a [core::Container],
    name: &str,
) -> Option<&'a core::Container> {
    containers.iter().find(|c| c.name == name)
}

/// Replaces the container with the same name as `container`, or appends it.
pub fn upsert_container(containers: &mut Vec<core::Container>, container: core::Container) {
    match containers.iter_mut().find(|c| c.name == container.name) {
        Some(existing) => *existing = container,
        None => containers.push(container),
    }
}

/// Returns the container named `name`, inserting an empty one when missing.
pub(crate) fn container_mut<'a>(
    containers: &'a mut Vec<core::Container>,
    name: &str,
) -> &'a mut core::Container {
    let idx = match containers.iter().position(|c| c.name == name) {
        Some(idx) => idx,
        None => {
            containers.push(core::Container {
                name: name.to_string(),
                ..Default::default()
            });
            containers.len().saturating_sub(1)
        }
    };
    &mut containers[idx]
}

/// ServiceTemplateSpec describes a service the database exposes.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTemplateSpec {
    /// Metadata applied to the service.
    #[serde(default)]
    pub metadata: PartialObjectMeta,
    /// Specification of the service.
    #[serde(default)]
    pub spec: ServiceSpec,
}

/// ServiceSpec is the user-tunable part of a service specification.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Service type, such as ClusterIP or LoadBalancer.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    /// Ports merged over the generated ports by name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<core::ServicePort>,
    /// Cluster IP to request.
    #[serde(rename = "clusterIP", skip_serializing_if = "Option::is_none")]
    pub cluster_ip: Option<String>,
    /// External IPs routed to the service.
    #[serde(rename = "externalIPs", default, skip_serializing_if = "Vec::is_empty")]
    pub external_ips: Vec<String>,
    /// Load balancer IP to request.
    #[serde(rename = "loadBalancerIP", skip_serializing_if = "Option::is_none")]
    pub load_balancer_ip: Option<String>,
    /// Source ranges allowed through a load balancer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub load_balancer_source_ranges: Vec<String>,
    /// External traffic policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_traffic_policy: Option<String>,
    /// Health check node port for load balancers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_node_port: Option<i32>,
    /// Session affinity config.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_affinity_config: Option<core::SessionAffinityConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(name: &str, image: &str) -> core::Container {
        core::Container {
            name: name.to_string(),
            image: Some(image.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn upsert() {
        let mut cs = vec![container("postgres", "a"), container("exporter", "b")];
        upsert_container(&mut cs, container("postgres", "c"));
        upsert_container(&mut cs, container("coordinator", "d"));
        let names: Vec<_> = cs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["postgres", "exporter", "coordinator"]);
        assert_eq!(
            get_container_by_name(&cs, "postgres").and_then(|c| c.image.as_deref()),
            Some("c")
        );
    }

    #[test]
    fn container_mut_inserts() {
        let mut cs = vec![container("exporter", "b")];
        container_mut(&mut cs, "mysql").image = Some("x".into());
        assert_eq!(cs.len(), 2);
        container_mut(&mut cs, "mysql").image = Some("y".into());
        assert_eq!(cs.len(), 2);
        assert_eq!(cs[1].image.as_deref(), Some("y"));
    }

    #[test]
    fn template_wire_form() {
        let t: PodTemplateSpec = serde_json::from_value(serde_json::json!({
            "metadata": {"labels": {"a": "b"}},
            "spec": {"serviceAccountName": "sa", "nodeSelector": {"zone": "x"}},
        }))
        .unwrap();
        assert_eq!(t.spec.service_account_name.as_deref(), Some("sa"));
        assert_eq!(t.metadata.labels.get("a").map(String::as_str), Some("b"));
        let s: ServiceTemplateSpec =
            serde_json::from_value(serde_json::json!({"spec": {"type": "LoadBalancer", "clusterIP": "None"}}))
                .unwrap();
        assert_eq!(s.spec.type_.as_deref(), Some("LoadBalancer"));
        assert_eq!(s.spec.cluster_ip.as_deref(), Some("None"));
    }
}
