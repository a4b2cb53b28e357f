use k8s_openapi::api::core::v1 as core;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{DatabaseStatus, spec_accessors, spec_defaults};
use crate::{
    Database, Defaults, GROUP, Labels,
    catalog::KafkaVersion,
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    meta::name_with_suffix,
    monitor::AgentSpec,
    offshoot::PodTemplateSpec,
    resources,
    tls::{CertificateAlias, TlsConfig},
    types::{DeletionPolicy, NamedServiceTemplateSpec, SecretReference, StorageType},
};

/// Value of the role label on the pods of a topology role.
pub const KAFKA_NODE_ROLE_SET: &str = "set";

/// KafkaSpec describes the desired state of a Kafka cluster running in KRaft mode.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "Kafka",
    plural = "kafkas",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "kf",
    category = "datastore",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct KafkaSpec {
    /// Version of Kafka to be deployed.
    #[validate(length(min = 1))]
    pub version: String,
    /// Number of combined nodes to deploy when no topology is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// Topology splits the cluster into dedicated controllers and brokers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topology: Option<KafkaClusterTopology>,
    /// StorageType can be durable (default) or ephemeral.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<StorageType>,
    /// Storage to specify how storage shall be used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
    /// EnableSSL serves the listeners over TLS.
    #[serde(default, rename = "enableSSL", skip_serializing_if = "std::ops::Not::not")]
    pub enable_ssl: bool,
    /// DisableSecurity turns off SASL authentication.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disable_security: bool,
    /// AuthSecret holds the admin credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
    /// ConfigSecret is an optional field to provide custom configuration file for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<core::LocalObjectReference>,
    /// KeystoreCredSecret holds the keystore passwords.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keystore_cred_secret: Option<SecretReference>,
    /// TLS contains tls configurations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    /// PodTemplate is the template of combined nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
    /// ServiceTemplates is an optional configuration for services used to expose the database.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_templates: Vec<NamedServiceTemplateSpec>,
    /// Halted indicates that the database is halted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub halted: bool,
    /// TerminationPolicy controls the delete operation for the database.
    #[serde(rename = "terminationPolicy", skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
    /// HealthChecker for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub health_checker: Option<HealthCheckSpec>,
    /// Monitor is used to monitor the database instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<AgentSpec>,
}

/// KafkaClusterTopology lists the dedicated node groups.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KafkaClusterTopology {
    /// Controllers run the KRaft quorum.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<KafkaNode>,
    /// Brokers store and serve partitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker: Option<KafkaNode>,
}

/// KafkaNode configures one node group.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KafkaNode {
    /// Number of nodes in the group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Suffix appended to the PetSet name of the group.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub suffix: String,
    /// Storage of the group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
    /// PodTemplate of the group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
}

/// KafkaNodeRole is the role a node plays in the cluster.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    PartialEq,
    Serialize,
    JsonSchema,
    strum::AsRefStr,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum KafkaNodeRole {
    /// Runs the KRaft quorum.
    Controller,
    /// Stores and serves partitions.
    Broker,
    /// Acts as both.
    Combined,
}

/// KafkaListener names the listeners a node exposes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::AsRefStr, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum KafkaListener {
    /// Inter-broker traffic.
    Broker,
    /// KRaft quorum traffic.
    Controller,
    /// Client traffic inside the cluster.
    Internal,
}

impl KafkaClusterTopology {
    /// Returns the node group for `role`.
    pub fn node(&self, role: KafkaNodeRole) -> Option<&KafkaNode> {
        match role {
            KafkaNodeRole::Controller => self.controller.as_ref(),
            KafkaNodeRole::Broker => self.broker.as_ref(),
            KafkaNodeRole::Combined => None,
        }
    }
}

impl Kafka {
    /// Label key marking the pods of `role`.
    pub fn node_role_label_key(role: KafkaNodeRole) -> String {
        format!("{GROUP}/role-{role}")
    }

    /// Selectors of the pods running `role`.
    pub fn node_selectors(&self, role: KafkaNodeRole) -> Labels {
        self.offshoot_selectors_with(&Labels::from([(
            Self::node_role_label_key(role),
            KAFKA_NODE_ROLE_SET.to_string(),
        )]))
    }

    /// Name of the PetSet running combined nodes.
    pub fn combined_petset_name(&self) -> String {
        self.petset_name()
    }

    /// Name of the PetSet running `role`.
    pub fn node_petset_name(&self, role: KafkaNodeRole) -> String {
        let suffix = self
            .spec
            .topology
            .as_ref()
            .and_then(|t| t.node(role))
            .map(|n| n.suffix.as_str())
            .filter(|s| !s.is_empty());
        match (role, suffix) {
            (KafkaNodeRole::Combined, _) => self.combined_petset_name(),
            (_, Some(suffix)) => name_with_suffix(self.petset_name(), suffix),
            (_, None) => name_with_suffix(self.petset_name(), role),
        }
    }

    /// Name of the governing service of `role`.
    pub fn node_governing_service_name(&self, role: KafkaNodeRole) -> String {
        match role {
            KafkaNodeRole::Combined => self.governing_service_name(),
            _ => name_with_suffix(self.service_name(), format!("{role}s")),
        }
    }

    /// Name of the Secret holding the rendered configuration of `role`.
    pub fn role_config_secret_name(&self, role: KafkaNodeRole) -> String {
        match role {
            KafkaNodeRole::Combined => self.config_secret_name(),
            _ => name_with_suffix(self.offshoot_name(), format!("{role}-config")),
        }
    }

    /// Name of the Secret holding the credentials of `user`.
    pub fn default_user_cred_secret_name(&self, user: &str) -> String {
        name_with_suffix(self.offshoot_name(), format!("{user}-cred").replace('_', "-"))
    }

    /// Name of the Secret holding the keystore passwords.
    pub fn keystore_cred_secret_name(&self) -> String {
        match &self.spec.keystore_cred_secret {
            Some(s) if !s.name.is_empty() => s.name.clone(),
            _ => name_with_suffix(self.offshoot_name(), "keystore-cred"),
        }
    }

    /// Scheme of the client listeners.
    pub fn connection_scheme(&self) -> &'static str {
        if self.spec.enable_ssl { "https" } else { "http" }
    }
}

impl Database for Kafka {
    const RESOURCE_CODE: &'static str = "kf";
    const CONTAINER_NAME: &'static str = "kafka";
    const CERT_ALIASES: &'static [CertificateAlias] =
        &[CertificateAlias::Server, CertificateAlias::Client];

    spec_accessors!();

    fn persistent_secrets(&self) -> Vec<String> {
        let mut secrets = Vec::new();
        if self.spec.auth_secret.is_some() {
            secrets.push(self.auth_secret_name());
        }
        if self.spec.keystore_cred_secret.is_some() {
            secrets.push(self.keystore_cred_secret_name());
        }
        secrets
    }
}

impl Defaults for Kafka {
    spec_defaults!(KafkaVersion);

    fn set_defaults(&mut self, version: Option<&KafkaVersion>) {
        self.spec.deletion_policy.get_or_insert(DeletionPolicy::Delete);
        self.spec.storage_type.get_or_insert(StorageType::Durable);
        if !self.spec.disable_security {
            crate::types::default_auth_secret(&mut self.spec.auth_secret);
        }
        if self.spec.enable_ssl && self.spec.keystore_cred_secret.is_none() {
            self.spec.keystore_cred_secret = Some(SecretReference {
                name: self.keystore_cred_secret_name(),
                ..Default::default()
            });
        }
        match self.spec.topology.as_mut() {
            Some(topology) => {
                for (role, node) in [
                    (KafkaNodeRole::Controller, topology.controller.as_mut()),
                    (KafkaNodeRole::Broker, topology.broker.as_mut()),
                ] {
                    if let Some(node) = node {
                        if node.suffix.is_empty() {
                            node.suffix = role.to_string();
                        }
                        node.replicas.get_or_insert(1);
                    }
                }
            }
            None => {
                self.spec.replicas.get_or_insert(1);
            }
        }

        let Some(version) = version else {
            return;
        };
        let defaults = resources::default_resources();
        match self.spec.topology.as_mut() {
            Some(topology) => {
                for node in [topology.controller.as_mut(), topology.broker.as_mut()]
                    .into_iter()
                    .flatten()
                {
                    defaults::set_default_pod_template(
                        &mut node.pod_template,
                        Self::CONTAINER_NAME,
                        version,
                        &defaults,
                    );
                }
            }
            None => {
                defaults::set_default_pod_template(
                    &mut self.spec.pod_template,
                    Self::CONTAINER_NAME,
                    version,
                    &defaults,
                );
            }
        }
        defaults::set_monitor_defaults(&mut self.spec.monitor, version);
        self.set_health_checker_defaults();
        if self.spec.enable_ssl {
            self.set_tls_defaults();
        }
    }

    fn set_health_checker_defaults(&mut self) {
        health::set_health_checker_defaults(
            &mut self.spec.health_checker,
            HealthCheckDefaults::new(20, 10, 3),
        );
    }

    fn set_tls_defaults(&mut self) {
        if let Some(tls) = defaults::tls_with_secret_names(self) {
            self.spec.tls = Some(tls);
        }
    }
}
