use k8s_openapi::api::core::v1 as core;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{DatabaseStatus, spec_defaults};
use crate::{
    Database, Defaults, Labels,
    catalog::QdrantVersion,
    database::uid_config_secret_name,
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    monitor::AgentSpec,
    offshoot::PodTemplateSpec,
    resources,
    tls::{CertificateAlias, TlsConfig},
    types::{DeletionPolicy, NamedServiceTemplateSpec, SecretReference, StorageType},
};

/// Port of the REST API.
pub const QDRANT_HTTP_PORT: i32 = 6333;
/// Port of the gRPC API.
pub const QDRANT_GRPC_PORT: i32 = 6334;
/// Port peers of a distributed deployment talk to each other on.
pub const QDRANT_P2P_PORT: i32 = 6335;
/// Key of the API key in the auth Secret.
pub const QDRANT_API_KEY: &str = "api-key";

/// QdrantSpec describes the desired state of a Qdrant vector database.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "Qdrant",
    plural = "qdrants",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "qd",
    category = "datastore",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct QdrantSpec {
    /// Version of Qdrant to be deployed.
    #[validate(length(min = 1))]
    pub version: String,
    /// Number of instances to deploy.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// Mode selects a single node or a distributed cluster.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<QdrantMode>,
    /// StorageType can be durable (default) or ephemeral.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<StorageType>,
    /// Storage to specify how storage shall be used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
    /// DisableSecurity turns off API key authentication.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disable_security: bool,
    /// AuthSecret holds the API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
    /// Configuration provides a custom config.yaml.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<ConfigurationSpec>,
    /// PodTemplate is an optional configuration for pods used to expose the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
    /// TLS contains tls configurations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<QdrantTlsConfig>,
    /// ServiceTemplates is an optional configuration for services used to expose the database.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_templates: Vec<NamedServiceTemplateSpec>,
    /// Halted indicates that the database is halted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub halted: bool,
    /// DeletionPolicy controls the delete operation for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
    /// HealthChecker for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub health_checker: Option<HealthCheckSpec>,
    /// Monitor is used to monitor the database instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<AgentSpec>,
}

/// QdrantMode selects the deployment topology.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
pub enum QdrantMode {
    /// A single node.
    #[default]
    Standalone,
    /// Nodes sharding collections between them.
    Distributed,
}

/// QdrantTlsConfig selects which endpoints use TLS.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QdrantTlsConfig {
    /// Common TLS configuration.
    #[serde(flatten)]
    pub config: TlsConfig,
    /// P2P encrypts traffic between peers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p2p: Option<bool>,
    /// Client encrypts the REST and gRPC APIs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<bool>,
}

/// ConfigurationSpec provides database configuration by Secret or inline.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSpec {
    /// SecretName of a Secret holding configuration files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
    /// Inline maps file names to their content.
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub inline: Labels,
}

impl Qdrant {
    /// Reports whether the nodes form a distributed cluster.
    pub fn is_distributed(&self) -> bool {
        self.spec.mode == Some(QdrantMode::Distributed)
    }

    /// Name of the PVC for `alias`.
    pub fn pvc_name(&self, alias: &str) -> String {
        alias.to_string()
    }

    /// Address of the REST API of the `i`th pod.
    pub fn pod_address(&self, i: i32) -> String {
        self.address(i, QDRANT_HTTP_PORT)
    }

    /// Scheme clients connect with.
    pub fn connection_scheme(&self) -> &'static str {
        "grpc"
    }

    /// Reports whether the REST and gRPC APIs are served over TLS.
    pub fn client_tls_enabled(&self) -> bool {
        self.spec
            .tls
            .as_ref()
            .is_some_and(|t| t.client.unwrap_or_default())
    }

    /// Reports whether peer traffic is encrypted.
    pub fn p2p_tls_enabled(&self) -> bool {
        self.spec
            .tls
            .as_ref()
            .is_some_and(|t| t.p2p.unwrap_or_default())
    }
}

impl Database for Qdrant {
    const RESOURCE_CODE: &'static str = "qd";
    const CONTAINER_NAME: &'static str = "qdrant";
    const CERT_ALIASES: &'static [CertificateAlias] =
        &[CertificateAlias::Server, CertificateAlias::Client];

    fn auth_secret(&self) -> Option<&SecretReference> {
        self.spec.auth_secret.as_ref()
    }
    fn tls(&self) -> Option<&TlsConfig> {
        self.spec.tls.as_ref().map(|t| &t.config)
    }
    fn pod_template(&self) -> Option<&PodTemplateSpec> {
        self.spec.pod_template.as_ref()
    }
    fn service_templates(&self) -> &[NamedServiceTemplateSpec] {
        &self.spec.service_templates
    }
    fn monitor(&self) -> Option<&AgentSpec> {
        self.spec.monitor.as_ref()
    }

    fn config_secret_name(&self) -> String {
        uid_config_secret_name(self)
    }

    fn persistent_secrets(&self) -> Vec<String> {
        if self.spec.auth_secret.is_none() {
            return Vec::new();
        }
        vec![self.auth_secret_name(), self.config_secret_name()]
    }
}

impl Defaults for Qdrant {
    spec_defaults!(QdrantVersion);

    fn set_defaults(&mut self, version: Option<&QdrantVersion>) {
        let name = self.offshoot_name();
        self.spec.deletion_policy.get_or_insert(DeletionPolicy::Delete);
        self.spec.replicas.get_or_insert(1);
        self.spec.mode.get_or_insert_default();
        self.spec.storage_type.get_or_insert(StorageType::Durable);
        if !self.spec.disable_security {
            crate::types::default_auth_secret(&mut self.spec.auth_secret);
        }
        self.spec
            .pod_template
            .get_or_insert_with(PodTemplateSpec::default)
            .spec
            .service_account_name
            .get_or_insert(name);

        let Some(version) = version else {
            return;
        };
        defaults::set_default_pod_template(
            &mut self.spec.pod_template,
            Self::CONTAINER_NAME,
            version,
            &resources::default_resources(),
        );
        defaults::set_monitor_defaults(&mut self.spec.monitor, version);
        self.set_health_checker_defaults();
        self.set_tls_defaults();
    }

    fn set_health_checker_defaults(&mut self) {
        health::set_health_checker_defaults(
            &mut self.spec.health_checker,
            HealthCheckDefaults::STANDARD,
        );
    }

    fn set_tls_defaults(&mut self) {
        if let Some(tls) = defaults::tls_with_secret_names(self) {
            if let Some(t) = self.spec.tls.as_mut() {
                t.config = tls;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{QdrantVersionSpec, VersionSecurityContext};

    fn qdrant(spec: serde_json::Value) -> Qdrant {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "kubedb.com/v1alpha2",
            "kind": "Qdrant",
            "metadata": {
                "name": "qd",
                "namespace": "demo",
                "uid": "7a3f2c9e-1111-2222-3333-abcdef654321",
            },
            "spec": spec,
        }))
        .unwrap()
    }

    #[test]
    fn names() {
        let qd = qdrant(serde_json::json!({
            "version": "1.11.0",
            "mode": "Distributed",
            "authSecret": {"name": "qd-key"},
        }));
        assert!(qd.is_distributed());
        assert_eq!(qd.pod_address(1), "qd-1.qd-pods.demo.svc:6333");
        assert_eq!(qd.pvc_name("data"), "data");
        assert_eq!(qd.persistent_secrets(), vec!["qd-key", "qd-654321"]);
    }

    #[test]
    fn tls_flags() {
        let mut qd = qdrant(serde_json::json!({
            "version": "1.11.0",
            "tls": {"issuerRef": {"kind": "Issuer", "name": "ca"}, "p2p": true, "client": false},
        }));
        assert!(qd.p2p_tls_enabled());
        assert!(!qd.client_tls_enabled());

        let version = QdrantVersion::new(
            "1.11.0",
            QdrantVersionSpec {
                version: "1.11.0".into(),
                security_context: Some(VersionSecurityContext {
                    run_as_user: Some(1000),
                    run_as_group: None,
                }),
                ..Default::default()
            },
        );
        qd.set_defaults(Some(&version));
        assert_eq!(qd.cert_secret_name(CertificateAlias::Server), "qd-server-cert");
        assert_eq!(qd.spec.tls.as_ref().unwrap().config.certificates.len(), 2);
        assert_eq!(qd.spec.mode, Some(QdrantMode::Standalone));
        assert!(qd.spec.auth_secret.is_some());
    }

    #[test]
    fn security_disabled() {
        let mut qd = qdrant(serde_json::json!({"version": "1.11.0", "disableSecurity": true}));
        qd.set_defaults(None);
        assert!(qd.spec.auth_secret.is_none());
        assert!(qd.persistent_secrets().is_empty());
    }
}
