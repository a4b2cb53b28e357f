use k8s_openapi::api::core::v1 as core;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{DatabaseStatus, spec_accessors, spec_defaults};
use crate::{
    Database, Defaults,
    catalog::RabbitMQVersion,
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    meta::name_with_suffix,
    monitor::AgentSpec,
    offshoot::PodTemplateSpec,
    resources,
    tls::{CertificateAlias, TlsConfig},
    types::{DeletionPolicy, NamedServiceTemplateSpec, SecretReference, StorageType},
};

/// AMQP port.
pub const RABBITMQ_AMQP_PORT: i32 = 5672;
/// AMQP over TLS port.
pub const RABBITMQ_AMQPS_PORT: i32 = 5671;
/// Management UI and HTTP API port.
pub const RABBITMQ_MANAGEMENT_UI_PORT: i32 = 15672;
/// Management UI port when TLS is enabled.
pub const RABBITMQ_MANAGEMENT_UI_PORT_WITH_SSL: i32 = 15671;
/// Prometheus plugin port.
pub const RABBITMQ_EXPORTER_PORT: i32 = 15692;
/// Erlang distribution port.
pub const RABBITMQ_INTER_NODE_PORT: i32 = 25672;
/// Erlang port mapper port.
pub const RABBITMQ_PEER_DISCOVERY_PORT: i32 = 4369;
/// Name of the init container rendering the configuration.
pub const RABBITMQ_INIT_CONTAINER_NAME: &str = "rabbitmq-init";
/// Directory certificates are mounted under.
pub const RABBITMQ_CERT_DIR: &str = "/var/private/ssl";

/// RabbitMQSpec describes the desired state of a RabbitMQ cluster.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "RabbitMQ",
    plural = "rabbitmqs",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "rm",
    category = "datastore",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RabbitMQSpec {
    /// Version of RabbitMQ to be deployed.
    #[validate(length(min = 1))]
    pub version: String,
    /// Number of nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// StorageType can be durable (default) or ephemeral.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<StorageType>,
    /// Storage to specify how storage shall be used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
    /// EnableSSL serves AMQP and the management UI over TLS.
    #[serde(default, rename = "enableSSL", skip_serializing_if = "std::ops::Not::not")]
    pub enable_ssl: bool,
    /// DisableSecurity turns off authentication.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disable_security: bool,
    /// AuthSecret holds the admin credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
    /// ConfigSecret is an optional field to provide custom configuration file for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<core::LocalObjectReference>,
    /// TLS contains tls configurations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    /// PodTemplate is an optional configuration for pods used to expose the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
    /// ServiceTemplates is an optional configuration for services used to expose the database.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_templates: Vec<NamedServiceTemplateSpec>,
    /// Halted indicates that the database is halted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub halted: bool,
    /// Monitor is used to monitor the database instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<AgentSpec>,
    /// TerminationPolicy controls the delete operation for the database.
    #[serde(rename = "terminationPolicy", skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
    /// HealthChecker for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub health_checker: Option<HealthCheckSpec>,
}

impl RabbitMQ {
    /// Scheme of the management API.
    pub fn connection_scheme(&self) -> &'static str {
        if self.spec.enable_ssl { "https" } else { "http" }
    }

    /// Name of the Secret holding the credentials of `username`.
    pub fn default_user_cred_secret_name(&self, username: &str) -> String {
        name_with_suffix(self.offshoot_name(), format!("{username}-cred").replace('_', "-"))
    }

    /// Name of the Secret holding the Erlang cookie shared by the nodes.
    pub fn erlang_cookie_secret_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), "erlang-cookie")
    }

    /// Common name of the client certificate for `alias`.
    pub fn client_certificate_cn(&self, alias: CertificateAlias) -> String {
        name_with_suffix(self.offshoot_name(), alias.as_ref())
    }

    /// Name of the volume mounting the certificate for `alias`.
    pub fn cert_secret_volume_name(alias: CertificateAlias) -> String {
        format!("{alias}-certs")
    }

    /// Name of the PVC for `alias`.
    pub fn pvc_name(&self, alias: &str) -> String {
        name_with_suffix(self.offshoot_name(), alias)
    }

    /// Name of the Role granted to the pods for peer discovery.
    pub fn default_pod_role_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), "role")
    }

    /// Name of the RoleBinding granting [`RabbitMQ::default_pod_role_name`].
    pub fn default_pod_role_binding_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), "rolebinding")
    }
}

impl Database for RabbitMQ {
    const RESOURCE_CODE: &'static str = "rm";
    const CONTAINER_NAME: &'static str = "rabbitmq";
    const CERT_ALIASES: &'static [CertificateAlias] = &[
        CertificateAlias::Ca,
        CertificateAlias::Client,
        CertificateAlias::Server,
    ];

    spec_accessors!();

    fn auth_secret_name(&self) -> String {
        match &self.spec.auth_secret {
            Some(s) if !s.name.is_empty() => s.name.clone(),
            _ => self.default_user_cred_secret_name("admin"),
        }
    }

    fn persistent_secrets(&self) -> Vec<String> {
        vec![self.auth_secret_name(), self.erlang_cookie_secret_name()]
    }
}

impl Defaults for RabbitMQ {
    spec_defaults!(RabbitMQVersion);

    fn set_defaults(&mut self, version: Option<&RabbitMQVersion>) {
        let name = self.offshoot_name();
        self.spec.deletion_policy.get_or_insert(DeletionPolicy::Delete);
        self.spec.replicas.get_or_insert(1);
        self.spec.storage_type.get_or_insert(StorageType::Durable);
        if !self.spec.disable_security && self.spec.auth_secret.is_none() {
            self.spec.auth_secret = Some(SecretReference {
                name: self.default_user_cred_secret_name("admin"),
                ..Default::default()
            });
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
        let template = defaults::set_default_pod_template(
            &mut self.spec.pod_template,
            Self::CONTAINER_NAME,
            version,
            &resources::default_resources(),
        );
        defaults::set_default_init_container_security_context(
            template,
            RABBITMQ_INIT_CONTAINER_NAME,
            version,
        );
        defaults::set_monitor_defaults(&mut self.spec.monitor, version);
        self.set_health_checker_defaults();
        self.set_tls_defaults();
    }

    fn set_health_checker_defaults(&mut self) {
        health::set_health_checker_defaults(
            &mut self.spec.health_checker,
            HealthCheckDefaults::new(10, 10, 3),
        );
    }

    fn set_tls_defaults(&mut self) {
        if let Some(tls) = defaults::tls_with_secret_names(self) {
            self.spec.tls = Some(tls);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{RabbitMQVersionSpec, VersionSecurityContext};

    fn rabbitmq(spec: serde_json::Value) -> RabbitMQ {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "kubedb.com/v1alpha2",
            "kind": "RabbitMQ",
            "metadata": {"name": "rm", "namespace": "demo"},
            "spec": spec,
        }))
        .unwrap()
    }

    #[test]
    fn names() {
        let rm = rabbitmq(serde_json::json!({"version": "3.13.2", "enableSSL": true}));
        assert_eq!(rm.connection_scheme(), "https");
        assert_eq!(rm.auth_secret_name(), "rm-admin-cred");
        assert_eq!(rm.default_user_cred_secret_name("guest_user"), "rm-guest-user-cred");
        assert_eq!(rm.persistent_secrets(), vec!["rm-admin-cred", "rm-erlang-cookie"]);
        assert_eq!(rm.client_certificate_cn(CertificateAlias::Client), "rm-client");
        assert_eq!(
            RabbitMQ::cert_secret_volume_name(CertificateAlias::Server),
            "server-certs"
        );
        assert_eq!(rm.pvc_name("data"), "rm-data");
    }

    #[test]
    fn defaults_with_version() {
        let mut rm = rabbitmq(serde_json::json!({"version": "3.13.2", "replicas": 3}));
        let version = RabbitMQVersion::new(
            "3.13.2",
            RabbitMQVersionSpec {
                version: "3.13.2".into(),
                security_context: Some(VersionSecurityContext {
                    run_as_user: Some(999),
                    run_as_group: None,
                }),
                ..Default::default()
            },
        );
        rm.set_defaults(Some(&version));

        assert_eq!(
            rm.spec.auth_secret.as_ref().map(|s| s.name.as_str()),
            Some("rm-admin-cred")
        );
        assert_eq!(
            rm.spec.health_checker,
            Some(HealthCheckSpec {
                period_seconds: Some(10),
                timeout_seconds: Some(10),
                failure_threshold: Some(3),
                disable_write_check: false,
            })
        );
        let template = rm.spec.pod_template.as_ref().unwrap();
        assert!(template.spec.init_container(RABBITMQ_INIT_CONTAINER_NAME).is_some());
        assert_eq!(
            template
                .spec
                .container("rabbitmq")
                .and_then(|c| c.security_context.as_ref())
                .and_then(|sc| sc.run_as_user),
            Some(999)
        );
    }

    #[test]
    fn security_disabled() {
        let mut rm = rabbitmq(serde_json::json!({"version": "3.13.2", "disableSecurity": true}));
        rm.set_defaults(None);
        assert!(rm.spec.auth_secret.is_none());
        assert_eq!(rm.spec.storage_type, Some(StorageType::Durable));
    }
}
