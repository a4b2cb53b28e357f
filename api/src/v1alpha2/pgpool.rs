use k8s_openapi::api::core::v1 as core;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{
    DatabaseStatus, PostgresClientAuthMode, PostgresSslMode, spec_accessors, spec_defaults,
};
use crate::{
    Database, Defaults,
    catalog::PgpoolVersion,
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    meta::name_with_suffix,
    monitor::{AgentSpec, PrometheusSpec},
    offshoot::PodTemplateSpec,
    resources,
    tls::{CertificateAlias, TlsConfig},
    types::{DeletionPolicy, NamedServiceTemplateSpec, ObjectReference, SecretReference},
};

/// Port Pgpool accepts client connections on.
pub const PGPOOL_DEFAULT_SERVICE_PORT: i32 = 9999;
/// Port of the PCP administration protocol.
pub const PGPOOL_PCP_PORT: i32 = 9595;
/// Port of the Pgpool exporter.
pub const PGPOOL_MONITORING_DEFAULT_SERVICE_PORT: i32 = 9719;

/// PgpoolSpec describes the desired state of a Pgpool-II middleware.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "Pgpool",
    plural = "pgpools",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "pp",
    category = "proxy",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PgpoolSpec {
    /// SyncUsers copies the users of the backend into Pgpool.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sync_users: bool,
    /// Version of Pgpool to be deployed.
    #[validate(length(min = 1))]
    pub version: String,
    /// Number of Pgpool pods.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// PostgresRef refers to the AppBinding of the backend Postgres.
    #[validate(nested)]
    pub postgres_ref: ObjectReference,
    /// AuthSecret holds the pcp credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
    /// ConfigSecret holds a custom pgpool.conf.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<core::LocalObjectReference>,
    /// PodTemplate is an optional configuration for the Pgpool pods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
    /// InitConfiguration is merged into the generated pgpool.conf.
    #[serde(rename = "initConfig", skip_serializing_if = "Option::is_none")]
    pub init_configuration: Option<PgpoolConfiguration>,
    /// ServiceTemplates is an optional configuration for services used to expose Pgpool.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_templates: Vec<NamedServiceTemplateSpec>,
    /// SSLMode for connections from clients and to the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_mode: Option<PostgresSslMode>,
    /// ClientAuthMode clients authenticate with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_auth_mode: Option<PostgresClientAuthMode>,
    /// TLS contains tls configurations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    /// HealthChecker for Pgpool.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub health_checker: Option<HealthCheckSpec>,
    /// Monitor is used to monitor Pgpool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<AgentSpec>,
    /// Halted indicates that Pgpool is halted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub halted: bool,
    /// TerminationPolicy controls the delete operation for Pgpool.
    #[serde(rename = "terminationPolicy", skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
}

/// PgpoolConfiguration holds initial pgpool.conf parameters.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PgpoolConfiguration {
    /// PgpoolConfig maps parameter names to values.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::types::preserve_unknown_fields")]
    pub pgpool_config: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Pgpool {
    /// Name of the Secret holding the serving certificates.
    pub fn tls_secret_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), "tls-certs")
    }

    /// DNS name of the primary service.
    pub fn primary_service_dns(&self) -> String {
        self.service_dns()
    }

    /// `<namespace>/<name>` of the object.
    pub fn namespaced_name(&self) -> String {
        format!("{}/{}", self.namespace(), self.offshoot_name())
    }
}

impl Database for Pgpool {
    const RESOURCE_CODE: &'static str = "pp";
    const CONTAINER_NAME: &'static str = "pgpool";
    const CERT_ALIASES: &'static [CertificateAlias] = &[
        CertificateAlias::Server,
        CertificateAlias::Client,
        CertificateAlias::MetricsExporter,
    ];

    spec_accessors!();
}

impl Defaults for Pgpool {
    spec_defaults!(PgpoolVersion);

    fn set_defaults(&mut self, version: Option<&PgpoolVersion>) {
        let name = self.offshoot_name();
        self.spec.deletion_policy.get_or_insert(DeletionPolicy::Delete);
        self.spec.replicas.get_or_insert(1);
        let ssl_mode = if self.spec.tls.is_some() {
            PostgresSslMode::VerifyFull
        } else {
            PostgresSslMode::Disable
        };
        self.spec.ssl_mode.get_or_insert(ssl_mode);
        self.spec
            .client_auth_mode
            .get_or_insert(PostgresClientAuthMode::Md5);
        let namespace = self.namespace();
        self.spec.postgres_ref.set_default_namespace(&namespace);
        self.spec
            .pod_template
            .get_or_insert_with(PodTemplateSpec::default)
            .spec
            .service_account_name
            .get_or_insert(name);

        let Some(version) = version else {
            return;
        };
        if let Some(monitor) = self.spec.monitor.as_mut() {
            let prom = monitor.prometheus.get_or_insert_with(PrometheusSpec::default);
            if prom.exporter.port == 0 {
                prom.exporter.port = PGPOOL_MONITORING_DEFAULT_SERVICE_PORT;
            }
        }
        defaults::set_monitor_defaults(&mut self.spec.monitor, version);
        self.set_tls_defaults();
        self.set_health_checker_defaults();
        defaults::set_default_pod_template(
            &mut self.spec.pod_template,
            Self::CONTAINER_NAME,
            version,
            &resources::default_resources(),
        );
    }

    fn set_health_checker_defaults(&mut self) {
        health::set_health_checker_defaults(
            &mut self.spec.health_checker,
            HealthCheckDefaults::STANDARD,
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
    use crate::catalog::{PgpoolVersionSpec, VersionSecurityContext};

    fn pgpool(spec: serde_json::Value) -> Pgpool {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "kubedb.com/v1alpha2",
            "kind": "Pgpool",
            "metadata": {"name": "pp", "namespace": "demo"},
            "spec": spec,
        }))
        .unwrap()
    }

    #[test]
    fn backend_and_modes() {
        let mut pp = pgpool(serde_json::json!({
            "version": "4.5.0",
            "postgresRef": {"name": "ha-postgres"},
            "syncUsers": true,
            "initConfig": {"pgpoolConfig": {"num_init_children": 6, "max_pool": 65}},
        }));
        pp.set_defaults(None);

        assert_eq!(pp.spec.postgres_ref.namespace.as_deref(), Some("demo"));
        assert_eq!(pp.spec.ssl_mode, Some(PostgresSslMode::Disable));
        assert_eq!(pp.spec.client_auth_mode, Some(PostgresClientAuthMode::Md5));
        assert_eq!(pp.spec.replicas, Some(1));
        assert!(pp.persistent_secrets().is_empty());
        assert_eq!(pp.namespaced_name(), "demo/pp");
        assert_eq!(pp.primary_service_dns(), "pp.demo.svc");
        let config = pp
            .spec
            .init_configuration
            .as_ref()
            .and_then(|c| c.pgpool_config.as_ref())
            .unwrap();
        assert_eq!(config["max_pool"], 65);
    }

    #[test]
    fn exporter_port() {
        let mut pp = pgpool(serde_json::json!({
            "version": "4.5.0",
            "postgresRef": {"name": "ha-postgres", "namespace": "db"},
            "monitor": {"agent": "prometheus.io/operator"},
        }));
        let version = PgpoolVersion::new(
            "4.5.0",
            PgpoolVersionSpec {
                version: "4.5.0".into(),
                security_context: Some(VersionSecurityContext {
                    run_as_user: Some(70),
                    run_as_group: None,
                }),
                ..Default::default()
            },
        );
        pp.set_defaults(Some(&version));

        assert_eq!(pp.spec.postgres_ref.namespace.as_deref(), Some("db"));
        let prom = pp
            .spec
            .monitor
            .as_ref()
            .and_then(|m| m.prometheus.as_ref())
            .unwrap();
        assert_eq!(prom.exporter.port, PGPOOL_MONITORING_DEFAULT_SERVICE_PORT);
        let template = pp.spec.pod_template.as_ref().unwrap();
        assert!(template.spec.container("pgpool").is_some());
        assert!(pp.spec.health_checker.is_some());
    }
}
