use k8s_openapi::api::core::v1 as core;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{DatabaseStatus, spec_accessors, spec_defaults};
use crate::{
    Database, Defaults,
    catalog::PostgresVersion,
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    monitor::AgentSpec,
    offshoot::PodTemplateSpec,
    resources,
    tls::{CertificateAlias, TlsConfig},
    types::{
        CoordinatorSpec, DeletionPolicy, InitSpec, LeaderElectionConfig, NamedServiceTemplateSpec,
        SecretReference, StorageType,
    },
};

/// PostgresSpec describes the desired state of a PostgreSQL cluster.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "Postgres",
    plural = "postgreses",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "pg",
    category = "datastore",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PostgresSpec {
    /// Version of Postgres to be deployed.
    #[validate(length(min = 1))]
    pub version: String,
    /// Number of instances to deploy for a Postgres database.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// StandbyMode selects between hot and warm standby servers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standby_mode: Option<PostgresStandbyMode>,
    /// StreamingMode selects between synchronous and asynchronous replication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming_mode: Option<PostgresStreamingMode>,
    /// LeaderElection tunes failover.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub leader_election: Option<LeaderElectionConfig>,
    /// ClientAuthMode is the authentication method clients must use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_auth_mode: Option<PostgresClientAuthMode>,
    /// SSLMode for both standalone and clusters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_mode: Option<PostgresSslMode>,
    /// StorageType can be durable (default) or ephemeral.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<StorageType>,
    /// Storage to specify how storage shall be used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
    /// AuthSecret is the Secret holding the credentials of the postgres superuser.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
    /// Init is used to initialize the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init: Option<InitSpec>,
    /// ConfigSecret is an optional field to provide custom configuration file for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<core::LocalObjectReference>,
    /// PodTemplate is an optional configuration for pods used to expose the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
    /// ServiceTemplates is an optional configuration for services used to expose the database.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_templates: Vec<NamedServiceTemplateSpec>,
    /// TLS contains tls configurations for client and server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    /// Halted indicates that the database is halted and all offshoot Kubernetes resources except
    /// PVCs are deleted.
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
    /// Coordinator configures the pg-coordinator sidecar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<CoordinatorSpec>,
}

/// PostgresStandbyMode selects how standby servers behave.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
pub enum PostgresStandbyMode {
    /// Standby servers accept read-only queries.
    Hot,
    /// Standby servers only replay WAL.
    Warm,
}

/// PostgresStreamingMode selects how WAL is shipped to standbys.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
pub enum PostgresStreamingMode {
    /// Commits wait for a standby.
    Synchronous,
    /// Commits do not wait for a standby.
    Asynchronous,
}

/// PostgresClientAuthMode is the authentication method clients use.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PostgresClientAuthMode {
    /// MD5 challenge-response.
    Md5,
    /// SCRAM-SHA-256, as described in RFC 7677.
    Scram,
    /// Client certificates.
    Cert,
}

/// PostgresSslMode is the libpq sslmode servers and clients use.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, JsonSchema, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PostgresSslMode {
    /// Never use TLS.
    Disable,
    /// Use TLS if the server insists.
    Allow,
    /// Use TLS if the server supports it.
    Prefer,
    /// Always use TLS, without verification.
    Require,
    /// Always use TLS and verify the server certificate.
    VerifyCa,
    /// Always use TLS and verify the server certificate and host name.
    VerifyFull,
}

impl PostgresSpec {
    /// Leader election used when none is configured.
    pub fn default_leader_election() -> LeaderElectionConfig {
        LeaderElectionConfig {
            period: "100ms".to_string(),
            maximum_lag_before_failover: Some(33_554_432),
            election_tick: 10,
            heartbeat_tick: 1,
            ..Default::default()
        }
    }
}

impl Postgres {
    /// Reports whether standbys accept read-only queries.
    pub fn has_hot_standby(&self) -> bool {
        self.spec.standby_mode == Some(PostgresStandbyMode::Hot)
    }
}

impl Database for Postgres {
    const RESOURCE_CODE: &'static str = "pg";
    const CONTAINER_NAME: &'static str = "postgres";
    const CERT_ALIASES: &'static [CertificateAlias] = &[
        CertificateAlias::Server,
        CertificateAlias::Client,
        CertificateAlias::Archiver,
        CertificateAlias::MetricsExporter,
    ];

    spec_accessors!();
}

impl Defaults for Postgres {
    spec_defaults!(PostgresVersion);

    fn set_defaults(&mut self, version: Option<&PostgresVersion>) {
        let name = self.offshoot_name();
        self.spec.deletion_policy.get_or_insert(DeletionPolicy::Delete);
        self.spec.storage_type.get_or_insert(StorageType::Durable);
        self.spec.replicas.get_or_insert(1);
        self.spec
            .leader_election
            .get_or_insert_with(PostgresSpec::default_leader_election);
        let ssl_mode = if self.spec.tls.is_some() {
            PostgresSslMode::VerifyFull
        } else {
            PostgresSslMode::Disable
        };
        self.spec.ssl_mode.get_or_insert(ssl_mode);
        self.spec
            .client_auth_mode
            .get_or_insert(PostgresClientAuthMode::Md5);
        self.spec
            .pod_template
            .get_or_insert_with(PodTemplateSpec::default)
            .spec
            .service_account_name
            .get_or_insert(name);

        let Some(version) = version else {
            return;
        };
        let selector = self.offshoot_selectors();
        let namespace = self.namespace();
        let template = defaults::set_default_pod_template(
            &mut self.spec.pod_template,
            Self::CONTAINER_NAME,
            version,
            &resources::default_resources(),
        );
        defaults::set_default_affinity(template, &selector, &namespace);
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
            self.spec.tls = Some(tls);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        apply_defaults,
        catalog::{PostgresVersionSpec, StaticCatalog, VersionSecurityContext},
        tls,
    };
    use test_log::test;

    fn postgres(spec: serde_json::Value) -> Postgres {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "kubedb.com/v1alpha2",
            "kind": "Postgres",
            "metadata": {"name": "pg", "namespace": "demo"},
            "spec": spec,
        }))
        .unwrap()
    }

    fn version() -> PostgresVersion {
        PostgresVersion::new(
            "16.1",
            PostgresVersionSpec {
                version: "16.1".into(),
                security_context: Some(VersionSecurityContext {
                    run_as_user: Some(70),
                    run_as_group: None,
                }),
                ..Default::default()
            },
        )
    }

    #[test]
    fn defaults_without_version() {
        let mut pg = postgres(serde_json::json!({"version": "16.1"}));
        pg.set_defaults(None);

        assert_eq!(pg.spec.storage_type, Some(StorageType::Durable));
        assert_eq!(pg.spec.deletion_policy, Some(DeletionPolicy::Delete));
        assert_eq!(pg.spec.replicas, Some(1));
        assert_eq!(pg.spec.ssl_mode, Some(PostgresSslMode::Disable));
        assert_eq!(pg.spec.client_auth_mode, Some(PostgresClientAuthMode::Md5));
        assert_eq!(
            pg.spec.leader_election,
            Some(PostgresSpec::default_leader_election())
        );
        let template = pg.spec.pod_template.as_ref().unwrap();
        assert_eq!(template.spec.service_account_name.as_deref(), Some("pg"));
        assert!(template.spec.containers.is_empty());
        assert!(pg.spec.health_checker.is_none());
    }

    #[test]
    fn defaults_with_version() {
        let mut pg = postgres(serde_json::json!({
            "version": "16.1",
            "monitor": {"agent": "prometheus.io/operator"},
        }));
        pg.set_defaults(Some(&version()));

        let template = pg.spec.pod_template.as_ref().unwrap();
        let container = template.spec.container("postgres").unwrap();
        let sc = container.security_context.as_ref().unwrap();
        assert_eq!(sc.run_as_user, Some(70));
        assert_eq!(sc.run_as_group, Some(70));
        assert_eq!(
            container.resources,
            Some(resources::default_resources())
        );
        assert!(template.spec.affinity.is_some());
        assert_eq!(
            pg.spec.health_checker,
            Some(HealthCheckSpec {
                period_seconds: Some(10),
                timeout_seconds: Some(10),
                failure_threshold: Some(1),
                disable_write_check: false,
            })
        );
        let exporter = &pg.spec.monitor.as_ref().unwrap().prometheus.as_ref().unwrap().exporter;
        assert_eq!(exporter.port, crate::monitor::PROMETHEUS_EXPORTER_PORT);
    }

    #[test]
    fn tls_defaults() {
        let mut pg = postgres(serde_json::json!({
            "version": "16.1",
            "tls": {
                "issuerRef": {"apiGroup": "cert-manager.io", "kind": "Issuer", "name": "pg-ca"},
                "certificates": [{"alias": "server", "secretName": "custom-server"}],
            },
        }));
        pg.set_defaults(Some(&version()));

        assert_eq!(pg.spec.ssl_mode, Some(PostgresSslMode::VerifyFull));
        let certs = &pg.spec.tls.as_ref().unwrap().certificates;
        assert_eq!(certs.len(), 4);
        assert_eq!(
            tls::get_certificate_secret_name(certs, "server"),
            Some("custom-server")
        );
        assert_eq!(
            tls::get_certificate_secret_name(certs, "metrics-exporter"),
            Some("pg-metrics-exporter-cert")
        );
        assert_eq!(pg.cert_secret_name(CertificateAlias::Archiver), "pg-archiver-cert");
    }

    #[test]
    fn halted_database() {
        let mut pg = postgres(serde_json::json!({"version": "16.1", "halted": true}));
        pg.set_defaults(None);
        assert_eq!(pg.spec.deletion_policy, Some(DeletionPolicy::Delete));
        assert_eq!(pg.spec.storage_type, Some(StorageType::Durable));

        let mut pg = postgres(serde_json::json!({
            "version": "16.1",
            "halted": true,
            "terminationPolicy": "DoNotTerminate",
        }));
        pg.set_defaults(Some(&version()));
        assert_eq!(pg.spec.deletion_policy, Some(DeletionPolicy::DoNotTerminate));
        assert_eq!(pg.spec.storage_type, Some(StorageType::Durable));
        assert!(pg.spec.health_checker.is_some());
    }

    #[test]
    fn idempotent() {
        let mut pg = postgres(serde_json::json!({"version": "16.1", "replicas": 3}));
        pg.set_defaults(Some(&version()));
        let once = pg.clone();
        pg.set_defaults(Some(&version()));
        assert_eq!(pg, once);
        assert_eq!(pg.spec.replicas, Some(3));
    }

    #[test]
    fn validation() {
        let pg = postgres(serde_json::json!({"version": "", "replicas": 0}));
        let errs = pg.validate_spec().unwrap_err();
        let fields = errs.field_errors();
        assert!(fields.contains_key("version"));
        assert!(fields.contains_key("replicas"));
        assert!(postgres(serde_json::json!({"version": "16.1"})).validate_spec().is_ok());
    }

    #[test]
    fn wire_forms() {
        let pg = postgres(serde_json::json!({
            "version": "16.1",
            "sslMode": "verify-ca",
            "clientAuthMode": "scram",
            "standbyMode": "Hot",
        }));
        assert_eq!(pg.spec.ssl_mode, Some(PostgresSslMode::VerifyCa));
        assert_eq!(PostgresSslMode::VerifyCa.to_string(), "verify-ca");
        assert!(pg.has_hot_standby());
        assert_json_diff::assert_json_include!(
            actual: serde_json::to_value(&pg).unwrap(),
            expected: serde_json::json!({"spec": {"sslMode": "verify-ca", "clientAuthMode": "scram"}})
        );
    }

    #[test(tokio::test)]
    async fn catalog_lookup() {
        let mut catalog = StaticCatalog::new();
        catalog.insert(&version()).unwrap();

        let mut pg = postgres(serde_json::json!({"version": "16.1"}));
        apply_defaults(&mut pg, &catalog).await;
        assert!(pg.spec.health_checker.is_some());

        let mut missing = postgres(serde_json::json!({"version": "9.6"}));
        apply_defaults(&mut missing, &catalog).await;
        assert_eq!(missing.spec.storage_type, Some(StorageType::Durable));
        assert!(missing.spec.health_checker.is_none());
        assert!(missing.spec.pod_template.unwrap().spec.security_context.is_none());
    }
}
