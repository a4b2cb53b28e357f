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
    catalog::PgBouncerVersion,
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    meta::name_with_suffix,
    monitor::AgentSpec,
    offshoot::PodTemplateSpec,
    resources,
    tls::{CertificateAlias, TlsConfig},
    types::{
        AutoOpsSpec, DeletionPolicy, NamedServiceTemplateSpec, ObjectReference, SecretReference,
    },
};

/// Port PgBouncer accepts client connections on.
pub const PGBOUNCER_DATABASE_PORT: i32 = 5432;
/// Pool mode used when none is configured.
pub const PGBOUNCER_DEFAULT_POOL_MODE: &str = "session";
/// Name of the database used to administer PgBouncer.
pub const PGBOUNCER_ADMIN_DATABASE: &str = "pgbouncer";

/// PgBouncerSpec describes the desired state of a PgBouncer connection pooler.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "PgBouncer",
    plural = "pgbouncers",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "pb",
    category = "proxy",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PgBouncerSpec {
    /// AutoOps contains configuration of automatic ops-request-recommendation generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_ops: Option<AutoOpsSpec>,
    /// Version of PgBouncer to be deployed.
    #[validate(length(min = 1))]
    pub version: String,
    /// Number of PgBouncer pods.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// ServiceTemplates is an optional configuration for services used to expose the pooler.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_templates: Vec<NamedServiceTemplateSpec>,
    /// PodTemplate is an optional configuration for the pooler pods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
    /// Databases the pooler routes to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(nested)]
    pub databases: Vec<PgBouncerDatabase>,
    /// ConnectionPool tunes the pooler.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_pool: Option<ConnectionPoolConfig>,
    /// AuthSecret holds the admin credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
    /// ConfigSecret holds extra pgbouncer.ini sections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<core::LocalObjectReference>,
    /// Monitor is used to monitor the pooler.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<AgentSpec>,
    /// SSLMode for connections from clients and to the backends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_mode: Option<PostgresSslMode>,
    /// TLS contains tls configurations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    /// Halted indicates that the pooler is halted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub halted: bool,
    /// TerminationPolicy controls the delete operation for the pooler.
    #[serde(rename = "terminationPolicy", skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
    /// HealthChecker for the pooler.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub health_checker: Option<HealthCheckSpec>,
}

/// PgBouncerDatabase maps a pooler database to a Postgres database.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PgBouncerDatabase {
    /// Alias clients connect to.
    #[validate(length(min = 1))]
    pub alias: String,
    /// DatabaseRef refers to the AppBinding of the Postgres server.
    #[validate(nested)]
    pub database_ref: ObjectReference,
    /// DatabaseName inside the Postgres server.
    #[validate(length(min = 1))]
    pub database_name: String,
    /// SyncUsers copies the users of the backend into the pooler.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sync_users: bool,
}

/// ConnectionPoolConfig mirrors the `[pgbouncer]` section of pgbouncer.ini.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPoolConfig {
    /// Port PgBouncer listens on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    /// PoolMode is one of session, transaction or statement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_mode: Option<String>,
    /// Maximum number of client connections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_client_connections: Option<i64>,
    /// Server connections per user and database pair.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_pool_size: Option<i64>,
    /// Server connections kept open per pool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_pool_size: Option<i64>,
    /// Extra connections a pool may open under load.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserve_pool_size: Option<i64>,
    /// Seconds a client waits before the reserve pool is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserve_pool_timeout_seconds: Option<i64>,
    /// Zero means unlimited.
    #[serde(rename = "maxDBConnections", skip_serializing_if = "Option::is_none")]
    pub max_db_connections: Option<i64>,
    /// Zero means unlimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_user_connections: Option<i64>,
    /// Seconds between statistics snapshots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats_period_seconds: Option<i64>,
    /// AuthType clients authenticate with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<PostgresClientAuthMode>,
    /// Comma separated startup parameters PgBouncer ignores.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_startup_parameters: Option<String>,
}

impl ConnectionPoolConfig {
    fn set_defaults(&mut self) {
        self.port.get_or_insert(PGBOUNCER_DATABASE_PORT);
        self.pool_mode
            .get_or_insert_with(|| PGBOUNCER_DEFAULT_POOL_MODE.to_string());
        self.max_client_connections.get_or_insert(100);
        self.default_pool_size.get_or_insert(20);
        self.min_pool_size.get_or_insert(0);
        self.reserve_pool_size.get_or_insert(0);
        self.reserve_pool_timeout_seconds.get_or_insert(5);
        self.max_db_connections.get_or_insert(0);
        self.max_user_connections.get_or_insert(0);
        self.stats_period_seconds.get_or_insert(60);
        self.auth_type.get_or_insert(PostgresClientAuthMode::Md5);
        self.ignore_startup_parameters
            .get_or_insert_with(|| "empty".to_string());
    }
}

impl PgBouncer {
    /// Name of the Secret holding the credentials PgBouncer uses against the backends.
    pub fn backend_secret_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), "backend")
    }

    /// Name of the Secret holding the rendered pgbouncer.ini.
    pub fn final_config_secret_name(&self) -> String {
        name_with_suffix(self.service_name(), "final-config")
    }

    /// Name of the service spreading connections over every pooler pod.
    pub fn replicas_service_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), "replicas")
    }

    /// Port clients connect to.
    pub fn port(&self) -> i32 {
        self.spec
            .connection_pool
            .as_ref()
            .and_then(|p| p.port)
            .unwrap_or(PGBOUNCER_DATABASE_PORT)
    }
}

impl Database for PgBouncer {
    const RESOURCE_CODE: &'static str = "pb";
    const CONTAINER_NAME: &'static str = "pgbouncer";
    const CERT_ALIASES: &'static [CertificateAlias] = &[
        CertificateAlias::Server,
        CertificateAlias::Client,
        CertificateAlias::MetricsExporter,
    ];

    spec_accessors!();

    fn persistent_secrets(&self) -> Vec<String> {
        vec![
            self.auth_secret_name(),
            self.backend_secret_name(),
            self.final_config_secret_name(),
        ]
    }
}

impl Defaults for PgBouncer {
    spec_defaults!(PgBouncerVersion);

    fn set_defaults(&mut self, version: Option<&PgBouncerVersion>) {
        let name = self.offshoot_name();
        self.spec.deletion_policy.get_or_insert(DeletionPolicy::Delete);
        self.spec.replicas.get_or_insert(1);
        let ssl_mode = if self.spec.tls.is_some() {
            PostgresSslMode::VerifyFull
        } else {
            PostgresSslMode::Disable
        };
        self.spec.ssl_mode.get_or_insert(ssl_mode);
        let namespace = self.namespace();
        for db in &mut self.spec.databases {
            db.database_ref.set_default_namespace(&namespace);
        }
        self.spec
            .connection_pool
            .get_or_insert_with(ConnectionPoolConfig::default)
            .set_defaults();
        crate::types::default_auth_secret(&mut self.spec.auth_secret);
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

    fn pgbouncer(spec: serde_json::Value) -> PgBouncer {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "kubedb.com/v1alpha2",
            "kind": "PgBouncer",
            "metadata": {"name": "pb", "namespace": "demo"},
            "spec": spec,
        }))
        .unwrap()
    }

    #[test]
    fn names() {
        let pb = pgbouncer(serde_json::json!({"version": "1.18.0"}));
        assert_eq!(pb.backend_secret_name(), "pb-backend");
        assert_eq!(pb.final_config_secret_name(), "pb-final-config");
        assert_eq!(pb.replicas_service_name(), "pb-replicas");
        assert_eq!(pb.port(), 5432);
        assert_eq!(
            pb.persistent_secrets(),
            vec!["pb-auth", "pb-backend", "pb-final-config"]
        );
    }

    #[test]
    fn pool_and_backend_defaults() {
        let mut pb = pgbouncer(serde_json::json!({
            "version": "1.18.0",
            "databases": [
                {"alias": "app", "databaseRef": {"name": "pg"}, "databaseName": "app"},
                {
                    "alias": "other",
                    "databaseRef": {"name": "pg", "namespace": "prod"},
                    "databaseName": "postgres",
                },
            ],
            "connectionPool": {"poolMode": "transaction", "maxClientConnections": 20},
        }));
        pb.set_defaults(None);

        let namespaces: Vec<_> = pb
            .spec
            .databases
            .iter()
            .map(|d| d.database_ref.namespace.as_deref())
            .collect();
        assert_eq!(namespaces, vec![Some("demo"), Some("prod")]);
        let pool = pb.spec.connection_pool.as_ref().unwrap();
        assert_eq!(pool.pool_mode.as_deref(), Some("transaction"));
        assert_eq!(pool.max_client_connections, Some(20));
        assert_eq!(pool.default_pool_size, Some(20));
        assert_eq!(pool.auth_type, Some(PostgresClientAuthMode::Md5));
        assert_eq!(pool.ignore_startup_parameters.as_deref(), Some("empty"));
        assert_eq!(pb.spec.ssl_mode, Some(PostgresSslMode::Disable));
        assert!(pb.spec.validate().is_ok());
    }

    #[test]
    fn tls_selects_verify_full() {
        let mut pb = pgbouncer(serde_json::json!({
            "version": "1.18.0",
            "tls": {"issuerRef": {"kind": "Issuer", "name": "ca"}},
        }));
        pb.set_defaults(None);
        assert_eq!(pb.spec.ssl_mode, Some(PostgresSslMode::VerifyFull));

        let json = serde_json::to_value(&pb.spec).unwrap();
        assert_eq!(json["connectionPool"]["maxDBConnections"], 0);
        assert_eq!(json["sslMode"], "verify-full");
    }
}
