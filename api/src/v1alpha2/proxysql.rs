use k8s_openapi::api::core::v1 as core;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;
use validator::Validate;

use super::{DatabaseStatus, spec_accessors, spec_defaults};
use crate::{
    Database, Defaults,
    catalog::ProxySQLVersion,
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    monitor::AgentSpec,
    offshoot::PodTemplateSpec,
    resources,
    tls::{CertificateAlias, TlsConfig},
    types::{AutoOpsSpec, DeletionPolicy, NamedServiceTemplateSpec, SecretReference},
};

/// Port ProxySQL accepts MySQL connections on.
pub const PROXYSQL_DATABASE_PORT: i32 = 6033;
/// Port of the ProxySQL admin interface.
pub const PROXYSQL_ADMIN_PORT: i32 = 6032;
/// Label recording the load balancing mode of the pods.
pub const PROXYSQL_LOAD_BALANCE_LABEL_KEY: &str = "proxysql.kubedb.com/load-balance";
/// Admin user ProxySQL cluster members authenticate with.
pub const PROXYSQL_CLUSTER_ADMIN: &str = "cluster";
/// User ProxySQL monitors its backends with.
pub const PROXYSQL_MONITOR_USERNAME: &str = "proxysql";

/// ProxySQLSpec describes the desired state of a ProxySQL load balancer.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "ProxySQL",
    plural = "proxysqls",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "prx",
    category = "proxy",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProxySQLSpec {
    /// AutoOps contains configuration of automatic ops-request-recommendation generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_ops: Option<AutoOpsSpec>,
    /// SyncUsers copies the users of the backend into ProxySQL.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sync_users: bool,
    /// InitConfiguration seeds the ProxySQL tables.
    #[serde(rename = "initConfig", skip_serializing_if = "Option::is_none")]
    pub init_configuration: Option<ProxySQLConfiguration>,
    /// Version of ProxySQL to be deployed.
    #[validate(length(min = 1))]
    pub version: String,
    /// Number of ProxySQL pods. More than one forms a ProxySQL cluster.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// Mode is the replication technology of the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<LoadBalanceMode>,
    /// Backend names the MySQL, MariaDB or PerconaXtraDB object in the same namespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<core::LocalObjectReference>,
    /// AuthSecret holds the admin credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
    /// Monitor is used to monitor ProxySQL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<AgentSpec>,
    /// ConfigSecret holds a custom proxysql.cnf.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<core::LocalObjectReference>,
    /// PodTemplate is an optional configuration for the ProxySQL pods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
    /// ServiceTemplates is an optional configuration for services used to expose ProxySQL.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_templates: Vec<NamedServiceTemplateSpec>,
    /// TLS contains tls configurations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    /// Halted indicates that ProxySQL is halted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub halted: bool,
    /// TerminationPolicy controls the delete operation for ProxySQL.
    #[serde(rename = "terminationPolicy", skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
    /// HealthChecker for ProxySQL.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub health_checker: Option<HealthCheckSpec>,
}

/// LoadBalanceMode is the replication technology of the backend.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, JsonSchema, strum::Display)]
pub enum LoadBalanceMode {
    /// A Galera cluster (MariaDB or PerconaXtraDB).
    Galera,
    /// A MySQL group replication cluster.
    GroupReplication,
}

/// ProxySQLConfiguration seeds the ProxySQL configuration tables.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProxySQLConfiguration {
    /// Rows of `mysql_users`.
    #[serde(rename = "mysqlUsers", default, skip_serializing_if = "Vec::is_empty")]
    pub mysql_users: Vec<MySQLUser>,
    /// Rows of `mysql_query_rules`.
    #[serde(rename = "mysqlQueryRules", default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "query_rules")]
    pub mysql_query_rules: Vec<serde_json::Map<String, serde_json::Value>>,
    /// Rows of `global_variables` prefixed with `mysql-`.
    #[serde(rename = "mysqlVariables", skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::types::preserve_unknown_fields")]
    pub mysql_variables: Option<serde_json::Map<String, serde_json::Value>>,
    /// Rows of `global_variables` prefixed with `admin-`.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::types::preserve_unknown_fields")]
    pub admin_variables: Option<serde_json::Map<String, serde_json::Value>>,
}

fn query_rules(generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
    let rule = crate::types::preserve_unknown_fields(generator);
    schemars::json_schema!({
        "type": "array",
        "items": rule,
    })
}

/// MySQLUser is a row of the ProxySQL `mysql_users` table. Field names follow the table columns.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[allow(missing_docs)]
pub struct MySQLUser {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<i32>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub use_ssl: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub default_hostgroup: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_schema: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub schema_locked: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_persistent: Option<i32>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub fast_forward: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontend: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub attributes: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

fn is_zero(v: &i32) -> bool {
    *v == 0
}

impl ProxySQL {
    /// Reports whether the pods form a ProxySQL cluster.
    pub fn is_cluster(&self) -> bool {
        self.spec.replicas.is_some_and(|r| r > 1)
    }

    /// Name of the backend database object.
    pub fn backend_name(&self) -> Option<&str> {
        self.spec
            .backend
            .as_ref()
            .map(|b| b.name.as_str())
            .filter(|n| !n.is_empty())
    }
}

impl Database for ProxySQL {
    const RESOURCE_CODE: &'static str = "prx";
    const CONTAINER_NAME: &'static str = "proxysql";
    const CERT_ALIASES: &'static [CertificateAlias] = &[
        CertificateAlias::Server,
        CertificateAlias::Client,
        CertificateAlias::MetricsExporter,
    ];

    spec_accessors!();
}

impl Defaults for ProxySQL {
    spec_defaults!(ProxySQLVersion);

    fn set_defaults(&mut self, version: Option<&ProxySQLVersion>) {
        let name = self.offshoot_name();
        self.spec.deletion_policy.get_or_insert(DeletionPolicy::Delete);
        if self.backend_name().is_none() {
            warn!(name = %name, "proxysql has no backend, skipping defaults");
            return;
        }
        self.spec.replicas.get_or_insert(1);
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
        let namespace = self.namespace();
        let template = defaults::set_default_pod_template(
            &mut self.spec.pod_template,
            Self::CONTAINER_NAME,
            version,
            &resources::default_resources(),
        );
        defaults::set_default_affinity(template, &selector, &namespace);
        defaults::set_monitor_defaults(&mut self.spec.monitor, version);
        self.set_tls_defaults();
        self.set_health_checker_defaults();
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

    fn proxysql(spec: serde_json::Value) -> ProxySQL {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "kubedb.com/v1alpha2",
            "kind": "ProxySQL",
            "metadata": {"name": "prx", "namespace": "demo"},
            "spec": spec,
        }))
        .unwrap()
    }

    #[test]
    fn init_config() {
        let prx = proxysql(serde_json::json!({
            "version": "2.6.3-debian",
            "mode": "GroupReplication",
            "backend": {"name": "my-group"},
            "initConfig": {
                "mysqlUsers": [{"username": "app", "active": 1, "default_hostgroup": 2}],
                "mysqlQueryRules": [{"rule_id": 1, "match_digest": "^SELECT", "destination_hostgroup": 3}],
                "adminVariables": {"restapi_enabled": true},
            },
        }));
        let init = prx.spec.init_configuration.as_ref().unwrap();
        assert_eq!(init.mysql_users[0].default_hostgroup, 2);
        assert_eq!(init.mysql_query_rules[0]["destination_hostgroup"], 3);
        assert_eq!(prx.backend_name(), Some("my-group"));
        assert_eq!(prx.spec.mode.map(|m| m.to_string()).as_deref(), Some("GroupReplication"));

        let json = serde_json::to_value(&init.mysql_users[0]).unwrap();
        assert_eq!(json, serde_json::json!({"username": "app", "active": 1, "default_hostgroup": 2}));
    }

    #[test]
    fn missing_backend_is_left_alone() {
        let mut prx = proxysql(serde_json::json!({"version": "2.6.3-debian"}));
        prx.set_defaults(None);
        assert_eq!(prx.spec.deletion_policy, Some(DeletionPolicy::Delete));
        assert!(prx.spec.replicas.is_none());
        assert!(prx.spec.auth_secret.is_none());
    }

    #[test]
    fn cluster_defaults() {
        let mut prx = proxysql(serde_json::json!({
            "version": "2.6.3-debian",
            "replicas": 3,
            "backend": {"name": "xtradb"},
            "mode": "Galera",
        }));
        prx.set_defaults(None);
        assert!(prx.is_cluster());
        assert_eq!(prx.auth_secret_name(), "prx-auth");
        assert_eq!(
            prx.spec
                .pod_template
                .as_ref()
                .and_then(|t| t.spec.service_account_name.as_deref()),
            Some("prx")
        );
    }
}
