use k8s_openapi::api::core::v1 as core;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{DatabaseStatus, spec_accessors, spec_defaults};
use crate::{
    Database, Defaults,
    catalog::PerconaXtraDBVersion,
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    meta::name_with_suffix,
    monitor::AgentSpec,
    offshoot::PodTemplateSpec,
    resources,
    tls::{CertificateAlias, TlsConfig},
    types::{
        AutoOpsSpec, CoordinatorSpec, DeletionPolicy, InitSpec, NamedServiceTemplateSpec,
        SecretReference, StorageType, SystemUserSecretsSpec,
    },
};

/// Number of Galera nodes deployed when replicas are not set.
pub const PERCONA_XTRADB_DEFAULT_CLUSTER_SIZE: i32 = 3;

/// Name of the sidecar coordinating Galera failover.
pub const PERCONA_XTRADB_COORDINATOR_CONTAINER_NAME: &str = "px-coordinator";

/// PerconaXtraDBSpec describes the desired state of a Percona XtraDB cluster.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "PerconaXtraDB",
    plural = "perconaxtradbs",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "px",
    category = "datastore",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PerconaXtraDBSpec {
    /// AutoOps contains configuration of automatic ops-request-recommendation generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_ops: Option<AutoOpsSpec>,
    /// Version of Percona XtraDB to be deployed.
    #[validate(length(min = 1))]
    pub version: String,
    /// Number of Galera nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// StorageType can be durable (default) or ephemeral.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<StorageType>,
    /// Storage to specify how storage shall be used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
    /// AuthSecret holds the root credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
    /// Init is used to initialize the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init: Option<InitSpec>,
    /// Monitor is used to monitor the database instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<AgentSpec>,
    /// ConfigSecret is an optional field to provide custom configuration file for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<core::LocalObjectReference>,
    /// PodTemplate is an optional configuration for pods used to expose the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
    /// ServiceTemplates is an optional configuration for services used to expose the database.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_templates: Vec<NamedServiceTemplateSpec>,
    /// RequireSSL rejects client connections without TLS.
    #[serde(default, rename = "requireSSL", skip_serializing_if = "std::ops::Not::not")]
    pub require_ssl: bool,
    /// TLS contains tls configurations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    /// Halted indicates that the database is halted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub halted: bool,
    /// TerminationPolicy controls the delete operation for the database.
    #[serde(rename = "terminationPolicy", skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
    /// Coordinator configures the px-coordinator sidecar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<CoordinatorSpec>,
    /// HealthChecker for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub health_checker: Option<HealthCheckSpec>,
    /// SystemUserSecrets names the Secrets of the replication and monitor users.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_user_secrets: Option<SystemUserSecretsSpec>,
}

impl PerconaXtraDB {
    /// Name of the Galera cluster.
    pub fn cluster_name(&self) -> String {
        self.offshoot_name()
    }

    /// Address of the `idx`th peer.
    pub fn peer_name(&self, idx: i32) -> String {
        format!(
            "{}-{idx}.{}.{}",
            self.offshoot_name(),
            self.governing_service_name(),
            self.namespace()
        )
    }

    fn system_secret_name(
        &self,
        pick: impl Fn(&SystemUserSecretsSpec) -> Option<&SecretReference>,
        suffix: &str,
    ) -> String {
        self.spec
            .system_user_secrets
            .as_ref()
            .and_then(pick)
            .map(|s| s.name.as_str())
            .filter(|n| !n.is_empty())
            .map_or_else(|| name_with_suffix(self.offshoot_name(), suffix), String::from)
    }

    /// Name of the Secret holding the replication user credentials.
    pub fn replication_secret_name(&self) -> String {
        self.system_secret_name(|s| s.replication_user_secret.as_ref(), "replication")
    }

    /// Name of the Secret holding the monitor user credentials.
    pub fn monitor_secret_name(&self) -> String {
        self.system_secret_name(|s| s.monitor_user_secret.as_ref(), "monitor")
    }
}

impl Database for PerconaXtraDB {
    const RESOURCE_CODE: &'static str = "px";
    const CONTAINER_NAME: &'static str = "perconaxtradb";
    const CERT_ALIASES: &'static [CertificateAlias] = &[
        CertificateAlias::Server,
        CertificateAlias::Client,
        CertificateAlias::MetricsExporter,
    ];

    spec_accessors!();

    fn persistent_secrets(&self) -> Vec<String> {
        let mut secrets = Vec::new();
        if self.spec.auth_secret.is_some() {
            secrets.push(self.auth_secret_name());
        }
        if let Some(system) = &self.spec.system_user_secrets {
            if system.replication_user_secret.is_some() {
                secrets.push(self.replication_secret_name());
            }
            if system.monitor_user_secret.is_some() {
                secrets.push(self.monitor_secret_name());
            }
        }
        secrets
    }
}

impl Defaults for PerconaXtraDB {
    spec_defaults!(PerconaXtraDBVersion);

    fn set_defaults(&mut self, version: Option<&PerconaXtraDBVersion>) {
        let name = self.offshoot_name();
        self.spec.deletion_policy.get_or_insert(DeletionPolicy::Delete);
        self.spec.replicas.get_or_insert(PERCONA_XTRADB_DEFAULT_CLUSTER_SIZE);
        self.spec.storage_type.get_or_insert(StorageType::Durable);
        crate::types::default_auth_secret(&mut self.spec.auth_secret);
        let replication = self.replication_secret_name();
        let monitor = self.monitor_secret_name();
        let system = self
            .spec
            .system_user_secrets
            .get_or_insert_with(SystemUserSecretsSpec::default);
        system
            .replication_user_secret
            .get_or_insert_with(|| SecretReference {
                name: replication,
                ..Default::default()
            });
        system.monitor_user_secret.get_or_insert_with(|| SecretReference {
            name: monitor,
            ..Default::default()
        });
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
        let coordinator = self.spec.coordinator.get_or_insert_with(CoordinatorSpec::default);
        resources::set_default_resource_limits(
            coordinator.resources.get_or_insert_with(Default::default),
            &resources::coordinator_default_resources(),
        );
        defaults::set_container_security_context(&mut coordinator.security_context, version);
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
    use crate::catalog::{PerconaXtraDBVersionSpec, VersionSecurityContext};

    fn xtradb(spec: serde_json::Value) -> PerconaXtraDB {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "kubedb.com/v1alpha2",
            "kind": "PerconaXtraDB",
            "metadata": {"name": "px", "namespace": "demo"},
            "spec": spec,
        }))
        .unwrap()
    }

    #[test]
    fn system_user_secrets() {
        let mut px = xtradb(serde_json::json!({
            "version": "8.0.40",
            "systemUserSecrets": {"monitorUserSecret": {"name": "custom-monitor"}},
        }));
        px.set_defaults(None);

        assert_eq!(px.spec.replicas, Some(3));
        assert_eq!(px.replication_secret_name(), "px-replication");
        assert_eq!(px.monitor_secret_name(), "custom-monitor");
        assert_eq!(
            px.persistent_secrets(),
            vec!["px-auth", "px-replication", "custom-monitor"]
        );
        assert_eq!(px.peer_name(0), "px-0.px-pods.demo");
    }

    #[test]
    fn defaults_with_version() {
        let mut px = xtradb(serde_json::json!({"version": "8.0.40"}));
        let version = PerconaXtraDBVersion::new(
            "8.0.40",
            PerconaXtraDBVersionSpec {
                version: "8.0.40".into(),
                security_context: Some(VersionSecurityContext {
                    run_as_user: Some(1001),
                    run_as_group: None,
                }),
                ..Default::default()
            },
        );
        px.set_defaults(Some(&version));

        let template = px.spec.pod_template.as_ref().unwrap();
        assert_eq!(
            template.spec.security_context.as_ref().and_then(|sc| sc.fs_group),
            Some(1001)
        );
        assert!(template.spec.container("perconaxtradb").is_some());
        assert_eq!(
            px.spec.coordinator.as_ref().and_then(|c| c.resources.clone()),
            Some(resources::coordinator_default_resources())
        );
        let once = px.clone();
        px.set_defaults(Some(&version));
        assert_eq!(px, once);
    }
}
