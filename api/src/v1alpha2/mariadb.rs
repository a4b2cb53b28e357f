use k8s_openapi::api::core::v1 as core;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{DatabaseStatus, spec_accessors, spec_defaults};
use crate::{
    Database, Defaults,
    catalog::MariaDBVersion,
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    meta::name_with_suffix,
    monitor::AgentSpec,
    offshoot::PodTemplateSpec,
    resources,
    tls::{CertificateAlias, TlsConfig},
    types::{
        CoordinatorSpec, DeletionPolicy, InitSpec, NamedServiceTemplateSpec, SecretReference,
        StorageType,
    },
};

/// Name of the sidecar coordinating Galera failover.
pub const MARIADB_COORDINATOR_CONTAINER_NAME: &str = "md-coordinator";

/// Directory certificates are mounted under.
pub const MARIADB_CERT_MOUNT_PATH: &str = "/etc/mysql/certs";

/// MariaDBSpec describes the desired state of a MariaDB server or Galera cluster.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "MariaDB",
    plural = "mariadbs",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "md",
    category = "datastore",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MariaDBSpec {
    /// Version of MariaDB to be deployed.
    #[validate(length(min = 1))]
    pub version: String,
    /// Number of instances to deploy. More than one forms a Galera cluster.
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
    /// Coordinator configures the md-coordinator sidecar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<CoordinatorSpec>,
    /// HealthChecker for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub health_checker: Option<HealthCheckSpec>,
}

impl MariaDB {
    /// Reports whether the instances form a Galera cluster.
    pub fn is_cluster(&self) -> bool {
        self.spec.replicas.is_some_and(|r| r > 1)
    }

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

    /// Name of the Secret holding inline configuration.
    pub fn inline_config_secret_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), "inline")
    }

    /// Directory the certificate for `alias` is mounted in.
    pub fn cert_mount_path(alias: CertificateAlias) -> String {
        format!("{MARIADB_CERT_MOUNT_PATH}/{alias}")
    }
}

impl Database for MariaDB {
    const RESOURCE_CODE: &'static str = "md";
    const CONTAINER_NAME: &'static str = "mariadb";
    const CERT_ALIASES: &'static [CertificateAlias] = &[
        CertificateAlias::Server,
        CertificateAlias::Client,
        CertificateAlias::MetricsExporter,
    ];

    spec_accessors!();
}

impl Defaults for MariaDB {
    spec_defaults!(MariaDBVersion);

    fn set_defaults(&mut self, version: Option<&MariaDBVersion>) {
        let name = self.offshoot_name();
        self.spec.deletion_policy.get_or_insert(DeletionPolicy::Delete);
        self.spec.replicas.get_or_insert(1);
        self.spec.storage_type.get_or_insert(StorageType::Durable);
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
        if self.is_cluster() {
            let coordinator = self.spec.coordinator.get_or_insert_with(CoordinatorSpec::default);
            resources::set_default_resource_limits(
                coordinator.resources.get_or_insert_with(Default::default),
                &resources::coordinator_default_resources(),
            );
            defaults::set_container_security_context(&mut coordinator.security_context, version);
        }
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
    use crate::catalog::{MariaDBVersionSpec, VersionSecurityContext};

    fn mariadb(spec: serde_json::Value) -> MariaDB {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "kubedb.com/v1alpha2",
            "kind": "MariaDB",
            "metadata": {"name": "md", "namespace": "demo"},
            "spec": spec,
        }))
        .unwrap()
    }

    fn version() -> MariaDBVersion {
        MariaDBVersion::new(
            "11.1.3",
            MariaDBVersionSpec {
                version: "11.1.3".into(),
                security_context: Some(VersionSecurityContext {
                    run_as_user: Some(999),
                    run_as_group: None,
                }),
                ..Default::default()
            },
        )
    }

    #[test]
    fn names() {
        let md = mariadb(serde_json::json!({"version": "11.1.3", "replicas": 3}));
        assert!(md.is_cluster());
        assert_eq!(md.peer_name(2), "md-2.md-pods.demo");
        assert_eq!(md.inline_config_secret_name(), "md-inline");
        assert_eq!(
            MariaDB::cert_mount_path(CertificateAlias::Server),
            "/etc/mysql/certs/server"
        );
    }

    #[test]
    fn galera_defaults() {
        let mut md = mariadb(serde_json::json!({"version": "11.1.3", "replicas": 3}));
        md.set_defaults(Some(&version()));

        let coordinator = md.spec.coordinator.as_ref().unwrap();
        assert_eq!(
            coordinator.resources,
            Some(resources::coordinator_default_resources())
        );
        assert_eq!(
            coordinator.security_context.as_ref().and_then(|sc| sc.run_as_user),
            Some(999)
        );
        let template = md.spec.pod_template.as_ref().unwrap();
        assert_eq!(template.spec.service_account_name.as_deref(), Some("md"));
        assert!(template.spec.affinity.is_some());
        assert_eq!(md.auth_secret_name(), "md-auth");
    }

    #[test]
    fn standalone_has_no_coordinator() {
        let mut md = mariadb(serde_json::json!({"version": "11.1.3"}));
        md.set_defaults(Some(&version()));
        assert_eq!(md.spec.replicas, Some(1));
        assert!(md.spec.coordinator.is_none());
        assert_eq!(
            md.spec.health_checker,
            Some(HealthCheckSpec {
                period_seconds: Some(10),
                timeout_seconds: Some(10),
                failure_threshold: Some(1),
                disable_write_check: false,
            })
        );
    }
}
