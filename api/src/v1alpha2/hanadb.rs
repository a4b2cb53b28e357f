use k8s_openapi::api::core::v1 as core;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{DatabaseStatus, spec_accessors, spec_defaults};
use crate::{
    Database, Defaults,
    catalog::HanaDBVersion,
    database::uid_config_secret_name,
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    meta::{name_with_prefix, name_with_suffix},
    monitor::AgentSpec,
    offshoot::PodTemplateSpec,
    resources,
    tls::{CertificateAlias, TlsConfig},
    types::{DeletionPolicy, NamedServiceTemplateSpec, SecretReference, StorageType},
};

/// HanaDBSpec describes the desired state of an SAP HANA database.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "HanaDB",
    plural = "hanadbs",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "hdb",
    category = "datastore",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct HanaDBSpec {
    /// Version of SAP HANA to be deployed.
    #[validate(length(min = 1))]
    pub version: String,
    /// Number of instances to deploy.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// Topology selects the deployment mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topology: Option<HanaDBTopology>,
    /// StorageType can be durable (default) or ephemeral.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<StorageType>,
    /// Storage to specify how storage shall be used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
    /// AuthSecret holds the credentials of the SYSTEM user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
    /// ConfigSecret holds custom global.ini settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<core::LocalObjectReference>,
    /// PodTemplate is an optional configuration for pods used to expose the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
    /// ServiceTemplates is an optional configuration for services used to expose the database.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_templates: Vec<NamedServiceTemplateSpec>,
    /// TLS contains tls configurations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
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

/// HanaDBMode is the deployment mode.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
pub enum HanaDBMode {
    /// A single instance.
    Standalone,
    /// A primary replicating to secondaries with HANA system replication.
    SystemReplication,
}

/// HanaDBTopology selects the deployment mode.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HanaDBTopology {
    /// Mode of the deployment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<HanaDBMode>,
    /// SystemReplication tunes replication in SystemReplication mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_replication: Option<HanaDBSystemReplicationSpec>,
}

/// HanaDBSystemReplicationSpec tunes HANA system replication.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HanaDBSystemReplicationSpec {
    /// How commits wait for secondaries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_mode: Option<HanaDBReplicationMode>,
    /// How secondaries apply changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_mode: Option<HanaDBOperationMode>,
}

/// HanaDBReplicationMode controls when the primary acknowledges a commit.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum HanaDBReplicationMode {
    /// After the secondary persisted the log.
    Sync,
    /// After the secondary received the log in memory.
    Syncmem,
    /// Without waiting for the secondary.
    Async,
}

/// HanaDBOperationMode controls how secondaries apply changes.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HanaDBOperationMode {
    /// Continuously replays the log.
    Logreplay,
    /// Replays the log and serves reads.
    LogreplayReadaccess,
    /// Ships delta data snapshots.
    DeltaDatashipping,
}

impl HanaDB {
    /// Reports whether the database runs a single instance.
    pub fn is_standalone(&self) -> bool {
        self.spec
            .topology
            .as_ref()
            .is_none_or(|t| t.mode == Some(HanaDBMode::Standalone))
    }

    /// Reports whether the database runs with system replication.
    pub fn is_system_replication(&self) -> bool {
        self.spec
            .topology
            .as_ref()
            .is_some_and(|t| t.mode == Some(HanaDBMode::SystemReplication))
    }

    /// Name of the service routing to secondaries.
    pub fn secondary_service_name(&self) -> String {
        name_with_prefix(self.service_name(), "secondary")
    }

    /// Name of the PetSet running the replication observer.
    pub fn observer_petset_name(&self) -> String {
        name_with_suffix(self.petset_name(), "observer")
    }
}

impl Database for HanaDB {
    const RESOURCE_CODE: &'static str = "hdb";
    const CONTAINER_NAME: &'static str = "hanadb";
    const CERT_ALIASES: &'static [CertificateAlias] =
        &[CertificateAlias::Server, CertificateAlias::Client];

    spec_accessors!();

    fn config_secret_name(&self) -> String {
        uid_config_secret_name(self)
    }
}

impl Defaults for HanaDB {
    spec_defaults!(HanaDBVersion);

    fn set_defaults(&mut self, version: Option<&HanaDBVersion>) {
        self.spec.deletion_policy.get_or_insert(DeletionPolicy::Delete);
        self.spec.storage_type.get_or_insert(StorageType::Durable);
        self.spec.pod_template.get_or_insert_with(PodTemplateSpec::default);

        let Some(version) = version else {
            return;
        };
        if self.is_standalone() {
            self.spec.replicas.get_or_insert(1);
        }
        if self.is_system_replication()
            && let Some(topology) = self.spec.topology.as_mut()
        {
            let sr = topology
                .system_replication
                .get_or_insert_with(HanaDBSystemReplicationSpec::default);
            sr.replication_mode.get_or_insert(HanaDBReplicationMode::Sync);
            sr.operation_mode.get_or_insert(HanaDBOperationMode::Logreplay);
        }
        let template = self.spec.pod_template.get_or_insert_with(PodTemplateSpec::default);
        defaults::set_default_container_security_context(template, Self::CONTAINER_NAME, version);
        if let Some(c) = template
            .spec
            .containers
            .iter_mut()
            .find(|c| c.name == Self::CONTAINER_NAME)
            && resources::is_empty(c.resources.as_ref())
        {
            resources::set_default_resource_limits(
                c.resources.get_or_insert_with(Default::default),
                &resources::hanadb_default_resources(),
            );
        }
        self.set_health_checker_defaults();
    }

    fn set_health_checker_defaults(&mut self) {
        health::set_health_checker_defaults(
            &mut self.spec.health_checker,
            HealthCheckDefaults::new(120, 120, 1),
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
    use crate::catalog::{HanaDBVersionSpec, VersionSecurityContext};

    fn hanadb(spec: serde_json::Value) -> HanaDB {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "kubedb.com/v1alpha2",
            "kind": "HanaDB",
            "metadata": {"name": "hdb", "namespace": "demo", "uid": "0b8a9c2d-4e5f-6789-abcd-0123456789ab"},
            "spec": spec,
        }))
        .unwrap()
    }

    fn version() -> HanaDBVersion {
        HanaDBVersion::new(
            "2.0.82",
            HanaDBVersionSpec {
                version: "2.0.82".into(),
                security_context: Some(VersionSecurityContext {
                    run_as_user: Some(12000),
                    run_as_group: Some(79),
                }),
                ..Default::default()
            },
        )
    }

    #[test]
    fn names() {
        let hdb = hanadb(serde_json::json!({"version": "2.0.82"}));
        assert_eq!(hdb.config_secret_name(), "hdb-6789ab");
        assert_eq!(hdb.secondary_service_name(), "hdb-secondary");
        assert_eq!(hdb.observer_petset_name(), "hdb-observer");
        assert!(hdb.is_standalone());
        assert!(!hdb.is_system_replication());
    }

    #[test]
    fn system_replication_defaults() {
        let mut hdb = hanadb(serde_json::json!({
            "version": "2.0.82",
            "replicas": 3,
            "topology": {"mode": "SystemReplication"},
        }));
        hdb.set_defaults(Some(&version()));

        let sr = hdb
            .spec
            .topology
            .as_ref()
            .and_then(|t| t.system_replication.as_ref())
            .unwrap();
        assert_eq!(sr.replication_mode, Some(HanaDBReplicationMode::Sync));
        assert_eq!(sr.operation_mode, Some(HanaDBOperationMode::Logreplay));
        assert_eq!(hdb.spec.replicas, Some(3));
        let c = hdb.spec.pod_template.as_ref().unwrap().spec.container("hanadb").unwrap();
        assert_eq!(c.resources, Some(resources::hanadb_default_resources()));
        assert_eq!(
            c.security_context.as_ref().and_then(|sc| sc.run_as_group),
            Some(79)
        );
        assert_eq!(
            hdb.spec.health_checker,
            Some(HealthCheckSpec {
                period_seconds: Some(120),
                timeout_seconds: Some(120),
                failure_threshold: Some(1),
                disable_write_check: false,
            })
        );
        assert_eq!(
            serde_json::to_value(HanaDBOperationMode::LogreplayReadaccess).unwrap(),
            "logreplay_readaccess"
        );
    }

    #[test]
    fn standalone_without_version() {
        let mut hdb = hanadb(serde_json::json!({"version": "2.0.82"}));
        hdb.set_defaults(None);
        assert_eq!(hdb.spec.storage_type, Some(StorageType::Durable));
        assert!(hdb.spec.replicas.is_none());
        assert!(hdb.spec.health_checker.is_none());
    }
}
