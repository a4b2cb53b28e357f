use k8s_openapi::api::core::v1 as core;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::error;
use validator::Validate;

use super::{DatabaseStatus, spec_defaults};
use crate::{
    Database, Defaults,
    catalog::{CatalogVersion, DruidVersion},
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    meta::name_with_suffix,
    monitor::AgentSpec,
    offshoot::PodTemplateSpec,
    resources,
    tls::{CertificateAlias, TlsConfig},
    types::{
        AutoOpsSpec, DeletionPolicy, InitSpec, NamedServiceTemplateSpec, SecretReference,
        StorageType,
    },
};

/// DRUID_EXPORTER_PORT is the port of the Druid metrics exporter.
pub const DRUID_EXPORTER_PORT: i32 = 9104;

/// DruidSpec describes the desired state of a Druid cluster.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "Druid",
    plural = "druids",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "dr",
    category = "datastore",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DruidSpec {
    /// AutoOps contains configuration of automatic ops-request-recommendation generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_ops: Option<AutoOpsSpec>,
    /// Version of Druid to be deployed.
    #[validate(length(min = 1))]
    pub version: String,
    /// Topology of the Druid nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub topology: Option<DruidClusterTopology>,
    /// DisableSecurity turns off basic authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_security: Option<bool>,
    /// AuthSecret holds the credentials of the admin user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
    /// Init is used to initialize the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init: Option<InitSpec>,
    /// ConfigSecret holds custom runtime properties.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<core::LocalObjectReference>,
    /// EnableSSL serves every endpoint over TLS.
    #[serde(default, rename = "enableSSL", skip_serializing_if = "std::ops::Not::not")]
    pub enable_ssl: bool,
    /// KeystoreCredSecret holds the keystore password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keystore_cred_secret: Option<SecretReference>,
    /// TLS contains tls configurations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    /// MetadataStorage is the SQL database holding segment and task metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_storage: Option<MetadataStorage>,
    /// DeepStorage is where segments are persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deep_storage: Option<DeepStorageSpec>,
    /// ZookeeperRef points at the ZooKeeper ensemble used for coordination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zookeeper_ref: Option<ZookeeperRef>,
    /// ServiceTemplates is an optional configuration for services used to expose the database.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_templates: Vec<NamedServiceTemplateSpec>,
    /// Halted indicates that the database is halted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub halted: bool,
    /// Monitor is used to monitor the database instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<AgentSpec>,
    /// DeletionPolicy controls the delete operation for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
    /// HealthChecker for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub health_checker: Option<HealthCheckSpec>,
}

/// DruidClusterTopology lists the node roles of a cluster.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DruidClusterTopology {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    #[allow(missing_docs)]
    pub coordinators: Option<DruidNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    #[allow(missing_docs)]
    pub overlords: Option<DruidNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    #[allow(missing_docs)]
    pub middle_managers: Option<DruidDataNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    #[allow(missing_docs)]
    pub historicals: Option<DruidDataNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    #[allow(missing_docs)]
    pub brokers: Option<DruidNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    #[allow(missing_docs)]
    pub routers: Option<DruidNode>,
}

/// DruidNode configures the pods of one role.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DruidNode {
    /// Number of pods of this role.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// Suffix appended to the PetSet name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub suffix: String,
    /// PodTemplate customizes the pods of this role.
    #[serde(default)]
    pub pod_template: PodTemplateSpec,
}

/// DruidDataNode configures a role that keeps segments on disk.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DruidDataNode {
    #[serde(flatten)]
    #[validate(nested)]
    #[allow(missing_docs)]
    pub node: DruidNode,
    /// StorageType can be durable (default) or ephemeral.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<StorageType>,
    /// Storage of each pod.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
    /// EphemeralStorage used when the storage type is ephemeral.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ephemeral_storage: Option<core::EmptyDirVolumeSource>,
}

/// DruidNodeRole names the roles of a Druid cluster.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, strum::AsRefStr, strum::Display, strum::EnumIter,
)]
#[strum(serialize_all = "camelCase")]
pub enum DruidNodeRole {
    #[allow(missing_docs)]
    Coordinators,
    #[allow(missing_docs)]
    Overlords,
    #[allow(missing_docs)]
    MiddleManagers,
    #[allow(missing_docs)]
    Historicals,
    #[allow(missing_docs)]
    Brokers,
    #[allow(missing_docs)]
    Routers,
}

impl DruidNodeRole {
    /// Port the role's main container listens on.
    pub fn container_port(self) -> i32 {
        match self {
            Self::Coordinators => 8081,
            Self::Overlords => 8090,
            Self::MiddleManagers => 8091,
            Self::Historicals => 8083,
            Self::Brokers => 8082,
            Self::Routers => 8888,
        }
    }

    fn default_resources(self) -> core::ResourceRequirements {
        match self {
            Self::MiddleManagers => resources::druid_memory_intensive_resources(),
            _ => resources::default_resources(),
        }
    }
}

/// DruidMetadataStorageType is the engine of the metadata store.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
pub enum DruidMetadataStorageType {
    #[allow(missing_docs)]
    MySQL,
    #[allow(missing_docs)]
    PostgreSQL,
}

/// MetadataStorage references the SQL database holding Druid metadata.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetadataStorage {
    /// Name of the database object.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Namespace of the database object.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Engine of the metadata store.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<DruidMetadataStorageType>,
    /// CreateTables makes Druid create its tables on startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_tables: Option<bool>,
    /// LinkedDB is the database name inside the store.
    #[serde(default, rename = "linkedDB", skip_serializing_if = "String::is_empty")]
    pub linked_db: String,
    /// ExternallyManaged reports that the store is not provisioned for this cluster.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub externally_managed: bool,
    /// Version of a provisioned store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// DruidDeepStorageType is the backend segments are persisted to.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DruidDeepStorageType {
    #[default]
    #[allow(missing_docs)]
    S3,
    #[allow(missing_docs)]
    Google,
    #[allow(missing_docs)]
    Azure,
    #[allow(missing_docs)]
    Hdfs,
}

/// DeepStorageSpec configures segment persistence.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeepStorageSpec {
    /// Backend type.
    #[serde(rename = "type")]
    pub type_: DruidDeepStorageType,
    /// ConfigSecret holds the backend credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<core::LocalObjectReference>,
}

/// ZookeeperRef references the ZooKeeper ensemble of a cluster.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ZookeeperRef {
    /// Name of the ZooKeeper object.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Namespace of the ZooKeeper object.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// PathsBase is the znode all Druid paths live under.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub paths_base: String,
    /// ExternallyManaged reports that the ensemble is not provisioned for this cluster.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub externally_managed: bool,
    /// Version of a provisioned ensemble.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl DruidClusterTopology {
    /// Returns the node configuration of `role`.
    pub fn node(&self, role: DruidNodeRole) -> Option<&DruidNode> {
        match role {
            DruidNodeRole::Coordinators => self.coordinators.as_ref(),
            DruidNodeRole::Overlords => self.overlords.as_ref(),
            DruidNodeRole::MiddleManagers => self.middle_managers.as_ref().map(|n| &n.node),
            DruidNodeRole::Historicals => self.historicals.as_ref().map(|n| &n.node),
            DruidNodeRole::Brokers => self.brokers.as_ref(),
            DruidNodeRole::Routers => self.routers.as_ref(),
        }
    }

    fn node_mut(&mut self, role: DruidNodeRole) -> Option<&mut DruidNode> {
        match role {
            DruidNodeRole::Coordinators => self.coordinators.as_mut(),
            DruidNodeRole::Overlords => self.overlords.as_mut(),
            DruidNodeRole::MiddleManagers => self.middle_managers.as_mut().map(|n| &mut n.node),
            DruidNodeRole::Historicals => self.historicals.as_mut().map(|n| &mut n.node),
            DruidNodeRole::Brokers => self.brokers.as_mut(),
            DruidNodeRole::Routers => self.routers.as_mut(),
        }
    }
}

impl DruidDataNode {
    fn set_defaults(&mut self) {
        self.node.replicas.get_or_insert(1);
        let storage_type = *self.storage_type.get_or_insert(StorageType::Durable);
        if storage_type == StorageType::Durable {
            self.storage.get_or_insert_with(default_pvc);
        }
    }
}

/// Returns the claim used for data nodes without storage: 1Gi, ReadWriteOnce.
pub fn default_pvc() -> core::PersistentVolumeClaimSpec {
    core::PersistentVolumeClaimSpec {
        access_modes: Some(vec!["ReadWriteOnce".to_string()]),
        resources: Some(core::VolumeResourceRequirements {
            requests: Some(
                [(
                    "storage".to_string(),
                    k8s_openapi::apimachinery::pkg::api::resource::Quantity("1Gi".to_string()),
                )]
                .into(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}

impl Druid {
    /// Name of the PetSet running `role`.
    pub fn node_petset_name(&self, role: DruidNodeRole) -> String {
        name_with_suffix(self.offshoot_name(), role.as_ref().to_lowercase())
    }

    /// Name of the service fronting the coordinators.
    pub fn coordinators_service_name(&self) -> String {
        name_with_suffix(self.service_name(), "coordinators")
    }

    /// Name of the service fronting the overlords.
    pub fn overlords_service_name(&self) -> String {
        name_with_suffix(self.service_name(), "overlords")
    }

    /// Name of the service fronting the brokers.
    pub fn brokers_service_name(&self) -> String {
        name_with_suffix(self.service_name(), "brokers")
    }

    /// Name of the service fronting the routers.
    pub fn routers_service_name(&self) -> String {
        name_with_suffix(self.service_name(), "routers")
    }

    /// Name of the Secret holding the generated credentials of `user`.
    pub fn default_user_cred_secret_name(&self, user: &str) -> String {
        name_with_suffix(self.offshoot_name(), format!("{}-cred", user.replace('_', "-")))
    }

    /// Name of the metadata store provisioned for this cluster.
    pub fn metadata_storage_name(&self) -> String {
        let suffix = match self.spec.metadata_storage.as_ref().and_then(|m| m.type_) {
            Some(DruidMetadataStorageType::PostgreSQL) => "pg-metadata",
            _ => "mysql-metadata",
        };
        name_with_suffix(self.offshoot_name(), suffix)
    }

    /// Name of the ZooKeeper ensemble provisioned for this cluster.
    pub fn zookeeper_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), "zk")
    }

    fn set_metadata_storage_defaults(&mut self) {
        let default_name = self.metadata_storage_name();
        let namespace = self.namespace();
        let ms = self
            .spec
            .metadata_storage
            .get_or_insert_with(MetadataStorage::default);
        if ms.name.is_empty() {
            ms.externally_managed = false;
            ms.name = default_name;
        }
        if ms.namespace.is_empty() {
            ms.namespace = namespace;
        }
        if ms.linked_db.is_empty() {
            ms.linked_db = "druid".to_string();
        }
        ms.create_tables.get_or_insert(true);
        // The type of an external store is only known from its AppBinding.
        if ms.type_.is_none() && !ms.externally_managed {
            ms.type_ = Some(DruidMetadataStorageType::MySQL);
        }
        if ms.version.is_none() {
            let version = match ms.type_ {
                Some(DruidMetadataStorageType::PostgreSQL) => "13.13",
                _ => "8.0.35",
            };
            ms.version = Some(version.to_string());
        }
    }

    fn set_zookeeper_defaults(&mut self) {
        let default_name = self.zookeeper_name();
        let namespace = self.namespace();
        let zk = self.spec.zookeeper_ref.get_or_insert_with(ZookeeperRef::default);
        if zk.name.is_empty() {
            zk.externally_managed = false;
            zk.name = default_name;
        }
        if zk.namespace.is_empty() {
            zk.namespace = namespace;
        }
        zk.version.get_or_insert_with(|| "3.7.2".to_string());
    }

    fn set_node_defaults(&mut self, version: &DruidVersion) {
        let Some(topology) = self.spec.topology.as_mut() else {
            return;
        };
        for role in <DruidNodeRole as strum::IntoEnumIterator>::iter() {
            let Some(node) = topology.node_mut(role) else {
                continue;
            };
            let template = &mut node.pod_template;
            defaults::set_default_container_security_context(
                template,
                Self::CONTAINER_NAME,
                version,
            );
            if let Some(c) = template
                .spec
                .containers
                .iter_mut()
                .find(|c| c.name == Self::CONTAINER_NAME)
                && resources::is_empty(c.resources.as_ref())
            {
                resources::set_default_resource_limits(
                    c.resources.get_or_insert_with(Default::default),
                    &role.default_resources(),
                );
            }
            if let Some(c) = template
                .spec
                .init_containers
                .iter_mut()
                .find(|c| c.name == "init-druid")
                && resources::is_empty(c.resources.as_ref())
            {
                resources::set_default_resource_limits(
                    c.resources.get_or_insert_with(Default::default),
                    &resources::init_container_resources(),
                );
            }
        }
    }
}

impl Database for Druid {
    const RESOURCE_CODE: &'static str = "dr";
    const CONTAINER_NAME: &'static str = "druid";
    const CERT_ALIASES: &'static [CertificateAlias] =
        &[CertificateAlias::Server, CertificateAlias::Client];

    fn auth_secret(&self) -> Option<&SecretReference> {
        self.spec.auth_secret.as_ref()
    }
    fn tls(&self) -> Option<&TlsConfig> {
        self.spec.tls.as_ref()
    }
    fn service_templates(&self) -> &[NamedServiceTemplateSpec] {
        &self.spec.service_templates
    }
    fn monitor(&self) -> Option<&AgentSpec> {
        self.spec.monitor.as_ref()
    }
}

impl Defaults for Druid {
    spec_defaults!(DruidVersion);

    fn set_defaults(&mut self, version: Option<&DruidVersion>) {
        let name = self.offshoot_name();
        self.spec.deletion_policy.get_or_insert(DeletionPolicy::Delete);
        if !*self.spec.disable_security.get_or_insert(false) && self.spec.auth_secret.is_none() {
            self.spec.auth_secret = Some(SecretReference {
                name: self.default_user_cred_secret_name("admin"),
                ..Default::default()
            });
        }
        if let Some(topology) = self.spec.topology.as_mut() {
            for node in [
                topology.coordinators.get_or_insert_with(DruidNode::default),
                topology.brokers.get_or_insert_with(DruidNode::default),
            ] {
                node.replicas.get_or_insert(1);
            }
            for node in [topology.overlords.as_mut(), topology.routers.as_mut()]
                .into_iter()
                .flatten()
            {
                node.replicas.get_or_insert(1);
            }
            topology
                .middle_managers
                .get_or_insert_with(DruidDataNode::default)
                .set_defaults();
            topology
                .historicals
                .get_or_insert_with(DruidDataNode::default)
                .set_defaults();
        }
        self.set_metadata_storage_defaults();
        self.set_zookeeper_defaults();

        let Some(version) = version else {
            return;
        };
        // Images before Druid 26 do not run as a non-root user.
        match version.db_version().split('.').next().map(str::parse::<u64>) {
            Some(Ok(major)) if major > 25 => self.set_node_defaults(version),
            Some(Ok(_)) => {}
            _ => {
                error!(
                    name,
                    version = version.db_version(),
                    "failed to parse druid version"
                );
                return;
            }
        }
        if let Some(monitor) = self.spec.monitor.as_mut() {
            let exporter = &mut monitor
                .prometheus
                .get_or_insert_with(Default::default)
                .exporter;
            if exporter.port == 0 {
                exporter.port = DRUID_EXPORTER_PORT;
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
            HealthCheckDefaults::new(30, 10, 3),
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
    use crate::catalog::{DruidVersionSpec, VersionSecurityContext};

    fn druid() -> Druid {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "kubedb.com/v1alpha2",
            "kind": "Druid",
            "metadata": {"name": "dr", "namespace": "demo"},
            "spec": {
                "version": "28.0.1",
                "deepStorage": {"type": "s3", "configSecret": {"name": "deep-storage"}},
                "topology": {"routers": {"replicas": 2}},
            },
        }))
        .unwrap()
    }

    fn version(v: &str) -> DruidVersion {
        DruidVersion::new(
            v,
            DruidVersionSpec {
                version: v.into(),
                security_context: Some(VersionSecurityContext {
                    run_as_user: Some(1000),
                    run_as_group: None,
                }),
                ..Default::default()
            },
        )
    }

    #[test]
    fn names() {
        let dr = druid();
        assert_eq!(dr.node_petset_name(DruidNodeRole::MiddleManagers), "dr-middlemanagers");
        assert_eq!(DruidNodeRole::MiddleManagers.to_string(), "middleManagers");
        assert_eq!(dr.coordinators_service_name(), "dr-coordinators");
        assert_eq!(dr.routers_service_name(), "dr-routers");
        assert_eq!(dr.config_secret_name(), "dr-config");
        assert_eq!(dr.default_user_cred_secret_name("admin"), "dr-admin-cred");
        assert_eq!(DruidNodeRole::Brokers.container_port(), 8082);
    }

    #[test]
    fn topology_defaults() {
        let mut dr = druid();
        dr.set_defaults(None);

        assert_eq!(dr.auth_secret_name(), "dr-admin-cred");
        let topology = dr.spec.topology.as_ref().unwrap();
        assert_eq!(topology.coordinators.as_ref().unwrap().replicas, Some(1));
        assert_eq!(topology.routers.as_ref().unwrap().replicas, Some(2));
        assert!(topology.overlords.is_none());
        let historicals = topology.historicals.as_ref().unwrap();
        assert_eq!(historicals.storage_type, Some(StorageType::Durable));
        assert_eq!(historicals.storage, Some(default_pvc()));

        let ms = dr.spec.metadata_storage.as_ref().unwrap();
        assert_eq!(ms.name, "dr-mysql-metadata");
        assert_eq!(ms.namespace, "demo");
        assert_eq!(ms.linked_db, "druid");
        assert_eq!(ms.version.as_deref(), Some("8.0.35"));
        let zk = dr.spec.zookeeper_ref.as_ref().unwrap();
        assert_eq!(zk.name, "dr-zk");
        assert_eq!(zk.version.as_deref(), Some("3.7.2"));
        assert!(dr.spec.health_checker.is_none());
    }

    #[test]
    fn version_defaults() {
        let mut dr = druid();
        dr.spec.monitor = Some(AgentSpec::default());
        dr.set_defaults(Some(&version("28.0.1")));

        let topology = dr.spec.topology.as_ref().unwrap();
        let mm = &topology.middle_managers.as_ref().unwrap().node.pod_template;
        let c = mm.spec.container("druid").unwrap();
        assert_eq!(
            c.resources,
            Some(resources::druid_memory_intensive_resources())
        );
        assert_eq!(
            c.security_context.as_ref().and_then(|sc| sc.run_as_user),
            Some(1000)
        );
        assert_eq!(
            dr.spec.health_checker.as_ref().and_then(|h| h.period_seconds),
            Some(30)
        );
        let exporter = &dr.spec.monitor.as_ref().unwrap().prometheus.as_ref().unwrap().exporter;
        assert_eq!(exporter.port, DRUID_EXPORTER_PORT);
    }

    #[test]
    fn old_images_keep_pods_untouched() {
        let mut dr = druid();
        dr.set_defaults(Some(&version("25.0.0")));
        let topology = dr.spec.topology.as_ref().unwrap();
        assert!(
            topology
                .node(DruidNodeRole::Coordinators)
                .unwrap()
                .pod_template
                .spec
                .containers
                .is_empty()
        );
        assert!(dr.spec.health_checker.is_some());
    }
}
