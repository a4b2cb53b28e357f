use k8s_openapi::api::core::v1 as core;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{DatabaseStatus, spec_accessors, spec_defaults};
use crate::{
    Database, Defaults, Labels,
    catalog::MySQLVersion,
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    meta::{self, name_with_suffix},
    monitor::AgentSpec,
    offshoot::{self, PodTemplateSpec},
    resources,
    tls::{CertificateAlias, TlsConfig},
    types::{
        AddressType, AutoOpsSpec, CoordinatorSpec, DeletionPolicy, InitSpec,
        NamedServiceTemplateSpec, ObjectReference, SecretReference, StorageType,
    },
};

/// Number of members of a group replication cluster unless replicas are set.
pub const MYSQL_DEFAULT_GROUP_SIZE: i32 = 3;
/// Upper bound on group replication members.
pub const MYSQL_MAX_GROUP_MEMBERS: i32 = 9;
/// Port mysqld listens on.
pub const MYSQL_DATABASE_PORT: i32 = 3306;
/// Read-write port of MySQL Router.
pub const MYSQL_ROUTER_READ_WRITE_PORT: i32 = 6446;
/// Read-only port of MySQL Router.
pub const MYSQL_ROUTER_READ_ONLY_PORT: i32 = 6447;
/// Port group members communicate on.
pub const MYSQL_GROUP_COMM_PORT: i32 = 33060;
/// Name of the MySQL init container.
pub const MYSQL_INIT_CONTAINER_NAME: &str = "mysql-init";
/// Name of the sidecar coordinating failover.
pub const MYSQL_COORDINATOR_CONTAINER_NAME: &str = "mysql-coordinator";
/// Name of the MySQL Router container.
pub const MYSQL_ROUTER_CONTAINER_NAME: &str = "mysql-router";
/// Label separating database pods from router pods of an InnoDB cluster.
pub const MYSQL_COMPONENT_KEY: &str = "mysql.kubedb.com/component";
/// [`MYSQL_COMPONENT_KEY`] value of database pods.
pub const MYSQL_COMPONENT_DATABASE: &str = "database";
/// [`MYSQL_COMPONENT_KEY`] value of router pods.
pub const MYSQL_COMPONENT_ROUTER: &str = "router";

const MYSQL_CERT_DIRECTORY: &str = "/etc/mysql/certs";

/// MySQLSpec describes the desired state of a MySQL server or cluster.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "MySQL",
    plural = "mysqls",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "my",
    category = "datastore",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MySQLSpec {
    /// AutoOps contains configuration of automatic ops-request-recommendation generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_ops: Option<AutoOpsSpec>,
    /// Version of MySQL to be deployed.
    #[validate(length(min = 1))]
    pub version: String,
    /// Number of instances to deploy.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// Topology selects the clustering mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topology: Option<MySQLTopology>,
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
    /// UseAddressType selects how members address each other.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_address_type: Option<AddressType>,
    /// Coordinator configures the mysql-coordinator sidecar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<CoordinatorSpec>,
    /// HealthChecker for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub health_checker: Option<HealthCheckSpec>,
}

/// MySQLMode is the clustering mode.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
pub enum MySQLMode {
    /// Group replication without a router.
    GroupReplication,
    /// Group replication fronted by MySQL Router.
    InnoDBCluster,
    /// Read-only replica of a database outside this object.
    RemoteReplica,
    /// Semi-synchronous source/replica replication.
    SemiSync,
}

/// MySQLGroupMode is the primary election mode of a group.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
pub enum MySQLGroupMode {
    /// One writable primary.
    #[default]
    #[serde(rename = "Single-Primary")]
    SinglePrimary,
    /// Every member is writable.
    #[serde(rename = "Multi-Primary")]
    MultiPrimary,
}

/// ErrantTransactionRecoveryPolicy is how a replica with errant transactions rejoins.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
pub enum ErrantTransactionRecoveryPolicy {
    /// Re-clone the replica from the source.
    Clone,
    /// Inject empty transactions for the errant GTIDs.
    #[default]
    PseudoTransaction,
}

/// MySQLTopology selects and configures the clustering mode.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MySQLTopology {
    /// Mode of the cluster.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<MySQLMode>,
    /// Group configures group replication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<MySQLGroupSpec>,
    /// InnoDBCluster configures the router of an InnoDB cluster.
    #[serde(rename = "innoDBCluster", skip_serializing_if = "Option::is_none")]
    pub innodb_cluster: Option<MySQLInnoDBClusterSpec>,
    /// RemoteReplica names the AppBinding of the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_replica: Option<RemoteReplicaSpec>,
    /// SemiSync tunes semi-synchronous replication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semi_sync: Option<SemiSyncSpec>,
}

/// MySQLGroupSpec configures group replication.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MySQLGroupSpec {
    /// Mode of the group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<MySQLGroupMode>,
    /// Name of the group, a version 4 UUID.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// MySQLInnoDBClusterSpec configures an InnoDB cluster.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MySQLInnoDBClusterSpec {
    /// Mode of the group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<MySQLGroupMode>,
    /// Router in front of the cluster.
    #[serde(default)]
    pub router: MySQLRouterSpec,
}

/// MySQLRouterSpec configures MySQL Router.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MySQLRouterSpec {
    /// Number of router instances.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// PodTemplate of the router pods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
}

/// RemoteReplicaSpec names the source of a remote replica.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoteReplicaSpec {
    /// AppBinding of the source.
    pub source_ref: ObjectReference,
}

/// SemiSyncSpec tunes semi-synchronous replication.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SemiSyncSpec {
    /// Replicas the source waits for before committing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_wait_for_replica_count: Option<i32>,
    /// How long the source waits before falling back to asynchronous replication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_timeout: Option<String>,
    /// ErrantTransactionRecoveryPolicy is how replicas with errant transactions rejoin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errant_transaction_recovery_policy: Option<ErrantTransactionRecoveryPolicy>,
}

impl MySQL {
    fn mode(&self) -> Option<MySQLMode> {
        self.spec.topology.as_ref().and_then(|t| t.mode)
    }

    /// Reports whether the members form a group replication cluster.
    pub fn uses_group_replication(&self) -> bool {
        self.mode() == Some(MySQLMode::GroupReplication)
    }

    /// Reports whether the members form an InnoDB cluster.
    pub fn is_innodb_cluster(&self) -> bool {
        self.mode() == Some(MySQLMode::InnoDBCluster)
    }

    /// Reports whether this database replicates from a remote source.
    pub fn is_remote_replica(&self) -> bool {
        self.mode() == Some(MySQLMode::RemoteReplica)
    }

    /// Reports whether the members use semi-synchronous replication.
    pub fn is_semi_sync(&self) -> bool {
        self.mode() == Some(MySQLMode::SemiSync)
    }

    fn is_clustered(&self) -> bool {
        self.uses_group_replication() || self.is_innodb_cluster() || self.is_semi_sync()
    }

    /// Name of the MySQL Router deployment.
    pub fn router_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), MYSQL_COMPONENT_ROUTER)
    }

    /// Selectors of the router pods.
    pub fn router_selectors(&self) -> Labels {
        let mut selectors = Database::offshoot_selectors(self);
        selectors.insert(
            MYSQL_COMPONENT_KEY.to_string(),
            MYSQL_COMPONENT_ROUTER.to_string(),
        );
        selectors
    }

    /// Cluster DNS name of the standby service.
    pub fn standby_service_dns(&self) -> String {
        format!("{}.{}.svc", self.standby_service_name(), self.namespace())
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

    /// Cluster DNS names of every member.
    pub fn hosts(&self) -> Vec<String> {
        (0..self.spec.replicas.unwrap_or(1))
            .map(|i| self.governing_service_dns(&format!("{}-{i}", self.offshoot_name())))
            .collect()
    }

    /// Arguments enabling TLS on mysqld.
    pub fn tls_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--ssl-capath={MYSQL_CERT_DIRECTORY}"),
            format!("--ssl-ca={MYSQL_CERT_DIRECTORY}/ca.crt"),
            format!("--ssl-cert={MYSQL_CERT_DIRECTORY}/server.crt"),
            format!("--ssl-key={MYSQL_CERT_DIRECTORY}/server.key"),
        ];
        if self.spec.require_ssl {
            args.push("--require-secure-transport=ON".to_string());
        }
        args
    }
}

impl Database for MySQL {
    const RESOURCE_CODE: &'static str = "my";
    const CONTAINER_NAME: &'static str = "mysql";
    const CERT_ALIASES: &'static [CertificateAlias] = &[
        CertificateAlias::Server,
        CertificateAlias::Client,
        CertificateAlias::MetricsExporter,
    ];

    spec_accessors!();

    fn offshoot_selectors(&self) -> Labels {
        let mut selectors = Labels::from([
            (meta::NAME_LABEL_KEY.to_string(), Self::resource_fqn()),
            (meta::INSTANCE_LABEL_KEY.to_string(), self.offshoot_name()),
            (meta::MANAGED_BY_LABEL_KEY.to_string(), crate::GROUP.to_string()),
        ]);
        if self.is_innodb_cluster() {
            selectors.insert(
                MYSQL_COMPONENT_KEY.to_string(),
                MYSQL_COMPONENT_DATABASE.to_string(),
            );
        }
        selectors
    }
}

impl Defaults for MySQL {
    spec_defaults!(MySQLVersion);

    fn set_defaults(&mut self, version: Option<&MySQLVersion>) {
        let name = self.offshoot_name();
        self.spec.deletion_policy.get_or_insert(DeletionPolicy::Delete);
        self.spec.storage_type.get_or_insert(StorageType::Durable);
        crate::types::default_auth_secret(&mut self.spec.auth_secret);
        let clustered = self.is_clustered();
        self.spec.replicas.get_or_insert(if clustered {
            MYSQL_DEFAULT_GROUP_SIZE
        } else {
            1
        });
        if let Some(topology) = self.spec.topology.as_mut() {
            if let Some(group) = topology.group.as_mut() {
                group.mode.get_or_insert_with(MySQLGroupMode::default);
            }
            if let Some(innodb) = topology.innodb_cluster.as_mut() {
                innodb.mode.get_or_insert_with(MySQLGroupMode::default);
                innodb.router.replicas.get_or_insert(1);
            }
            if let Some(semi_sync) = topology.semi_sync.as_mut() {
                semi_sync.source_wait_for_replica_count.get_or_insert(1);
                semi_sync.source_timeout.get_or_insert_with(|| "24h".to_string());
                semi_sync
                    .errant_transaction_recovery_policy
                    .get_or_insert_with(ErrantTransactionRecoveryPolicy::default);
            }
        }
        self.spec
            .pod_template
            .get_or_insert_with(PodTemplateSpec::default)
            .spec
            .service_account_name
            .get_or_insert_with(|| name.clone());

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
            MYSQL_INIT_CONTAINER_NAME,
            version,
        );
        let init = offshoot::container_mut(&mut template.spec.init_containers, MYSQL_INIT_CONTAINER_NAME);
        if resources::is_empty(init.resources.as_ref()) {
            init.resources = Some(resources::init_container_resources());
        }
        if clustered {
            let coordinator = self.spec.coordinator.get_or_insert_with(CoordinatorSpec::default);
            resources::set_default_resource_limits(
                coordinator.resources.get_or_insert_with(Default::default),
                &resources::coordinator_default_resources(),
            );
            defaults::set_container_security_context(&mut coordinator.security_context, version);
        }
        if let Some(innodb) = self
            .spec
            .topology
            .as_mut()
            .and_then(|t| t.innodb_cluster.as_mut())
        {
            let router = defaults::set_default_pod_template(
                &mut innodb.router.pod_template,
                MYSQL_ROUTER_CONTAINER_NAME,
                version,
                &resources::coordinator_default_resources(),
            );
            router.spec.service_account_name.get_or_insert(name);
        }
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
