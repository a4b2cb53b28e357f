use k8s_openapi::api::core::v1 as core;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::error;
use validator::Validate;

use super::{DatabaseStatus, spec_accessors, spec_defaults};
use crate::{
    Database, Defaults, Labels,
    catalog::{CatalogVersion, MongoDBVersion},
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    meta::name_with_suffix,
    monitor::AgentSpec,
    offshoot::{self, PodTemplateSpec},
    resources,
    tls::{self, CertificateAlias, CertificateSpec, TlsConfig},
    types::{
        DeletionPolicy, InitSpec, NamedServiceTemplateSpec, SecretReference, SslMode, StorageType,
    },
};

/// Port mongod and mongos listen on.
pub const MONGODB_DATABASE_PORT: i32 = 27017;
/// Label selecting the pods of one shard.
pub const MONGODB_SHARD_LABEL_KEY: &str = "mongodb.kubedb.com/node.shard";
/// Label selecting the config server pods.
pub const MONGODB_CONFIG_LABEL_KEY: &str = "mongodb.kubedb.com/node.config";
/// Label selecting the mongos pods.
pub const MONGODB_MONGOS_LABEL_KEY: &str = "mongodb.kubedb.com/node.mongos";
/// Label distinguishing arbiter and hidden members from data-bearing ones.
pub const MONGODB_TYPE_LABEL_KEY: &str = "mongodb.kubedb.com/node.type";
/// Variable the operator substitutes with the shard index in shard affinity rules.
pub const MONGODB_SHARD_AFFINITY_TEMPLATE_VAR: &str = "SHARD_INDEX";
/// Directory certificates are mounted in.
pub const MONGODB_CERT_DIRECTORY: &str = "/var/run/mongodb/tls";

const NODE_TYPE_SHARD: &str = "shard";
const NODE_TYPE_CONFIG: &str = "configsvr";
const NODE_TYPE_MONGOS: &str = "mongos";
const NODE_TYPE_ARBITER: &str = "arbiter";
const NODE_TYPE_HIDDEN: &str = "hidden";

/// MongoDBSpec describes the desired state of a MongoDB server, replica set or sharded cluster.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "MongoDB",
    plural = "mongodbs",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "mg",
    category = "datastore",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MongoDBSpec {
    /// Version of MongoDB to be deployed.
    #[validate(length(min = 1))]
    pub version: String,
    /// Number of replica set members.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// ReplicaSet turns the database into a replica set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replica_set: Option<MongoDBReplicaSet>,
    /// ShardTopology turns the database into a sharded cluster.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard_topology: Option<MongoDBShardingTopology>,
    /// Arbiter adds a voting member without data to each replica set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arbiter: Option<MongoDBArbiterNode>,
    /// Hidden adds hidden members to each replica set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<MongoDBHiddenNode>,
    /// StorageType can be durable (default) or ephemeral.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<StorageType>,
    /// Storage to specify how storage shall be used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
    /// AuthSecret holds the root credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
    /// ClusterAuthMode is the authentication mode used for cluster authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_auth_mode: Option<ClusterAuthMode>,
    /// SSLMode for both standalone and clusters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_mode: Option<SslMode>,
    /// Init is used to initialize the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init: Option<InitSpec>,
    /// Monitor is used to monitor the database instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<AgentSpec>,
    /// ConfigSecret is an optional field to provide custom configuration file for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<core::LocalObjectReference>,
    /// PodTemplate is the template of standalone and replica set members.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
    /// ServiceTemplates is an optional configuration for services used to expose the database.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_templates: Vec<NamedServiceTemplateSpec>,
    /// TLS contains tls configurations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    /// KeyFileSecret holds the key file members authenticate each other with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_file_secret: Option<core::LocalObjectReference>,
    /// Halted indicates that the database is halted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub halted: bool,
    /// TerminationPolicy controls the delete operation for the database.
    #[serde(rename = "terminationPolicy", skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
    /// StorageEngine selects the storage engine of mongod.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_engine: Option<StorageEngine>,
    /// HealthChecker for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub health_checker: Option<HealthCheckSpec>,
}

/// ClusterAuthMode is how members of a cluster authenticate each other.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ClusterAuthMode {
    /// A shared key file.
    KeyFile,
    /// Sends the key file but accepts both key files and x.509 certificates.
    SendKeyFile,
    /// Sends x.509 certificates but accepts both key files and certificates.
    #[serde(rename = "sendX509")]
    SendX509,
    /// x.509 certificates.
    #[serde(rename = "x509")]
    X509,
}

/// StorageEngine selects the mongod storage engine.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum StorageEngine {
    /// The default on-disk engine.
    WiredTiger,
    /// Keeps data in memory only.
    InMemory,
}

/// MongoDBReplicaSet names the replica set.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
pub struct MongoDBReplicaSet {
    /// Name of the replica set.
    pub name: String,
}

/// MongoDBShardingTopology describes a sharded cluster.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MongoDBShardingTopology {
    /// Shard replica sets.
    pub shard: MongoDBShardNode,
    /// Config server replica set.
    pub config_server: MongoDBConfigNode,
    /// Mongos routers.
    pub mongos: MongoDBMongosNode,
}

/// MongoDBShardNode configures the shard replica sets.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MongoDBShardNode {
    /// Number of shards.
    pub shards: i32,
    /// Members of every shard.
    #[serde(flatten)]
    pub node: MongoDBNode,
    /// Storage of every shard member.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
}

/// MongoDBConfigNode configures the config server replica set.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MongoDBConfigNode {
    /// Config server members.
    #[serde(flatten)]
    pub node: MongoDBNode,
    /// Storage of every config server member.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
}

/// MongoDBMongosNode configures the mongos routers.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MongoDBMongosNode {
    /// Mongos instances.
    #[serde(flatten)]
    pub node: MongoDBNode,
}

/// MongoDBNode is the common part of every sharded cluster component.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MongoDBNode {
    /// Number of instances.
    pub replicas: i32,
    /// Prefix of the PetSet name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    /// ConfigSecret holds component specific configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<core::LocalObjectReference>,
    /// PodTemplate of the component.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
}

/// MongoDBArbiterNode configures arbiters.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MongoDBArbiterNode {
    /// ConfigSecret holds arbiter specific configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<core::LocalObjectReference>,
    /// PodTemplate of the arbiters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
}

/// MongoDBHiddenNode configures hidden members.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MongoDBHiddenNode {
    /// Number of hidden members per replica set.
    pub replicas: i32,
    /// ConfigSecret holds hidden member specific configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<core::LocalObjectReference>,
    /// Storage of the hidden members.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
    /// PodTemplate of the hidden members.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
}

impl MongoDB {
    fn topology(&self) -> Option<&MongoDBShardingTopology> {
        self.spec.shard_topology.as_ref()
    }

    /// Common prefix of the shard PetSets.
    pub fn shard_common_node_name(&self) -> Option<String> {
        self.topology().map(|t| {
            format!(
                "{}{}",
                t.shard.node.prefix,
                name_with_suffix(self.offshoot_name(), NODE_TYPE_SHARD)
            )
        })
    }

    /// Name of the PetSet of shard `i`.
    pub fn shard_node_name(&self, i: i32) -> Option<String> {
        self.shard_common_node_name().map(|n| format!("{n}{i}"))
    }

    /// Shard PetSet name with the shard index left as a template variable.
    pub fn shard_node_template(&self) -> Option<String> {
        self.shard_common_node_name()
            .map(|n| format!("{n}${{{MONGODB_SHARD_AFFINITY_TEMPLATE_VAR}}}"))
    }

    /// Name of the config server PetSet.
    pub fn config_server_node_name(&self) -> Option<String> {
        self.topology().map(|t| {
            format!(
                "{}{}",
                t.config_server.node.prefix,
                name_with_suffix(self.offshoot_name(), NODE_TYPE_CONFIG)
            )
        })
    }

    /// Name of the mongos PetSet.
    pub fn mongos_node_name(&self) -> Option<String> {
        self.topology().map(|t| {
            format!(
                "{}{}",
                t.mongos.node.prefix,
                name_with_suffix(self.offshoot_name(), NODE_TYPE_MONGOS)
            )
        })
    }

    /// Name of the replica set of a non-sharded database.
    pub fn replica_set_name(&self) -> Option<&str> {
        self.spec.replica_set.as_ref().map(|r| r.name.as_str())
    }

    /// Name of the replica set of shard `i`.
    pub fn shard_replica_set_name(&self, i: i32) -> String {
        match self.topology().map(|t| t.shard.node.prefix.as_str()) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}{i}"),
            _ => format!("shard{i}"),
        }
    }

    /// Name of the config server replica set.
    pub fn config_server_replica_set_name(&self) -> String {
        match self.topology().map(|t| t.config_server.node.prefix.as_str()) {
            Some(prefix) if !prefix.is_empty() => prefix.to_string(),
            _ => "cnfRepSet".to_string(),
        }
    }

    /// Name of the arbiter PetSet of a replica set.
    pub fn arbiter_node_name(&self) -> Option<String> {
        (self.spec.replica_set.is_some() && self.spec.arbiter.is_some())
            .then(|| name_with_suffix(self.offshoot_name(), NODE_TYPE_ARBITER))
    }

    /// Name of the hidden member PetSet of a replica set.
    pub fn hidden_node_name(&self) -> Option<String> {
        (self.spec.replica_set.is_some() && self.spec.hidden.is_some())
            .then(|| name_with_suffix(self.offshoot_name(), NODE_TYPE_HIDDEN))
    }

    /// Name of the arbiter PetSet of shard `i`.
    pub fn arbiter_shard_node_name(&self, i: i32) -> Option<String> {
        self.spec.arbiter.as_ref()?;
        self.shard_node_name(i)
            .map(|n| name_with_suffix(n, NODE_TYPE_ARBITER))
    }

    /// Name of the hidden member PetSet of shard `i`.
    pub fn hidden_shard_node_name(&self, i: i32) -> Option<String> {
        self.spec.hidden.as_ref()?;
        self.shard_node_name(i).map(|n| name_with_suffix(n, NODE_TYPE_HIDDEN))
    }

    /// Governing service of the PetSet `petset`. Arbiters and hidden members share the service
    /// of the replica set they belong to.
    pub fn governing_service_name_of(&self, petset: &str) -> String {
        let base = petset
            .strip_suffix(&format!("-{NODE_TYPE_ARBITER}"))
            .or_else(|| petset.strip_suffix(&format!("-{NODE_TYPE_HIDDEN}")))
            .unwrap_or(petset);
        name_with_suffix(base, "pods")
    }

    /// Selectors of the pods of shard `i`.
    pub fn shard_selectors(&self, i: i32) -> Labels {
        self.offshoot_selectors_with(&Labels::from([(
            MONGODB_SHARD_LABEL_KEY.to_string(),
            self.shard_node_name(i).unwrap_or_default(),
        )]))
    }

    /// Selectors of the config server pods.
    pub fn config_server_selectors(&self) -> Labels {
        self.offshoot_selectors_with(&Labels::from([(
            MONGODB_CONFIG_LABEL_KEY.to_string(),
            self.config_server_node_name().unwrap_or_default(),
        )]))
    }

    /// Selectors of the mongos pods.
    pub fn mongos_selectors(&self) -> Labels {
        self.offshoot_selectors_with(&Labels::from([(
            MONGODB_MONGOS_LABEL_KEY.to_string(),
            self.mongos_node_name().unwrap_or_default(),
        )]))
    }

    /// Selectors of the arbiter pods of a replica set.
    pub fn arbiter_selectors(&self) -> Labels {
        self.offshoot_selectors_with(&Labels::from([(
            MONGODB_TYPE_LABEL_KEY.to_string(),
            NODE_TYPE_ARBITER.to_string(),
        )]))
    }

    fn pod_hosts(&self, petset: &str, replicas: i32) -> Vec<String> {
        let governing = self.governing_service_name_of(petset);
        let namespace = self.namespace();
        (0..replicas)
            .map(|i| format!("{petset}-{i}.{governing}.{namespace}.svc:{MONGODB_DATABASE_PORT}"))
            .collect()
    }

    /// Hosts of the data-bearing members of a standalone database or replica set.
    pub fn hosts_only_core_members(&self) -> Vec<String> {
        let replicas = match self.spec.replica_set {
            Some(_) => self.spec.replicas.unwrap_or(1),
            None => 1,
        };
        self.pod_hosts(&self.offshoot_name(), replicas)
    }

    /// Hosts of every replica set member, arbiters and hidden members included.
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts = self.hosts_only_core_members();
        if let Some(arbiter) = self.arbiter_node_name() {
            hosts.extend(self.pod_hosts(&arbiter, 1));
        }
        if let (Some(hidden), Some(spec)) = (self.hidden_node_name(), &self.spec.hidden) {
            hosts.extend(self.pod_hosts(&hidden, spec.replicas));
        }
        hosts
    }

    /// Connection string of the database: `<replset>/<hosts>` for replica sets and the service
    /// name otherwise.
    pub fn host_address(&self) -> String {
        match self.replica_set_name() {
            Some(name) => format!("{name}/{}", self.hosts().join(",")),
            None => self.service_name(),
        }
    }

    /// Hosts of every member of shard `i`.
    pub fn shard_hosts(&self, i: i32) -> Vec<String> {
        let (Some(topology), Some(shard)) = (self.topology(), self.shard_node_name(i)) else {
            return Vec::new();
        };
        let mut hosts = self.pod_hosts(&shard, topology.shard.node.replicas);
        if let Some(arbiter) = self.arbiter_shard_node_name(i) {
            hosts.extend(self.pod_hosts(&arbiter, 1));
        }
        if let (Some(hidden), Some(spec)) = (self.hidden_shard_node_name(i), &self.spec.hidden) {
            hosts.extend(self.pod_hosts(&hidden, spec.replicas));
        }
        hosts
    }

    /// Connection string of shard `i`.
    pub fn shard_dsn(&self, i: i32) -> Option<String> {
        self.topology()?;
        Some(format!(
            "{}/{}",
            self.shard_replica_set_name(i),
            self.shard_hosts(i).join(",")
        ))
    }

    /// Hosts of the config servers.
    pub fn config_server_hosts(&self) -> Vec<String> {
        match (self.topology(), self.config_server_node_name()) {
            (Some(t), Some(name)) => self.pod_hosts(&name, t.config_server.node.replicas),
            _ => Vec::new(),
        }
    }

    /// Connection string of the config server replica set.
    pub fn config_server_dsn(&self) -> Option<String> {
        self.topology()?;
        Some(format!(
            "{}/{}",
            self.config_server_replica_set_name(),
            self.config_server_hosts().join(",")
        ))
    }

    /// Hosts of the mongos routers.
    pub fn mongos_hosts(&self) -> Vec<String> {
        match (self.topology(), self.mongos_node_name()) {
            (Some(t), Some(name)) => self.pod_hosts(&name, t.mongos.node.replicas),
            _ => Vec::new(),
        }
    }

    /// Reports whether members authenticate with a key file.
    pub fn key_file_required(&self) -> bool {
        matches!(
            self.spec.cluster_auth_mode,
            Some(ClusterAuthMode::KeyFile | ClusterAuthMode::SendKeyFile | ClusterAuthMode::SendX509)
        )
    }

    /// Name of the Secret holding the key file.
    pub fn key_file_secret_name(&self) -> String {
        match &self.spec.key_file_secret {
            Some(s) if !s.name.is_empty() => s.name.clone(),
            _ => format!("{}-key", self.offshoot_name()),
        }
    }

    /// Name of the Secret holding the configuration of `node_type`, e.g. "shard" or "mongos".
    pub fn node_config_secret_name(&self, node_type: &str) -> String {
        if node_type.is_empty() {
            self.config_secret_name()
        } else {
            format!("{}-{node_type}-config", self.offshoot_name())
        }
    }

    /// Name of the server certificate of the PetSet `petset`. Sharded clusters and replica sets
    /// with arbiters issue one server certificate per PetSet.
    pub fn server_certificate_name(&self, petset: Option<&str>) -> String {
        let alias = CertificateAlias::Server;
        match petset {
            Some(petset) if self.spec.shard_topology.is_some() || self.spec.replica_set.is_some() => {
                name_with_suffix(petset, format!("{alias}-cert"))
            }
            _ => self.certificate_name(alias),
        }
    }

    /// Shell used by health checks and init scripts.
    pub fn entry_command(version: &MongoDBVersion) -> &'static str {
        if major_version(version).is_some_and(|major| major >= 6) {
            "mongosh"
        } else {
            "mongo"
        }
    }

    fn health_check(&self, version: &MongoDBVersion, arbiter: bool) -> core::Probe {
        let tls_args = if self.spec.ssl_mode == Some(SslMode::RequireSsl) {
            format!(
                "--tls --tlsCAFile={MONGODB_CERT_DIRECTORY}/ca.crt --tlsCertificateKeyFile={MONGODB_CERT_DIRECTORY}/client.pem"
            )
        } else {
            String::new()
        };
        let auth_args = if arbiter {
            ""
        } else {
            "--username=$MONGO_INITDB_ROOT_USERNAME --password=$MONGO_INITDB_ROOT_PASSWORD --authenticationDatabase=admin"
        };
        let script = format!(
            r#"set -x; if [[ $({} admin --host=localhost {tls_args} {auth_args} --quiet --eval "db.adminCommand('ping').ok" ) -eq "1" ]]; then
          exit 0
        fi
        exit 1"#,
            Self::entry_command(version)
        );
        core::Probe {
            exec: Some(core::ExecAction {
                command: Some(vec!["bash".to_string(), "-c".to_string(), script]),
            }),
            failure_threshold: Some(3),
            period_seconds: Some(10),
            success_threshold: Some(1),
            timeout_seconds: Some(5),
            ..Default::default()
        }
    }
}

fn major_version(version: &MongoDBVersion) -> Option<u64> {
    version
        .db_version()
        .split('.')
        .next()
        .and_then(|m| m.parse().ok())
}

struct NodeDefaults<'a> {
    version: &'a MongoDBVersion,
    resources: core::ResourceRequirements,
    namespace: String,
    service_account: String,
}

impl NodeDefaults<'_> {
    fn apply(&self, template: &mut Option<PodTemplateSpec>, check: &core::Probe, selector: &Labels) {
        let template = defaults::set_default_pod_template(
            template,
            MongoDB::CONTAINER_NAME,
            self.version,
            &self.resources,
        );
        template
            .spec
            .service_account_name
            .get_or_insert_with(|| self.service_account.clone());
        defaults::set_default_affinity(template, selector, &self.namespace);
        let c = offshoot::container_mut(&mut template.spec.containers, MongoDB::CONTAINER_NAME);
        c.liveness_probe.get_or_insert_with(|| check.clone());
        c.readiness_probe.get_or_insert_with(|| check.clone());
    }
}

/// Fills the subject of the certificate for `alias`, and its secret name when given.
fn set_certificate_defaults(certs: &mut Vec<CertificateSpec>, alias: CertificateAlias, secret: Option<String>) {
    tls::set_missing_subject(certs, alias.as_ref(), tls::KUBEDB_ORGANIZATION);
    if let Some(secret) = secret {
        tls::set_missing_secret_name_for_certificate(certs, alias.as_ref(), secret);
    }
}

impl Database for MongoDB {
    const RESOURCE_CODE: &'static str = "mg";
    const CONTAINER_NAME: &'static str = "mongodb";
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
        if self.spec.key_file_secret.is_some() {
            secrets.push(self.key_file_secret_name());
        }
        secrets
    }
}

impl Defaults for MongoDB {
    spec_defaults!(MongoDBVersion);

    fn set_defaults(&mut self, version: Option<&MongoDBVersion>) {
        let name = self.offshoot_name();
        self.spec.deletion_policy.get_or_insert(DeletionPolicy::Delete);
        self.spec.storage_type.get_or_insert(StorageType::Durable);
        self.spec.storage_engine.get_or_insert(StorageEngine::WiredTiger);
        let ssl_mode = *self.spec.ssl_mode.get_or_insert(SslMode::Disabled);
        if (self.spec.replica_set.is_some() || self.spec.shard_topology.is_some())
            && self.spec.cluster_auth_mode.is_none()
        {
            self.spec.cluster_auth_mode = Some(match ssl_mode {
                SslMode::Disabled | SslMode::AllowSsl => ClusterAuthMode::KeyFile,
                SslMode::PreferSsl | SslMode::RequireSsl => ClusterAuthMode::X509,
            });
        }
        crate::types::default_auth_secret(&mut self.spec.auth_secret);
        if self.key_file_required() && self.spec.key_file_secret.is_none() {
            self.spec.key_file_secret = Some(core::LocalObjectReference {
                name: self.key_file_secret_name(),
            });
        }
        if self.spec.shard_topology.is_none() {
            self.spec.replicas.get_or_insert(1);
        }

        let Some(version) = version else {
            return;
        };
        let Some(major) = major_version(version) else {
            error!(name = %name, version = version.db_version(), "failed to parse mongodb version");
            return;
        };
        let nodes = NodeDefaults {
            version,
            resources: if major >= 6 {
                resources::mongodb_v6_default_resources()
            } else {
                resources::default_resources()
            },
            namespace: self.namespace(),
            service_account: name,
        };
        let check = self.health_check(version, false);
        let arbiter_check = self.health_check(version, true);
        let selectors = self.offshoot_selectors();
        let shard_selectors = self.offshoot_selectors_with(&Labels::from([(
            MONGODB_SHARD_LABEL_KEY.to_string(),
            self.shard_node_template().unwrap_or_default(),
        )]));
        let config_selectors = self.config_server_selectors();
        let mongos_selectors = self.mongos_selectors();

        let member_selectors = match self.spec.shard_topology.as_mut() {
            Some(topology) => {
                nodes.apply(&mut topology.shard.node.pod_template, &check, &shard_selectors);
                nodes.apply(
                    &mut topology.config_server.node.pod_template,
                    &check,
                    &config_selectors,
                );
                nodes.apply(&mut topology.mongos.node.pod_template, &check, &mongos_selectors);
                &shard_selectors
            }
            None => {
                nodes.apply(&mut self.spec.pod_template, &check, &selectors);
                &selectors
            }
        };
        if let Some(arbiter) = self.spec.arbiter.as_mut() {
            nodes.apply(&mut arbiter.pod_template, &arbiter_check, member_selectors);
        }
        if let Some(hidden) = self.spec.hidden.as_mut() {
            nodes.apply(&mut hidden.pod_template, &check, member_selectors);
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
        let per_petset = self.spec.shard_topology.is_some()
            || (self.spec.replica_set.is_some() && self.spec.arbiter.is_some());
        let server = self.certificate_name(CertificateAlias::Server);
        let client = self.certificate_name(CertificateAlias::Client);
        let exporter = self.certificate_name(CertificateAlias::MetricsExporter);
        let Some(tls) = self.spec.tls.as_mut().filter(|t| t.has_issuer()) else {
            return;
        };
        // Sharded clusters and replica sets with arbiters get one server certificate per PetSet.
        let server = (!per_petset).then_some(server);
        set_certificate_defaults(&mut tls.certificates, CertificateAlias::Server, server);
        set_certificate_defaults(&mut tls.certificates, CertificateAlias::Client, Some(client));
        set_certificate_defaults(
            &mut tls.certificates,
            CertificateAlias::MetricsExporter,
            Some(exporter),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MongoDBVersionSpec, VersionSecurityContext};
    use test_log::test;

    fn mongodb(spec: serde_json::Value) -> MongoDB {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "kubedb.com/v1alpha2",
            "kind": "MongoDB",
            "metadata": {"name": "mg", "namespace": "demo"},
            "spec": spec,
        }))
        .unwrap()
    }

    fn version(v: &str) -> MongoDBVersion {
        MongoDBVersion::new(
            v,
            MongoDBVersionSpec {
                version: v.into(),
                security_context: Some(VersionSecurityContext {
                    run_as_user: Some(999),
                    run_as_group: None,
                }),
                ..Default::default()
            },
        )
    }

    fn sharded() -> MongoDB {
        mongodb(serde_json::json!({
            "version": "7.0.16",
            "shardTopology": {
                "shard": {"shards": 2, "replicas": 3},
                "configServer": {"replicas": 3, "prefix": "cfg"},
                "mongos": {"replicas": 2},
            },
        }))
    }

    #[test]
    fn shard_names() {
        let mg = sharded();
        assert_eq!(mg.shard_node_name(1).as_deref(), Some("mg-shard1"));
        assert_eq!(mg.shard_node_template().as_deref(), Some("mg-shard${SHARD_INDEX}"));
        assert_eq!(mg.config_server_node_name().as_deref(), Some("cfgmg-configsvr"));
        assert_eq!(mg.mongos_node_name().as_deref(), Some("mg-mongos"));
        assert_eq!(mg.shard_replica_set_name(0), "shard0");
        assert_eq!(mg.config_server_replica_set_name(), "cfg");
        assert_eq!(
            mg.shard_dsn(0).as_deref(),
            Some(
                "shard0/mg-shard0-0.mg-shard0-pods.demo.svc:27017,\
                 mg-shard0-1.mg-shard0-pods.demo.svc:27017,\
                 mg-shard0-2.mg-shard0-pods.demo.svc:27017"
            )
        );
        assert_eq!(mg.mongos_hosts().len(), 2);
        assert_eq!(mg.node_config_secret_name("mongos"), "mg-mongos-config");
        assert!(mg.replica_set_name().is_none());
        assert_eq!(mg.host_address(), "mg");
    }

    #[test]
    fn replica_set_hosts() {
        let mg = mongodb(serde_json::json!({
            "version": "7.0.16",
            "replicas": 2,
            "replicaSet": {"name": "rs0"},
            "arbiter": {},
            "hidden": {"replicas": 1},
        }));
        assert_eq!(mg.arbiter_node_name().as_deref(), Some("mg-arbiter"));
        assert_eq!(mg.governing_service_name_of("mg-arbiter"), "mg-pods");
        assert_eq!(
            mg.host_address(),
            "rs0/mg-0.mg-pods.demo.svc:27017,mg-1.mg-pods.demo.svc:27017,\
             mg-arbiter-0.mg-pods.demo.svc:27017,mg-hidden-0.mg-pods.demo.svc:27017"
        );
        assert!(mg.shard_node_name(0).is_none());
        assert!(mg.shard_dsn(0).is_none());
    }

    #[test]
    fn replica_set_defaults() {
        let mut mg = mongodb(serde_json::json!({
            "version": "7.0.16",
            "replicas": 3,
            "replicaSet": {"name": "rs0"},
            "arbiter": {},
        }));
        mg.set_defaults(Some(&version("7.0.16")));

        assert_eq!(mg.spec.cluster_auth_mode, Some(ClusterAuthMode::KeyFile));
        assert_eq!(mg.spec.ssl_mode, Some(SslMode::Disabled));
        assert_eq!(mg.spec.storage_engine, Some(StorageEngine::WiredTiger));
        assert_eq!(mg.key_file_secret_name(), "mg-key");
        assert_eq!(mg.persistent_secrets(), vec!["mg-auth", "mg-key"]);

        let c = mg.spec.pod_template.as_ref().unwrap().spec.container("mongodb").unwrap();
        assert_eq!(c.resources, Some(resources::mongodb_v6_default_resources()));
        let command = c
            .liveness_probe
            .as_ref()
            .and_then(|p| p.exec.as_ref())
            .and_then(|e| e.command.as_ref())
            .unwrap();
        assert!(command[2].contains("mongosh admin"));
        assert!(command[2].contains("--username"));

        let arbiter = mg.spec.arbiter.as_ref().and_then(|a| a.pod_template.as_ref()).unwrap();
        let command = arbiter
            .spec
            .container("mongodb")
            .and_then(|c| c.readiness_probe.as_ref())
            .and_then(|p| p.exec.as_ref())
            .and_then(|e| e.command.as_ref())
            .unwrap();
        assert!(!command[2].contains("--username"));
    }

    #[test]
    fn sharded_defaults() {
        let mut mg = sharded();
        mg.spec.ssl_mode = Some(SslMode::RequireSsl);
        mg.spec.tls = Some(TlsConfig {
            issuer_ref: Some(core::TypedLocalObjectReference {
                api_group: Some("cert-manager.io".into()),
                kind: "Issuer".into(),
                name: "mg-ca".into(),
            }),
            certificates: Vec::new(),
        });
        mg.set_defaults(Some(&version("4.4.26")));

        assert_eq!(mg.spec.cluster_auth_mode, Some(ClusterAuthMode::X509));
        assert!(mg.spec.replicas.is_none());
        assert!(mg.spec.key_file_secret.is_none());
        let topology = mg.spec.shard_topology.as_ref().unwrap();
        let shard = topology.shard.node.pod_template.as_ref().unwrap();
        assert_eq!(shard.spec.service_account_name.as_deref(), Some("mg"));
        assert_eq!(
            shard.spec.container("mongodb").unwrap().resources,
            Some(resources::default_resources())
        );
        let command = shard
            .spec
            .container("mongodb")
            .and_then(|c| c.liveness_probe.as_ref())
            .and_then(|p| p.exec.as_ref())
            .and_then(|e| e.command.as_ref())
            .unwrap();
        assert!(command[2].contains("mongo admin"));
        assert!(command[2].contains("--tls"));

        let certs = &mg.spec.tls.as_ref().unwrap().certificates;
        let server = tls::get_certificate(certs, "server").unwrap();
        assert!(server.secret_name.is_empty());
        assert_eq!(
            server.subject.as_ref().unwrap().organizational_units,
            vec!["server"]
        );
        assert_eq!(
            tls::get_certificate_secret_name(certs, "client"),
            Some("mg-client-cert")
        );
        assert_eq!(
            mg.server_certificate_name(Some("mg-shard0")),
            "mg-shard0-server-cert"
        );
    }

    #[test]
    fn standalone_without_version() {
        let mut mg = mongodb(serde_json::json!({"version": "7.0.16"}));
        mg.set_defaults(None);
        assert_eq!(mg.spec.replicas, Some(1));
        assert!(mg.spec.cluster_auth_mode.is_none());
        assert!(mg.spec.pod_template.is_none());
        assert_eq!(
            mg.hosts_only_core_members(),
            vec!["mg-0.mg-pods.demo.svc:27017"]
        );
    }
}
