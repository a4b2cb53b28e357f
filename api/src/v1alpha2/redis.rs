use k8s_openapi::api::core::v1 as core;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{DatabaseStatus, spec_accessors, spec_defaults};
use crate::{
    Database, Defaults,
    catalog::RedisVersion,
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    meta::name_with_suffix,
    monitor::AgentSpec,
    offshoot::PodTemplateSpec,
    resources,
    tls::{CertificateAlias, TlsConfig},
    types::{
        CoordinatorSpec, DeletionPolicy, InitSpec, NamedServiceTemplateSpec, ObjectReference,
        SecretReference, StorageType,
    },
};

/// Port Redis serves clients on.
pub const REDIS_DATABASE_PORT: i32 = 6379;
/// Port of the cluster bus.
pub const REDIS_GOSSIP_PORT: i32 = 16379;
/// Port Redis Sentinel listens on.
pub const REDIS_SENTINEL_PORT: i32 = 26379;
/// Label carrying the shard index of a cluster pod.
pub const REDIS_SHARD_LABEL_KEY: &str = "redis.kubedb.com/shard";
/// Placeholder substituted with the shard index in affinity rules.
pub const REDIS_SHARD_AFFINITY_TEMPLATE_VAR: &str = "SHARD_INDEX";
/// Name of the init container.
pub const REDIS_INIT_CONTAINER_NAME: &str = "redis-init";
/// Name of the coordinator sidecar used in sentinel mode.
pub const REDIS_COORDINATOR_CONTAINER_NAME: &str = "rd-coordinator";
/// Name of the built-in superuser.
pub const REDIS_ROOT_USERNAME: &str = "default";

/// RedisSpec describes the desired state of a Redis deployment.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "Redis",
    plural = "redises",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "rd",
    category = "datastore",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RedisSpec {
    /// Version of Redis to be deployed.
    #[validate(length(min = 1))]
    pub version: String,
    /// Number of instances; ignored in cluster mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// Mode selects the deployment topology.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<RedisMode>,
    /// SentinelRef points to the RedisSentinel monitoring this database.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub sentinel_ref: Option<ObjectReference>,
    /// Cluster shapes the shards in cluster mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub cluster: Option<RedisClusterSpec>,
    /// StorageType can be durable (default) or ephemeral.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<StorageType>,
    /// Storage to specify how storage shall be used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
    /// AuthSecret holds the password of the default user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
    /// DisableAuth turns off password authentication.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disable_auth: bool,
    /// Init is used to initialize the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init: Option<InitSpec>,
    /// Monitor is used to monitor the database instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<AgentSpec>,
    /// ConfigSecret is an optional field to provide a custom redis.conf.
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
    /// TerminationPolicy controls the delete operation for the database.
    #[serde(rename = "terminationPolicy", skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
    /// Coordinator configures the sidecar that follows sentinel failovers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<CoordinatorSpec>,
    /// HealthChecker for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub health_checker: Option<HealthCheckSpec>,
}

/// RedisMode selects the deployment topology.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
pub enum RedisMode {
    /// A single server with optional replicas.
    #[default]
    Standalone,
    /// Redis Cluster with hash slots spread over shards.
    Cluster,
    /// Primary and replicas failed over by a RedisSentinel.
    Sentinel,
}

/// RedisClusterSpec sizes a Redis Cluster.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedisClusterSpec {
    /// Number of shards, each led by one master.
    #[serde(rename = "master", skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 3))]
    pub shards: Option<i32>,
    /// Number of replicas per shard, the primary included.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
}

impl Redis {
    /// Reports whether the database runs in `mode`.
    pub fn is_mode(&self, mode: RedisMode) -> bool {
        self.spec.mode.unwrap_or_default() == mode
    }

    /// Common prefix of the shard PetSets.
    pub fn base_name_for_shard(&self) -> String {
        name_with_suffix(self.offshoot_name(), "shard")
    }

    /// Name of the PetSet running shard `i`.
    pub fn shard_petset_name(&self, i: i32) -> String {
        format!("{}{i}", self.base_name_for_shard())
    }

    /// Template substituted with the shard index in the shard selector.
    pub fn shard_node_template(&self) -> Option<String> {
        (!self.is_mode(RedisMode::Standalone))
            .then(|| format!("${{{REDIS_SHARD_AFFINITY_TEMPLATE_VAR}}}"))
    }

    /// Name the sentinels monitor the primary under.
    pub fn sentinel_monitor_name(&self) -> String {
        format!("{}/{}", self.namespace(), self.offshoot_name())
    }

    /// Name of the Secret holding a user supplied redis.conf merged into the rendered one.
    pub fn custom_config_secret_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), "custom-config")
    }

    /// Number of PetSets expected once the database is ready.
    pub fn expected_petsets(&self) -> i32 {
        if self.is_mode(RedisMode::Cluster) {
            self.spec
                .cluster
                .as_ref()
                .and_then(|c| c.shards)
                .unwrap_or(1)
        } else {
            1
        }
    }
}

impl Database for Redis {
    const RESOURCE_CODE: &'static str = "rd";
    const CONTAINER_NAME: &'static str = "redis";
    const CERT_ALIASES: &'static [CertificateAlias] = &[
        CertificateAlias::Server,
        CertificateAlias::Client,
        CertificateAlias::MetricsExporter,
    ];

    spec_accessors!();
}

impl Defaults for Redis {
    spec_defaults!(RedisVersion);

    fn set_defaults(&mut self, version: Option<&RedisVersion>) {
        let name = self.offshoot_name();
        self.spec.deletion_policy.get_or_insert(DeletionPolicy::Delete);
        let mode = *self.spec.mode.get_or_insert_default();
        if mode == RedisMode::Cluster {
            let cluster = self.spec.cluster.get_or_insert_with(RedisClusterSpec::default);
            cluster.shards.get_or_insert(3);
            cluster.replicas.get_or_insert(1);
        }
        self.spec.storage_type.get_or_insert(StorageType::Durable);
        if !self.spec.disable_auth {
            crate::types::default_auth_secret(&mut self.spec.auth_secret);
        }
        let namespace = self.namespace();
        if let Some(sentinel) = self.spec.sentinel_ref.as_mut() {
            sentinel.set_default_namespace(&namespace);
        }
        self.spec
            .pod_template
            .get_or_insert_with(PodTemplateSpec::default)
            .spec
            .service_account_name
            .get_or_insert(name);

        let Some(version) = version else {
            return;
        };
        let mut selector = self.offshoot_selectors();
        if mode == RedisMode::Cluster {
            selector.extend(
                self.shard_node_template()
                    .map(|shard| (REDIS_SHARD_LABEL_KEY.to_string(), shard)),
            );
        }
        let template = defaults::set_default_pod_template(
            &mut self.spec.pod_template,
            Self::CONTAINER_NAME,
            version,
            &resources::default_resources(),
        );
        defaults::set_default_init_container_security_context(
            template,
            REDIS_INIT_CONTAINER_NAME,
            version,
        );
        if mode == RedisMode::Sentinel {
            defaults::set_default_container_security_context(
                template,
                REDIS_COORDINATOR_CONTAINER_NAME,
                version,
            );
            defaults::set_default_container_resources(
                template,
                REDIS_COORDINATOR_CONTAINER_NAME,
                &resources::coordinator_default_resources(),
            );
        }
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
