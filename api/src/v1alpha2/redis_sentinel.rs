use k8s_openapi::api::core::v1 as core;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{DatabaseStatus, REDIS_SENTINEL_PORT, spec_accessors, spec_defaults};
use crate::{
    Database, Defaults,
    catalog::RedisVersion,
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    monitor::AgentSpec,
    offshoot::PodTemplateSpec,
    resources,
    tls::{CertificateAlias, TlsConfig},
    types::{DeletionPolicy, NamedServiceTemplateSpec, SecretReference, StorageType},
};

/// Name of the init container of the sentinel pods.
pub const REDIS_SENTINEL_INIT_CONTAINER_NAME: &str = "sentinel-init";

/// RedisSentinelSpec describes the desired state of a group of Redis sentinels.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "RedisSentinel",
    plural = "redissentinels",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "rds",
    category = "datastore",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RedisSentinelSpec {
    /// Version of Redis the sentinels run.
    #[validate(length(min = 1))]
    pub version: String,
    /// Number of sentinels.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// PodTemplate is an optional configuration for the sentinel pods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
    /// ServiceTemplates is an optional configuration for services used to expose the sentinels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_templates: Vec<NamedServiceTemplateSpec>,
    /// TLS contains tls configurations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    /// StorageType can be durable (default) or ephemeral.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<StorageType>,
    /// Storage to specify how storage shall be used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
    /// AuthSecret holds the sentinel password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
    /// DisableAuth turns off password authentication.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disable_auth: bool,
    /// Halted indicates that the sentinels are halted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub halted: bool,
    /// Monitor is used to monitor the sentinels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<AgentSpec>,
    /// TerminationPolicy controls the delete operation for the sentinels.
    #[serde(rename = "terminationPolicy", skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
    /// HealthChecker for the sentinels.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub health_checker: Option<HealthCheckSpec>,
}

impl RedisSentinel {
    /// Address of the sentinel service.
    pub fn sentinel_address(&self) -> String {
        format!("{}:{REDIS_SENTINEL_PORT}", self.service_dns())
    }
}

impl Database for RedisSentinel {
    const RESOURCE_CODE: &'static str = "rds";
    const CONTAINER_NAME: &'static str = "redissentinel";
    const CERT_ALIASES: &'static [CertificateAlias] = &[
        CertificateAlias::Server,
        CertificateAlias::Client,
        CertificateAlias::MetricsExporter,
    ];

    spec_accessors!();

    fn config_secret_name(&self) -> String {
        self.offshoot_name()
    }
}

impl Defaults for RedisSentinel {
    spec_defaults!(RedisVersion);

    fn set_defaults(&mut self, version: Option<&RedisVersion>) {
        let name = self.offshoot_name();
        self.spec.deletion_policy.get_or_insert(DeletionPolicy::Delete);
        self.spec.storage_type.get_or_insert(StorageType::Durable);
        if !self.spec.disable_auth {
            crate::types::default_auth_secret(&mut self.spec.auth_secret);
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
        let template = defaults::set_default_pod_template(
            &mut self.spec.pod_template,
            Self::CONTAINER_NAME,
            version,
            &resources::default_resources(),
        );
        defaults::set_default_init_container_security_context(
            template,
            REDIS_SENTINEL_INIT_CONTAINER_NAME,
            version,
        );
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
