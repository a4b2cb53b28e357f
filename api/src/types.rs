//! Types shared by the specs and statuses of every database kind.

use k8s_openapi::api::core::v1 as core;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::offshoot::ServiceTemplateSpec;

/// DatabasePhase is the coarse lifecycle state reported in a database status.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, JsonSchema, strum::Display,
)]
pub enum DatabasePhase {
    /// Used for Databases that are currently provisioning.
    Provisioning,
    /// Used for Databases for which data is currently restoring.
    DataRestoring,
    /// Used for Databases that are currently ReplicaReady, AcceptingConnection and Ready.
    Ready,
    /// Used for Databases that can connect, ReplicaReady == false || Ready == false.
    Critical,
    /// Used for Databases that can't connect.
    NotReady,
    /// Used for Databases that are halted.
    Halted,
    /// Used for Databases whose state is not yet known.
    #[default]
    Unknown,
}

/// StorageType selects between persistent and pod-lifetime storage.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, JsonSchema, strum::Display,
)]
pub enum StorageType {
    /// Durable uses PersistentVolumeClaims.
    #[default]
    Durable,
    /// Ephemeral uses emptyDir volumes.
    Ephemeral,
}

/// DeletionPolicy controls what happens to the offshoots when a database is deleted.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, JsonSchema, strum::Display,
)]
pub enum DeletionPolicy {
    /// Deletes database pods, service but leave the PVCs and stash backup data intact.
    Halt,
    /// Deletes database pods, service, pvcs but leave the stash backup data intact.
    #[default]
    Delete,
    /// Deletes database pods, service, pvcs and stash backup data.
    WipeOut,
    /// Rejects attempt to delete database using ValidationWebhook.
    DoNotTerminate,
}

/// ServiceAlias names one of the services fronting a database.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    PartialEq,
    Serialize,
    JsonSchema,
    strum::AsRefStr,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ServiceAlias {
    /// The service routing to the primary.
    Primary,
    /// The service routing to standby replicas.
    Standby,
    /// The service exposing monitoring endpoints.
    Stats,
}

/// AddressType selects how peers address each other.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
pub enum AddressType {
    /// Uses DNS names.
    #[default]
    DNS,
    /// Uses IP addresses of any family.
    IP,
    /// Uses IPv4 addresses.
    IPv4,
    /// Uses IPv6 addresses.
    IPv6,
}

impl AddressType {
    /// Reports whether peers are addressed by IP.
    pub fn is_ip(&self) -> bool {
        matches!(self, AddressType::IP | AddressType::IPv4 | AddressType::IPv6)
    }
}

/// SecretReference names a Secret in the database's namespace.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Kind is always "Secret" when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Name of the Secret.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// ExternallyManaged reports that the Secret is created by the user, not the operator.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub externally_managed: bool,
}

/// ObjectReference names an object that may live in another namespace.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    /// Namespace of the referent. Defaults to the referrer's namespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Name of the referent.
    #[validate(length(min = 1))]
    pub name: String,
}

impl ObjectReference {
    /// Fills an empty namespace with `namespace` when the reference names an object.
    pub fn set_default_namespace(&mut self, namespace: &str) {
        if !self.name.is_empty() && self.namespace.as_deref().is_none_or(str::is_empty) {
            self.namespace = Some(namespace.to_string());
        }
    }
}

/// NamedServiceTemplateSpec is a service template keyed by the service it applies to.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamedServiceTemplateSpec {
    /// Alias of the service this template applies to.
    pub alias: ServiceAlias,
    /// Template for the service.
    #[serde(flatten)]
    pub template: ServiceTemplateSpec,
}

/// Reports whether a template for `alias` is present.
pub fn has_service_template(templates: &[NamedServiceTemplateSpec], alias: ServiceAlias) -> bool {
    templates.iter().any(|t| t.alias == alias)
}

/// Returns the template for `alias`, or an empty template.
pub fn get_service_template(
    templates: &[NamedServiceTemplateSpec],
    alias: ServiceAlias,
) -> ServiceTemplateSpec {
    templates
        .iter()
        .find(|t| t.alias == alias)
        .map(|t| t.template.clone())
        .unwrap_or_default()
}

/// InitSpec describes how to seed a new database.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitSpec {
    /// Initialized indicates that this database has been initialized.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub initialized: bool,
    /// WaitForInitialRestore makes the operator hold the database until a restore finishes.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub wait_for_initial_restore: bool,
    /// Script runs a set of init scripts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<ScriptSourceSpec>,
}

/// ScriptSourceSpec points at init scripts mounted from a ConfigMap or Secret.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSourceSpec {
    /// ScriptPath is the path the scripts are mounted at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_path: Option<String>,
    /// ConfigMap holding the scripts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_map: Option<core::ConfigMapVolumeSource>,
    /// Secret holding the scripts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<core::SecretVolumeSource>,
}

/// CoordinatorSpec configures the sidecar that coordinates replication.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorSpec {
    /// Compute resources of the coordinator container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<core::ResourceRequirements>,
    /// Security options of the coordinator container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_context: Option<core::SecurityContext>,
}

/// AutoOpsSpec toggles operations requested automatically by the operator.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoOpsSpec {
    /// Disabled turns off automatic operations.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

/// KernelSettings configures node-level kernel parameters through a privileged init container.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KernelSettings {
    /// DisableDefaults skips the kernel parameters the operator would set on its own.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disable_defaults: bool,
    /// Privileged runs the init container privileged.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub privileged: bool,
    /// Sysctls to apply.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sysctls: Vec<core::Sysctl>,
}

/// SystemUserSecretsSpec names the Secrets of internal users.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemUserSecretsSpec {
    /// Secret of the replication user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_user_secret: Option<SecretReference>,
    /// Secret of the monitoring user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor_user_secret: Option<SecretReference>,
}

/// LeaderElectionConfig tunes the raft-based failover of replicated databases.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderElectionConfig {
    /// Period between ticks, in Go duration syntax.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub period: String,
    /// Replication lag, in bytes, beyond which a replica must resync before it can be promoted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_lag_before_failover: Option<u64>,
    /// Ticks without a heartbeat before a follower starts an election.
    #[serde(default)]
    #[validate(range(min = 1))]
    pub election_tick: i32,
    /// Ticks between heartbeats.
    #[serde(default)]
    #[validate(range(min = 1))]
    pub heartbeat_tick: i32,
    /// How often a demoted leader retries handing over leadership.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_leadership_interval: Option<String>,
    /// How long a leadership hand-over may take.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_leadership_timeout: Option<String>,
}

/// SslMode is the TLS requirement of MongoDB-protocol servers.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, JsonSchema, strum::Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum SslMode {
    /// TLS is not used.
    #[default]
    Disabled,
    /// Connections may use TLS, servers accept both.
    #[serde(rename = "allowSSL")]
    #[strum(serialize = "allowSSL")]
    AllowSsl,
    /// Servers prefer TLS but accept plain connections.
    #[serde(rename = "preferSSL")]
    #[strum(serialize = "preferSSL")]
    PreferSsl,
    /// Servers only accept TLS connections.
    #[serde(rename = "requireSSL")]
    #[strum(serialize = "requireSSL")]
    RequireSsl,
}

impl SslMode {
    /// Reports whether the servers need certificates.
    pub fn uses_tls(self) -> bool {
        self != SslMode::Disabled
    }
}

/// Schema of free-form configuration objects stored verbatim.
pub(crate) fn preserve_unknown_fields(_: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": "object",
        "x-kubernetes-preserve-unknown-fields": true,
    })
}

/// Ensures an auth secret reference exists and records its kind.
pub(crate) fn default_auth_secret(secret: &mut Option<SecretReference>) {
    secret.get_or_insert_with(SecretReference::default).kind = Some("Secret".to_string());
}
