use std::collections::BTreeMap;

use k8s_openapi::{api::core::v1 as core, apimachinery::pkg::api::resource::Quantity};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{DatabaseStatus, spec_defaults};
use crate::{
    Database, Defaults, Labels,
    catalog::{CatalogVersion, OracleVersion},
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    meta::name_with_suffix,
    monitor::AgentSpec,
    offshoot::{self, PodTemplateSpec},
    resources,
    tls::{CertificateAlias, TlsConfig},
    types::{
        AutoOpsSpec, DeletionPolicy, NamedServiceTemplateSpec, SecretReference, StorageType,
    },
};

/// Port the Oracle listener binds.
pub const ORACLE_DATABASE_PORT: i32 = 1521;
/// Service name registered with the listener.
pub const ORACLE_DATABASE_SERVICE_NAME: &str = "ORCL";
/// Label distinguishing database instances from the data guard observer.
pub const ORACLE_ROLE_LABEL_KEY: &str = "oracle.kubedb.com/role";
/// Role label value of database instances.
pub const ORACLE_ROLE_INSTANCE: &str = "instance";
/// Role label value of the data guard observer.
pub const ORACLE_ROLE_OBSERVER: &str = "observer";

/// Name of the init container preparing the data directory.
pub const ORACLE_INIT_CONTAINER_NAME: &str = "oracle-init";
/// Name of the sidecar coordinating data guard roles.
pub const ORACLE_COORDINATOR_CONTAINER_NAME: &str = "oracle-coordinator";
/// Name of the observer container.
pub const ORACLE_OBSERVER_CONTAINER_NAME: &str = "observer";
/// Name of the observer init container.
pub const ORACLE_OBSERVER_INIT_CONTAINER_NAME: &str = "observer-init";

const OBSERVER_STORAGE_REQUEST: &str = "1Gi";
const FAST_START_FAILOVER_THRESHOLD: i32 = 15;

/// OracleSpec describes the desired state of an Oracle database.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "Oracle",
    plural = "oracles",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "ora",
    category = "datastore",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Mode","type":"string","jsonPath":".spec.mode"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct OracleSpec {
    /// AutoOps contains configuration of automatic ops-request-recommendation generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_ops: Option<AutoOpsSpec>,
    /// Version of Oracle to be deployed.
    #[validate(length(min = 1))]
    pub version: String,
    /// Mode selects a single instance or a data guard configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<OracleMode>,
    /// Edition of the database, e.g. `enterprise`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
    /// Number of instances to deploy.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// StorageType can be durable (default) or ephemeral.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<StorageType>,
    /// Storage to specify how storage shall be used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
    /// ConfigSecret is an optional field to provide custom configuration file for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<core::LocalObjectReference>,
    /// AuthSecret holds the sys credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
    /// PodTemplate is an optional configuration for pods used to expose the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
    /// ServiceTemplates is an optional configuration for services used to expose the database.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_templates: Vec<NamedServiceTemplateSpec>,
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
    /// DataGuard configures the standby databases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_guard: Option<DataGuardSpec>,
    /// Listener configures the database listener.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listener: Option<ListenerSpec>,
    /// Monitor is used to monitor the database instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<AgentSpec>,
    /// TcpsConfig enables a TLS listener.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcps_config: Option<TcpsConfig>,
}

/// OracleMode selects the deployment topology.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
pub enum OracleMode {
    /// A single instance.
    #[default]
    Standalone,
    /// A primary with physical or logical standbys managed by data guard.
    DataGuard,
}

/// ProtectionMode is the data guard protection mode.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
pub enum ProtectionMode {
    /// Commits wait for a standby unless none is reachable.
    MaximumAvailability,
    /// Commits do not wait for standbys.
    MaximumPerformance,
    /// Commits wait for a standby; the primary shuts down without one.
    #[default]
    MaximumProtection,
}

/// SyncMode controls redo transport.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncMode {
    /// Redo is shipped synchronously.
    #[default]
    Sync,
    /// Redo is shipped asynchronously.
    Async,
}

/// StandbyType is the kind of standby database.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum StandbyType {
    /// Block for block copy of the primary.
    #[default]
    Physical,
    /// SQL apply standby.
    Logical,
}

/// ListenerProtocol is the transport of a listener.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
#[allow(clippy::upper_case_acronyms)]
pub enum ListenerProtocol {
    /// Plain TCP.
    #[default]
    TCP,
    /// TCP with TLS.
    TCPS,
}

/// ListenerSpec describes an Oracle listener.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListenerSpec {
    /// Name of the listener.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Port the listener binds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    /// Service name registered with the listener.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Transport of the listener.
    #[serde(default)]
    pub protocol: ListenerProtocol,
}

/// TcpsConfig describes the TLS listener.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TcpsConfig {
    /// Certificates of the listener.
    #[serde(default)]
    pub tls: TlsConfig,
    /// Listener accepting TCPS connections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcps_listener: Option<ListenerSpec>,
}

/// DataGuardSpec configures data guard replication and failover.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataGuardSpec {
    /// ProtectionMode balances durability against availability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protection_mode: Option<ProtectionMode>,
    /// SyncMode of redo transport.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_mode: Option<SyncMode>,
    /// StandbyType of the standby databases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standby_type: Option<StandbyType>,
    /// FastStartFailover configures the observer initiated failover.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fast_start_failover: Option<FastStartFailover>,
    /// Seconds of apply lag tolerated before failover, zero disables the check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_lag_threshold: Option<i32>,
    /// Seconds of transport lag tolerated before failover, zero disables the check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_lag_threshold: Option<i32>,
    /// Observer runs the data guard broker observer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observer: Option<ObserverSpec>,
}

/// FastStartFailover tunes the automatic failover.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FastStartFailover {
    /// Seconds the observer waits before failing over.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fast_start_failover_threshold: Option<i32>,
}

/// ObserverSpec describes the observer pod.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObserverSpec {
    /// PodTemplate of the observer pod.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
    /// Storage of the observer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
}

impl Oracle {
    /// Reports whether a single instance is deployed.
    pub fn is_standalone(&self) -> bool {
        self.spec.mode.unwrap_or_default() == OracleMode::Standalone
    }

    /// Reports whether data guard manages the instances.
    pub fn is_data_guard_enabled(&self) -> bool {
        self.spec.mode == Some(OracleMode::DataGuard)
    }

    /// Selectors of the database instance pods, excluding the observer.
    pub fn offshoot_pod_selectors(&self) -> Labels {
        self.offshoot_selectors_with(&Labels::from([(
            ORACLE_ROLE_LABEL_KEY.to_string(),
            ORACLE_ROLE_INSTANCE.to_string(),
        )]))
    }

    /// Selectors of the observer pod.
    pub fn observer_selectors(&self) -> Labels {
        self.offshoot_selectors_with(&Labels::from([(
            ORACLE_ROLE_LABEL_KEY.to_string(),
            ORACLE_ROLE_OBSERVER.to_string(),
        )]))
    }

    /// Labels of the observer pods.
    pub fn observer_pod_labels(&self) -> Labels {
        self.pod_labels_with(&Labels::from([(
            ORACLE_ROLE_LABEL_KEY.to_string(),
            ORACLE_ROLE_OBSERVER.to_string(),
        )]))
    }

    /// Name of the service exposing the observer.
    pub fn observer_service_name(&self) -> String {
        format!("{}{ORACLE_ROLE_OBSERVER}", self.service_name())
    }

    /// Name of the observer PetSet.
    pub fn observer_name(&self) -> String {
        name_with_suffix(self.petset_name(), ORACLE_ROLE_OBSERVER)
    }

    /// Name of the Role granted to the database pods.
    pub fn default_pod_role_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), "role")
    }

    /// Name of the RoleBinding granting [`Oracle::default_pod_role_name`].
    pub fn default_pod_role_binding_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), "rolebinding")
    }

    fn set_listener_defaults(&mut self) {
        let listener = self.spec.listener.get_or_insert_with(ListenerSpec::default);
        listener.port = Some(ORACLE_DATABASE_PORT);
        listener.protocol = ListenerProtocol::TCP;
        listener.service = Some(ORACLE_DATABASE_SERVICE_NAME.to_string());
    }

    fn set_data_guard_defaults(&mut self) {
        let storage_class = self
            .spec
            .storage
            .as_ref()
            .and_then(|s| s.storage_class_name.clone());
        let dg = self.spec.data_guard.get_or_insert_with(DataGuardSpec::default);
        dg.protection_mode.get_or_insert_default();
        dg.sync_mode.get_or_insert_default();
        dg.standby_type.get_or_insert_default();
        dg.fast_start_failover.get_or_insert_with(|| FastStartFailover {
            fast_start_failover_threshold: Some(FAST_START_FAILOVER_THRESHOLD),
        });
        dg.apply_lag_threshold.get_or_insert(0);
        dg.transport_lag_threshold.get_or_insert(0);
        let observer = dg.observer.get_or_insert_with(ObserverSpec::default);
        observer.storage.get_or_insert_with(|| core::PersistentVolumeClaimSpec {
            storage_class_name: storage_class,
            resources: Some(core::VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(OBSERVER_STORAGE_REQUEST.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        });
    }
}

// Containers only get an empty security context; identity comes from the pod.
fn set_container(
    containers: &mut Vec<core::Container>,
    name: &str,
    defaults: core::ResourceRequirements,
) {
    let c = offshoot::container_mut(containers, name);
    c.security_context.get_or_insert_with(Default::default);
    if resources::is_empty(c.resources.as_ref()) {
        let r = c.resources.get_or_insert_with(Default::default);
        resources::set_default_resource_limits(r, &defaults);
    }
}

fn set_pod_identity(template: &mut PodTemplateSpec, version: &OracleVersion) {
    let user = version.run_as_user();
    let psc = template
        .spec
        .security_context
        .get_or_insert_with(core::PodSecurityContext::default);
    if psc.fs_group.is_none() {
        psc.fs_group = user;
    }
    if psc.run_as_user.is_none() {
        psc.run_as_user = user;
    }
    if psc.run_as_group.is_none() {
        psc.run_as_group = user;
    }
}

impl Database for Oracle {
    const RESOURCE_CODE: &'static str = "ora";
    const CONTAINER_NAME: &'static str = "oracle";
    const CERT_ALIASES: &'static [CertificateAlias] = &[
        CertificateAlias::Server,
        CertificateAlias::Client,
        CertificateAlias::MetricsExporter,
    ];

    fn auth_secret(&self) -> Option<&SecretReference> {
        self.spec.auth_secret.as_ref()
    }
    fn tls(&self) -> Option<&TlsConfig> {
        self.spec.tcps_config.as_ref().map(|t| &t.tls)
    }
    fn pod_template(&self) -> Option<&PodTemplateSpec> {
        self.spec.pod_template.as_ref()
    }
    fn service_templates(&self) -> &[NamedServiceTemplateSpec] {
        &self.spec.service_templates
    }
    fn monitor(&self) -> Option<&AgentSpec> {
        self.spec.monitor.as_ref()
    }

    fn persistent_secrets(&self) -> Vec<String> {
        vec![self.auth_secret_name()]
    }
}

impl Defaults for Oracle {
    spec_defaults!(OracleVersion);

    fn set_defaults(&mut self, version: Option<&OracleVersion>) {
        let name = self.offshoot_name();
        self.spec.storage_type.get_or_insert(StorageType::Durable);
        if !defaults::set_deletion_policy(
            &name,
            self.spec.halted,
            &mut self.spec.deletion_policy,
            DeletionPolicy::Delete,
        ) {
            return;
        }
        self.spec.mode.get_or_insert_default();
        self.spec.replicas.get_or_insert(1);
        self.set_listener_defaults();
        if self.is_data_guard_enabled() {
            self.spec
                .data_guard
                .get_or_insert_with(DataGuardSpec::default)
                .observer
                .get_or_insert_with(ObserverSpec::default)
                .pod_template
                .get_or_insert_with(PodTemplateSpec::default);
        }
        self.spec.pod_template.get_or_insert_with(PodTemplateSpec::default);

        let Some(version) = version else {
            return;
        };
        let template = self.spec.pod_template.get_or_insert_with(PodTemplateSpec::default);
        template.spec.service_account_name.get_or_insert(name);

        if self.is_data_guard_enabled() {
            self.set_data_guard_defaults();
            if let Some(observer) = self
                .spec
                .data_guard
                .as_mut()
                .and_then(|dg| dg.observer.as_mut())
                .and_then(|o| o.pod_template.as_mut())
            {
                set_container(
                    &mut observer.spec.init_containers,
                    ORACLE_OBSERVER_INIT_CONTAINER_NAME,
                    resources::init_container_resources(),
                );
                set_container(
                    &mut observer.spec.containers,
                    ORACLE_OBSERVER_CONTAINER_NAME,
                    resources::default_resources(),
                );
            }
        }

        let template = self.spec.pod_template.get_or_insert_with(PodTemplateSpec::default);
        set_pod_identity(template, version);
        set_container(
            &mut template.spec.containers,
            Self::CONTAINER_NAME,
            resources::memory_intensive_resources(),
        );
        set_container(
            &mut template.spec.containers,
            ORACLE_COORDINATOR_CONTAINER_NAME,
            resources::coordinator_default_resources(),
        );
        set_container(
            &mut template.spec.init_containers,
            ORACLE_INIT_CONTAINER_NAME,
            resources::init_container_resources(),
        );
        self.set_health_checker_defaults();
        defaults::set_monitor_defaults(&mut self.spec.monitor, version);
        self.set_tls_defaults();
    }

    fn set_health_checker_defaults(&mut self) {
        health::set_health_checker_defaults(
            &mut self.spec.health_checker,
            HealthCheckDefaults::new(10, 10, 3),
        );
    }

    fn set_tls_defaults(&mut self) {
        if let Some(tls) = defaults::tls_with_secret_names(self) {
            if let Some(tcps) = self.spec.tcps_config.as_mut() {
                tcps.tls = tls;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{OracleVersionSpec, VersionSecurityContext};

    fn oracle(spec: serde_json::Value) -> Oracle {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "kubedb.com/v1alpha2",
            "kind": "Oracle",
            "metadata": {"name": "ora", "namespace": "demo"},
            "spec": spec,
        }))
        .unwrap()
    }

    fn version() -> OracleVersion {
        OracleVersion::new(
            "21.3.0",
            OracleVersionSpec {
                version: "21.3.0".into(),
                security_context: Some(VersionSecurityContext {
                    run_as_user: Some(54321),
                    run_as_group: None,
                }),
                ..Default::default()
            },
        )
    }

    #[test]
    fn names() {
        let ora = oracle(serde_json::json!({"version": "21.3.0", "mode": "DataGuard"}));
        assert!(ora.is_data_guard_enabled());
        assert!(!ora.is_standalone());
        assert_eq!(ora.observer_name(), "ora-observer");
        assert_eq!(ora.observer_service_name(), "oraobserver");
        assert_eq!(ora.standby_service_name(), "ora-standby");
        assert_eq!(ora.default_pod_role_binding_name(), "ora-rolebinding");
        assert_eq!(
            ora.observer_selectors().get(ORACLE_ROLE_LABEL_KEY).map(String::as_str),
            Some("observer")
        );
        assert_eq!(ora.persistent_secrets(), vec!["ora-auth"]);
    }

    #[test]
    fn listener_is_forced() {
        let mut ora = oracle(serde_json::json!({
            "version": "21.3.0",
            "listener": {"port": 1600, "protocol": "TCPS", "service": "OTHER"},
        }));
        ora.set_defaults(None);
        let listener = ora.spec.listener.as_ref().unwrap();
        assert_eq!(listener.port, Some(1521));
        assert_eq!(listener.protocol, ListenerProtocol::TCP);
        assert_eq!(listener.service.as_deref(), Some("ORCL"));
        assert_eq!(ora.spec.mode, Some(OracleMode::Standalone));
        assert!(ora.spec.health_checker.is_none());
    }

    #[test]
    fn data_guard_defaults() {
        let mut ora = oracle(serde_json::json!({
            "version": "21.3.0",
            "mode": "DataGuard",
            "replicas": 3,
            "storage": {"storageClassName": "fast"},
        }));
        ora.set_defaults(Some(&version()));

        let dg = ora.spec.data_guard.as_ref().unwrap();
        assert_eq!(dg.protection_mode, Some(ProtectionMode::MaximumProtection));
        assert_eq!(dg.sync_mode, Some(SyncMode::Sync));
        assert_eq!(dg.standby_type, Some(StandbyType::Physical));
        assert_eq!(
            dg.fast_start_failover
                .as_ref()
                .and_then(|f| f.fast_start_failover_threshold),
            Some(15)
        );
        let observer = dg.observer.as_ref().unwrap();
        assert_eq!(
            observer
                .storage
                .as_ref()
                .and_then(|s| s.storage_class_name.as_deref()),
            Some("fast")
        );
        let pod = observer.pod_template.as_ref().unwrap();
        assert!(pod.spec.container(ORACLE_OBSERVER_CONTAINER_NAME).is_some());
        assert!(pod.spec.init_container(ORACLE_OBSERVER_INIT_CONTAINER_NAME).is_some());

        let json = serde_json::to_value(dg).unwrap();
        assert_eq!(json["syncMode"], "SYNC");
        assert_eq!(json["standbyType"], "PHYSICAL");
    }

    #[test]
    fn pod_defaults() {
        let mut ora = oracle(serde_json::json!({"version": "21.3.0"}));
        ora.set_defaults(Some(&version()));

        let template = ora.spec.pod_template.as_ref().unwrap();
        let psc = template.spec.security_context.as_ref().unwrap();
        assert_eq!(psc.run_as_group, Some(54321));
        assert_eq!(psc.fs_group, Some(54321));
        assert_eq!(template.spec.service_account_name.as_deref(), Some("ora"));
        assert_eq!(
            template.spec.container("oracle").and_then(|c| c.resources.clone()),
            Some(resources::memory_intensive_resources())
        );
        assert!(template.spec.container(ORACLE_COORDINATOR_CONTAINER_NAME).is_some());
        assert!(template.spec.init_container(ORACLE_INIT_CONTAINER_NAME).is_some());
        assert_eq!(
            ora.spec.health_checker.as_ref().and_then(|h| h.failure_threshold),
            Some(3)
        );
        assert!(ora.spec.data_guard.is_none());

        let once = ora.clone();
        ora.set_defaults(Some(&version()));
        assert_eq!(ora, once);
    }

    #[test]
    fn halting_protected_database_keeps_storage_type() {
        let mut ora = oracle(serde_json::json!({
            "version": "21.3.0",
            "halted": true,
            "deletionPolicy": "DoNotTerminate",
        }));
        ora.set_defaults(Some(&version()));
        assert_eq!(ora.spec.storage_type, Some(StorageType::Durable));
        assert_eq!(ora.spec.deletion_policy, Some(DeletionPolicy::DoNotTerminate));
        assert!(ora.spec.health_checker.is_none());

        let mut ora = oracle(serde_json::json!({"version": "21.3.0", "halted": true}));
        ora.set_defaults(None);
        assert_eq!(ora.spec.deletion_policy, Some(DeletionPolicy::Halt));
    }
}
