use k8s_openapi::api::core::v1 as core;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;
use validator::Validate;

use super::{DatabaseStatus, spec_defaults};
use crate::{
    Database, Defaults,
    catalog::MSSQLServerVersion,
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    meta::{name_with_prefix, name_with_suffix},
    monitor::AgentSpec,
    offshoot::{self, PodTemplateSpec},
    resources,
    tls::{self, CertificateAlias, TlsConfig},
    types::{
        DeletionPolicy, InitSpec, LeaderElectionConfig, NamedServiceTemplateSpec, SecretReference,
        StorageType,
    },
};

/// Name of the MSSQLServer init container.
pub const MSSQLSERVER_INIT_CONTAINER_NAME: &str = "mssql-init";
/// Name of the sidecar coordinating availability group failover.
pub const MSSQLSERVER_COORDINATOR_CONTAINER_NAME: &str = "mssql-coordinator";

const AVAILABILITY_GROUP_FALLBACK_NAME: &str = "DefaultGroupName";

/// MSSQLServerSpec describes the desired state of a Microsoft SQL Server instance or
/// availability group.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "MSSQLServer",
    plural = "mssqlservers",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "ms",
    category = "datastore",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MSSQLServerSpec {
    /// Version of SQL Server to be deployed.
    #[validate(length(min = 1))]
    pub version: String,
    /// Number of instances to deploy.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// Topology turns the instances into an availability group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topology: Option<MSSQLServerTopology>,
    /// StorageType can be durable (default) or ephemeral.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<StorageType>,
    /// Storage to specify how storage shall be used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
    /// AuthSecret holds the sa credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
    /// InternalAuth configures how availability group endpoints authenticate each other.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_auth: Option<MSSQLServerInternalAuth>,
    /// ConfigSecret is an optional field to provide custom configuration file for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<core::LocalObjectReference>,
    /// Init is used to initialize the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init: Option<InitSpec>,
    /// PodTemplate is an optional configuration for pods used to expose the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
    /// TLS contains tls configurations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<MSSQLServerTlsConfig>,
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
    /// Monitor is used to monitor the database instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<AgentSpec>,
    /// Arbiter adds a witness to availability groups with an even number of replicas.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arbiter: Option<MSSQLServerArbiter>,
}

/// MSSQLServerMode is the replication topology.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, JsonSchema, strum::AsRefStr)]
pub enum MSSQLServerMode {
    /// Always On availability group.
    AvailabilityGroup,
    /// Asynchronous replica of a remote primary.
    RemoteReplica,
}

/// SecondaryAccessMode controls which connections secondaries accept.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
pub enum SecondaryAccessMode {
    /// Secondaries reject connections.
    #[default]
    Passive,
    /// Secondaries accept read-intent connections only.
    ReadOnly,
    /// Secondaries accept every connection for reads.
    All,
}

/// MSSQLServerTopology selects and configures the replication topology.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MSSQLServerTopology {
    /// Mode of the topology.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<MSSQLServerMode>,
    /// AvailabilityGroup configures the availability group.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub availability_group: Option<MSSQLServerAvailabilityGroupSpec>,
}

/// MSSQLServerAvailabilityGroupSpec configures an availability group.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MSSQLServerAvailabilityGroupSpec {
    /// Databases added to the group.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub databases: Vec<String>,
    /// LeaderElection tunes coordinator failover.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub leader_election: Option<LeaderElectionConfig>,
    /// SecondaryAccessMode controls connections to secondaries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_access_mode: Option<SecondaryAccessMode>,
}

/// MSSQLServerTlsConfig adds client TLS enforcement to the common TLS configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MSSQLServerTlsConfig {
    /// Common TLS configuration.
    #[serde(flatten)]
    pub config: TlsConfig,
    /// ClientTLS requires clients to connect with TLS.
    #[serde(rename = "clientTLS", skip_serializing_if = "Option::is_none")]
    pub client_tls: Option<bool>,
}

/// MSSQLServerInternalAuth configures the certificates of database mirroring endpoints.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MSSQLServerInternalAuth {
    /// EndpointCert issues the endpoint certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_cert: Option<TlsConfig>,
}

/// MSSQLServerArbiter configures the arbiter pod.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MSSQLServerArbiter {
    /// Compute resources of the arbiter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<core::ResourceRequirements>,
    /// NodeSelector of the arbiter pod.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<crate::Labels>,
    /// Tolerations of the arbiter pod.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<core::Toleration>,
}

impl MSSQLServer {
    /// Reports whether the instances form an availability group.
    pub fn is_availability_group(&self) -> bool {
        self.spec
            .topology
            .as_ref()
            .is_some_and(|t| t.mode == Some(MSSQLServerMode::AvailabilityGroup))
    }

    /// Reports whether the database runs without a topology.
    pub fn is_standalone(&self) -> bool {
        self.spec.topology.is_none()
    }

    /// Name of the service selecting secondary replicas.
    pub fn secondary_service_name(&self) -> String {
        name_with_prefix(self.service_name(), "secondary")
    }

    /// Name of the availability group: the alphanumeric characters of the object name.
    pub fn availability_group_name(&self) -> String {
        let name: String = self
            .offshoot_name()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        if name.is_empty() {
            warn!(
                name = %self.offshoot_name(),
                "name has no characters valid in an availability group name"
            );
            return AVAILABILITY_GROUP_FALLBACK_NAME.to_string();
        }
        name
    }

    /// Name of the arbiter PetSet.
    pub fn arbiter_name(&self) -> String {
        name_with_suffix(self.petset_name(), "arbiter")
    }

    /// Name of the PVC for `alias`.
    pub fn pvc_name(&self, alias: &str) -> String {
        name_with_suffix(self.offshoot_name(), alias)
    }

    /// Name of the Secret holding the credentials of `username`.
    pub fn default_user_cred_secret_name(&self, username: &str) -> String {
        name_with_suffix(self.offshoot_name(), format!("{username}-cred").replace('_', "-"))
    }

    /// Name of the Secret holding the database mirroring login.
    pub fn dbm_login_secret_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), "dbm-login")
    }

    /// Name of the Secret holding the database master key password.
    pub fn master_key_secret_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), "master-key")
    }

    /// Name of the Secret holding the endpoint certificate.
    pub fn endpoint_cert_secret_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), "endpoint-cert")
    }

    /// Name of the CA provider class mounting the certificate authority.
    pub fn ca_provider_class_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), "ca-provider")
    }

    /// `<namespace>/<name>` of the object.
    pub fn namespaced_name(&self) -> String {
        format!("{}/{}", self.namespace(), self.offshoot_name())
    }

    fn set_container_defaults(&mut self, version: &MSSQLServerVersion) {
        let availability_group = self.is_availability_group();
        let template = self.spec.pod_template.get_or_insert_with(PodTemplateSpec::default);
        defaults::set_pod_security_context(template, version);

        // SQL Server binds its endpoints as a non-root user.
        let c = offshoot::container_mut(&mut template.spec.containers, Self::CONTAINER_NAME);
        c.security_context
            .get_or_insert_with(Default::default)
            .capabilities
            .get_or_insert_with(|| core::Capabilities {
                add: Some(vec!["NET_BIND_SERVICE".to_string()]),
                drop: Some(vec!["ALL".to_string()]),
            });
        defaults::set_container_security_context(&mut c.security_context, version);
        if resources::is_empty(c.resources.as_ref()) {
            c.resources = Some(resources::mssqlserver_default_resources());
        }

        let c = offshoot::container_mut(
            &mut template.spec.init_containers,
            MSSQLSERVER_INIT_CONTAINER_NAME,
        );
        defaults::set_container_security_context(&mut c.security_context, version);
        if resources::is_empty(c.resources.as_ref()) {
            c.resources = Some(resources::init_container_resources());
        }

        if availability_group {
            let c = offshoot::container_mut(
                &mut template.spec.containers,
                MSSQLSERVER_COORDINATOR_CONTAINER_NAME,
            );
            defaults::set_container_security_context(&mut c.security_context, version);
            if resources::is_empty(c.resources.as_ref()) {
                c.resources = Some(resources::coordinator_default_resources());
            }
        }
    }
}

impl Database for MSSQLServer {
    const RESOURCE_CODE: &'static str = "ms";
    const CONTAINER_NAME: &'static str = "mssql";
    const CERT_ALIASES: &'static [CertificateAlias] =
        &[CertificateAlias::Server, CertificateAlias::Client];

    fn auth_secret(&self) -> Option<&SecretReference> {
        self.spec.auth_secret.as_ref()
    }
    fn tls(&self) -> Option<&TlsConfig> {
        self.spec.tls.as_ref().map(|t| &t.config)
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
        let mut secrets = Vec::new();
        if self.spec.auth_secret.is_some() {
            secrets.push(self.auth_secret_name());
        }
        secrets.push(self.endpoint_cert_secret_name());
        secrets.push(self.dbm_login_secret_name());
        secrets.push(self.master_key_secret_name());
        secrets
    }
}

impl Defaults for MSSQLServer {
    spec_defaults!(MSSQLServerVersion);

    fn set_defaults(&mut self, version: Option<&MSSQLServerVersion>) {
        self.spec.deletion_policy.get_or_insert(DeletionPolicy::Delete);
        self.spec.storage_type.get_or_insert(StorageType::Durable);
        crate::types::default_auth_secret(&mut self.spec.auth_secret);
        if self.is_standalone() {
            self.spec.replicas.get_or_insert(1);
        }
        if self.is_availability_group() {
            let le = self
                .spec
                .topology
                .get_or_insert_with(Default::default)
                .availability_group
                .get_or_insert_with(Default::default)
                .leader_election
                .get_or_insert_with(|| LeaderElectionConfig {
                    period: "300ms".to_string(),
                    election_tick: 10,
                    heartbeat_tick: 1,
                    ..Default::default()
                });
            le.transfer_leadership_interval
                .get_or_insert_with(|| "1s".to_string());
            le.transfer_leadership_timeout
                .get_or_insert_with(|| "60s".to_string());
        }
        self.spec.pod_template.get_or_insert_with(PodTemplateSpec::default);

        let Some(version) = version else {
            return;
        };
        self.set_container_defaults(version);
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
        let endpoint = self.cert_secret_name(CertificateAlias::Endpoint);
        if let Some(cert) = self
            .spec
            .internal_auth
            .as_mut()
            .and_then(|a| a.endpoint_cert.as_mut())
            .filter(|t| t.has_issuer())
        {
            let alias = CertificateAlias::Endpoint.as_ref();
            tls::set_missing_subject(&mut cert.certificates, alias, tls::KUBEDB_ORGANIZATION);
            tls::set_missing_secret_name_for_certificate(&mut cert.certificates, alias, endpoint);
        }

        let secrets: Vec<_> = Self::CERT_ALIASES
            .iter()
            .map(|alias| (*alias, self.cert_secret_name(*alias)))
            .collect();
        let Some(tls) = self
            .spec
            .tls
            .as_mut()
            .map(|t| &mut t.config)
            .filter(|t| t.has_issuer())
        else {
            return;
        };
        for (alias, secret) in secrets {
            tls::set_missing_subject(&mut tls.certificates, alias.as_ref(), tls::KUBEDB_ORGANIZATION);
            tls::set_missing_secret_name_for_certificate(&mut tls.certificates, alias.as_ref(), secret);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MSSQLServerVersionSpec, VersionSecurityContext};

    fn mssql(spec: serde_json::Value) -> MSSQLServer {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "kubedb.com/v1alpha2",
            "kind": "MSSQLServer",
            "metadata": {"name": "ms-prod", "namespace": "demo"},
            "spec": spec,
        }))
        .unwrap()
    }

    fn version() -> MSSQLServerVersion {
        MSSQLServerVersion::new(
            "2022-cu12",
            MSSQLServerVersionSpec {
                version: "2022".into(),
                security_context: Some(VersionSecurityContext {
                    run_as_user: Some(10001),
                    run_as_group: None,
                }),
                ..Default::default()
            },
        )
    }

    #[test]
    fn names() {
        let ms = mssql(serde_json::json!({"version": "2022-cu12", "authSecret": {"name": "sa"}}));
        assert_eq!(ms.availability_group_name(), "msprod");
        assert_eq!(ms.secondary_service_name(), "ms-prod-secondary");
        assert_eq!(ms.arbiter_name(), "ms-prod-arbiter");
        assert_eq!(ms.default_user_cred_secret_name("dbm_user"), "ms-prod-dbm-user-cred");
        assert_eq!(ms.namespaced_name(), "demo/ms-prod");
        assert_eq!(
            ms.persistent_secrets(),
            vec![
                "sa",
                "ms-prod-endpoint-cert",
                "ms-prod-dbm-login",
                "ms-prod-master-key"
            ]
        );
    }

    #[test]
    fn availability_group_defaults() {
        let mut ms = mssql(serde_json::json!({
            "version": "2022-cu12",
            "replicas": 3,
            "topology": {"mode": "AvailabilityGroup"},
            "internalAuth": {"endpointCert": {"issuerRef": {"kind": "Issuer", "name": "ms-ca"}}},
            "tls": {"issuerRef": {"kind": "Issuer", "name": "ms-ca"}, "clientTLS": true},
        }));
        ms.set_defaults(Some(&version()));

        let le = ms
            .spec
            .topology
            .as_ref()
            .and_then(|t| t.availability_group.as_ref())
            .and_then(|ag| ag.leader_election.as_ref())
            .unwrap();
        assert_eq!(le.period, "300ms");
        assert_eq!(le.election_tick, 10);
        assert_eq!(le.transfer_leadership_timeout.as_deref(), Some("60s"));

        let pod = &ms.spec.pod_template.as_ref().unwrap().spec;
        let caps = pod
            .container("mssql")
            .and_then(|c| c.security_context.as_ref())
            .and_then(|sc| sc.capabilities.as_ref())
            .unwrap();
        assert_eq!(caps.add, Some(vec!["NET_BIND_SERVICE".to_string()]));
        assert_eq!(
            pod.container(MSSQLSERVER_COORDINATOR_CONTAINER_NAME)
                .and_then(|c| c.resources.clone()),
            Some(resources::coordinator_default_resources())
        );
        assert!(pod.init_container(MSSQLSERVER_INIT_CONTAINER_NAME).is_some());

        let endpoint = &ms.spec.internal_auth.as_ref().unwrap().endpoint_cert.as_ref().unwrap();
        assert_eq!(
            tls::get_certificate_secret_name(&endpoint.certificates, "endpoint"),
            Some("ms-prod-endpoint-cert")
        );
        let tls = ms.spec.tls.as_ref().unwrap();
        assert_eq!(tls.client_tls, Some(true));
        assert_eq!(
            tls::get_certificate_secret_name(&tls.config.certificates, "client"),
            Some("ms-prod-client-cert")
        );
    }

    #[test]
    fn standalone_defaults() {
        let mut ms = mssql(serde_json::json!({"version": "2022-cu12"}));
        ms.set_defaults(Some(&version()));
        assert_eq!(ms.spec.replicas, Some(1));
        assert!(ms.spec.topology.is_none());

        let pod = &ms.spec.pod_template.as_ref().unwrap().spec;
        assert!(pod.container(MSSQLSERVER_COORDINATOR_CONTAINER_NAME).is_none());
        assert_eq!(
            pod.container("mssql").and_then(|c| c.resources.clone()),
            Some(resources::mssqlserver_default_resources())
        );
        assert_eq!(pod.security_context.as_ref().and_then(|s| s.fs_group), Some(10001));
    }

    #[test]
    fn symbols_only_name() {
        let ms = MSSQLServer::new("---", MSSQLServerSpec::default());
        assert_eq!(ms.availability_group_name(), "DefaultGroupName");
    }
}
