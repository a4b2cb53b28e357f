use std::collections::BTreeMap;

use k8s_openapi::api::core::v1 as core;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{DatabaseStatus, spec_accessors, spec_defaults};
use crate::{
    Database, Defaults,
    catalog::{CatalogVersion, ElasticsearchVersion},
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    meta::{self, name_with_suffix},
    monitor::AgentSpec,
    offshoot::PodTemplateSpec,
    resources,
    tls::{self, CertificateAlias, TlsConfig},
    types::{
        DeletionPolicy, InitSpec, KernelSettings, NamedServiceTemplateSpec, SecretReference,
        StorageType,
    },
};

/// Role the metrics exporter user is mapped to on OpenDistro.
pub const OPENDISTRO_READALL_MONITOR_ROLE: &str = "readall_and_monitor";
/// Role the metrics exporter user is mapped to on SearchGuard 7.
pub const SEARCHGUARD_READALL_MONITOR_ROLE_V7: &str = "SGS_READALL_AND_MONITOR";
/// Role the metrics exporter user is mapped to on SearchGuard 6.
pub const SEARCHGUARD_READALL_MONITOR_ROLE_V6: &str = "sg_readall_and_monitor";

/// ElasticsearchSpec describes the desired state of an Elasticsearch cluster.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "Elasticsearch",
    plural = "elasticsearches",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "es",
    category = "datastore",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchSpec {
    /// Version of Elasticsearch to be deployed.
    #[validate(length(min = 1))]
    pub version: String,
    /// Number of instances of a combined cluster.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// Topology splits the cluster into dedicated node roles.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub topology: Option<ElasticsearchClusterTopology>,
    /// EnableSSL serves the HTTP layer over TLS.
    #[serde(default, rename = "enableSSL", skip_serializing_if = "std::ops::Not::not")]
    pub enable_ssl: bool,
    /// DisableSecurity turns off authentication and transport encryption.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disable_security: bool,
    /// AuthSecret holds the credentials of the admin user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
    /// StorageType can be durable (default) or ephemeral.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<StorageType>,
    /// Storage of a combined cluster.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
    /// Init is used to initialize the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init: Option<InitSpec>,
    /// ConfigSecret holds custom elasticsearch.yml settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<core::LocalObjectReference>,
    /// SecureConfigSecret holds settings for the keystore.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure_config_secret: Option<core::LocalObjectReference>,
    /// KernelSettings applied by a privileged init container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel_settings: Option<KernelSettings>,
    /// InternalUsers of the security plugin, keyed by user name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub internal_users: BTreeMap<String, ElasticsearchUserSpec>,
    /// RolesMapping of the security plugin, keyed by role name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub roles_mapping: BTreeMap<String, ElasticsearchRoleMapSpec>,
    /// PodTemplate is an optional configuration for pods of a combined cluster.
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
    /// HealthChecker for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub health_checker: Option<HealthCheckSpec>,
    /// Monitor is used to monitor the database instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<AgentSpec>,
}

/// ElasticsearchClusterTopology lists the node roles of a dedicated cluster.
///
/// Master and ingest nodes are required; every other role is optional.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct ElasticsearchClusterTopology {
    #[validate(nested)]
    pub master: ElasticsearchNode,
    #[validate(nested)]
    pub ingest: ElasticsearchNode,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub data: Option<ElasticsearchNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub data_content: Option<ElasticsearchNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub data_hot: Option<ElasticsearchNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub data_warm: Option<ElasticsearchNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub data_cold: Option<ElasticsearchNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub data_frozen: Option<ElasticsearchNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub ml: Option<ElasticsearchNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub transform: Option<ElasticsearchNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub coordinating: Option<ElasticsearchNode>,
}

/// ElasticsearchNode configures the pods of one role.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchNode {
    /// Number of pods of this role.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// Suffix appended to the PetSet name. Defaults to the role.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub suffix: String,
    /// Storage of each pod.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
    /// PodTemplate customizes the pods of this role.
    #[serde(default)]
    pub pod_template: PodTemplateSpec,
}

/// ElasticsearchUserSpec describes an internal user of the security plugin.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchUserSpec {
    /// Reserved users can only be changed through the REST API by an admin.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reserved: bool,
    /// Hidden users are not returned by the REST API.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    /// Backend roles of the user.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backend_roles: Vec<String>,
    /// Secret holding the user's credentials.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_name: String,
}

/// ElasticsearchRoleMapSpec maps users and backend roles to a security role.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchRoleMapSpec {
    /// Users with the role.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    /// Backend roles with the role.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backend_roles: Vec<String>,
}

/// ElasticsearchNodeRole names the node roles of a cluster.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, strum::AsRefStr, strum::Display, strum::EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
#[allow(missing_docs)]
pub enum ElasticsearchNodeRole {
    Combined,
    Master,
    Ingest,
    Data,
    DataContent,
    DataHot,
    DataWarm,
    DataCold,
    DataFrozen,
    Ml,
    Transform,
    Coordinating,
}

/// ElasticsearchDistribution is the flavor of a catalog entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::AsRefStr, strum::EnumString)]
#[allow(missing_docs)]
pub enum ElasticsearchDistribution {
    ElasticStack,
    OpenDistro,
    SearchGuard,
    OpenSearch,
}

impl ElasticsearchDistribution {
    /// Parses the distribution of a catalog entry.
    pub fn of(version: &ElasticsearchVersion) -> Option<Self> {
        version.spec.distribution.as_deref()?.parse().ok()
    }

    /// Reports whether the distribution manages users through a security plugin config.
    pub fn has_security_plugin(self) -> bool {
        matches!(self, Self::OpenDistro | Self::SearchGuard)
    }
}

impl ElasticsearchClusterTopology {
    /// Returns the node configuration of `role`.
    pub fn node(&self, role: ElasticsearchNodeRole) -> Option<&ElasticsearchNode> {
        use ElasticsearchNodeRole::*;
        match role {
            Combined => None,
            Master => Some(&self.master),
            Ingest => Some(&self.ingest),
            Data => self.data.as_ref(),
            DataContent => self.data_content.as_ref(),
            DataHot => self.data_hot.as_ref(),
            DataWarm => self.data_warm.as_ref(),
            DataCold => self.data_cold.as_ref(),
            DataFrozen => self.data_frozen.as_ref(),
            Ml => self.ml.as_ref(),
            Transform => self.transform.as_ref(),
            Coordinating => self.coordinating.as_ref(),
        }
    }

    fn nodes_mut(&mut self) -> impl Iterator<Item = (ElasticsearchNodeRole, &mut ElasticsearchNode)> {
        use ElasticsearchNodeRole::*;
        [
            (Master, Some(&mut self.master)),
            (Ingest, Some(&mut self.ingest)),
            (Data, self.data.as_mut()),
            (DataContent, self.data_content.as_mut()),
            (DataHot, self.data_hot.as_mut()),
            (DataWarm, self.data_warm.as_mut()),
            (DataCold, self.data_cold.as_mut()),
            (DataFrozen, self.data_frozen.as_mut()),
            (Ml, self.ml.as_mut()),
            (Transform, self.transform.as_mut()),
            (Coordinating, self.coordinating.as_mut()),
        ]
        .into_iter()
        .filter_map(|(role, node)| Some((role, node?)))
    }
}

/// Returns the kernel settings every node needs: a raised vm.max_map_count.
pub fn default_kernel_settings() -> KernelSettings {
    KernelSettings {
        privileged: true,
        sysctls: vec![core::Sysctl {
            name: "vm.max_map_count".to_string(),
            value: "262144".to_string(),
        }],
        ..Default::default()
    }
}

impl Elasticsearch {
    /// Name of the service master nodes discover each other through.
    pub fn master_discovery_service_name(&self) -> String {
        name_with_suffix(self.service_name(), "master")
    }

    /// Name of the PetSet of a cluster without topology.
    pub fn combined_petset_name(&self) -> String {
        self.offshoot_name()
    }

    /// Name of the PetSet running `role`, honoring the node's suffix.
    pub fn node_petset_name(&self, role: ElasticsearchNodeRole) -> String {
        if role == ElasticsearchNodeRole::Combined {
            return self.combined_petset_name();
        }
        let suffix = self
            .spec
            .topology
            .as_ref()
            .and_then(|t| t.node(role))
            .map(|n| n.suffix.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(role.as_ref());
        name_with_suffix(self.offshoot_name(), suffix)
    }

    /// Name of the master PetSet.
    pub fn master_petset_name(&self) -> String {
        self.node_petset_name(ElasticsearchNodeRole::Master)
    }

    /// Name of the ingest PetSet.
    pub fn ingest_petset_name(&self) -> String {
        self.node_petset_name(ElasticsearchNodeRole::Ingest)
    }

    /// Name of the generic data PetSet.
    pub fn data_petset_name(&self) -> String {
        self.node_petset_name(ElasticsearchNodeRole::Data)
    }

    /// Name of the Secret holding the credentials of internal user `user`.
    pub fn default_user_cred_secret_name(&self, user: &str) -> String {
        name_with_suffix(self.offshoot_name(), format!("{}-cred", user.replace('_', "-")))
    }

    fn set_internal_user_defaults(&mut self, version: &ElasticsearchVersion) {
        if self.spec.disable_security {
            return;
        }
        let Some(distribution) = ElasticsearchDistribution::of(version) else {
            return;
        };
        if !distribution.has_security_plugin() {
            return;
        }
        let monitored = self.spec.monitor.is_some();
        let mut users = std::mem::take(&mut self.spec.internal_users);

        let admin = users.entry("admin".to_string()).or_insert_with(|| ElasticsearchUserSpec {
            reserved: true,
            ..Default::default()
        });
        if !admin.backend_roles.iter().any(|r| r == "admin") {
            admin.backend_roles.push("admin".to_string());
        }
        users
            .entry("kibanaserver".to_string())
            .or_insert_with(|| ElasticsearchUserSpec {
                reserved: true,
                ..Default::default()
            });
        for user in ["kibanaro", "logstash", "readall", "snapshotrestore"] {
            users.entry(user.to_string()).or_default();
        }
        if monitored {
            users.entry("metrics_exporter".to_string()).or_default();
        }

        for (name, user) in users.iter_mut() {
            if name == "admin" {
                match self.spec.auth_secret.as_ref().filter(|s| !s.name.is_empty()) {
                    Some(secret) => user.secret_name = secret.name.clone(),
                    None => {
                        if user.secret_name.is_empty() {
                            user.secret_name = self.default_user_cred_secret_name(name);
                        }
                        self.spec.auth_secret = Some(SecretReference {
                            name: user.secret_name.clone(),
                            ..Default::default()
                        });
                    }
                }
            } else if user.secret_name.is_empty() {
                user.secret_name = self.default_user_cred_secret_name(name);
            }
        }
        self.spec.internal_users = users;

        if monitored {
            let role = match distribution {
                ElasticsearchDistribution::SearchGuard if version.db_version().starts_with("6.") => {
                    self.spec.roles_mapping.remove(SEARCHGUARD_READALL_MONITOR_ROLE_V7);
                    SEARCHGUARD_READALL_MONITOR_ROLE_V6
                }
                ElasticsearchDistribution::SearchGuard => {
                    self.spec.roles_mapping.remove(SEARCHGUARD_READALL_MONITOR_ROLE_V6);
                    SEARCHGUARD_READALL_MONITOR_ROLE_V7
                }
                _ => OPENDISTRO_READALL_MONITOR_ROLE,
            };
            let mapping = self.spec.roles_mapping.entry(role.to_string()).or_default();
            if !mapping.users.iter().any(|u| u == "metrics_exporter") {
                mapping.users.push("metrics_exporter".to_string());
            }
        }
    }

    fn set_admin_cert_defaults(&mut self, version: &ElasticsearchVersion) {
        if self.spec.disable_security || !self.spec.enable_ssl {
            return;
        }
        if !ElasticsearchDistribution::of(version).is_some_and(|d| d.has_security_plugin()) {
            return;
        }
        let name = self.certificate_name(CertificateAlias::Admin);
        if let Some(tls) = self.spec.tls.as_mut() {
            tls::set_missing_secret_name_for_certificate(
                &mut tls.certificates,
                CertificateAlias::Admin.as_ref(),
                name,
            );
        }
    }
}

impl Database for Elasticsearch {
    const RESOURCE_CODE: &'static str = "es";
    const CONTAINER_NAME: &'static str = "elasticsearch";
    const CERT_ALIASES: &'static [CertificateAlias] = &[
        CertificateAlias::Ca,
        CertificateAlias::Transport,
        CertificateAlias::Http,
        CertificateAlias::Admin,
        CertificateAlias::Archiver,
        CertificateAlias::MetricsExporter,
    ];

    spec_accessors!();
}

impl Defaults for Elasticsearch {
    spec_defaults!(ElasticsearchVersion);

    fn set_defaults(&mut self, version: Option<&ElasticsearchVersion>) {
        let name = self.offshoot_name();
        self.spec.deletion_policy.get_or_insert(DeletionPolicy::Delete);
        self.spec.storage_type.get_or_insert(StorageType::Durable);
        self.spec
            .pod_template
            .get_or_insert_with(PodTemplateSpec::default)
            .spec
            .service_account_name
            .get_or_insert(name);
        match self.spec.topology.as_mut() {
            Some(topology) => {
                for (role, node) in topology.nodes_mut() {
                    if node.suffix.is_empty() {
                        node.suffix = role.to_string();
                    }
                    node.replicas.get_or_insert(1);
                }
            }
            None => {
                self.spec.replicas.get_or_insert(1);
            }
        }
        self.spec
            .kernel_settings
            .get_or_insert_with(default_kernel_settings);

        let Some(version) = version else {
            return;
        };
        let selector = self.offshoot_selectors();
        let namespace = self.namespace();
        let template = defaults::set_default_pod_template(
            &mut self.spec.pod_template,
            Self::CONTAINER_NAME,
            version,
            &resources::memory_intensive_resources(),
        );
        defaults::set_default_affinity(template, &selector, &namespace);
        if let Some(topology) = self.spec.topology.as_mut() {
            for (role, node) in topology.nodes_mut() {
                let template = &mut node.pod_template;
                defaults::set_default_container_security_context(
                    template,
                    Self::CONTAINER_NAME,
                    version,
                );
                defaults::set_default_container_resources(
                    template,
                    Self::CONTAINER_NAME,
                    &resources::memory_intensive_resources(),
                );
                let mut node_selector = selector.clone();
                node_selector.insert(meta::LABEL_ROLE.to_string(), role.to_string());
                defaults::set_default_affinity(template, &node_selector, &namespace);
            }
        }
        self.set_tls_defaults();
        self.set_admin_cert_defaults(version);
        self.set_internal_user_defaults(version);
        defaults::set_monitor_defaults(&mut self.spec.monitor, version);
        self.set_health_checker_defaults();
    }

    fn set_health_checker_defaults(&mut self) {
        health::set_health_checker_defaults(
            &mut self.spec.health_checker,
            HealthCheckDefaults::STANDARD,
        );
    }

    /// The transport layer is always encrypted unless security is disabled, so a TLS config is
    /// created even when none was requested.
    fn set_tls_defaults(&mut self) {
        if self.spec.disable_security {
            return;
        }
        let ca = self.certificate_name(CertificateAlias::Ca);
        let transport = self.certificate_name(CertificateAlias::Transport);
        let http = self.certificate_name(CertificateAlias::Http);
        let enable_ssl = self.spec.enable_ssl;
        let tls = self.spec.tls.get_or_insert_with(TlsConfig::default);
        if !tls.has_issuer() {
            tls::set_missing_secret_name_for_certificate(
                &mut tls.certificates,
                CertificateAlias::Ca.as_ref(),
                ca,
            );
        }
        tls::set_missing_secret_name_for_certificate(
            &mut tls.certificates,
            CertificateAlias::Transport.as_ref(),
            transport,
        );
        if enable_ssl {
            tls::set_missing_secret_name_for_certificate(
                &mut tls.certificates,
                CertificateAlias::Http.as_ref(),
                http,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ElasticsearchVersionSpec, VersionSecurityContext};

    fn elasticsearch(spec: serde_json::Value) -> Elasticsearch {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "kubedb.com/v1alpha2",
            "kind": "Elasticsearch",
            "metadata": {"name": "es", "namespace": "demo"},
            "spec": spec,
        }))
        .unwrap()
    }

    fn version(v: &str, distribution: &str) -> ElasticsearchVersion {
        ElasticsearchVersion::new(
            v,
            ElasticsearchVersionSpec {
                version: v.into(),
                distribution: Some(distribution.into()),
                security_context: Some(VersionSecurityContext {
                    run_as_user: Some(1000),
                    run_as_group: None,
                }),
                ..Default::default()
            },
        )
    }

    #[test]
    fn topology_names() {
        let mut es = elasticsearch(serde_json::json!({
            "version": "xpack-8.11.1",
            "topology": {
                "master": {"suffix": "m"},
                "ingest": {},
                "dataHot": {"replicas": 2},
            },
        }));
        assert_eq!(es.master_petset_name(), "es-m");
        assert_eq!(es.ingest_petset_name(), "es-ingest");
        assert_eq!(es.node_petset_name(ElasticsearchNodeRole::DataHot), "es-data-hot");
        assert_eq!(es.combined_petset_name(), "es");
        assert_eq!(es.master_discovery_service_name(), "es-master");

        es.set_defaults(None);
        let topology = es.spec.topology.as_ref().unwrap();
        assert_eq!(topology.ingest.suffix, "ingest");
        assert_eq!(topology.ingest.replicas, Some(1));
        assert_eq!(topology.data_hot.as_ref().unwrap().replicas, Some(2));
        assert!(topology.data.is_none());
        assert!(es.spec.replicas.is_none());
        assert_eq!(es.spec.kernel_settings, Some(default_kernel_settings()));
    }

    #[test]
    fn combined_defaults() {
        let mut es = elasticsearch(serde_json::json!({"version": "xpack-8.11.1"}));
        es.set_defaults(Some(&version("8.11.1", "ElasticStack")));
        assert_eq!(es.spec.replicas, Some(1));
        let template = es.spec.pod_template.as_ref().unwrap();
        assert_eq!(
            template.spec.container("elasticsearch").and_then(|c| c.resources.clone()),
            Some(resources::memory_intensive_resources())
        );
        let certs = &es.spec.tls.as_ref().unwrap().certificates;
        assert_eq!(tls::get_certificate_secret_name(certs, "ca"), Some("es-ca-cert"));
        assert_eq!(
            tls::get_certificate_secret_name(certs, "transport"),
            Some("es-transport-cert")
        );
        assert!(tls::get_certificate(certs, "http").is_none());
        assert!(es.spec.internal_users.is_empty());
    }

    #[test]
    fn security_disabled() {
        let mut es = elasticsearch(serde_json::json!({
            "version": "opendistro-1.13.2",
            "disableSecurity": true,
        }));
        es.set_defaults(Some(&version("1.13.2", "OpenDistro")));
        assert!(es.spec.tls.is_none());
        assert!(es.spec.internal_users.is_empty());
    }

    #[test]
    fn internal_users() {
        let mut es = elasticsearch(serde_json::json!({
            "version": "searchguard-7.14.2",
            "enableSSL": true,
            "monitor": {"agent": "prometheus.io/operator"},
            "tls": {"issuerRef": {"apiGroup": "cert-manager.io", "kind": "Issuer", "name": "ca"}},
            "internalUsers": {"admin": {"backendRoles": ["ops"]}},
        }));
        es.set_defaults(Some(&version("7.14.2", "SearchGuard")));

        let admin = &es.spec.internal_users["admin"];
        assert_eq!(admin.backend_roles, ["ops", "admin"]);
        assert_eq!(admin.secret_name, "es-admin-cred");
        assert_eq!(es.auth_secret_name(), "es-admin-cred");
        assert_eq!(
            es.spec.internal_users["metrics_exporter"].secret_name,
            "es-metrics-exporter-cred"
        );
        assert!(es.spec.internal_users["kibanaserver"].reserved);
        assert_eq!(
            es.spec.roles_mapping[SEARCHGUARD_READALL_MONITOR_ROLE_V7].users,
            ["metrics_exporter"]
        );

        let certs = &es.spec.tls.as_ref().unwrap().certificates;
        assert!(tls::get_certificate(certs, "ca").is_none());
        assert_eq!(tls::get_certificate_secret_name(certs, "http"), Some("es-http-cert"));
        assert_eq!(tls::get_certificate_secret_name(certs, "admin"), Some("es-admin-cert"));
    }

    #[test]
    fn idempotent() {
        let mut es = elasticsearch(serde_json::json!({
            "version": "opendistro-1.13.2",
            "topology": {"master": {}, "ingest": {}, "data": {}},
        }));
        let v = version("1.13.2", "OpenDistro");
        es.set_defaults(Some(&v));
        let once = es.clone();
        es.set_defaults(Some(&v));
        assert_eq!(es, once);
    }
}
