use k8s_openapi::api::core::v1 as core;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{DatabaseStatus, spec_defaults};
use crate::{
    Database, Defaults, Labels,
    catalog::{CatalogVersion, FerretDBVersion},
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    meta::{self, name_with_suffix},
    monitor::AgentSpec,
    offshoot::PodTemplateSpec,
    resources,
    tls::{CertificateAlias, TlsConfig},
    types::{
        self, DeletionPolicy, NamedServiceTemplateSpec, ObjectReference, SecretReference, SslMode,
        StorageType,
    },
};

/// FERRETDB_PRIMARY_LABEL_KEY selects the pods of the primary server group.
pub const FERRETDB_PRIMARY_LABEL_KEY: &str = "ferretdb.kubedb.com/primary";
/// FERRETDB_SECONDARY_LABEL_KEY selects the pods of the secondary server group.
pub const FERRETDB_SECONDARY_LABEL_KEY: &str = "ferretdb.kubedb.com/secondary";

/// FerretDBSpec describes the desired state of a FerretDB server.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "FerretDB",
    plural = "ferretdbs",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "fr",
    category = "datastore",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct FerretDBSpec {
    /// Version of FerretDB to be deployed.
    #[validate(length(min = 1))]
    pub version: String,
    /// AuthSecret holds the credentials of the backend user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
    /// StorageType of the provisioned backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<StorageType>,
    /// Storage of the provisioned backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
    /// SSLMode of the wire protocol listener.
    #[serde(rename = "sslMode", skip_serializing_if = "Option::is_none")]
    pub ssl_mode: Option<SslMode>,
    /// TLS contains tls configurations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    /// Server groups of the deployment.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub server: Option<FerretDBServer>,
    /// Backend is the Postgres server the documents are stored in.
    #[serde(default)]
    #[validate(nested)]
    pub backend: FerretDBBackend,
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
}

/// FerretDBServer holds the primary and the optional read-only secondary server group.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FerretDBServer {
    /// Primary servers accept writes.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub primary: Option<FerretDBServerSpec>,
    /// Secondary servers read from the backend's standbys.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub secondary: Option<FerretDBServerSpec>,
}

/// FerretDBServerSpec configures one server group.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FerretDBServerSpec {
    /// Number of servers.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// PodTemplate customizes the pods of this group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
}

/// FerretDBBackend describes the Postgres server backing FerretDB.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FerretDBBackend {
    /// PostgresRef refers to the AppBinding of an external backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres_ref: Option<ObjectReference>,
    /// Postgres version of a provisioned backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// LinkedDB is the database inside the backend FerretDB uses.
    #[serde(default, rename = "linkedDB", skip_serializing_if = "String::is_empty")]
    pub linked_db: String,
    /// ExternallyManaged reports that the backend is not provisioned for this server.
    #[serde(default)]
    pub externally_managed: bool,
}

impl FerretDB {
    /// Name of the secondary server group, if there is one.
    pub fn secondary_server_name(&self) -> Option<String> {
        self.spec
            .server
            .as_ref()
            .and_then(|s| s.secondary.as_ref())
            .map(|_| name_with_suffix(self.offshoot_name(), "secondary"))
    }

    /// Selectors of the primary server pods.
    pub fn primary_server_selectors(&self) -> Labels {
        self.offshoot_selectors_with(&Labels::from([(
            FERRETDB_PRIMARY_LABEL_KEY.to_string(),
            self.offshoot_name(),
        )]))
    }

    /// Selectors of the secondary server pods.
    pub fn secondary_server_selectors(&self) -> Labels {
        self.offshoot_selectors_with(&Labels::from([(
            FERRETDB_SECONDARY_LABEL_KEY.to_string(),
            self.secondary_server_name().unwrap_or_default(),
        )]))
    }

    /// Labels of the primary server pods.
    pub fn primary_server_labels(&self) -> Labels {
        meta::overwrite_keys(self.offshoot_labels(), [&self.primary_server_selectors()])
    }

    /// Labels of the secondary server pods.
    pub fn secondary_server_labels(&self) -> Labels {
        meta::overwrite_keys(self.offshoot_labels(), [&self.secondary_server_selectors()])
    }

    /// Headless service of the secondary server group.
    pub fn secondary_governing_service_name(&self) -> String {
        name_with_suffix(self.governing_service_name(), "secondary")
    }

    /// Name of the Postgres provisioned as the backend.
    pub fn pg_backend_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), "pg-backend")
    }

    /// Name of the Secret holding the backend connection string.
    pub fn backend_connection_secret_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), "backend-connection")
    }

    /// Name of the client certificate Secret used against an external backend.
    pub fn external_backend_client_secret_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), "ext-pg-client-cert")
    }

    fn default_backend_version(version: &FerretDBVersion) -> &'static str {
        // FerretDB 2 stores documents through the DocumentDB extension.
        match version.db_version().split('.').next().map(str::parse::<u64>) {
            Some(Ok(major)) if major >= 2 => "16.7-doc",
            _ => "16.4-bookworm",
        }
    }
}

impl Database for FerretDB {
    const RESOURCE_CODE: &'static str = "fr";
    const CONTAINER_NAME: &'static str = "ferretdb";
    const CERT_ALIASES: &'static [CertificateAlias] =
        &[CertificateAlias::Server, CertificateAlias::Client];

    fn auth_secret(&self) -> Option<&SecretReference> {
        self.spec.auth_secret.as_ref()
    }
    fn tls(&self) -> Option<&TlsConfig> {
        self.spec.tls.as_ref()
    }
    fn pod_template(&self) -> Option<&PodTemplateSpec> {
        self.spec
            .server
            .as_ref()
            .and_then(|s| s.primary.as_ref())
            .and_then(|p| p.pod_template.as_ref())
    }
    fn service_templates(&self) -> &[NamedServiceTemplateSpec] {
        &self.spec.service_templates
    }
    fn monitor(&self) -> Option<&AgentSpec> {
        self.spec.monitor.as_ref()
    }
}

impl Defaults for FerretDB {
    spec_defaults!(FerretDBVersion);

    fn set_defaults(&mut self, version: Option<&FerretDBVersion>) {
        self.spec.deletion_policy.get_or_insert(DeletionPolicy::WipeOut);
        self.spec.storage_type.get_or_insert(StorageType::Durable);
        self.spec.ssl_mode.get_or_insert(SslMode::Disabled);
        let namespace = self.namespace();
        let backend = &mut self.spec.backend;
        if backend.linked_db.is_empty() {
            backend.linked_db = if backend.externally_managed {
                "postgres".to_string()
            } else {
                "ferretdb".to_string()
            };
        }
        if let Some(pg) = backend.postgres_ref.as_mut() {
            pg.set_default_namespace(&namespace);
        }
        if self.spec.auth_secret.is_none() {
            types::default_auth_secret(&mut self.spec.auth_secret);
        }

        let Some(version) = version else {
            return;
        };
        let server = self.spec.server.get_or_insert_with(|| FerretDBServer {
            primary: Some(FerretDBServerSpec::default()),
            secondary: None,
        });
        for group in [server.primary.as_mut(), server.secondary.as_mut()]
            .into_iter()
            .flatten()
        {
            group.replicas.get_or_insert(1);
            defaults::set_default_pod_template(
                &mut group.pod_template,
                Self::CONTAINER_NAME,
                version,
                &resources::default_resources(),
            );
        }
        if !self.spec.backend.externally_managed {
            self.spec
                .backend
                .version
                .get_or_insert_with(|| Self::default_backend_version(version).to_string());
        }
        defaults::set_monitor_defaults(&mut self.spec.monitor, version);
        self.set_tls_defaults();
        self.set_health_checker_defaults();
    }

    fn set_health_checker_defaults(&mut self) {
        health::set_health_checker_defaults(
            &mut self.spec.health_checker,
            HealthCheckDefaults::new(10, 10, 2),
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
    use crate::catalog::{FerretDBVersionSpec, VersionSecurityContext};

    fn ferretdb(spec: serde_json::Value) -> FerretDB {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "kubedb.com/v1alpha2",
            "kind": "FerretDB",
            "metadata": {"name": "fr", "namespace": "demo"},
            "spec": spec,
        }))
        .unwrap()
    }

    fn version(v: &str) -> FerretDBVersion {
        FerretDBVersion::new(
            v,
            FerretDBVersionSpec {
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
        let fr = ferretdb(serde_json::json!({
            "version": "1.23.0",
            "server": {"primary": {}, "secondary": {"replicas": 2}},
        }));
        assert_eq!(fr.secondary_server_name().as_deref(), Some("fr-secondary"));
        assert_eq!(fr.secondary_governing_service_name(), "fr-pods-secondary");
        assert_eq!(fr.pg_backend_name(), "fr-pg-backend");
        assert_eq!(fr.backend_connection_secret_name(), "fr-backend-connection");
        assert_eq!(fr.primary_server_selectors()[FERRETDB_PRIMARY_LABEL_KEY], "fr");
        assert_eq!(
            fr.secondary_server_labels()[FERRETDB_SECONDARY_LABEL_KEY],
            "fr-secondary"
        );
        assert_eq!(
            fr.secondary_server_labels()[meta::COMPONENT_LABEL_KEY],
            meta::COMPONENT_DATABASE
        );
    }

    #[test]
    fn defaults_without_version() {
        let mut fr = ferretdb(serde_json::json!({
            "version": "1.23.0",
            "backend": {"externallyManaged": true, "postgresRef": {"name": "pg"}},
        }));
        fr.set_defaults(None);
        assert_eq!(fr.spec.deletion_policy, Some(DeletionPolicy::WipeOut));
        assert_eq!(fr.spec.ssl_mode, Some(SslMode::Disabled));
        assert_eq!(fr.spec.backend.linked_db, "postgres");
        assert_eq!(
            fr.spec.backend.postgres_ref.as_ref().and_then(|r| r.namespace.as_deref()),
            Some("demo")
        );
        assert!(fr.spec.auth_secret.is_some());
        assert!(fr.spec.server.is_none());
        assert!(fr.spec.backend.version.is_none());
    }

    #[test]
    fn defaults_with_version() {
        let mut fr = ferretdb(serde_json::json!({"version": "2.0.0"}));
        fr.set_defaults(Some(&version("2.0.0")));
        assert_eq!(fr.spec.backend.linked_db, "ferretdb");
        assert_eq!(fr.spec.backend.version.as_deref(), Some("16.7-doc"));
        let primary = fr.spec.server.as_ref().and_then(|s| s.primary.as_ref()).unwrap();
        assert_eq!(primary.replicas, Some(1));
        let template = fr.pod_template().unwrap();
        assert_eq!(
            template.spec.container("ferretdb").and_then(|c| c.resources.clone()),
            Some(resources::default_resources())
        );
        assert_eq!(
            fr.spec.health_checker.as_ref().and_then(|h| h.failure_threshold),
            Some(2)
        );

        let mut old = ferretdb(serde_json::json!({"version": "1.23.0"}));
        old.set_defaults(Some(&version("1.23.0")));
        assert_eq!(old.spec.backend.version.as_deref(), Some("16.4-bookworm"));
    }

    #[test]
    fn ssl_mode_wire_form() {
        let fr = ferretdb(serde_json::json!({"version": "2.0.0", "sslMode": "requireSSL"}));
        assert_eq!(fr.spec.ssl_mode, Some(SslMode::RequireSsl));
        assert!(fr.spec.ssl_mode.is_some_and(SslMode::uses_tls));
    }
}
