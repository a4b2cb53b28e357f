use k8s_openapi::{api::core::v1 as core, apimachinery::pkg::util::intstr::IntOrString};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{DatabaseStatus, spec_accessors, spec_defaults};
use crate::{
    Database, Defaults,
    catalog::{CatalogVersion, HazelcastVersion},
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    meta::name_with_suffix,
    monitor::AgentSpec,
    offshoot::{self, PodTemplateSpec},
    resources,
    tls::{CertificateAlias, TlsConfig},
    types::{DeletionPolicy, NamedServiceTemplateSpec, SecretReference, StorageType},
};

/// Port of the Hazelcast member REST endpoint.
pub const HAZELCAST_REST_PORT: i32 = 5701;

/// Name of the Hazelcast init container.
pub const HAZELCAST_INIT_CONTAINER_NAME: &str = "hazelcast-init";

/// HazelcastSpec describes the desired state of a Hazelcast cluster.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "Hazelcast",
    plural = "hazelcasts",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "hz",
    category = "datastore",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct HazelcastSpec {
    /// Version of Hazelcast to be deployed.
    #[validate(length(min = 1))]
    pub version: String,
    /// LicenseSecret holds the Hazelcast Enterprise license key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_secret: Option<core::SecretReference>,
    /// Number of members to deploy.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// StorageType can be durable (default) or ephemeral.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<StorageType>,
    /// Storage to specify how storage shall be used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
    /// JavaOpts are extra options passed to the JVM.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub java_opts: Vec<String>,
    /// DisableSecurity turns off authentication.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disable_security: bool,
    /// ConfigSecret is an optional field to provide custom configuration file for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<core::LocalObjectReference>,
    /// AuthSecret holds the admin credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
    /// PodTemplate is an optional configuration for pods used to expose the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,
    /// ServiceTemplates is an optional configuration for services used to expose the database.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_templates: Vec<NamedServiceTemplateSpec>,
    /// DeletionPolicy controls the delete operation for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
    /// HealthChecker for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub health_checker: Option<HealthCheckSpec>,
    /// EnableSSL serves the member and REST endpoints over TLS.
    #[serde(default, rename = "enableSSL", skip_serializing_if = "std::ops::Not::not")]
    pub enable_ssl: bool,
    /// TLS contains tls configurations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    /// KeystoreSecret holds the keystore passwords.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keystore_secret: Option<core::LocalObjectReference>,
    /// Halted indicates that the database is halted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub halted: bool,
    /// Monitor is used to monitor the database instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<AgentSpec>,
}

impl Hazelcast {
    /// Name of a Secret owned by the database.
    pub fn secret_name(&self, suffix: &str) -> String {
        name_with_suffix(self.offshoot_name(), suffix)
    }

    /// Name of the Secret holding the keystore passwords.
    pub fn keystore_cred_secret_name(&self) -> String {
        match &self.spec.keystore_secret {
            Some(secret) if !secret.name.is_empty() => secret.name.clone(),
            _ => self.secret_name("keystore-cred"),
        }
    }

    /// Common name of a client certificate.
    pub fn client_certificate_cn(&self, alias: CertificateAlias) -> String {
        name_with_suffix(self.offshoot_name(), alias)
    }

    /// Name of the volume mounting the certificate for `alias`.
    pub fn cert_secret_volume_name(alias: CertificateAlias) -> String {
        format!("{alias}-certs")
    }

    fn http_check(&self, path: &str) -> core::Probe {
        let scheme = if self.spec.enable_ssl { "HTTPS" } else { "HTTP" };
        core::Probe {
            http_get: Some(core::HTTPGetAction {
                path: Some(path.to_string()),
                port: IntOrString::Int(HAZELCAST_REST_PORT),
                scheme: Some(scheme.to_string()),
                ..Default::default()
            }),
            initial_delay_seconds: Some(30),
            timeout_seconds: Some(10),
            period_seconds: Some(10),
            success_threshold: Some(1),
            failure_threshold: Some(10),
            ..Default::default()
        }
    }

    fn set_pod_defaults(&mut self, version: &HazelcastVersion) {
        let liveness = self.http_check("/hazelcast/health/node-state");
        let readiness = self.http_check("/hazelcast/health/ready");
        let template = self.spec.pod_template.get_or_insert_with(PodTemplateSpec::default);
        // Members run as the catalog user, so the volume group follows it.
        template
            .spec
            .security_context
            .get_or_insert_with(Default::default)
            .fs_group = version.run_as_user();
        template.spec.termination_grace_period_seconds.get_or_insert(600);

        defaults::set_default_init_container_security_context(
            template,
            HAZELCAST_INIT_CONTAINER_NAME,
            version,
        );
        let init = offshoot::container_mut(
            &mut template.spec.init_containers,
            HAZELCAST_INIT_CONTAINER_NAME,
        );
        if resources::is_empty(init.resources.as_ref()) {
            init.resources = Some(resources::init_container_resources());
        }

        let c = offshoot::container_mut(&mut template.spec.containers, Self::CONTAINER_NAME);
        defaults::set_container_security_context(&mut c.security_context, version);
        if resources::is_empty(c.resources.as_ref()) {
            c.resources = Some(resources::memory_intensive_resources());
        }
        c.liveness_probe.get_or_insert(liveness);
        c.readiness_probe.get_or_insert(readiness);
    }
}

impl Database for Hazelcast {
    const RESOURCE_CODE: &'static str = "hz";
    const CONTAINER_NAME: &'static str = "hazelcast";
    const CERT_ALIASES: &'static [CertificateAlias] =
        &[CertificateAlias::Server, CertificateAlias::Client];

    spec_accessors!();
}

impl Defaults for Hazelcast {
    spec_defaults!(HazelcastVersion);

    fn set_defaults(&mut self, version: Option<&HazelcastVersion>) {
        self.spec.deletion_policy.get_or_insert(DeletionPolicy::Delete);
        self.spec.storage_type.get_or_insert(StorageType::Durable);

        let Some(version) = version else {
            return;
        };
        self.spec.replicas.get_or_insert(1);
        self.set_pod_defaults(version);
        defaults::set_monitor_defaults(&mut self.spec.monitor, version);
        self.set_health_checker_defaults();
        self.set_tls_defaults();
    }

    fn set_health_checker_defaults(&mut self) {
        health::set_health_checker_defaults(
            &mut self.spec.health_checker,
            HealthCheckDefaults::new(20, 10, 3),
        );
    }

    fn set_tls_defaults(&mut self) {
        if !self.spec.disable_security {
            crate::types::default_auth_secret(&mut self.spec.auth_secret);
        }
        if let Some(tls) = defaults::tls_with_secret_names(self) {
            self.spec.tls = Some(tls);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{HazelcastVersionSpec, VersionSecurityContext};

    fn hazelcast(spec: serde_json::Value) -> Hazelcast {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "kubedb.com/v1alpha2",
            "kind": "Hazelcast",
            "metadata": {"name": "hz", "namespace": "demo"},
            "spec": spec,
        }))
        .unwrap()
    }

    fn version() -> HazelcastVersion {
        HazelcastVersion::new(
            "5.5.2",
            HazelcastVersionSpec {
                version: "5.5.2".into(),
                security_context: Some(VersionSecurityContext {
                    run_as_user: Some(65534),
                    run_as_group: None,
                }),
                ..Default::default()
            },
        )
    }

    #[test]
    fn names() {
        let hz = hazelcast(serde_json::json!({"version": "5.5.2"}));
        assert_eq!(hz.keystore_cred_secret_name(), "hz-keystore-cred");
        assert_eq!(hz.client_certificate_cn(CertificateAlias::Client), "hz-client");
        assert_eq!(
            Hazelcast::cert_secret_volume_name(CertificateAlias::Server),
            "server-certs"
        );
        assert_eq!(hz.certificate_name(CertificateAlias::Ca), "hz-ca-cert");
    }

    #[test]
    fn pod_defaults() {
        let mut hz = hazelcast(serde_json::json!({"version": "5.5.2", "enableSSL": true}));
        hz.set_defaults(Some(&version()));

        assert_eq!(hz.spec.replicas, Some(1));
        let pod = &hz.spec.pod_template.as_ref().unwrap().spec;
        assert_eq!(pod.termination_grace_period_seconds, Some(600));
        assert_eq!(pod.security_context.as_ref().unwrap().fs_group, Some(65534));

        let c = pod.container("hazelcast").unwrap();
        assert_eq!(c.resources, Some(resources::memory_intensive_resources()));
        let liveness = c.liveness_probe.as_ref().unwrap();
        let get = liveness.http_get.as_ref().unwrap();
        assert_eq!(get.scheme.as_deref(), Some("HTTPS"));
        assert_eq!(get.port, IntOrString::Int(5701));
        assert_eq!(get.path.as_deref(), Some("/hazelcast/health/node-state"));
        assert_eq!(liveness.failure_threshold, Some(10));
        assert_eq!(
            c.readiness_probe.as_ref().and_then(|p| p.http_get.as_ref()).and_then(|g| g.path.as_deref()),
            Some("/hazelcast/health/ready")
        );

        let init = pod.init_container(HAZELCAST_INIT_CONTAINER_NAME).unwrap();
        assert_eq!(init.resources, Some(resources::init_container_resources()));
        assert_eq!(
            init.security_context.as_ref().and_then(|sc| sc.run_as_user),
            Some(65534)
        );
        assert_eq!(
            hz.spec.health_checker.as_ref().and_then(|h| h.period_seconds),
            Some(20)
        );
        assert!(hz.spec.auth_secret.is_some());
    }

    #[test]
    fn keeps_user_health_checks() {
        let mut hz = hazelcast(serde_json::json!({
            "version": "5.5.2",
            "disableSecurity": true,
            "podTemplate": {"spec": {"containers": [{
                "name": "hazelcast",
                "livenessProbe": {"tcpSocket": {"port": 5701}},
            }]}},
        }));
        hz.set_defaults(Some(&version()));

        let c = hz.spec.pod_template.as_ref().unwrap().spec.container("hazelcast").unwrap();
        assert!(c.liveness_probe.as_ref().unwrap().http_get.is_none());
        assert!(c.readiness_probe.is_some());
        assert!(hz.spec.auth_secret.is_none());
    }

    #[test]
    fn defaults_without_version() {
        let mut hz = hazelcast(serde_json::json!({"version": "5.5.2"}));
        hz.set_defaults(None);
        assert_eq!(hz.spec.deletion_policy, Some(DeletionPolicy::Delete));
        assert_eq!(hz.spec.storage_type, Some(StorageType::Durable));
        assert!(hz.spec.replicas.is_none());
        assert!(hz.spec.pod_template.is_none());
    }
}
