use k8s_openapi::api::core::v1 as core;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{DatabaseStatus, spec_accessors, spec_defaults};
use crate::{
    Database, Defaults,
    catalog::IgniteVersion,
    defaults,
    health::{self, HealthCheckDefaults, HealthCheckSpec},
    meta::name_with_suffix,
    monitor::AgentSpec,
    offshoot::{self, PodTemplateSpec},
    resources,
    tls::{CertificateAlias, TlsConfig},
    types::{AutoOpsSpec, DeletionPolicy, NamedServiceTemplateSpec, SecretReference, StorageType},
};

/// Name of the Ignite init container.
pub const IGNITE_INIT_CONTAINER_NAME: &str = "ignite-init";

/// IgniteSpec describes the desired state of an Apache Ignite cluster.
#[derive(
    CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema,
)]
#[kube(
    group = "kubedb.com",
    version = "v1alpha2",
    kind = "Ignite",
    plural = "ignites",
    namespaced,
    status = "DatabaseStatus",
    derive = "PartialEq",
    shortname = "ig",
    category = "datastore",
    category = "kubedb",
    category = "appscode",
    category = "all",
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IgniteSpec {
    /// AutoOps contains configuration of automatic ops-request-recommendation generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_ops: Option<AutoOpsSpec>,
    /// Version of Ignite to be deployed.
    #[validate(length(min = 1))]
    pub version: String,
    /// Number of server nodes to deploy.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub replicas: Option<i32>,
    /// StorageType can be durable (default) or ephemeral.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<StorageType>,
    /// Storage to specify how storage shall be used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<core::PersistentVolumeClaimSpec>,
    /// DisableSecurity turns off authentication.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disable_security: bool,
    /// AuthSecret holds the ignite user credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<SecretReference>,
    /// ConfigSecret is an optional field to provide custom configuration file for the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<core::LocalObjectReference>,
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
    /// TLS contains tls configurations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    /// KeystoreCredSecret holds the keystore passwords.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keystore_cred_secret: Option<SecretReference>,
    /// Monitor is used to monitor the database instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<AgentSpec>,
}

impl Ignite {
    /// Scheme of the REST endpoint.
    pub fn connection_scheme(&self) -> &'static str {
        if self.spec.tls.is_some() { "https" } else { "http" }
    }

    /// Name of the Secret holding the keystore passwords.
    pub fn keystore_secret_name(&self) -> String {
        match &self.spec.keystore_cred_secret {
            Some(s) if !s.name.is_empty() => s.name.clone(),
            _ => name_with_suffix(self.offshoot_name(), "keystore-cred"),
        }
    }

    /// Name of the PVC for `alias`.
    pub fn pvc_name(&self, alias: &str) -> String {
        name_with_suffix(self.offshoot_name(), alias)
    }

    /// In-cluster address of the client service.
    pub fn client_address(&self) -> String {
        format!("{}.{}.svc.cluster.local", self.service_name(), self.namespace())
    }
}

impl Database for Ignite {
    const RESOURCE_CODE: &'static str = "ig";
    const CONTAINER_NAME: &'static str = "ignite";
    const CERT_ALIASES: &'static [CertificateAlias] =
        &[CertificateAlias::Server, CertificateAlias::Client];

    spec_accessors!();
}

impl Defaults for Ignite {
    spec_defaults!(IgniteVersion);

    fn set_defaults(&mut self, version: Option<&IgniteVersion>) {
        self.spec.deletion_policy.get_or_insert(DeletionPolicy::Delete);
        self.spec.replicas.get_or_insert(1);
        self.spec.storage_type.get_or_insert(StorageType::Durable);

        let Some(version) = version else {
            return;
        };
        let template = self.spec.pod_template.get_or_insert_with(PodTemplateSpec::default);
        defaults::set_default_container_security_context(template, Self::CONTAINER_NAME, version);
        defaults::set_default_init_container_security_context(
            template,
            IGNITE_INIT_CONTAINER_NAME,
            version,
        );
        let c = offshoot::container_mut(&mut template.spec.containers, Self::CONTAINER_NAME);
        resources::set_default_resource_limits(
            c.resources.get_or_insert_with(Default::default),
            &resources::default_resources(),
        );
        defaults::set_monitor_defaults(&mut self.spec.monitor, version);
        self.set_health_checker_defaults();
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
            self.spec.tls = Some(tls);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{IgniteVersionSpec, VersionSecurityContext};

    fn ignite(spec: serde_json::Value) -> Ignite {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "kubedb.com/v1alpha2",
            "kind": "Ignite",
            "metadata": {"name": "ig", "namespace": "demo"},
            "spec": spec,
        }))
        .unwrap()
    }

    #[test]
    fn names() {
        let ig = ignite(serde_json::json!({"version": "2.17.0"}));
        assert_eq!(ig.client_address(), "ig.demo.svc.cluster.local");
        assert_eq!(ig.keystore_secret_name(), "ig-keystore-cred");
        assert_eq!(ig.pvc_name("data"), "ig-data");
        assert_eq!(ig.connection_scheme(), "http");
        assert!(ig.persistent_secrets().is_empty());
    }

    #[test]
    fn defaults_with_version() {
        let mut ig = ignite(serde_json::json!({
            "version": "2.17.0",
            "podTemplate": {"spec": {"containers": [{
                "name": "ignite",
                "resources": {"requests": {"cpu": "1"}},
            }]}},
        }));
        let version = IgniteVersion::new(
            "2.17.0",
            IgniteVersionSpec {
                version: "2.17.0".into(),
                security_context: Some(VersionSecurityContext {
                    run_as_user: Some(70),
                    run_as_group: None,
                }),
                ..Default::default()
            },
        );
        ig.set_defaults(Some(&version));

        let pod = &ig.spec.pod_template.as_ref().unwrap().spec;
        assert_eq!(pod.security_context.as_ref().unwrap().fs_group, Some(70));
        let c = pod.container("ignite").unwrap();
        let res = c.resources.as_ref().unwrap();
        assert!(res.requests.as_ref().unwrap().contains_key(resources::MEMORY));
        assert!(res.limits.as_ref().unwrap().contains_key(resources::MEMORY));
        assert!(pod.init_container(IGNITE_INIT_CONTAINER_NAME).is_some());
        assert_eq!(
            ig.spec.health_checker.as_ref().and_then(|h| h.failure_threshold),
            Some(3)
        );
    }
}
