//! The [`Database`] trait derives the names and labels of every object a database owns.
//!
//! Kinds implement the accessors for the spec fields they have; everything else is derived from
//! object metadata and is identical across kinds.

use k8s_openapi::{NamespaceResourceScope, apimachinery::pkg::apis::meta::v1::OwnerReference};
use kube::Resource;

use crate::{
    GROUP, Labels,
    meta::{self, name_with_suffix},
    monitor::AgentSpec,
    offshoot::PodTemplateSpec,
    tls::{self, CertificateAlias, TlsConfig},
    types::{self, NamedServiceTemplateSpec, SecretReference, ServiceAlias},
};

/// DEFAULT_STATS_PATH is the path metrics are scraped from.
pub const DEFAULT_STATS_PATH: &str = "/metrics";

/// Database is implemented by every KubeDB database kind.
pub trait Database: Resource<DynamicType = (), Scope = NamespaceResourceScope> + Sized {
    /// Short code of the resource, as used by `kubectl get`.
    const RESOURCE_CODE: &'static str;
    /// Name of the main database container.
    const CONTAINER_NAME: &'static str;
    /// Aliases of the certificates issued when TLS is enabled.
    const CERT_ALIASES: &'static [CertificateAlias];

    /// Returns the configured auth secret.
    fn auth_secret(&self) -> Option<&SecretReference> {
        None
    }
    /// Returns the TLS configuration.
    fn tls(&self) -> Option<&TlsConfig> {
        None
    }
    /// Returns the pod template of the main workload.
    fn pod_template(&self) -> Option<&PodTemplateSpec> {
        None
    }
    /// Returns the service templates.
    fn service_templates(&self) -> &[NamedServiceTemplateSpec] {
        &[]
    }
    /// Returns the monitoring configuration.
    fn monitor(&self) -> Option<&AgentSpec> {
        None
    }

    /// Returns the singular resource name, e.g. "postgres".
    fn resource_singular() -> String {
        Self::kind(&()).to_lowercase()
    }
    /// Returns the plural resource name, e.g. "postgreses".
    fn resource_plural() -> String {
        Self::plural(&()).into_owned()
    }
    /// Returns the short name of the resource, e.g. "pg".
    fn resource_short_code() -> &'static str {
        Self::RESOURCE_CODE
    }
    /// Returns the fully qualified resource name, e.g. "postgreses.kubedb.com".
    fn resource_fqn() -> String {
        format!("{}.{}", Self::resource_plural(), GROUP)
    }
    /// Returns the AppBinding type of this kind, e.g. "kubedb.com/postgres".
    fn app_binding_type() -> String {
        format!("{}/{}", GROUP, Self::resource_singular())
    }

    /// Name all offshoots are derived from. This is always the object's name.
    fn offshoot_name(&self) -> String {
        self.meta().name.clone().unwrap_or_default()
    }
    /// Returns the object's namespace, or the empty string.
    fn namespace(&self) -> String {
        self.meta().namespace.clone().unwrap_or_default()
    }

    /// Returns the selectors matching every offshoot of this database.
    fn offshoot_selectors(&self) -> Labels {
        Labels::from([
            (meta::NAME_LABEL_KEY.to_string(), Self::resource_fqn()),
            (meta::INSTANCE_LABEL_KEY.to_string(), self.offshoot_name()),
            (meta::MANAGED_BY_LABEL_KEY.to_string(), GROUP.to_string()),
        ])
    }
    /// Returns [`Database::offshoot_selectors`] overwritten by `extra`.
    fn offshoot_selectors_with(&self, extra: &Labels) -> Labels {
        meta::overwrite_keys(self.offshoot_selectors(), [extra])
    }
    /// Returns the labels every offshoot carries.
    fn offshoot_labels(&self) -> Labels {
        offshoot_labels(self, self.offshoot_selectors(), None)
    }
    /// Returns the labels of the database pods.
    fn pod_labels(&self) -> Labels {
        self.pod_labels_with(&Labels::new())
    }
    /// Returns the labels of the database pods with `extra` selectors.
    fn pod_labels_with(&self, extra: &Labels) -> Labels {
        offshoot_labels(
            self,
            self.offshoot_selectors_with(extra),
            self.pod_template().map(|t| &t.metadata.labels),
        )
    }
    /// Returns the labels of the service named by `alias`.
    fn service_labels(&self, alias: ServiceAlias) -> Labels {
        self.service_labels_with(alias, &Labels::new())
    }
    /// Returns the labels of the service named by `alias` with `extra` selectors.
    fn service_labels_with(&self, alias: ServiceAlias, extra: &Labels) -> Labels {
        let template = types::get_service_template(self.service_templates(), alias);
        offshoot_labels(
            self,
            self.offshoot_selectors_with(extra),
            Some(&template.metadata.labels),
        )
    }

    /// Name of the primary service.
    fn service_name(&self) -> String {
        self.offshoot_name()
    }
    /// Name of the headless service giving pods stable DNS names.
    fn governing_service_name(&self) -> String {
        name_with_suffix(self.service_name(), "pods")
    }
    /// Name of the service routing to standby replicas.
    fn standby_service_name(&self) -> String {
        name_with_suffix(self.service_name(), ServiceAlias::Standby)
    }
    /// Name of the PetSet running the database.
    fn petset_name(&self) -> String {
        self.offshoot_name()
    }
    /// Name of the service account the pods run as.
    fn service_account_name(&self) -> String {
        self.offshoot_name()
    }
    /// Cluster DNS name of the primary service.
    fn service_dns(&self) -> String {
        format!("{}.{}.svc", self.service_name(), self.namespace())
    }
    /// Cluster DNS name of a pod behind the governing service.
    fn governing_service_dns(&self, pod: &str) -> String {
        format!("{pod}.{}.{}.svc", self.governing_service_name(), self.namespace())
    }
    /// Address of the `i`th pod of the PetSet.
    fn address(&self, i: i32, port: i32) -> String {
        let pod = format!("{}-{i}", self.petset_name());
        format!("{}:{port}", self.governing_service_dns(&pod))
    }

    /// Name of the Secret holding the admin credentials.
    fn auth_secret_name(&self) -> String {
        match self.auth_secret() {
            Some(s) if !s.name.is_empty() => s.name.clone(),
            _ => name_with_suffix(self.offshoot_name(), "auth"),
        }
    }
    /// Name of the Secret holding the rendered configuration.
    fn config_secret_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), "config")
    }
    /// Secrets that must survive a halt.
    fn persistent_secrets(&self) -> Vec<String> {
        self.auth_secret()
            .map(|_| vec![self.auth_secret_name()])
            .unwrap_or_default()
    }

    /// Name of the Certificate issued for `alias`.
    fn certificate_name(&self, alias: CertificateAlias) -> String {
        name_with_suffix(self.offshoot_name(), format!("{alias}-cert"))
    }
    /// Name of the Secret holding the certificate for `alias`.
    fn cert_secret_name(&self, alias: CertificateAlias) -> String {
        self.tls()
            .and_then(|t| tls::get_certificate_secret_name(&t.certificates, alias.as_ref()))
            .map(String::from)
            .unwrap_or_else(|| self.certificate_name(alias))
    }

    /// Name of the service exposing metrics.
    fn stats_service_name(&self) -> String {
        name_with_suffix(self.offshoot_name(), ServiceAlias::Stats)
    }
    /// Labels of the service exposing metrics.
    fn stats_service_labels(&self) -> Labels {
        self.service_labels_with(
            ServiceAlias::Stats,
            &Labels::from([(meta::LABEL_ROLE.to_string(), meta::ROLE_STATS.to_string())]),
        )
    }
    /// Name of the ServiceMonitor scraping the stats service.
    fn service_monitor_name(&self) -> String {
        self.stats_service_name()
    }

    /// Returns a controller reference to this object, if it has a name and UID.
    fn owner(&self) -> Option<OwnerReference> {
        let mut owner = self.controller_owner_ref(&())?;
        owner.block_owner_deletion = Some(true);
        Some(owner)
    }
}

fn offshoot_labels<D: Database>(db: &D, mut selector: Labels, over: Option<&Labels>) -> Labels {
    selector.insert(
        meta::COMPONENT_LABEL_KEY.to_string(),
        meta::COMPONENT_DATABASE.to_string(),
    );
    let own = db.meta().labels.clone().unwrap_or_default();
    meta::filter_keys(GROUP, selector, Some(&meta::overwrite_keys(own, over)))
}

/// Returns the name suffixed with the last six characters of the object's UID.
///
/// Used by kinds whose configuration Secret changes with each incarnation of the object.
pub fn uid_config_secret_name<D: Database>(db: &D) -> String {
    let uid = db.meta().uid.as_deref().unwrap_or_default();
    let tail = uid
        .char_indices()
        .rev()
        .nth(5)
        .map(|(i, _)| &uid[i..])
        .unwrap_or(uid);
    name_with_suffix(db.offshoot_name(), tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v1alpha2::{Postgres, Qdrant};

    fn postgres() -> Postgres {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "kubedb.com/v1alpha2",
            "kind": "Postgres",
            "metadata": {
                "name": "pg",
                "namespace": "demo",
                "uid": "7a3f2c9e-1111-2222-3333-abcdef123456",
                "labels": {"team": "db", "kubedb.com/role": "primary"},
            },
            "spec": {
                "version": "16.1",
                "authSecret": {"name": "pg-custom-auth"},
                "podTemplate": {"metadata": {"labels": {"tier": "gold"}}},
                "serviceTemplates": [
                    {"alias": "primary", "metadata": {"labels": {"exposed": "true"}}},
                ],
                "tls": {
                    "issuerRef": {"apiGroup": "cert-manager.io", "kind": "Issuer", "name": "ca"},
                    "certificates": [{"alias": "server", "secretName": "pg-tls"}],
                },
            },
        }))
        .unwrap()
    }

    #[test]
    fn names() {
        let pg = postgres();
        assert_eq!(pg.offshoot_name(), "pg");
        assert_eq!(Postgres::resource_fqn(), "postgreses.kubedb.com");
        assert_eq!(Postgres::resource_short_code(), "pg");
        assert_eq!(Postgres::app_binding_type(), "kubedb.com/postgres");
        assert_eq!(pg.governing_service_name(), "pg-pods");
        assert_eq!(pg.standby_service_name(), "pg-standby");
        assert_eq!(pg.stats_service_name(), "pg-stats");
        assert_eq!(pg.service_dns(), "pg.demo.svc");
        assert_eq!(pg.address(2, 5432), "pg-2.pg-pods.demo.svc:5432");
        assert_eq!(pg.auth_secret_name(), "pg-custom-auth");
        assert_eq!(pg.persistent_secrets(), ["pg-custom-auth"]);
        assert_eq!(pg.config_secret_name(), "pg-config");
        assert_eq!(pg.certificate_name(CertificateAlias::Client), "pg-client-cert");
        assert_eq!(pg.cert_secret_name(CertificateAlias::Server), "pg-tls");
        assert_eq!(pg.cert_secret_name(CertificateAlias::Client), "pg-client-cert");
    }

    #[test]
    fn default_auth_secret_name() {
        let mut pg = postgres();
        pg.spec.auth_secret = None;
        assert_eq!(pg.auth_secret_name(), "pg-auth");
        assert!(pg.persistent_secrets().is_empty());
    }

    #[test]
    fn labels() {
        let pg = postgres();
        let selectors = pg.offshoot_selectors();
        assert_eq!(selectors.len(), 3);
        assert_eq!(selectors[meta::NAME_LABEL_KEY], "postgreses.kubedb.com");
        assert_eq!(selectors[meta::INSTANCE_LABEL_KEY], "pg");
        assert_eq!(selectors[meta::MANAGED_BY_LABEL_KEY], "kubedb.com");

        let labels = pg.offshoot_labels();
        assert_eq!(labels[meta::COMPONENT_LABEL_KEY], "database");
        assert_eq!(labels["team"], "db");
        assert!(!labels.contains_key(meta::LABEL_ROLE));

        let pod = pg.pod_labels();
        assert_eq!(pod["tier"], "gold");
        assert_eq!(pod["team"], "db");

        let svc = pg.service_labels(ServiceAlias::Primary);
        assert_eq!(svc["exposed"], "true");
        assert!(!svc.contains_key("tier"));

        let stats = pg.stats_service_labels();
        assert_eq!(stats[meta::INSTANCE_LABEL_KEY], "pg");
        assert_eq!(stats[meta::LABEL_ROLE], meta::ROLE_STATS);
        assert!(!stats.contains_key("exposed"));
    }

    #[test]
    fn stats_role_selector() {
        let pg = postgres();
        let sel = pg.offshoot_selectors_with(&Labels::from([(
            meta::LABEL_ROLE.to_string(),
            meta::ROLE_STATS.to_string(),
        )]));
        assert_eq!(sel[meta::LABEL_ROLE], "stats");
    }

    #[test]
    fn owner_reference() {
        let pg = postgres();
        let owner = pg.owner().unwrap();
        assert_eq!(owner.kind, "Postgres");
        assert_eq!(owner.api_version, "kubedb.com/v1alpha2");
        assert_eq!(owner.name, "pg");
        assert_eq!(owner.controller, Some(true));
        assert_eq!(owner.block_owner_deletion, Some(true));
    }

    #[test]
    fn uid_secret_name() {
        let qd: Qdrant = serde_json::from_value(serde_json::json!({
            "apiVersion": "kubedb.com/v1alpha2",
            "kind": "Qdrant",
            "metadata": {"name": "qd", "uid": "7a3f2c9e-1111-2222-3333-abcdef123456"},
            "spec": {"version": "1.11.0"},
        }))
        .unwrap();
        assert_eq!(qd.config_secret_name(), "qd-123456");
    }
}
