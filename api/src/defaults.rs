//! Defaulting shared by every database kind.
//!
//! Each kind implements [`Defaults`] by filling its own literals and calling the helpers here for
//! the parts that depend on the version catalog: pod and container security contexts, compute
//! resources, and scheduling.

use k8s_openapi::{
    api::core::v1 as core, apimachinery::pkg::apis::meta::v1::LabelSelector,
};
use tracing::{debug, error};

use crate::{
    Labels,
    catalog::{CatalogVersion, VersionSource},
    database::Database,
    monitor::AgentSpec,
    offshoot::{self, PodTemplateSpec},
    resources,
    tls::{self, TlsConfig},
    types::DeletionPolicy,
};

/// LABEL_HOSTNAME is the node label used to spread pods across hosts.
pub const LABEL_HOSTNAME: &str = "kubernetes.io/hostname";
/// LABEL_ZONE is the node label used to spread pods across zones.
pub const LABEL_ZONE: &str = "topology.kubernetes.io/zone";

/// Defaults is implemented by every kind that can be defaulted from the version catalog.
pub trait Defaults: Database {
    /// Catalog entry describing the versions of this kind.
    type Version: CatalogVersion;

    /// Name of the catalog version this database runs.
    fn version_name(&self) -> &str;

    /// Checks the spec against its field constraints.
    fn validate_spec(&self) -> Result<(), validator::ValidationErrors>;

    /// Fills unset fields.
    ///
    /// Fields that depend on the catalog are only filled when `version` is provided, so a failed
    /// lookup leaves them untouched.
    fn set_defaults(&mut self, version: Option<&Self::Version>);

    /// Fills the health checker with this kind's check timings.
    fn set_health_checker_defaults(&mut self);

    /// Fills the Secret names of every certificate when TLS is enabled.
    fn set_tls_defaults(&mut self);
}

/// Looks up the catalog version of `db` and defaults it.
///
/// Lookup failures are logged and only the version-independent defaults are applied.
pub async fn apply_defaults<D, S>(db: &mut D, source: &S)
where
    D: Defaults,
    S: VersionSource,
{
    let kind = D::kind(&());
    let name = db.version_name().to_string();
    match source.get::<D::Version>(&name).await {
        Ok(version) => {
            debug!(%kind, name = db.offshoot_name(), version = %name, "defaulting");
            db.set_defaults(Some(&version));
        }
        Err(err) => {
            error!(
                %kind,
                name = db.offshoot_name(),
                version = %name,
                "can't get the version object: {err}"
            );
            db.set_defaults(None);
        }
    }
}

/// Fills the deletion policy, switching halted databases to [`DeletionPolicy::Halt`].
///
/// Returns false, leaving the policy untouched, when a halted database is protected by
/// [`DeletionPolicy::DoNotTerminate`]. Only Oracle halts this way; the other kinds just fill in
/// their default policy.
pub fn set_deletion_policy(
    name: &str,
    halted: bool,
    policy: &mut Option<DeletionPolicy>,
    default: DeletionPolicy,
) -> bool {
    if halted {
        if *policy == Some(DeletionPolicy::DoNotTerminate) {
            error!(name, "can't halt, since deletion policy is 'DoNotTerminate'");
            return false;
        }
        *policy = Some(DeletionPolicy::Halt);
    }
    policy.get_or_insert(default);
    true
}

/// Returns the RuntimeDefault seccomp profile.
pub fn default_seccomp_profile() -> core::SeccompProfile {
    core::SeccompProfile {
        type_: "RuntimeDefault".to_string(),
        ..Default::default()
    }
}

/// Fills the fields the "restricted" pod security standard requires.
pub fn set_restricted_security_context(sc: &mut core::SecurityContext) {
    sc.allow_privilege_escalation.get_or_insert(false);
    sc.capabilities.get_or_insert_with(|| core::Capabilities {
        drop: Some(vec!["ALL".to_string()]),
        ..Default::default()
    });
    sc.run_as_non_root.get_or_insert(true);
    sc.seccomp_profile.get_or_insert_with(default_seccomp_profile);
}

/// Fills a container security context, running as the user and group from `version`.
pub fn set_container_security_context<V: CatalogVersion>(
    sc: &mut Option<core::SecurityContext>,
    version: &V,
) {
    let sc = sc.get_or_insert_with(core::SecurityContext::default);
    if sc.run_as_user.is_none() {
        sc.run_as_user = version.run_as_user();
    }
    if sc.run_as_group.is_none() {
        sc.run_as_group = version.run_as_group();
    }
    set_restricted_security_context(sc);
}

/// Sets the pod's fsGroup to the user from `version`.
pub fn set_pod_security_context<V: CatalogVersion>(template: &mut PodTemplateSpec, version: &V) {
    let psc = template
        .spec
        .security_context
        .get_or_insert_with(core::PodSecurityContext::default);
    if psc.fs_group.is_none() {
        psc.fs_group = version.run_as_user();
    }
}

/// Defaults the pod security context and the security context of `container`, inserting the
/// container when the template does not mention it.
pub fn set_default_container_security_context<V: CatalogVersion>(
    template: &mut PodTemplateSpec,
    container: &str,
    version: &V,
) {
    set_pod_security_context(template, version);
    let c = offshoot::container_mut(&mut template.spec.containers, container);
    set_container_security_context(&mut c.security_context, version);
}

/// Like [`set_default_container_security_context`] for an init container.
pub fn set_default_init_container_security_context<V: CatalogVersion>(
    template: &mut PodTemplateSpec,
    container: &str,
    version: &V,
) {
    let c = offshoot::container_mut(&mut template.spec.init_containers, container);
    set_container_security_context(&mut c.security_context, version);
}

/// Merges `defaults` into the resources of `container`, inserting the container if missing.
pub fn set_default_container_resources(
    template: &mut PodTemplateSpec,
    container: &str,
    defaults: &core::ResourceRequirements,
) {
    let c = offshoot::container_mut(&mut template.spec.containers, container);
    resources::set_default_resource_limits(
        c.resources.get_or_insert_with(core::ResourceRequirements::default),
        defaults,
    );
}

/// Defaults the pod template of a database workload: the pod security context plus the security
/// context and resources of `container`.
pub fn set_default_pod_template<'a, V: CatalogVersion>(
    template: &'a mut Option<PodTemplateSpec>,
    container: &str,
    version: &V,
    defaults: &core::ResourceRequirements,
) -> &'a mut PodTemplateSpec {
    let template = template.get_or_insert_with(PodTemplateSpec::default);
    set_default_container_security_context(template, container, version);
    set_default_container_resources(template, container, defaults);
    template
}

/// Fills the exporter of an enabled monitoring agent with the identity from `version`.
pub fn set_monitor_defaults<V: CatalogVersion>(monitor: &mut Option<AgentSpec>, version: &V) {
    if let Some(agent) = monitor.as_mut() {
        agent.set_defaults(version.run_as_user(), version.run_as_group());
    }
}

/// Returns the default anti-affinity, preferring to spread pods matching `selector` across hosts
/// and then zones.
pub fn default_pod_anti_affinity(selector: &Labels, namespace: &str) -> core::Affinity {
    let term = |weight: i32, topology_key: &str| core::WeightedPodAffinityTerm {
        weight,
        pod_affinity_term: core::PodAffinityTerm {
            label_selector: Some(LabelSelector {
                match_labels: Some(selector.clone()),
                ..Default::default()
            }),
            namespaces: Some(vec![namespace.to_string()]),
            topology_key: topology_key.to_string(),
            ..Default::default()
        },
    };
    core::Affinity {
        pod_anti_affinity: Some(core::PodAntiAffinity {
            preferred_during_scheduling_ignored_during_execution: Some(vec![
                term(100, LABEL_HOSTNAME),
                term(50, LABEL_ZONE),
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Sets the default anti-affinity on `template` unless it already has an affinity.
pub fn set_default_affinity(template: &mut PodTemplateSpec, selector: &Labels, namespace: &str) {
    template
        .spec
        .affinity
        .get_or_insert_with(|| default_pod_anti_affinity(selector, namespace));
}

/// Returns the TLS config of `db` with a Secret name for every certificate alias, if TLS is
/// issued by cert-manager.
pub fn tls_with_secret_names<D: Database>(db: &D) -> Option<TlsConfig> {
    let mut tls = db.tls().filter(|t| t.has_issuer())?.clone();
    for alias in D::CERT_ALIASES {
        tls::set_missing_secret_name_for_certificate(
            &mut tls.certificates,
            alias.as_ref(),
            db.certificate_name(*alias),
        );
    }
    Some(tls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PostgresVersion, PostgresVersionSpec, VersionSecurityContext};

    fn version(user: i64, group: Option<i64>) -> PostgresVersion {
        PostgresVersion::new(
            "16.1",
            PostgresVersionSpec {
                version: "16.1".into(),
                security_context: Some(VersionSecurityContext {
                    run_as_user: Some(user),
                    run_as_group: group,
                }),
                ..Default::default()
            },
        )
    }

    #[test]
    fn container_security_context() {
        let mut template = PodTemplateSpec::default();
        set_default_container_security_context(&mut template, "postgres", &version(70, None));

        assert_eq!(
            template.spec.security_context.as_ref().and_then(|p| p.fs_group),
            Some(70)
        );
        let sc = template.spec.containers[0].security_context.clone().unwrap();
        assert_eq!(template.spec.containers[0].name, "postgres");
        assert_eq!(sc.run_as_user, Some(70));
        assert_eq!(sc.run_as_group, Some(70));
        assert_eq!(sc.run_as_non_root, Some(true));
        assert_eq!(sc.allow_privilege_escalation, Some(false));
        assert_eq!(
            sc.capabilities.and_then(|c| c.drop),
            Some(vec!["ALL".to_string()])
        );
        assert_eq!(sc.seccomp_profile, Some(default_seccomp_profile()));
    }

    #[test]
    fn user_settings_win() {
        let mut template = PodTemplateSpec::default();
        template.spec.containers.push(core::Container {
            name: "postgres".into(),
            security_context: Some(core::SecurityContext {
                run_as_user: Some(1000),
                allow_privilege_escalation: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        });
        set_default_container_security_context(&mut template, "postgres", &version(70, Some(71)));
        let sc = template.spec.containers[0].security_context.clone().unwrap();
        assert_eq!(sc.run_as_user, Some(1000));
        assert_eq!(sc.run_as_group, Some(71));
        assert_eq!(sc.allow_privilege_escalation, Some(true));
        assert_eq!(template.spec.containers.len(), 1);
    }

    #[test]
    fn anti_affinity() {
        let sel = Labels::from([("app.kubernetes.io/instance".to_string(), "pg".to_string())]);
        let mut template = PodTemplateSpec::default();
        set_default_affinity(&mut template, &sel, "demo");
        let terms = template
            .spec
            .affinity
            .and_then(|a| a.pod_anti_affinity)
            .and_then(|a| a.preferred_during_scheduling_ignored_during_execution)
            .unwrap();
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].weight, 100);
        assert_eq!(terms[0].pod_affinity_term.topology_key, LABEL_HOSTNAME);
        assert_eq!(terms[1].weight, 50);
        assert_eq!(terms[1].pod_affinity_term.topology_key, LABEL_ZONE);
    }

    #[test]
    fn halting() {
        let mut policy = None;
        assert!(set_deletion_policy("pg", false, &mut policy, DeletionPolicy::WipeOut));
        assert_eq!(policy, Some(DeletionPolicy::WipeOut));

        assert!(set_deletion_policy("pg", true, &mut policy, DeletionPolicy::Delete));
        assert_eq!(policy, Some(DeletionPolicy::Halt));

        let mut protected = Some(DeletionPolicy::DoNotTerminate);
        assert!(!set_deletion_policy("pg", true, &mut protected, DeletionPolicy::Delete));
        assert_eq!(protected, Some(DeletionPolicy::DoNotTerminate));
    }

    #[test]
    fn monitor_only_when_enabled() {
        let mut monitor = None;
        set_monitor_defaults(&mut monitor, &version(70, None));
        assert!(monitor.is_none());

        let mut monitor = Some(AgentSpec::default());
        set_monitor_defaults(&mut monitor, &version(70, None));
        let exporter = monitor.and_then(|m| m.prometheus).map(|p| p.exporter).unwrap();
        assert_eq!(exporter.security_context.and_then(|sc| sc.run_as_user), Some(70));
    }

    #[test]
    fn container_resources() {
        let mut template = PodTemplateSpec::default();
        set_default_container_resources(&mut template, "postgres", &resources::default_resources());
        assert_eq!(
            template.spec.containers[0].resources,
            Some(resources::default_resources())
        );
    }
}
