//! Resources holds the default compute resources for database containers and the rule used to
//! merge them into user-provided requirements.

use std::{cmp::Ordering, collections::BTreeMap};

use k8s_openapi::{
    api::core::v1::ResourceRequirements, apimachinery::pkg::api::resource::Quantity,
};

use crate::quantity;

/// CPU is the resource name for CPU.
pub const CPU: &str = "cpu";
/// MEMORY is the resource name for memory.
pub const MEMORY: &str = "memory";

fn requirements(cpu: &str, memory: &str, memory_limit: &str) -> ResourceRequirements {
    ResourceRequirements {
        requests: Some(BTreeMap::from([
            (CPU.to_string(), Quantity(cpu.to_string())),
            (MEMORY.to_string(), Quantity(memory.to_string())),
        ])),
        limits: Some(BTreeMap::from([(
            MEMORY.to_string(),
            Quantity(memory_limit.to_string()),
        )])),
        ..Default::default()
    }
}

/// Default compute resources for a database container.
pub fn default_resources() -> ResourceRequirements {
    requirements(".500", "1024Mi", "1024Mi")
}

/// Default compute resources for init containers.
pub fn init_container_resources() -> ResourceRequirements {
    requirements(".200", "256Mi", "512Mi")
}

/// Default compute resources for sidecar coordinator containers.
pub fn coordinator_default_resources() -> ResourceRequirements {
    requirements(".200", "256Mi", "256Mi")
}

/// Default compute resources for memory hungry engines such as Elasticsearch.
pub fn memory_intensive_resources() -> ResourceRequirements {
    requirements(".500", "1.5Gi", "1.5Gi")
}

/// Default compute resources for SQL Server containers.
pub fn mssqlserver_default_resources() -> ResourceRequirements {
    requirements("500m", "1.5Gi", "4Gi")
}

/// Default compute resources for Druid middle managers.
pub fn druid_memory_intensive_resources() -> ResourceRequirements {
    requirements(".500", "2.5Gi", "2.5Gi")
}

/// Default compute resources for SAP HANA containers.
pub fn hanadb_default_resources() -> ResourceRequirements {
    requirements("1", "8Gi", "8Gi")
}

/// Default compute resources for the MongoDB 6+ containers.
pub fn mongodb_v6_default_resources() -> ResourceRequirements {
    requirements("800m", "1024Mi", "1024Mi")
}

/// Fills in missing requests and limits from `defaults`.
///
/// For every resource with a default limit the limit becomes the larger of the existing limit and
/// request, falling back to the default. Missing requests take the default, capped by an existing
/// limit.
pub fn set_default_resource_limits(req: &mut ResourceRequirements, defaults: &ResourceRequirements) {
    let limits = req.limits.get_or_insert_with(BTreeMap::new);
    let requests = req.requests.get_or_insert_with(BTreeMap::new);

    for (name, default) in defaults.limits.iter().flatten() {
        let limit = match (requests.get(name), limits.get(name)) {
            (Some(r), Some(l)) if quantity::compare(l, r) == Some(Ordering::Greater) => l.clone(),
            (Some(r), _) => r.clone(),
            (None, Some(l)) => l.clone(),
            (None, None) => default.clone(),
        };
        limits.insert(name.clone(), limit);
    }
    for (name, default) in defaults.requests.iter().flatten() {
        if requests.contains_key(name) {
            continue;
        }
        let request = match limits.get(name) {
            Some(l) if quantity::compare(l, default) == Some(Ordering::Less) => l.clone(),
            _ => default.clone(),
        };
        requests.insert(name.clone(), request);
    }
}

/// Returns true if neither requests nor limits are set.
pub fn is_empty(req: Option<&ResourceRequirements>) -> bool {
    req.is_none_or(|r| {
        r.requests.as_ref().is_none_or(BTreeMap::is_empty)
            && r.limits.as_ref().is_none_or(BTreeMap::is_empty)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(kv: &[(&str, &str)]) -> Option<BTreeMap<String, Quantity>> {
        Some(
            kv.iter()
                .map(|(k, v)| (k.to_string(), Quantity(v.to_string())))
                .collect(),
        )
    }

    #[test]
    fn empty_takes_defaults() {
        let mut req = ResourceRequirements::default();
        set_default_resource_limits(&mut req, &default_resources());
        assert_eq!(req, default_resources());
    }

    #[test]
    fn limit_raised_to_request() {
        let mut req = ResourceRequirements {
            requests: list(&[("memory", "2Gi")]),
            limits: list(&[("memory", "1Gi")]),
            ..Default::default()
        };
        set_default_resource_limits(&mut req, &default_resources());
        assert_eq!(req.limits, list(&[("memory", "2Gi")]));
        assert_eq!(req.requests, list(&[("cpu", ".500"), ("memory", "2Gi")]));
    }

    #[test]
    fn request_capped_by_limit() {
        let mut req = ResourceRequirements {
            limits: list(&[("memory", "512Mi")]),
            ..Default::default()
        };
        set_default_resource_limits(&mut req, &default_resources());
        assert_eq!(req.limits, list(&[("memory", "512Mi")]));
        assert_eq!(req.requests, list(&[("cpu", ".500"), ("memory", "512Mi")]));
    }

    #[test]
    fn larger_limit_kept() {
        let mut req = ResourceRequirements {
            requests: list(&[("memory", "1Gi")]),
            limits: list(&[("memory", "4Gi")]),
            ..Default::default()
        };
        set_default_resource_limits(&mut req, &default_resources());
        assert_eq!(req.limits, list(&[("memory", "4Gi")]));
    }

    #[test]
    fn emptiness() {
        assert!(is_empty(None));
        assert!(is_empty(Some(&ResourceRequirements::default())));
        assert!(!is_empty(Some(&default_resources())));
    }
}
