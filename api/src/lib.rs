#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]
//! Api contains the KubeDB custom resource types and the helpers used to derive the names,
//! labels and defaults of the objects a database owns.
//!
//! Every database kind lives in [`v1alpha2`], the version catalog those kinds are defaulted from
//! lives in [`catalog`].

use std::collections::BTreeMap;

pub mod catalog;
pub mod conditions;
pub mod database;
pub mod defaults;
pub mod health;
pub mod meta;
pub mod monitor;
pub mod offshoot;
pub mod quantity;
pub mod resources;
pub mod tls;
pub mod types;
pub mod v1alpha2;

pub use database::Database;
pub use defaults::{Defaults, apply_defaults};

/// GROUP is the kubernetes API group of the database kinds.
pub static GROUP: &str = "kubedb.com";

/// CATALOG_GROUP is the kubernetes API group of the version catalog kinds.
pub static CATALOG_GROUP: &str = "catalog.kubedb.com";

/// Labels is the map type used for labels, selectors and annotations.
pub type Labels = BTreeMap<String, String>;

/// Error enumerates the failures surfaced by this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Kube wraps a failed API call.
    #[error("kube error: {0}")]
    Kube(#[from] kube::Error),
    /// JSON wraps a (de)serialization failure.
    #[error("json error: {0}")]
    JSON(#[from] serde_json::Error),
    /// Validation reports spec fields rejected by their constraints.
    #[error("validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
    /// Quantity reports a resource quantity that could not be parsed.
    #[error("quantity error: {0}")]
    Quantity(#[from] quantity::ParseQuantityError),
    /// VersionNotFound is returned when the catalog has no entry for a version.
    #[error("{kind} {name:?} not found in catalog")]
    #[allow(missing_docs)]
    VersionNotFound { kind: String, name: String },
    /// UnknownKind is returned for objects that are not a known KubeDB kind.
    #[error("unknown kind: {0}")]
    UnknownKind(String),
}

/// Result typedef for the api crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    use kube::core::{CustomResourceExt, Resource};

    #[test]
    fn crd_names() {
        assert_eq!(v1alpha2::Postgres::crd_name(), "postgreses.kubedb.com");
        assert_eq!(v1alpha2::Redis::crd_name(), "redises.kubedb.com");
        assert_eq!(
            v1alpha2::Elasticsearch::crd_name(),
            "elasticsearches.kubedb.com"
        );
        assert_eq!(v1alpha2::MSSQLServer::kind(&()), "MSSQLServer");
        assert_eq!(
            catalog::PostgresVersion::crd_name(),
            "postgresversions.catalog.kubedb.com"
        );
    }

    #[test]
    fn crds_serialize() {
        for crd in v1alpha2::crds().into_iter().chain(catalog::crds()) {
            let doc = serde_json::to_value(&crd).unwrap();
            assert_eq!(doc["kind"], "CustomResourceDefinition");
        }
    }
}
