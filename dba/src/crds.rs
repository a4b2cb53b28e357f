//! `kubectl dba crds` prints the CustomResourceDefinitions of every database and catalog kind.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;

use crate::Result;

/// Returns the database CRDs followed by the catalog CRDs.
pub fn all() -> Vec<CustomResourceDefinition> {
    api::v1alpha2::crds()
        .into_iter()
        .chain(api::catalog::crds())
        .collect()
}

/// Runs the `crds` command, writing the CRDs to stdout.
pub fn command() -> Result<()> {
    crate::write_yaml(std::io::stdout().lock(), all())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_and_catalog_groups() {
        let crds = all();
        let (db, catalog): (Vec<_>, Vec<_>) =
            crds.iter().partition(|c| c.spec.group == api::GROUP);
        assert_eq!(db.len(), 21);
        assert_eq!(catalog.len(), 20);
        assert!(catalog.iter().all(|c| c.spec.group == api::CATALOG_GROUP));
        assert!(
            crds.iter()
                .any(|c| c.metadata.name.as_deref() == Some("redissentinels.kubedb.com"))
        );
    }
}
