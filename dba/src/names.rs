//! `kubectl dba names` prints the names and labels the operator derives for each database.

use std::path::PathBuf;

use api::{Database, Labels, types::ServiceAlias};
use serde::{Serialize, de::DeserializeOwned};

use crate::{Document, Result, for_kind};

/// Options of the `names` command.
#[derive(Clone, Debug, PartialEq)]
pub struct Opts {
    /// Manifests to inspect.
    pub files: Vec<PathBuf>,
}

impl From<&clap::ArgMatches> for Opts {
    fn from(m: &clap::ArgMatches) -> Self {
        Self {
            files: m
                .get_many::<String>("files")
                .unwrap_or_default()
                .map(PathBuf::from)
                .collect(),
        }
    }
}

/// Offshoots is the report printed for one database.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Offshoots {
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub resource: String,
    pub short_code: &'static str,
    pub app_binding_type: String,
    pub service: String,
    pub governing_service: String,
    pub standby_service: String,
    pub stats_service: String,
    pub service_dns: String,
    pub petset: String,
    pub service_account: String,
    pub auth_secret: String,
    pub config_secret: String,
    pub persistent_secrets: Vec<String>,
    pub selectors: Labels,
    pub labels: Labels,
    pub pod_labels: Labels,
    pub primary_service_labels: Labels,
    pub stats_service_labels: Labels,
}

impl Offshoots {
    /// Builds the report for `db`.
    pub fn of<K: Database>(db: &K) -> Self {
        Self {
            kind: K::kind(&()).into_owned(),
            name: db.offshoot_name(),
            namespace: db.namespace(),
            resource: K::resource_fqn(),
            short_code: K::resource_short_code(),
            app_binding_type: K::app_binding_type(),
            service: db.service_name(),
            governing_service: db.governing_service_name(),
            standby_service: db.standby_service_name(),
            stats_service: db.stats_service_name(),
            service_dns: db.service_dns(),
            petset: db.petset_name(),
            service_account: db.service_account_name(),
            auth_secret: db.auth_secret_name(),
            config_secret: db.config_secret_name(),
            persistent_secrets: db.persistent_secrets(),
            selectors: db.offshoot_selectors(),
            labels: db.offshoot_labels(),
            pod_labels: db.pod_labels(),
            primary_service_labels: db.service_labels(ServiceAlias::Primary),
            stats_service_labels: db.stats_service_labels(),
        }
    }
}

/// Runs the `names` command, writing one report per database to stdout.
pub fn command(opts: Opts) -> Result<()> {
    let mut docs = Vec::new();
    for f in &opts.files {
        docs.extend(crate::read_documents(f)?);
    }
    crate::write_yaml(std::io::stdout().lock(), offshoots(&docs)?)
}

/// Builds the report of every database in `docs`, skipping other objects.
pub fn offshoots(docs: &[Document]) -> Result<Vec<Offshoots>> {
    docs.iter()
        .filter(|d| d.is_database())
        .map(|doc| {
            for_kind!(doc.kind(), K => report::<K>(doc)).map_err(|err| doc.error(err))
        })
        .collect()
}

fn report<K: Database + DeserializeOwned>(doc: &Document) -> Result<Offshoots> {
    let db: K = serde_json::from_value(doc.value.clone())?;
    Ok(Offshoots::of(&db))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_report() {
        let docs = crate::parse_documents(
            "pg.yaml",
            r#"
apiVersion: kubedb.com/v1alpha2
kind: Postgres
metadata:
  name: pg
  namespace: demo
  labels: {team: db, kubedb.com/ignored: "x"}
spec: {version: "16.1", authSecret: {name: pg-creds}}
---
apiVersion: v1
kind: Secret
metadata: {name: pg-creds}
"#,
        )
        .unwrap();
        let out = offshoots(&docs).unwrap();
        assert_eq!(out.len(), 1);
        let r = &out[0];
        assert_eq!(r.resource, "postgreses.kubedb.com");
        assert_eq!(r.short_code, "pg");
        assert_eq!(r.app_binding_type, "kubedb.com/postgres");
        assert_eq!(r.governing_service, "pg-pods");
        assert_eq!(r.stats_service, "pg-stats");
        assert_eq!(r.service_dns, "pg.demo.svc");
        assert_eq!(r.auth_secret, "pg-creds");
        assert_eq!(r.config_secret, "pg-config");
        assert_eq!(r.persistent_secrets, vec!["pg-creds"]);
        assert_eq!(r.labels["team"], "db");
        assert!(!r.labels.contains_key("kubedb.com/ignored"));
        assert_eq!(r.selectors["app.kubernetes.io/instance"], "pg");
    }
}
