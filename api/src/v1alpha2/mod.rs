//! V1alpha2 holds the `kubedb.com/v1alpha2` database kinds.
//!
//! Every kind implements [`Database`](crate::Database) for naming and labels and
//! [`Defaults`](crate::Defaults) for defaulting against its catalog entry.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResourceExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{conditions, types::DatabasePhase};

mod druid;
mod elasticsearch;
mod ferretdb;
mod hanadb;
mod hazelcast;
mod ignite;
mod kafka;
mod mariadb;
mod mongodb;
mod mssqlserver;
mod mysql;
mod oracle;
mod perconaxtradb;
mod pgbouncer;
mod pgpool;
mod postgres;
mod proxysql;
mod qdrant;
mod rabbitmq;
mod redis;
mod redis_sentinel;

pub use druid::*;
pub use elasticsearch::*;
pub use ferretdb::*;
pub use hanadb::*;
pub use hazelcast::*;
pub use ignite::*;
pub use kafka::*;
pub use mariadb::*;
pub use mongodb::*;
pub use mssqlserver::*;
pub use mysql::*;
pub use oracle::*;
pub use perconaxtradb::*;
pub use pgbouncer::*;
pub use pgpool::*;
pub use postgres::*;
pub use proxysql::*;
pub use qdrant::*;
pub use rabbitmq::*;
pub use redis::*;
pub use redis_sentinel::*;

/// DatabaseStatus is the observed state of a database.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStatus {
    /// Phase is the coarse state of the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<DatabasePhase>,
    /// ObservedGeneration is the most recent generation observed by the operator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Conditions reports k8s-style conditions for the database.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl DatabaseStatus {
    /// Reports whether the database is ready to serve.
    pub fn is_ready(&self) -> bool {
        self.phase == Some(DatabasePhase::Ready)
            && conditions::is_condition_true(&self.conditions, conditions::READY)
    }
}

/// Implements the [`Database`](crate::Database) accessors for specs with the common fields.
macro_rules! spec_accessors {
    () => {
        fn auth_secret(&self) -> Option<&$crate::types::SecretReference> {
            self.spec.auth_secret.as_ref()
        }
        fn tls(&self) -> Option<&$crate::tls::TlsConfig> {
            self.spec.tls.as_ref()
        }
        fn pod_template(&self) -> Option<&$crate::offshoot::PodTemplateSpec> {
            self.spec.pod_template.as_ref()
        }
        fn service_templates(&self) -> &[$crate::types::NamedServiceTemplateSpec] {
            &self.spec.service_templates
        }
        fn monitor(&self) -> Option<&$crate::monitor::AgentSpec> {
            self.spec.monitor.as_ref()
        }
    };
}

/// Implements the version and validation items of [`Defaults`](crate::Defaults).
macro_rules! spec_defaults {
    ($version:ty) => {
        type Version = $version;

        fn version_name(&self) -> &str {
            &self.spec.version
        }

        fn validate_spec(&self) -> Result<(), validator::ValidationErrors> {
            validator::Validate::validate(&self.spec)
        }
    };
}

pub(crate) use {spec_accessors, spec_defaults};

/// Returns the CRDs of every database kind.
pub fn crds() -> Vec<CustomResourceDefinition> {
    vec![
        Druid::crd(),
        Elasticsearch::crd(),
        FerretDB::crd(),
        HanaDB::crd(),
        Hazelcast::crd(),
        Ignite::crd(),
        Kafka::crd(),
        MariaDB::crd(),
        MongoDB::crd(),
        MSSQLServer::crd(),
        MySQL::crd(),
        Oracle::crd(),
        PerconaXtraDB::crd(),
        PgBouncer::crd(),
        Pgpool::crd(),
        Postgres::crd(),
        ProxySQL::crd(),
        Qdrant::crd(),
        RabbitMQ::crd(),
        Redis::crd(),
        RedisSentinel::crd(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_crd() {
        let crds = crds();
        assert_eq!(crds.len(), 21);
        for crd in &crds {
            assert_eq!(crd.spec.group, crate::GROUP);
            assert_eq!(crd.spec.scope, "Namespaced");
            let names = &crd.spec.names;
            assert!(
                names
                    .categories
                    .as_ref()
                    .is_some_and(|c| c.iter().any(|c| c == "kubedb")),
                "{} lacks the kubedb category",
                names.kind
            );
            assert_eq!(names.short_names.as_ref().map(Vec::len), Some(1));
        }
    }

    #[test]
    fn ready_status() {
        let mut status = DatabaseStatus {
            phase: Some(DatabasePhase::Ready),
            ..Default::default()
        };
        assert!(!status.is_ready());
        conditions::set_condition(
            &mut status.conditions,
            conditions::new_condition(conditions::READY, true, "DatabaseReady", "", Some(1)),
        );
        assert!(status.is_ready());
    }

    mod defaulting {
        use std::fmt::Debug;

        use kube::Resource;
        use serde::de::DeserializeOwned;
        use serde_json::{Value, json};
        use test_log::test;

        use super::super::*;
        use crate::{Defaults, apply_defaults, catalog::StaticCatalog};

        fn object<D: Resource<DynamicType = ()> + DeserializeOwned>(spec: Value) -> D {
            serde_json::from_value(json!({
                "apiVersion": D::api_version(&()),
                "kind": D::kind(&()),
                "metadata": {"name": "db", "namespace": "demo", "uid": "0123456789ab"},
                "spec": spec,
            }))
            .unwrap()
        }

        fn catalog<D: Defaults>(version: &str) -> StaticCatalog {
            let mut catalog = StaticCatalog::new();
            catalog
                .insert_value(json!({
                    "apiVersion": "catalog.kubedb.com/v1alpha1",
                    "kind": <D::Version as Resource>::kind(&()),
                    "metadata": {"name": version},
                    "spec": {
                        "version": version,
                        "db": {"image": format!("db:{version}")},
                        "securityContext": {"runAsUser": 1000},
                    },
                }))
                .unwrap();
            catalog
        }

        fn spec_of<D: Serialize>(db: &D) -> Value {
            serde_json::to_value(db).unwrap()["spec"].clone()
        }

        /// Checks the properties every kind's defaulting upholds. `policy` is the wire name of
        /// the deletion policy field and `storage` tells whether the kind has a storage type.
        async fn check<D>(spec: Value, policy: &str, storage: bool)
        where
            D: Defaults + CustomResourceExt + DeserializeOwned + Serialize + Clone + PartialEq + Debug,
        {
            let kind = D::kind(&()).into_owned();
            let version = spec["version"].as_str().unwrap().to_string();

            let crd = D::crd();
            let schema = crd.spec.versions[0].schema.as_ref().unwrap();
            let props = schema.open_api_v3_schema.as_ref().unwrap().properties.as_ref().unwrap();
            let spec_props = props["spec"].properties.as_ref().unwrap();
            assert!(spec_props.contains_key(policy), "{kind}: no {policy} in schema");

            let mut with_policy = spec.clone();
            with_policy[policy] = json!("WipeOut");
            let mut db: D = object(with_policy);
            apply_defaults(&mut db, &StaticCatalog::new()).await;
            assert_eq!(spec_of(&db)[policy], "WipeOut", "{kind}: policy lost");

            // Lookup failure applies only the version-independent defaults.
            let mut db: D = object(spec.clone());
            apply_defaults(&mut db, &StaticCatalog::new()).await;
            let defaulted = spec_of(&db);
            assert!(defaulted[policy].is_string(), "{kind}: no default policy");
            if storage {
                assert_eq!(defaulted["storageType"], "Durable", "{kind}: storage type");
            }
            assert!(defaulted["healthChecker"].is_null(), "{kind}: health checker set");

            let source = catalog::<D>(&version);
            let mut db: D = object(spec);
            apply_defaults(&mut db, &source).await;
            let health = &spec_of(&db)["healthChecker"];
            for field in ["periodSeconds", "timeoutSeconds", "failureThreshold"] {
                assert!(health[field].is_i64(), "{kind}: {field} unset");
            }
            let once = db.clone();
            apply_defaults(&mut db, &source).await;
            assert_eq!(db, once, "{kind}: defaulting is not idempotent");
        }

        macro_rules! kinds {
            ($($name:ident: $kind:ty, $policy:literal, $storage:literal, $spec:tt;)+) => {
                $(
                    #[test(tokio::test)]
                    async fn $name() {
                        check::<$kind>(json!($spec), $policy, $storage).await;
                    }
                )+
            };
        }

        kinds! {
            druid: Druid, "deletionPolicy", true, {"version": "28.0.1"};
            elasticsearch: Elasticsearch, "terminationPolicy", true, {"version": "xpack-8.11.1"};
            ferretdb: FerretDB, "deletionPolicy", true, {"version": "1.23.0"};
            hanadb: HanaDB, "deletionPolicy", true, {"version": "2.0.82"};
            hazelcast: Hazelcast, "deletionPolicy", true, {"version": "5.5.2"};
            ignite: Ignite, "deletionPolicy", true, {"version": "2.17.0"};
            kafka: Kafka, "terminationPolicy", true, {"version": "3.9.0"};
            mariadb: MariaDB, "terminationPolicy", true, {"version": "11.1.3"};
            mongodb: MongoDB, "terminationPolicy", true, {"version": "7.0.16"};
            mssqlserver: MSSQLServer, "deletionPolicy", true, {"version": "2022-cu12"};
            mysql: MySQL, "terminationPolicy", true, {"version": "8.4.3"};
            oracle: Oracle, "deletionPolicy", true, {"version": "21.3.0"};
            perconaxtradb: PerconaXtraDB, "terminationPolicy", true, {"version": "8.0.40"};
            pgbouncer: PgBouncer, "terminationPolicy", false, {"version": "1.18.0"};
            pgpool: Pgpool, "terminationPolicy", false, {"version": "4.5.0", "postgresRef": {"name": "pg"}};
            postgres: Postgres, "terminationPolicy", true, {"version": "16.1"};
            proxysql: ProxySQL, "terminationPolicy", false, {"version": "2.6.3-debian", "backend": {"name": "my"}};
            qdrant: Qdrant, "deletionPolicy", true, {"version": "1.11.0"};
            rabbitmq: RabbitMQ, "terminationPolicy", true, {"version": "3.13.2"};
            redis: Redis, "terminationPolicy", true, {"version": "7.2.4"};
            redis_sentinel: RedisSentinel, "terminationPolicy", true, {"version": "7.2.4"};
        }
    }
}
