//! Catalog holds the cluster-scoped version catalog (`catalog.kubedb.com/v1alpha1`).
//!
//! Every database names a catalog entry in `spec.version`; the entry supplies the images and the
//! user the database runs as. [`VersionSource`] abstracts where entries come from so defaulting
//! can run against a cluster or against manifests on disk.

use std::{collections::BTreeMap, fmt::Debug, future::Future};

use k8s_openapi::{
    ClusterResourceScope,
    apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition,
};
use kube::{Api, CustomResource, CustomResourceExt, Resource};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use validator::Validate;

use crate::{CATALOG_GROUP, Error, Result};

/// ImageSpec names a container image.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    /// Image reference.
    #[validate(length(min = 1))]
    pub image: String,
}

/// VersionSecurityContext is the identity a version's images run as.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VersionSecurityContext {
    /// User ID of the database process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_as_user: Option<i64>,
    /// Group ID of the database process. Defaults to the user ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_as_group: Option<i64>,
}

/// UpdateConstraints limits which versions an entry can be updated to.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConstraints {
    /// Versions, or version ranges, that may be updated to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowlist: Vec<String>,
    /// Versions, or version ranges, that must not be updated to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub denylist: Vec<String>,
}

/// CatalogVersion is implemented by every catalog kind.
pub trait CatalogVersion:
    Resource<DynamicType = (), Scope = ClusterResourceScope>
    + CustomResourceExt
    + Clone
    + Debug
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
    /// Version of the database software.
    fn db_version(&self) -> &str;
    /// Database image.
    fn db_image(&self) -> &str;
    /// Reports whether the entry should no longer be used for new databases.
    fn is_deprecated(&self) -> bool;
    /// User the database runs as.
    fn run_as_user(&self) -> Option<i64>;
    /// Group the database runs as, falling back to the user.
    fn run_as_group(&self) -> Option<i64>;
}

macro_rules! catalog_versions {
    ($($ty:ident, $spec:ident => $kind:tt, $plural:tt, $short:tt;)+) => {
        $(
            #[doc = concat!("Spec of a ", $kind, " catalog entry.")]
            #[derive(
                CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate,
                JsonSchema,
            )]
            #[kube(
                group = "catalog.kubedb.com",
                version = "v1alpha1",
                kind = $kind,
                plural = $plural,
                shortname = $short,
                derive = "PartialEq",
                category = "kubedb",
                category = "catalog",
                category = "appscode",
                printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
                printcolumn = r#"{"name":"DB_Image","type":"string","jsonPath":".spec.db.image"}"#,
                printcolumn = r#"{"name":"Deprecated","type":"boolean","jsonPath":".spec.deprecated"}"#,
                printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
            )]
            #[serde(rename_all = "camelCase")]
            pub struct $spec {
                /// Version of the database software.
                #[validate(length(min = 1))]
                pub version: String,
                /// Distribution, e.g. "Official" or "Percona".
                #[serde(skip_serializing_if = "Option::is_none")]
                pub distribution: Option<String>,
                /// Database image.
                #[serde(default)]
                #[validate(nested)]
                pub db: ImageSpec,
                /// Metrics exporter image.
                #[serde(skip_serializing_if = "Option::is_none")]
                pub exporter: Option<ImageSpec>,
                /// Init container image.
                #[serde(skip_serializing_if = "Option::is_none")]
                pub init_container: Option<ImageSpec>,
                /// Coordinator sidecar image.
                #[serde(skip_serializing_if = "Option::is_none")]
                pub coordinator: Option<ImageSpec>,
                /// Deprecated entries are rejected for new databases.
                #[serde(default, skip_serializing_if = "std::ops::Not::not")]
                pub deprecated: bool,
                /// Identity the images run as.
                #[serde(skip_serializing_if = "Option::is_none")]
                pub security_context: Option<VersionSecurityContext>,
                /// Constraints on version updates.
                #[serde(skip_serializing_if = "Option::is_none")]
                pub update_constraints: Option<UpdateConstraints>,
            }

            impl CatalogVersion for $ty {
                fn db_version(&self) -> &str {
                    &self.spec.version
                }
                fn db_image(&self) -> &str {
                    &self.spec.db.image
                }
                fn is_deprecated(&self) -> bool {
                    self.spec.deprecated
                }
                fn run_as_user(&self) -> Option<i64> {
                    self.spec.security_context.as_ref().and_then(|sc| sc.run_as_user)
                }
                fn run_as_group(&self) -> Option<i64> {
                    self.spec
                        .security_context
                        .as_ref()
                        .and_then(|sc| sc.run_as_group.or(sc.run_as_user))
                }
            }
        )+

        /// Returns the CRDs of every catalog kind.
        pub fn crds() -> Vec<CustomResourceDefinition> {
            vec![$($ty::crd()),+]
        }
    };
}

catalog_versions! {
    DruidVersion, DruidVersionSpec => "DruidVersion", "druidversions", "drversion";
    ElasticsearchVersion, ElasticsearchVersionSpec => "ElasticsearchVersion", "elasticsearchversions", "esversion";
    FerretDBVersion, FerretDBVersionSpec => "FerretDBVersion", "ferretdbversions", "frversion";
    HanaDBVersion, HanaDBVersionSpec => "HanaDBVersion", "hanadbversions", "hdbversion";
    HazelcastVersion, HazelcastVersionSpec => "HazelcastVersion", "hazelcastversions", "hzversion";
    IgniteVersion, IgniteVersionSpec => "IgniteVersion", "igniteversions", "igversion";
    KafkaVersion, KafkaVersionSpec => "KafkaVersion", "kafkaversions", "kfversion";
    MariaDBVersion, MariaDBVersionSpec => "MariaDBVersion", "mariadbversions", "mdversion";
    MongoDBVersion, MongoDBVersionSpec => "MongoDBVersion", "mongodbversions", "mgversion";
    MSSQLServerVersion, MSSQLServerVersionSpec => "MSSQLServerVersion", "mssqlserverversions", "msversion";
    MySQLVersion, MySQLVersionSpec => "MySQLVersion", "mysqlversions", "myversion";
    OracleVersion, OracleVersionSpec => "OracleVersion", "oracleversions", "oraversion";
    PerconaXtraDBVersion, PerconaXtraDBVersionSpec => "PerconaXtraDBVersion", "perconaxtradbversions", "pxversion";
    PgBouncerVersion, PgBouncerVersionSpec => "PgBouncerVersion", "pgbouncerversions", "pbversion";
    PgpoolVersion, PgpoolVersionSpec => "PgpoolVersion", "pgpoolversions", "ppversion";
    PostgresVersion, PostgresVersionSpec => "PostgresVersion", "postgresversions", "pgversion";
    ProxySQLVersion, ProxySQLVersionSpec => "ProxySQLVersion", "proxysqlversions", "prxversion";
    QdrantVersion, QdrantVersionSpec => "QdrantVersion", "qdrantversions", "qdversion";
    RabbitMQVersion, RabbitMQVersionSpec => "RabbitMQVersion", "rabbitmqversions", "rmversion";
    RedisVersion, RedisVersionSpec => "RedisVersion", "redisversions", "rdversion";
}

/// VersionSource looks up catalog entries by name.
pub trait VersionSource {
    /// Fetches the entry of kind `V` named `name`.
    fn get<V: CatalogVersion>(&self, name: &str) -> impl Future<Output = Result<V>> + Send;
}

impl VersionSource for kube::Client {
    fn get<V: CatalogVersion>(&self, name: &str) -> impl Future<Output = Result<V>> + Send {
        let api = Api::<V>::all(self.clone());
        let name = name.to_string();
        async move { Ok(api.get(&name).await?) }
    }
}

/// StaticCatalog is an in-memory catalog, typically loaded from manifests.
#[derive(Clone, Debug, Default)]
pub struct StaticCatalog {
    entries: BTreeMap<(String, String), serde_json::Value>,
}

impl StaticCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a typed entry.
    pub fn insert<V: CatalogVersion>(&mut self, version: &V) -> Result<()> {
        self.insert_value(serde_json::to_value(version)?)
    }

    /// Adds an untyped entry, keyed by its kind and name.
    ///
    /// Documents outside the catalog group are rejected.
    pub fn insert_value(&mut self, doc: serde_json::Value) -> Result<()> {
        let api_version = doc["apiVersion"].as_str().unwrap_or_default();
        let kind = doc["kind"].as_str().unwrap_or_default().to_string();
        if !api_version.starts_with(&format!("{CATALOG_GROUP}/")) {
            return Err(Error::UnknownKind(format!("{api_version} {kind}")));
        }
        let name = doc["metadata"]["name"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        self.entries.insert((kind, name), doc);
        Ok(())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl VersionSource for StaticCatalog {
    fn get<V: CatalogVersion>(&self, name: &str) -> impl Future<Output = Result<V>> + Send {
        let kind = V::kind(&()).into_owned();
        let res = match self.entries.get(&(kind.clone(), name.to_string())) {
            Some(doc) => serde_json::from_value(doc.clone()).map_err(Error::from),
            None => Err(Error::VersionNotFound {
                kind,
                name: name.to_string(),
            }),
        };
        std::future::ready(res)
    }
}
