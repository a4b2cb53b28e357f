//! Dba implements the `kubectl dba` plugin: offline defaulting, naming and CRD output for KubeDB
//! manifests.

use std::{
    fs,
    io::{self, Read},
    path::Path,
};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

pub mod credentials;
pub mod crds;
pub mod default;
pub mod names;

/// Error enumerates the failures of the plugin.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("tracing_subscriber error: {0}")]
    TracingConfig(#[from] tracing_subscriber::filter::ParseError),
    #[error("tracing error: {0}")]
    Tracing(#[from] tracing::subscriber::SetGlobalDefaultError),
    #[error(transparent)]
    Api(#[from] api::Error),
    #[error("kube error: {0}")]
    Kube(#[from] kube::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    JSON(#[from] serde_json::Error),
    #[error("yaml error: {0}")]
    YAML(#[from] serde_yaml::Error),
    #[error("{path}: document {index}: {source}")]
    Document {
        path: String,
        index: usize,
        #[source]
        source: Box<Error>,
    },
}

/// Result typedef for the plugin.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Document is one object read from a manifest.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// File the object was read from, "-" for stdin.
    pub path: String,
    /// Position of the object in the file.
    pub index: usize,
    /// The object.
    pub value: Value,
}

impl Document {
    /// Kind of the object.
    pub fn kind(&self) -> &str {
        self.value["kind"].as_str().unwrap_or_default()
    }

    /// API version of the object.
    pub fn api_version(&self) -> &str {
        self.value["apiVersion"].as_str().unwrap_or_default()
    }

    /// Reports whether the object belongs to the database API group.
    pub fn is_database(&self) -> bool {
        self.api_version()
            .split_once('/')
            .is_some_and(|(group, _)| group == api::GROUP)
    }

    /// Reports whether the object belongs to the version catalog API group.
    pub fn is_catalog(&self) -> bool {
        self.api_version()
            .split_once('/')
            .is_some_and(|(group, _)| group == api::CATALOG_GROUP)
    }

    /// Attaches the position of this document to `err`.
    pub fn error(&self, err: impl Into<Error>) -> Error {
        Error::Document {
            path: self.path.clone(),
            index: self.index,
            source: Box::new(err.into()),
        }
    }
}

/// Reads every object in the YAML stream at `path`, "-" meaning stdin.
///
/// Empty documents are dropped and `List` objects are flattened into their items.
pub fn read_documents<P: AsRef<Path>>(path: P) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let src = if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(path)?
    };
    parse_documents(&path.to_string_lossy(), &src)
}

/// Parses every object in the YAML stream `src`.
pub fn parse_documents(path: &str, src: &str) -> Result<Vec<Document>> {
    let mut out = Vec::new();
    for de in serde_yaml::Deserializer::from_str(src) {
        let value = Value::deserialize(de)?;
        match value {
            Value::Null => continue,
            Value::Object(ref obj) if obj.get("kind").and_then(Value::as_str) == Some("List") => {
                let items = obj.get("items").and_then(Value::as_array);
                out.extend(items.into_iter().flatten().cloned());
            }
            v => out.push(v),
        }
    }
    debug!(path, count = out.len(), "read manifest");
    Ok(out
        .into_iter()
        .enumerate()
        .map(|(index, value)| Document {
            path: path.to_string(),
            index,
            value,
        })
        .collect())
}

/// Loads catalog entries from the YAML stream at `path` into a [`api::catalog::StaticCatalog`].
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<api::catalog::StaticCatalog> {
    let mut catalog = api::catalog::StaticCatalog::new();
    for doc in read_documents(path)? {
        if !doc.is_catalog() {
            warn!(
                path = %doc.path,
                index = doc.index,
                kind = doc.kind(),
                "skipping object outside the catalog group"
            );
            continue;
        }
        catalog
            .insert_value(doc.value.clone())
            .map_err(|err| doc.error(err))?;
    }
    debug!(entries = catalog.len(), "loaded catalog");
    Ok(catalog)
}

/// Writes `values` to `w` as a YAML stream.
pub fn write_yaml<W, I, T>(mut w: W, values: I) -> Result<()>
where
    W: io::Write,
    I: IntoIterator<Item = T>,
    T: serde::Serialize,
{
    for v in values {
        writeln!(w, "---")?;
        serde_yaml::to_writer(&mut w, &v)?;
    }
    Ok(())
}

/// Kinds of every database resource.
pub const DATABASE_KINDS: [&str; 21] = [
    "Druid",
    "Elasticsearch",
    "FerretDB",
    "HanaDB",
    "Hazelcast",
    "Ignite",
    "Kafka",
    "MariaDB",
    "MongoDB",
    "MSSQLServer",
    "MySQL",
    "Oracle",
    "PerconaXtraDB",
    "PgBouncer",
    "Pgpool",
    "Postgres",
    "ProxySQL",
    "Qdrant",
    "RabbitMQ",
    "Redis",
    "RedisSentinel",
];

/// Expands `$body` once per database kind, with `$ty` bound to the kind's type.
///
/// Unknown kinds evaluate to an [`api::Error::UnknownKind`] error.
#[macro_export]
macro_rules! for_kind {
    ($kind:expr, $ty:ident => $body:expr) => {
        $crate::for_kind!(@arms $kind, $ty, $body;
            Druid, Elasticsearch, FerretDB, HanaDB, Hazelcast, Ignite, Kafka, MariaDB, MongoDB,
            MSSQLServer, MySQL, Oracle, PerconaXtraDB, PgBouncer, Pgpool, Postgres, ProxySQL,
            Qdrant, RabbitMQ, Redis, RedisSentinel)
    };
    (@arms $kind:expr, $ty:ident, $body:expr; $($k:ident),+) => {
        match $kind {
            $(
                stringify!($k) => {
                    type $ty = ::api::v1alpha2::$k;
                    $body
                }
            )+
            other => Err($crate::Error::from(::api::Error::UnknownKind(other.to_string()))),
        }
    };
}
