//! `kubectl dba default` validates manifests and fills in the defaults the operator would apply.

use std::path::PathBuf;

use api::{Defaults, apply_defaults, catalog::VersionSource};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{info, warn};

use crate::{Document, Result, for_kind};

/// Where catalog versions are looked up.
#[derive(Clone, Debug, PartialEq)]
pub enum CatalogSource {
    /// No catalog; only version-independent defaults are applied.
    None,
    /// Catalog entries read from a manifest.
    File(PathBuf),
    /// The catalog installed in the current cluster.
    Cluster,
}

/// Options of the `default` command.
#[derive(Clone, Debug, PartialEq)]
pub struct Opts {
    /// Manifests to default.
    pub files: Vec<PathBuf>,
    /// Where versions are looked up.
    pub catalog: CatalogSource,
    /// Print a JSON patch of the changes instead of the defaulted objects.
    pub diff: bool,
}

impl TryFrom<&clap::ArgMatches> for Opts {
    type Error = crate::Error;

    fn try_from(m: &clap::ArgMatches) -> Result<Self> {
        let catalog = if m.get_flag("cluster") {
            CatalogSource::Cluster
        } else if let Some(p) = m.get_one::<String>("catalog") {
            CatalogSource::File(p.into())
        } else {
            CatalogSource::None
        };
        Ok(Self {
            files: m
                .get_many::<String>("files")
                .unwrap_or_default()
                .map(PathBuf::from)
                .collect(),
            catalog,
            diff: m.get_flag("diff"),
        })
    }
}

/// Runs the `default` command, writing the result to stdout.
pub async fn command(opts: Opts) -> Result<()> {
    let mut docs = Vec::new();
    for f in &opts.files {
        docs.extend(crate::read_documents(f)?);
    }
    let out = match &opts.catalog {
        CatalogSource::None => {
            warn!("no catalog given, version-dependent defaults are skipped");
            default_documents(&docs, &api::catalog::StaticCatalog::new(), opts.diff).await?
        }
        CatalogSource::File(p) => {
            let catalog = crate::load_catalog(p)?;
            default_documents(&docs, &catalog, opts.diff).await?
        }
        CatalogSource::Cluster => {
            let client = kube::Client::try_default().await?;
            default_documents(&docs, &client, opts.diff).await?
        }
    };
    crate::write_yaml(std::io::stdout().lock(), out)
}

/// Defaults every database in `docs`, returning the defaulted objects or, with `diff`, the JSON
/// patches turning the input into them.
///
/// Objects outside the database group are passed through unchanged.
pub async fn default_documents<S: VersionSource>(
    docs: &[Document],
    source: &S,
    diff: bool,
) -> Result<Vec<Value>> {
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        if !doc.is_database() {
            info!(path = %doc.path, index = doc.index, kind = doc.kind(), "passing through");
            if !diff {
                out.push(doc.value.clone());
            }
            continue;
        }
        let (before, after) = for_kind!(doc.kind(), K => default_one::<K, S>(&doc.value, source).await)
            .map_err(|err| doc.error(err))?;
        if diff {
            out.push(serde_json::to_value(json_patch::diff(&before, &after))?);
        } else {
            out.push(after);
        }
    }
    Ok(out)
}

/// Defaults one document, returning the input and the defaulted object.
///
/// The defaulted fields are merged back onto the input, so fields the typed spec does not model
/// come out unchanged.
async fn default_one<K, S>(value: &Value, source: &S) -> Result<(Value, Value)>
where
    K: Defaults + DeserializeOwned + Serialize,
    S: VersionSource,
{
    let mut db: K = serde_json::from_value(value.clone())?;
    db.validate_spec().map_err(api::Error::from)?;
    apply_defaults(&mut db, source).await;
    let mut after = value.clone();
    json_patch::merge(&mut after, &serde_json::to_value(&db)?);
    Ok((value.clone(), after))
}
