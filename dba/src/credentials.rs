//! `kubectl dba show-credentials` prints the admin credentials of a database in the cluster.

use std::fmt::Debug;

use api::Database;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{DATABASE_KINDS, Error, Result, for_kind};

/// Options of the `show-credentials` command.
#[derive(Clone, Debug, PartialEq)]
pub struct Opts {
    /// Kind, resource name or short name of the database, e.g. "pg".
    pub kind: String,
    /// Name of the database.
    pub name: String,
    /// Namespace of the database; the kubeconfig namespace when unset.
    pub namespace: Option<String>,
}

impl From<&clap::ArgMatches> for Opts {
    fn from(m: &clap::ArgMatches) -> Self {
        Self {
            kind: m.get_one::<String>("kind").cloned().unwrap_or_default(),
            name: m.get_one::<String>("name").cloned().unwrap_or_default(),
            namespace: m.get_one::<String>("namespace").cloned(),
        }
    }
}

/// Credentials read from an auth Secret.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Credentials {
    pub secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Credentials {
    /// Reads the `username` and `password` keys of `secret`.
    pub fn from_secret(secret: &Secret) -> Self {
        let field = |key: &str| {
            secret
                .data
                .as_ref()
                .and_then(|d| d.get(key))
                .map(|b| String::from_utf8_lossy(&b.0).into_owned())
                .or_else(|| secret.string_data.as_ref().and_then(|d| d.get(key)).cloned())
        };
        Self {
            secret: secret.metadata.name.clone().unwrap_or_default(),
            username: field("username"),
            password: field("password"),
        }
    }
}

/// Maps the kind, singular, plural, fully qualified or short name of a database resource to its
/// kind.
pub fn resolve_kind(arg: &str) -> Result<&'static str> {
    let lower = arg.to_lowercase();
    for kind in DATABASE_KINDS {
        if for_kind!(kind, K => Ok::<_, Error>(names_kind::<K>(&lower)))? {
            return Ok(kind);
        }
    }
    Err(api::Error::UnknownKind(arg.to_string()).into())
}

fn names_kind<K: Database>(arg: &str) -> bool {
    arg == K::resource_singular()
        || arg == K::resource_plural()
        || arg == K::resource_fqn()
        || arg == K::resource_short_code()
}

/// Runs the `show-credentials` command against the current cluster.
pub async fn command(opts: Opts) -> Result<()> {
    let kind = resolve_kind(&opts.kind)?;
    let client = Client::try_default().await?;
    let namespace = opts
        .namespace
        .unwrap_or_else(|| client.default_namespace().to_string());
    let secret_name =
        for_kind!(kind, K => auth_secret_name::<K>(&client, &namespace, &opts.name).await)?;
    let secrets: Api<Secret> = Api::namespaced(client, &namespace);
    let secret = secrets.get(&secret_name).await?;
    crate::write_yaml(std::io::stdout().lock(), [Credentials::from_secret(&secret)])
}

async fn auth_secret_name<K>(client: &Client, namespace: &str, name: &str) -> Result<String>
where
    K: Database + Clone + Debug + DeserializeOwned + Serialize,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    let db = api.get(name).await?;
    let secret = db.auth_secret_name();
    debug!(kind = %K::kind(&()), name, namespace, secret = %secret, "found auth secret");
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_aliases() {
        assert_eq!(resolve_kind("pg").unwrap(), "Postgres");
        assert_eq!(resolve_kind("Postgres").unwrap(), "Postgres");
        assert_eq!(resolve_kind("redises").unwrap(), "Redis");
        assert_eq!(resolve_kind("rds").unwrap(), "RedisSentinel");
        assert_eq!(resolve_kind("mongodbs.kubedb.com").unwrap(), "MongoDB");
        assert!(matches!(
            resolve_kind("memcached"),
            Err(Error::Api(api::Error::UnknownKind(k))) if k == "memcached"
        ));
    }

    #[test]
    fn reads_secret_data() {
        let secret: Secret = serde_json::from_value(json!({
            "metadata": {"name": "pg-auth"},
            "data": {"username": "cG9zdGdyZXM=", "password": "czNjcjN0"},
        }))
        .unwrap();
        assert_eq!(
            Credentials::from_secret(&secret),
            Credentials {
                secret: "pg-auth".into(),
                username: Some("postgres".into()),
                password: Some("s3cr3t".into()),
            }
        );

        let partial: Secret = serde_json::from_value(json!({
            "metadata": {"name": "rd-auth"},
            "stringData": {"password": "pw"},
        }))
        .unwrap();
        let creds = Credentials::from_secret(&partial);
        assert_eq!(creds.username, None);
        assert_eq!(creds.password.as_deref(), Some("pw"));
    }
}
