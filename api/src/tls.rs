//! TLS configuration shared by every kind that can serve encrypted connections.

use k8s_openapi::api::core::v1 as core;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// TlsConfig configures the certificates issued for a database.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// IssuerRef is a reference to an Issuer or ClusterIssuer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_ref: Option<core::TypedLocalObjectReference>,
    /// Certificates provides per-alias overrides.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<CertificateSpec>,
}

/// CertificateSpec customizes one certificate.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSpec {
    /// Alias is the role of the certificate, such as "server" or "client".
    pub alias: String,
    /// SecretName is the name of the Secret the certificate is stored in.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_name: String,
    /// Subject fields of the certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<X509Subject>,
    /// Requested validity, in Go duration syntax.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// How long before expiry to renew, in Go duration syntax.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renew_before: Option<String>,
    /// DNS subject alternative names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,
    /// IP subject alternative names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<String>,
    /// URI subject alternative names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uris: Vec<String>,
    /// Email subject alternative names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_addresses: Vec<String>,
}

/// X509Subject holds the distinguished name fields of a certificate subject.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct X509Subject {
    /// Organizations (O).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub organizations: Vec<String>,
    /// Countries (C).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub countries: Vec<String>,
    /// Organizational units (OU).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub organizational_units: Vec<String>,
    /// Localities (L).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub localities: Vec<String>,
    /// Provinces (ST).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provinces: Vec<String>,
}

/// CertificateAlias names the role a certificate is issued for.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::AsRefStr, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum CertificateAlias {
    /// Certificate authority.
    Ca,
    /// Serving certificate of the database.
    Server,
    /// Client certificate used by the operator and tools.
    Client,
    /// Certificate of the node-to-node transport layer.
    Transport,
    /// Certificate of the HTTP layer.
    Http,
    /// Certificate of an administrative user.
    Admin,
    /// Certificate used by the backup archiver.
    Archiver,
    /// Certificate of the metrics exporter sidecar.
    MetricsExporter,
    /// Certificate of database mirroring endpoints.
    Endpoint,
    /// Certificate of a routing proxy.
    Router,
}

impl TlsConfig {
    /// Reports whether certificates will be issued.
    pub fn has_issuer(&self) -> bool {
        self.issuer_ref.is_some()
    }
}

/// Returns the certificate spec for `alias`.
pub fn get_certificate<'a>(certs: &'a [CertificateSpec], alias: &str) -> Option<&'a CertificateSpec> {
    certs.iter().find(|c| c.alias == alias)
}

/// Returns the secret name configured for `alias`, if non-empty.
pub fn get_certificate_secret_name<'a>(certs: &'a [CertificateSpec], alias: &str) -> Option<&'a str> {
    get_certificate(certs, alias)
        .map(|c| c.secret_name.as_str())
        .filter(|s| !s.is_empty())
}

/// Records `secret_name` for `alias` unless one is already set.
///
/// A spec for `alias` is appended if there is none.
pub fn set_missing_secret_name_for_certificate(
    certs: &mut Vec<CertificateSpec>,
    alias: &str,
    secret_name: String,
) {
    match certs.iter_mut().find(|c| c.alias == alias) {
        Some(c) if c.secret_name.is_empty() => c.secret_name = secret_name,
        Some(_) => {}
        None => certs.push(CertificateSpec {
            alias: alias.to_string(),
            secret_name,
            ..Default::default()
        }),
    }
}

/// Organization written into certificate subjects unless the user set one.
pub const KUBEDB_ORGANIZATION: &str = "kubedb";

/// Fills the subject of the certificate for `alias` with `organization` and an organizational
/// unit named after the alias, appending a spec for `alias` if there is none.
///
/// Subject fields the user already set are kept.
pub fn set_missing_subject(certs: &mut Vec<CertificateSpec>, alias: &str, organization: &str) {
    if get_certificate(certs, alias).is_none() {
        certs.push(CertificateSpec {
            alias: alias.to_string(),
            ..Default::default()
        });
    }
    let Some(cert) = certs.iter_mut().find(|c| c.alias == alias) else {
        return;
    };
    let subject = cert.subject.get_or_insert_with(X509Subject::default);
    if subject.organizations.is_empty() {
        subject.organizations = vec![organization.to_string()];
    }
    if subject.organizational_units.is_empty() {
        subject.organizational_units = vec![alias.to_string()];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_strings() {
        assert_eq!(CertificateAlias::MetricsExporter.as_ref(), "metrics-exporter");
        assert_eq!("ca".parse::<CertificateAlias>(), Ok(CertificateAlias::Ca));
    }

    #[test]
    fn missing_secret_names() {
        let mut certs = vec![
            CertificateSpec {
                alias: "server".into(),
                secret_name: "custom".into(),
                ..Default::default()
            },
            CertificateSpec {
                alias: "client".into(),
                dns_names: vec!["db.example".into()],
                ..Default::default()
            },
        ];
        set_missing_secret_name_for_certificate(&mut certs, "server", "pg-server-cert".into());
        set_missing_secret_name_for_certificate(&mut certs, "client", "pg-client-cert".into());
        set_missing_secret_name_for_certificate(&mut certs, "archiver", "pg-archiver-cert".into());

        assert_eq!(get_certificate_secret_name(&certs, "server"), Some("custom"));
        assert_eq!(get_certificate_secret_name(&certs, "client"), Some("pg-client-cert"));
        assert_eq!(
            get_certificate(&certs, "client").map(|c| c.dns_names.len()),
            Some(1)
        );
        assert_eq!(get_certificate_secret_name(&certs, "archiver"), Some("pg-archiver-cert"));
        assert_eq!(get_certificate_secret_name(&certs, "metrics-exporter"), None);
    }

    #[test]
    fn missing_subjects() {
        let mut certs = vec![CertificateSpec {
            alias: "server".into(),
            subject: Some(X509Subject {
                organizations: vec!["acme".into()],
                ..Default::default()
            }),
            ..Default::default()
        }];
        set_missing_subject(&mut certs, "server", KUBEDB_ORGANIZATION);
        set_missing_subject(&mut certs, "client", KUBEDB_ORGANIZATION);

        let server = get_certificate(&certs, "server").and_then(|c| c.subject.clone()).unwrap();
        assert_eq!(server.organizations, vec!["acme"]);
        assert_eq!(server.organizational_units, vec!["server"]);
        let client = get_certificate(&certs, "client").and_then(|c| c.subject.clone()).unwrap();
        assert_eq!(client.organizations, vec!["kubedb"]);
        assert!(get_certificate_secret_name(&certs, "client").is_none());
    }
}
