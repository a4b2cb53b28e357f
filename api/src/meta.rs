//! Meta holds the naming and label-map helpers shared by every database kind.

use crate::Labels;

/// NAME_LABEL_KEY is the well-known label naming the application.
pub const NAME_LABEL_KEY: &str = "app.kubernetes.io/name";
/// INSTANCE_LABEL_KEY is the well-known label naming the application instance.
pub const INSTANCE_LABEL_KEY: &str = "app.kubernetes.io/instance";
/// MANAGED_BY_LABEL_KEY is the well-known label naming the managing tool.
pub const MANAGED_BY_LABEL_KEY: &str = "app.kubernetes.io/managed-by";
/// COMPONENT_LABEL_KEY is the well-known label naming the component within the application.
pub const COMPONENT_LABEL_KEY: &str = "app.kubernetes.io/component";

/// COMPONENT_DATABASE is the component label value for database offshoots.
pub const COMPONENT_DATABASE: &str = "database";
/// LABEL_ROLE is the label recording the role of a pod or service.
pub const LABEL_ROLE: &str = "kubedb.com/role";
/// ROLE_STATS is the [`LABEL_ROLE`] value of a stats service.
pub const ROLE_STATS: &str = "stats";
/// LABEL_PETSET is the label naming the PetSet a pod belongs to.
pub const LABEL_PETSET: &str = "kubedb.com/petset";

/// Joins `name` and `suffix` with a dash.
pub fn name_with_suffix<N: AsRef<str>, S: AsRef<str>>(name: N, suffix: S) -> String {
    format!("{}-{}", name.as_ref(), suffix.as_ref())
}

/// Joins `prefix` and `name` with a dash.
pub fn name_with_prefix<P: AsRef<str>, N: AsRef<str>>(prefix: P, name: N) -> String {
    format!("{}-{}", prefix.as_ref(), name.as_ref())
}

/// Copies every entry of `inputs`, in order, over `out`.
///
/// Later maps win over earlier ones.
pub fn overwrite_keys<'a, I>(mut out: Labels, inputs: I) -> Labels
where
    I: IntoIterator<Item = &'a Labels>,
{
    for input in inputs {
        out.extend(input.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    out
}

/// Copies the entries of `input` over `out`, dropping every key that lives under
/// `domain` or one of its subdomains.
///
/// Keys without a domain prefix are always kept.
pub fn filter_keys(domain: &str, mut out: Labels, input: Option<&Labels>) -> Labels {
    let Some(input) = input else {
        return out;
    };
    out.extend(
        input
            .iter()
            .filter(|(k, _)| !in_domain(domain, k))
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    out
}

fn in_domain(domain: &str, key: &str) -> bool {
    let Some((prefix, _)) = key.split_once('/') else {
        return false;
    };
    prefix == domain
        || prefix
            .strip_suffix(domain)
            .is_some_and(|sub| sub.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(kv: &[(&str, &str)]) -> Labels {
        kv.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn names() {
        assert_eq!(name_with_suffix("pg", "pods"), "pg-pods");
        assert_eq!(name_with_prefix("pg", "standby"), "pg-standby");
        assert_eq!(name_with_prefix("standby", "pg"), "standby-pg");
    }

    #[test]
    fn overwrite() {
        let out = overwrite_keys(
            labels(&[("a", "1"), ("b", "1")]),
            [&labels(&[("b", "2")]), &labels(&[("b", "3"), ("c", "3")])],
        );
        assert_eq!(out, labels(&[("a", "1"), ("b", "3"), ("c", "3")]));
    }

    #[test]
    fn filter() {
        let input = labels(&[
            ("team", "db"),
            ("kubedb.com/role", "primary"),
            ("ops.kubedb.com/paused", "true"),
            ("notkubedb.com/keep", "yes"),
            ("app.kubernetes.io/name", "override"),
        ]);
        let out = filter_keys(
            "kubedb.com",
            labels(&[("app.kubernetes.io/name", "postgreses.kubedb.com")]),
            Some(&input),
        );
        assert_eq!(
            out,
            labels(&[
                ("app.kubernetes.io/name", "override"),
                ("notkubedb.com/keep", "yes"),
                ("team", "db"),
            ])
        );
        assert_eq!(filter_keys("kubedb.com", Labels::new(), None), Labels::new());
    }
}
