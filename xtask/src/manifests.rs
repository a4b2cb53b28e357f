use std::{fs::File, path::Path};

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;

use crate::{Result, rel};

pub fn command(opts: ManifestsOpts) -> Result<()> {
    let out = opts.out_dir.join("crd");
    let out = out.as_path();
    std::fs::create_dir_all(out)?;
    eprintln!("# writing to dir: {}", rel(out));
    let mut resources = Vec::new();
    for crd in api::v1alpha2::crds().iter().chain(api::catalog::crds().iter()) {
        resources.push(write_crd(crd, out)?);
    }
    let kustomization = serde_json::json!({
        "apiVersion": "kustomize.config.k8s.io/v1beta1",
        "kind": "Kustomization",
        "resources": resources,
    });
    serde_yaml::to_writer(File::create(out.join("kustomization.yaml"))?, &kustomization)?;
    eprintln!("# wrote: kustomization.yaml");
    Ok(())
}

fn write_crd<P: AsRef<Path>>(crd: &CustomResourceDefinition, out_dir: P) -> Result<String> {
    let name = crd.metadata.name.as_deref().ok_or("CRD without a name")?;
    let file = format!("{name}.yaml");
    let w = File::create(out_dir.as_ref().join(&file))?;
    serde_yaml::to_writer(&w, &serde_json::to_value(crd)?)?;
    eprintln!("# wrote: {file}");
    Ok(file)
}

pub struct ManifestsOpts {
    out_dir: std::path::PathBuf,
}

impl From<&clap::ArgMatches> for ManifestsOpts {
    fn from(m: &clap::ArgMatches) -> Self {
        let mut out_dir = m
            .get_one::<String>("out_dir")
            .map(std::path::PathBuf::from)
            .unwrap_or_else(|| crate::CONFIG_DIR.clone());
        if !out_dir.is_absolute() {
            out_dir = crate::WORKSPACE.join(out_dir);
        }
        Self { out_dir }
    }
}
