use std::{path::Path, process};

use clap::{Arg, Command, ValueHint, crate_authors, crate_name, crate_version};
use xshell::{Shell, cmd};

use xtask::*;

fn main() {
    let cmd = Command::new(crate_name!())
        .author(crate_authors!())
        .version(crate_version!())
        .about("Task support for the KubeDB API crates")
        .subcommand_required(true)
        .subcommands(&[
            Command::new("manifests")
                .display_order(1)
                .about("generate CRD manifests for every database and catalog kind")
                .args(&[Arg::new("out_dir")
                    .long("out-dir")
                    .value_name("DIR")
                    .value_hint(ValueHint::DirPath)
                    .help("manifest output directory")
                    .default_value(CONFIG_DIR.as_os_str())]),
            Command::new("install")
                .display_order(2)
                .about("install CRDs into the current kubernetes cluster"),
            Command::new("uninstall")
                .display_order(2)
                .about("uninstall CRDs from the current kubernetes cluster"),
        ]);

    if let Err(e) = match cmd.get_matches().subcommand() {
        Some(("manifests", m)) => manifests::command(m.into()),
        Some(("install", _)) => shell().and_then(install),
        Some(("uninstall", _)) => shell().and_then(uninstall),
        Some((unknown, _)) => Err(format!("unknown subcommand: {unknown}").into()),
        None => Err("no subcommand provided".into()),
    } {
        eprintln!("{e}");
        process::exit(1);
    }
}

fn install(sh: Shell) -> Result<()> {
    let crds = generate(&sh)?;
    cmd!(sh, "kubectl apply --server-side --kustomize={crds}").run()?;
    Ok(())
}

fn uninstall(sh: Shell) -> Result<()> {
    let crds = generate(&sh)?;
    cmd!(sh, "kubectl delete --ignore-not-found --kustomize={crds}").run()?;
    Ok(())
}

fn generate(sh: &Shell) -> Result<std::path::PathBuf> {
    let cargo = std::env::var_os("CARGO").ok_or("CARGO unset; run via `cargo xtask`")?;
    let cargo: &Path = Path::new(&cargo);
    cmd!(sh, "{cargo} xtask manifests").run()?;
    check::kubectl(sh)?;
    Ok(CONFIG_DIR.join("crd"))
}
