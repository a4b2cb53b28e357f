use is_terminal::IsTerminal;

use dba::*;

fn main() {
    use clap::{
        Arg, ArgAction, Command, ValueHint, crate_authors, crate_description, crate_version,
    };
    use std::process;

    let files = Arg::new("files")
        .value_name("FILE")
        .help("manifest to read, \"-\" for stdin")
        .value_hint(ValueHint::FilePath)
        .action(ArgAction::Append)
        .default_value("-");
    let cmd = Command::new("kubectl-dba")
        .version(crate_version!())
        .author(crate_authors!())
        .about(crate_description!())
        .subcommand_required(true)
        .subcommands([
            Command::new("default")
                .about("validate manifests and print them with defaults applied")
                .args([
                    files.clone(),
                    Arg::new("catalog")
                        .long("catalog")
                        .value_name("FILE")
                        .env("KUBEDB_CATALOG")
                        .help("manifest holding the catalog versions to default from")
                        .value_hint(ValueHint::FilePath)
                        .conflicts_with("cluster"),
                    Arg::new("cluster")
                        .long("cluster")
                        .help("look up catalog versions in the current cluster")
                        .action(ArgAction::SetTrue),
                    Arg::new("diff")
                        .long("diff")
                        .help("print a JSON patch of the changes instead of the objects")
                        .action(ArgAction::SetTrue),
                ]),
            Command::new("names")
                .about("print the names and labels derived for each database")
                .args([files]),
            Command::new("crds").about("print the CRDs of every database and catalog kind"),
            Command::new("show-credentials")
                .about("print the admin credentials of a database in the cluster")
                .args([
                    Arg::new("kind")
                        .value_name("KIND")
                        .help("database kind, resource or short name, e.g. \"pg\"")
                        .required(true),
                    Arg::new("name")
                        .value_name("NAME")
                        .help("name of the database")
                        .required(true),
                    Arg::new("namespace")
                        .long("namespace")
                        .short('n')
                        .value_name("NAMESPACE")
                        .help("namespace of the database, the kubeconfig namespace if unset"),
                ]),
        ]);

    if let Err(e) = match cmd.get_matches().subcommand() {
        Some(("default", m)) => {
            default::Opts::try_from(m).and_then(|opts| block_on(default::command(opts)))
        }
        Some(("names", m)) => setup_tracing().and_then(|_| names::command(m.into())),
        Some(("crds", _)) => setup_tracing().and_then(|_| crds::command()),
        Some(("show-credentials", m)) => block_on(credentials::command(m.into())),
        _ => unreachable!(),
    } {
        eprintln!("{e}");
        process::exit(1);
    }
}

fn block_on<F: std::future::Future<Output = Result<()>>>(fut: F) -> Result<()> {
    use tokio::runtime;

    setup_tracing()?;
    let rt = runtime::Builder::new_current_thread().enable_all().build()?;
    rt.block_on(fut)
}

// Output goes to stdout, so logs go to stderr.
fn setup_tracing() -> Result<()> {
    use tracing_subscriber::{filter::EnvFilter, prelude::*};

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    let terminal = std::io::stderr().is_terminal();
    let collector = tracing_subscriber::Registry::default()
        .with(env_filter)
        .with(terminal.then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .with((!terminal).then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }));
    tracing::subscriber::set_global_default(collector)?;
    Ok(())
}
