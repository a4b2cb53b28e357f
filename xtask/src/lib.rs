use std::{
    env,
    path::{Path, PathBuf},
};

use lazy_static::lazy_static;
use xshell::Shell;

pub mod check;
pub mod manifests;

pub type DynError = Box<dyn std::error::Error>;
pub type Result<T> = std::result::Result<T, DynError>;

lazy_static! {
    pub static ref WORKSPACE: PathBuf = Path::new(&env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(1)
        .map(Path::to_path_buf)
        .unwrap_or_default();
    pub static ref CONFIG_DIR: PathBuf = WORKSPACE.join("config");
}

/// Returns a shell rooted at the workspace.
pub fn shell() -> Result<Shell> {
    let sh = Shell::new()?;
    sh.change_dir(WORKSPACE.as_path());
    Ok(sh)
}

/// Returns `p` relative to the workspace, for messages.
pub fn rel<P: AsRef<Path>>(p: P) -> String {
    let p = p.as_ref();
    p.strip_prefix(WORKSPACE.as_path())
        .unwrap_or(p)
        .display()
        .to_string()
}
