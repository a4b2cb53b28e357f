use xshell::{Shell, cmd};

use crate::Result;

pub fn kubectl(sh: &Shell) -> Result<()> {
    cmd!(sh, "which kubectl")
        .quiet()
        .ignore_stdout()
        .ignore_stderr()
        .run()
        .map_err(|_| "kubectl not found in PATH".into())
}
