//! Chroot-execution inside the target filesystem tree.

use camino::{Utf8Path, Utf8PathBuf};

use crate::executor::CommandSpec;

/// Builds commands that run with the mounted target as their root,
/// through `arch-chroot` so `/proc`, `/sys` and `/dev` are available.
#[derive(Debug, Clone)]
pub struct ArchChroot {
    root: Utf8PathBuf,
}

impl ArchChroot {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Returns `arch-chroot <root> <command...>`.
    pub fn command<I, S>(&self, command: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args: Vec<String> = vec![self.root.to_string()];
        args.extend(command.into_iter().map(Into::into));
        CommandSpec::new("arch-chroot", args)
    }

    /// Resolves a target-absolute path (e.g. `/etc/hosts`) to its host path under the root.
    pub fn host_path(&self, path: &str) -> Utf8PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}
