//! Installation input and runtime options.
//!
//! [`InstallConfig`] is the user's answers (target disk, account, timezone,
//! package list), loaded from YAML and never mutated during a run.
//! [`InstallerOptions`] holds the host-side paths and knobs the pipeline
//! needs that are not user input.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::sync::LazyLock;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::Deserialize;

use crate::disk::DEFAULT_SETTLE_DELAY;
use crate::error::InstallerError;

/// Default mount point of the target filesystem tree.
pub const DEFAULT_MOUNT_POINT: &str = "/mnt";
/// Mount point used by the CLI in simulated mode.
pub const SIMULATED_MOUNT_POINT: &str = "/tmp/endos-install-test";
/// Package list shipped on the live ISO.
pub const DEFAULT_PACKAGE_LIST: &str = "/etc/endos-packages.txt";
/// Skeleton home directory content replicated into the new system.
pub const DEFAULT_SKEL_DIR: &str = "/etc/skel";
/// Shell runtime environment replicated into the new system when present.
pub const DEFAULT_RUNTIME_ENV_DIR: &str = "/usr/share/quickshell/venv";

const MAX_USERNAME_LEN: usize = 32;

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z_][a-z0-9_-]*$").expect("username pattern is a valid regex")
});

fn default_timezone() -> String {
    "UTC".to_string()
}

/// User-supplied installation answers.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InstallConfig {
    /// Device node of the disk to erase, e.g. `/dev/sda`
    #[serde(default)]
    pub target_disk: String,
    #[serde(default)]
    pub username: String,
    /// Plaintext password for the new user and root; kept in memory only
    #[serde(default)]
    pub password: String,
    /// IANA timezone identifier
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Newline-separated package names; blank and `#` lines are ignored
    #[serde(default)]
    pub packages: String,
}

impl fmt::Debug for InstallConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallConfig")
            .field("target_disk", &self.target_disk)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timezone", &self.timezone)
            .field("packages", &self.packages)
            .finish()
    }
}

impl InstallConfig {
    /// Creates a config with the default timezone and no explicit packages.
    pub fn new(
        target_disk: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            target_disk: target_disk.into(),
            username: username.into(),
            password: password.into(),
            timezone: default_timezone(),
            packages: String::new(),
        }
    }

    #[must_use]
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    #[must_use]
    pub fn with_packages(mut self, packages: impl Into<String>) -> Self {
        self.packages = packages.into();
        self
    }

    /// Checks that every input the pipeline depends on is present and sane.
    pub fn validate(&self) -> Result<(), InstallerError> {
        let disk = self.target_disk.trim();
        if disk.is_empty() {
            return Err(InstallerError::Configuration("no target disk selected".to_string()));
        }
        if !disk.starts_with("/dev/") || disk.len() == "/dev/".len() {
            return Err(InstallerError::Configuration(format!(
                "target disk '{}' is not a device path under /dev",
                disk
            )));
        }

        if self.username.is_empty() {
            return Err(InstallerError::Configuration("no username given".to_string()));
        }
        if self.username.len() > MAX_USERNAME_LEN || !USERNAME_RE.is_match(&self.username) {
            return Err(InstallerError::Configuration(format!(
                "invalid username '{}': must start with a lowercase letter or underscore, \
                contain only lowercase letters, digits, '_' or '-', and be at most {} characters",
                self.username, MAX_USERNAME_LEN
            )));
        }
        if self.username == "root" {
            return Err(InstallerError::Configuration(
                "username 'root' is reserved".to_string(),
            ));
        }

        let tz = Utf8Path::new(&self.timezone);
        if self.timezone.trim().is_empty() {
            return Err(InstallerError::Configuration("timezone must not be empty".to_string()));
        }
        if tz.is_absolute() || tz.components().any(|c| c == camino::Utf8Component::ParentDir) {
            return Err(InstallerError::Configuration(format!(
                "timezone '{}' must be a relative zoneinfo name without '..'",
                self.timezone
            )));
        }

        Ok(())
    }
}

/// Loads an [`InstallConfig`] from a YAML file.
pub fn load_config(path: &Utf8Path) -> Result<InstallConfig, InstallerError> {
    let file = File::open(path)
        .map_err(|e| InstallerError::io(format!("failed to open config: {}", path), e))?;
    let reader = BufReader::new(file);
    serde_yaml::from_reader(reader).map_err(|e| {
        InstallerError::Configuration(format!("failed to parse YAML {}: {}", path, e))
    })
}

/// Host-side paths and knobs for one installer instance.
#[derive(Debug, Clone)]
pub struct InstallerOptions {
    /// Where the target root filesystem is mounted
    pub mount_point: Utf8PathBuf,
    /// Package list consulted when the config lists no packages
    pub package_list: Utf8PathBuf,
    pub skel_dir: Utf8PathBuf,
    pub runtime_env_dir: Utf8PathBuf,
    /// Pause after wiping and re-reading the partition table
    pub settle_delay: Duration,
    /// Route configuration file writes through the privileged writer
    pub elevated_writes: bool,
}

impl Default for InstallerOptions {
    fn default() -> Self {
        Self {
            mount_point: DEFAULT_MOUNT_POINT.into(),
            package_list: DEFAULT_PACKAGE_LIST.into(),
            skel_dir: DEFAULT_SKEL_DIR.into(),
            runtime_env_dir: DEFAULT_RUNTIME_ENV_DIR.into(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            elevated_writes: false,
        }
    }
}

impl InstallerOptions {
    #[must_use]
    pub fn with_mount_point(mut self, mount_point: impl Into<Utf8PathBuf>) -> Self {
        self.mount_point = mount_point.into();
        self
    }

    #[must_use]
    pub fn with_package_list(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.package_list = path.into();
        self
    }

    #[must_use]
    pub fn with_skel_dir(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.skel_dir = path.into();
        self
    }

    #[must_use]
    pub fn with_runtime_env_dir(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.runtime_env_dir = path.into();
        self
    }

    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    #[must_use]
    pub fn with_elevated_writes(mut self, elevated: bool) -> Self {
        self.elevated_writes = elevated;
        self
    }
}
