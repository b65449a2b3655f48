//! Base package list resolution.
//!
//! The list installed into the target comes from the first non-empty of:
//! the packages given in the config, the package list file shipped on the
//! live system, and a built-in minimal set.

use std::fs;

use camino::Utf8Path;
use tracing::{error, warn};

/// Minimal package set used when no other list is available.
pub const FALLBACK_PACKAGES: &[&str] =
    &["base", "linux", "linux-firmware", "base-devel", "vim", "git", "networkmanager"];

/// Splits package list text into names, dropping blank and `#` comment lines.
pub fn parse_package_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Returns the default package list text offered for editing.
///
/// Reads `path` when it exists, otherwise renders [`FALLBACK_PACKAGES`].
pub fn default_package_text(path: &Utf8Path) -> String {
    match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            if path.exists() {
                error!("failed to read default packages from {}: {}", path, e);
            }
            FALLBACK_PACKAGES.join("\n")
        }
    }
}

/// Resolves the packages to install.
///
/// Priority: `configured` > the list file at `default_list` > [`FALLBACK_PACKAGES`].
pub fn resolve_packages(configured: &str, default_list: &Utf8Path) -> Vec<String> {
    let packages = parse_package_list(configured);
    if !packages.is_empty() {
        return packages;
    }

    warn!("no packages in config, loading from {}", default_list);
    let packages = fs::read_to_string(default_list)
        .map(|text| parse_package_list(&text))
        .unwrap_or_default();
    if !packages.is_empty() {
        return packages;
    }

    error!("no package list found, using minimal fallback");
    FALLBACK_PACKAGES.iter().map(|p| p.to_string()).collect()
}
