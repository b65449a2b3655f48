//! IANA timezone discovery for the timezone picker.

use camino::Utf8Path;
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// Default zoneinfo database location.
pub const ZONEINFO_DIR: &str = "/usr/share/zoneinfo";

/// Zones offered in simulated mode, where the host database is not consulted.
pub const SIMULATED_TIMEZONES: &[&str] = &[
    "America/New_York",
    "America/Los_Angeles",
    "Europe/London",
    "Europe/Paris",
    "Asia/Tokyo",
    "UTC",
];

/// Top-level directories holding duplicate or legacy zone trees.
const IGNORED_DIRS: &[&str] = &["posix", "right", "Etc", "SystemV"];

fn is_ignored(entry: &DirEntry) -> bool {
    entry.depth() == 1
        && entry.file_type().is_dir()
        && entry.file_name().to_str().is_some_and(|name| IGNORED_DIRS.contains(&name))
}

/// Lists `Region/City` zone names under `zoneinfo_dir`, sorted.
///
/// Unreadable entries are skipped. Returns `["UTC"]` if nothing was found.
pub fn list_timezones(zoneinfo_dir: &Utf8Path) -> Vec<String> {
    let mut zones = Vec::new();

    for entry in WalkDir::new(zoneinfo_dir).into_iter().filter_entry(|e| !is_ignored(e)) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable zoneinfo entry under {}: {}", zoneinfo_dir, e);
                continue;
            }
        };
        // Legacy aliases such as US/Eastern are symlinks to the canonical zone file.
        let file_type = entry.file_type();
        if !(file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(zoneinfo_dir) else {
            continue;
        };
        if let Some(zone) = relative.to_str()
            && zone.contains('/')
            && !zone.starts_with('.')
        {
            zones.push(zone.to_string());
        }
    }

    if zones.is_empty() {
        return vec!["UTC".to_string()];
    }
    zones.sort();
    zones
}
