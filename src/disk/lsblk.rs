//! lsblk JSON parsing for disk enumeration

use serde::Deserialize;
use serde_json::Value;

use crate::error::InstallerError;

/// A physical disk offered as an installation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskDescriptor {
    /// Device node, e.g. `/dev/sda`
    pub device: String,
    /// Kernel name, e.g. `sda`
    pub name: String,
    /// Human-readable size as reported by lsblk, e.g. `500G`
    pub size: String,
    pub model: String,
    /// True for spinning disks
    pub rotational: bool,
}

#[derive(Debug, Deserialize)]
struct LsblkOutput {
    #[serde(default)]
    blockdevices: Vec<LsblkDevice>,
}

#[derive(Debug, Deserialize)]
struct LsblkDevice {
    name: String,
    #[serde(default)]
    size: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    rota: Option<Value>,
}

/// lsblk reports ROTA as `"1"`/`"0"` in older releases and as a JSON
/// boolean in newer ones.
fn is_rotational(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim() == "1",
        Some(Value::Number(n)) => n.as_u64() == Some(1),
        _ => false,
    }
}

/// Parses `lsblk -J -d -o NAME,SIZE,TYPE,MODEL,ROTA` output, keeping only
/// entries of type `disk`.
pub fn parse_disks(json: &str) -> Result<Vec<DiskDescriptor>, InstallerError> {
    let output: LsblkOutput =
        serde_json::from_str(json).map_err(|e| InstallerError::Parse(e.to_string()))?;

    Ok(output
        .blockdevices
        .into_iter()
        .filter(|dev| dev.kind.as_deref() == Some("disk"))
        .map(|dev| DiskDescriptor {
            device: format!("/dev/{}", dev.name),
            rotational: is_rotational(dev.rota.as_ref()),
            size: dev.size.unwrap_or_default(),
            model: dev
                .model
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            name: dev.name,
        })
        .collect())
}

/// Parses `lsblk -ln -o MOUNTPOINT <device>` output into active mountpoints.
pub fn parse_mountpoints(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
