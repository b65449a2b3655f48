//! Boot mode and the partition layout derived from it.

use strum::Display;

/// Firmware boot mode of the machine running the installer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BootMode {
    #[strum(serialize = "UEFI")]
    Uefi,
    #[strum(serialize = "BIOS")]
    Bios,
}

impl BootMode {
    /// Partition table label passed to `parted mklabel`.
    pub fn partition_table(&self) -> &'static str {
        match self {
            Self::Uefi => "gpt",
            Self::Bios => "msdos",
        }
    }
}

/// Partition paths that `format_partitions` produced for a device.
///
/// Derived from the device name and boot mode only; the partition table
/// is not re-read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    pub root: String,
    pub boot: Option<String>,
}

impl PartitionPlan {
    /// Computes the layout written by `partition_disk` for `device`.
    pub fn for_device(device: &str, mode: BootMode) -> Self {
        match mode {
            BootMode::Uefi => Self {
                boot: Some(partition_path(device, 1)),
                root: partition_path(device, 2),
            },
            BootMode::Bios => Self {
                root: partition_path(device, 1),
                boot: None,
            },
        }
    }
}

/// Returns the path of partition `number` on `device`.
///
/// Devices whose name ends in a digit (`nvme0n1`, `mmcblk0`, `loop0`)
/// separate the partition number with `p`; others (`sda`, `vdb`) append
/// it directly.
pub fn partition_path(device: &str, number: u32) -> String {
    let separator = if device.ends_with(|c: char| c.is_ascii_digit()) { "p" } else { "" };
    format!("{}{}{}", device, separator, number)
}
