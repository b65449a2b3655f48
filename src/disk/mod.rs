//! Disk enumeration, boot-mode detection, partitioning, formatting and mounting.
//!
//! [`DiskManager`] holds no state across calls; every operation goes
//! through the borrowed [`CommandExecutor`], so the same code drives a
//! real disk or a simulated one.

mod layout;
mod lsblk;

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use camino::Utf8Path;
use tracing::{error, info, warn};

use crate::executor::{CommandExecutor, CommandSpec, run_best_effort};

pub use layout::{BootMode, PartitionPlan, partition_path};
pub use lsblk::{DiskDescriptor, parse_disks, parse_mountpoints};

/// Directory whose presence indicates the system was booted through UEFI.
pub const EFI_FIRMWARE_MARKER: &str = "/sys/firmware/efi";

/// Default pause for the kernel to create or drop device nodes.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Size in MiB zeroed at the start of the device before partitioning.
const ZEROED_HEADER_MIB: u32 = 10;

/// Disk operations built on a [`CommandExecutor`].
pub struct DiskManager<'a> {
    executor: &'a dyn CommandExecutor,
    settle_delay: Duration,
}

impl<'a> DiskManager<'a> {
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self {
            executor,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// Overrides the pause applied after wiping and after re-reading the partition table.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Lists physical disks.
    ///
    /// Enumeration failure of any kind means "no disks available": the
    /// error is logged and an empty list returned.
    pub fn list_disks(&self) -> Vec<DiskDescriptor> {
        let spec = CommandSpec::new("lsblk", ["-J", "-d", "-o", "NAME,SIZE,TYPE,MODEL,ROTA"]);
        let output = match self.executor.run(&spec) {
            Ok(result) => result.stdout,
            Err(e) => {
                error!("failed to list disks: {:#}", e);
                return Vec::new();
            }
        };
        if output.trim().is_empty() {
            return Vec::new();
        }

        match parse_disks(&output) {
            Ok(disks) => disks,
            Err(e) => {
                error!("failed to list disks: {}", e);
                Vec::new()
            }
        }
    }

    /// Detects the firmware boot mode without side effects.
    pub fn boot_mode(&self) -> BootMode {
        let spec = CommandSpec::new("test", ["-d", EFI_FIRMWARE_MARKER]).allow_failure();
        match self.executor.run(&spec) {
            Ok(result) if result.success() => BootMode::Uefi,
            Ok(_) => BootMode::Bios,
            Err(e) => {
                warn!("boot mode probe failed, assuming BIOS: {:#}", e);
                BootMode::Bios
            }
        }
    }

    /// Erases `device` and writes a fresh partition table for `mode`.
    ///
    /// Unmounting, zeroing and signature wiping are best-effort; creating
    /// the label and the partitions must succeed.
    pub fn partition_disk(&self, device: &str, mode: BootMode) -> Result<()> {
        info!("partitioning {} in erase mode ({})", device, mode);

        self.unmount_device(device);

        info!("zeroing disk header...");
        run_best_effort(
            self.executor,
            CommandSpec::new(
                "dd",
                [
                    "if=/dev/zero".to_string(),
                    format!("of={}", device),
                    "bs=1M".to_string(),
                    format!("count={}", ZEROED_HEADER_MIB),
                    "conv=notrunc".to_string(),
                ],
            ),
        );

        info!("wiping disk signatures...");
        run_best_effort(self.executor, CommandSpec::new("wipefs", ["-af", device]));
        self.settle();

        let label = mode.partition_table();
        info!("creating {} partition table...", label);
        self.parted(device, &["mklabel", label])?;

        match mode {
            BootMode::Uefi => {
                self.parted(device, &["mkpart", "primary", "fat32", "1MiB", "513MiB"])?;
                self.parted(device, &["set", "1", "esp", "on"])?;
                self.parted(device, &["mkpart", "primary", "ext4", "513MiB", "100%"])?;
            }
            BootMode::Bios => {
                self.parted(device, &["mkpart", "primary", "ext4", "1MiB", "100%"])?;
                self.parted(device, &["set", "1", "boot", "on"])?;
            }
        }

        info!("syncing partition table...");
        run_best_effort(self.executor, CommandSpec::new("partprobe", [device]));
        self.settle();
        Ok(())
    }

    /// Formats the partitions laid out by [`partition_disk`](Self::partition_disk).
    ///
    /// Partition paths come from the device name; the table is not re-read.
    pub fn format_partitions(&self, device: &str, mode: BootMode) -> Result<PartitionPlan> {
        let plan = PartitionPlan::for_device(device, mode);

        if let Some(boot) = &plan.boot {
            info!("formatting boot: {}, root: {}", boot, plan.root);
            self.executor
                .run(&CommandSpec::new("mkfs.fat", ["-F32", boot.as_str()]))
                .with_context(|| format!("failed to format boot partition {}", boot))?;
        } else {
            info!("formatting root: {}", plan.root);
        }

        self.executor
            .run(&CommandSpec::new("mkfs.ext4", ["-F", plan.root.as_str()]))
            .with_context(|| format!("failed to format root partition {}", plan.root))?;

        Ok(plan)
    }

    /// Mounts root at `mount_point` and, if present, boot at `<mount_point>/boot`.
    pub fn mount_partitions(
        &self,
        root: &str,
        boot: Option<&str>,
        mount_point: &Utf8Path,
    ) -> Result<()> {
        self.executor
            .run(&CommandSpec::new("mount", [root, mount_point.as_str()]))
            .with_context(|| format!("failed to mount {} on {}", root, mount_point))?;

        if let Some(boot) = boot {
            let boot_mount = mount_point.join("boot");
            self.executor.run(&CommandSpec::new("mkdir", ["-p", boot_mount.as_str()]))?;
            self.executor
                .run(&CommandSpec::new("mount", [boot, boot_mount.as_str()]))
                .with_context(|| format!("failed to mount {} on {}", boot, boot_mount))?;
        }
        Ok(())
    }

    fn unmount_device(&self, device: &str) {
        let probe = CommandSpec::new("lsblk", ["-ln", "-o", "MOUNTPOINT", device]);
        let Some(result) = run_best_effort(self.executor, probe) else {
            return;
        };
        for mountpoint in parse_mountpoints(&result.stdout) {
            info!("unmounting {}", mountpoint);
            run_best_effort(self.executor, CommandSpec::new("umount", ["-f", mountpoint.as_str()]));
        }
    }

    fn parted(&self, device: &str, args: &[&str]) -> Result<()> {
        let mut full = vec!["-s", device];
        full.extend_from_slice(args);
        self.executor
            .run(&CommandSpec::new("parted", full))
            .with_context(|| format!("parted {} failed on {}", args.join(" "), device))?;
        Ok(())
    }

    fn settle(&self) {
        if !self.settle_delay.is_zero() {
            thread::sleep(self.settle_delay);
        }
    }
}
