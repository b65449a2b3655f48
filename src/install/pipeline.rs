//! The fixed, ordered installation pipeline.
//!
//! Every stage announces itself through the progress sink before it acts.
//! The first error aborts the run; nothing is rolled back.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use super::PipelineStage;
use super::chroot::ArchChroot;
use crate::config::{InstallConfig, InstallerOptions};
use crate::disk::{BootMode, DiskManager};
use crate::executor::{CommandExecutor, CommandSpec, run_best_effort};
use crate::packages::resolve_packages;

/// Hostname written into the target system.
pub const HOSTNAME: &str = "endos";

/// Hosts file written into the target system.
pub const HOSTS_CONTENT: &str =
    "127.0.0.1\tlocalhost\n::1\t\tlocalhost\n127.0.1.1\tendos.localdomain\tendos\n";

/// Locale enabled in `/etc/locale.gen` and made active.
pub const LOCALE: &str = "en_US.UTF-8";

/// Supplementary groups of the primary user.
pub const USER_GROUPS: &str = "wheel,video,audio,storage,input";

pub const USER_SHELL: &str = "/bin/bash";

/// Services enabled in the target, each independently best-effort.
pub const SERVICES: &[&str] = &["NetworkManager", "bluetooth", "sddm", "greetd"];

/// EFI boot entry name.
pub const BOOTLOADER_ID: &str = "EndOS";

const SUDOERS_WHEEL_EXPR: &str = "s/# %wheel ALL=(ALL:ALL) ALL/%wheel ALL=(ALL:ALL) ALL/";
const GRUB_SPLASH_EXPR: &str = "s/GRUB_CMDLINE_LINUX_DEFAULT=\"loglevel=3 quiet\"/\
    GRUB_CMDLINE_LINUX_DEFAULT=\"loglevel=3 quiet splash\"/";

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Partition,
    Format,
    Mount,
    Packages,
    Fstab,
    Timezone,
    Locale,
    User,
    Sudoers,
    Hostname,
    Services,
    Bootloader,
    Replicate,
    Done,
}

impl Stage {
    pub const ALL: [Stage; 14] = [
        Stage::Partition,
        Stage::Format,
        Stage::Mount,
        Stage::Packages,
        Stage::Fstab,
        Stage::Timezone,
        Stage::Locale,
        Stage::User,
        Stage::Sudoers,
        Stage::Hostname,
        Stage::Services,
        Stage::Bootloader,
        Stage::Replicate,
        Stage::Done,
    ];

    /// Progress reported when this stage begins.
    pub fn percent(self) -> u8 {
        match self {
            Stage::Partition => 5,
            Stage::Format => 15,
            Stage::Mount => 20,
            Stage::Packages => 30,
            Stage::Fstab => 50,
            Stage::Timezone => 55,
            Stage::Locale => 58,
            Stage::User => 65,
            Stage::Sudoers => 70,
            Stage::Hostname => 72,
            Stage::Services => 75,
            Stage::Bootloader => 80,
            Stage::Replicate => 90,
            Stage::Done => 100,
        }
    }
}

/// Runs the installation stages against one executor.
pub struct Pipeline<'a> {
    executor: &'a dyn CommandExecutor,
    options: &'a InstallerOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(executor: &'a dyn CommandExecutor, options: &'a InstallerOptions) -> Self {
        Self { executor, options }
    }

    /// Executes every stage in order, reporting progress through `progress`.
    ///
    /// The config is validated before anything touches the disk. Boot mode
    /// is probed once and shared by partitioning, formatting and the
    /// bootloader stage.
    pub fn run(
        &self,
        config: &InstallConfig,
        progress: &mut dyn FnMut(PipelineStage),
    ) -> Result<()> {
        config.validate()?;

        let device = config.target_disk.trim();
        let disks =
            DiskManager::new(self.executor).with_settle_delay(self.options.settle_delay);
        let mode = disks.boot_mode();
        let mount_point = self.options.mount_point.as_path();
        let chroot = ArchChroot::new(mount_point);
        info!("installing to {} ({}) at {}", device, mode, mount_point);

        report(progress, Stage::Partition, format!("Partitioning {}...", device));
        disks
            .partition_disk(device, mode)
            .with_context(|| format!("failed to partition {}", device))?;

        report(progress, Stage::Format, "Formatting partitions...");
        let plan = disks
            .format_partitions(device, mode)
            .with_context(|| format!("failed to format partitions on {}", device))?;

        report(progress, Stage::Mount, "Mounting filesystems...");
        self.executor.run(&CommandSpec::new("mkdir", ["-p", mount_point.as_str()]))?;
        disks
            .mount_partitions(&plan.root, plan.boot.as_deref(), mount_point)
            .context("failed to mount target filesystems")?;

        report(progress, Stage::Packages, "Installing system packages...");
        self.install_packages(config, mount_point)
            .context("failed to install system packages")?;

        report(progress, Stage::Fstab, "Generating fstab...");
        self.generate_fstab(&chroot).context("failed to generate fstab")?;

        report(
            progress,
            Stage::Timezone,
            format!("Setting timezone to {}...", config.timezone),
        );
        self.configure_timezone(&chroot, &config.timezone)
            .with_context(|| format!("failed to set timezone {}", config.timezone))?;

        report(progress, Stage::Locale, "Configuring locale...");
        self.configure_locale(&chroot).context("failed to configure locale")?;

        report(progress, Stage::User, format!("Creating user {}...", config.username));
        self.create_user(&chroot, &config.username, &config.password)
            .with_context(|| format!("failed to create user {}", config.username))?;

        report(progress, Stage::Sudoers, "Configuring sudoers...");
        self.executor
            .run(&CommandSpec::new(
                "sed",
                ["-i", SUDOERS_WHEEL_EXPR, chroot.host_path("/etc/sudoers").as_str()],
            ))
            .context("failed to configure sudoers")?;

        report(progress, Stage::Hostname, "Setting hostname...");
        self.configure_hostname(&chroot).context("failed to set hostname")?;

        report(progress, Stage::Services, "Enabling system services...");
        self.enable_services(&chroot);

        report(progress, Stage::Bootloader, "Installing bootloader (GRUB)...");
        self.install_bootloader(&chroot, device, mode)
            .context("failed to install bootloader")?;

        report(progress, Stage::Replicate, "Replicating environment...");
        self.replicate_environment(&chroot, &config.username)
            .context("failed to replicate environment")?;

        report(progress, Stage::Done, "Done!");
        Ok(())
    }

    fn write(&self, path: &Utf8Path, content: &str) -> Result<()> {
        self.executor.write_file(path, content, self.options.elevated_writes)
    }

    fn install_packages(&self, config: &InstallConfig, mount_point: &Utf8Path) -> Result<()> {
        let packages = resolve_packages(&config.packages, &self.options.package_list);
        info!("installing {} packages...", packages.len());

        let mut args = vec!["-K".to_string(), mount_point.to_string()];
        args.extend(packages);
        self.executor.run(&CommandSpec::new("pacstrap", args).stream_output())?;
        Ok(())
    }

    fn generate_fstab(&self, chroot: &ArchChroot) -> Result<()> {
        let result =
            self.executor.run(&CommandSpec::new("genfstab", ["-U", chroot.root().as_str()]))?;
        self.write(&chroot.host_path("/etc/fstab"), &result.stdout)
    }

    fn configure_timezone(&self, chroot: &ArchChroot, timezone: &str) -> Result<()> {
        let zone = Utf8PathBuf::from("/usr/share/zoneinfo").join(timezone);
        self.executor.run(&CommandSpec::new(
            "ln",
            ["-sf", zone.as_str(), chroot.host_path("/etc/localtime").as_str()],
        ))?;
        self.executor.run(&chroot.command(["hwclock", "--systohc"]))?;
        Ok(())
    }

    fn configure_locale(&self, chroot: &ArchChroot) -> Result<()> {
        let expr = format!("s/#{locale} UTF-8/{locale} UTF-8/", locale = LOCALE);
        self.executor.run(&CommandSpec::new(
            "sed",
            ["-i", expr.as_str(), chroot.host_path("/etc/locale.gen").as_str()],
        ))?;
        self.executor.run(&chroot.command(["locale-gen"]))?;
        self.write(&chroot.host_path("/etc/locale.conf"), &format!("LANG={}\n", LOCALE))
    }

    fn create_user(&self, chroot: &ArchChroot, username: &str, password: &str) -> Result<()> {
        self.executor.run(&chroot.command([
            "useradd",
            "-m",
            "-G",
            USER_GROUPS,
            "-s",
            USER_SHELL,
            username,
        ]))?;

        for account in [username, "root"] {
            let spec = chroot
                .command(["chpasswd"])
                .with_stdin(format!("{}:{}", account, password))
                .hide_args();
            self.executor
                .run(&spec)
                .with_context(|| format!("failed to set password for {}", account))?;
        }
        Ok(())
    }

    fn configure_hostname(&self, chroot: &ArchChroot) -> Result<()> {
        self.write(&chroot.host_path("/etc/hostname"), &format!("{}\n", HOSTNAME))?;
        self.write(&chroot.host_path("/etc/hosts"), HOSTS_CONTENT)
    }

    fn enable_services(&self, chroot: &ArchChroot) {
        for service in SERVICES.iter().copied() {
            run_best_effort(self.executor, chroot.command(["systemctl", "enable", service]));
        }
    }

    fn install_bootloader(&self, chroot: &ArchChroot, device: &str, mode: BootMode) -> Result<()> {
        let install = match mode {
            BootMode::Uefi => chroot.command([
                "grub-install".to_string(),
                "--target=x86_64-efi".to_string(),
                "--efi-directory=/boot".to_string(),
                format!("--bootloader-id={}", BOOTLOADER_ID),
            ]),
            BootMode::Bios => chroot.command(["grub-install", "--target=i386-pc", device]),
        };
        self.executor.run(&install.stream_output())?;

        self.executor.run(&CommandSpec::new(
            "sed",
            ["-i", GRUB_SPLASH_EXPR, chroot.host_path("/etc/default/grub").as_str()],
        ))?;
        self.executor.run(
            &chroot.command(["grub-mkconfig", "-o", "/boot/grub/grub.cfg"]).stream_output(),
        )?;
        Ok(())
    }

    fn replicate_environment(&self, chroot: &ArchChroot, username: &str) -> Result<()> {
        let skel = format!("{}/.", self.options.skel_dir);
        let home = format!("/home/{}", username);

        self.executor.run(&CommandSpec::new(
            "cp",
            ["-a".to_string(), skel.clone(), format!("{}/", chroot.host_path("/etc/skel"))],
        ))?;
        self.executor.run(&CommandSpec::new(
            "cp",
            ["-a".to_string(), skel, format!("{}/", chroot.host_path(&home))],
        ))?;
        self.executor.run(&chroot.command([
            "chown".to_string(),
            "-R".to_string(),
            format!("{}:{}", username, username),
            home,
        ]))?;

        let runtime_env = self.options.runtime_env_dir.as_path();
        let present = CommandSpec::new("test", ["-d", runtime_env.as_str()]).allow_failure();
        if !self.executor.run(&present)?.success() {
            info!("{} not present, skipping", runtime_env);
            return Ok(());
        }

        let dest = chroot.host_path(runtime_env.as_str());
        if let Some(parent) = dest.parent() {
            self.executor.run(&CommandSpec::new("mkdir", ["-p", parent.as_str()]))?;
        }
        self.executor
            .run(&CommandSpec::new("cp", ["-a", runtime_env.as_str(), dest.as_str()]))?;
        Ok(())
    }
}

fn report(progress: &mut dyn FnMut(PipelineStage), stage: Stage, message: impl Into<String>) {
    let stage = PipelineStage::new(stage.percent(), message);
    info!("[{}%] {}", stage.percent, stage.message);
    progress(stage);
}
