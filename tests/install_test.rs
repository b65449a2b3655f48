mod helpers;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use endos_installer::config::InstallConfig;
use endos_installer::executor::{CommandExecutor, SimulatedExecutor};
use endos_installer::install::{
    HOSTS_CONTENT, InstallEvent, InstallOutcome, Installer, PipelineStage, SERVICES,
};
use helpers::{FSTAB, RecordingExecutor, alice_config, test_options};

/// Runs one installation to completion and returns every event.
fn run_events(executor: Arc<RecordingExecutor>, config: InstallConfig) -> Vec<InstallEvent> {
    let installer = Installer::new(executor, test_options());
    let handle = installer.start(config).expect("installer should be idle");
    handle.events().iter().collect()
}

fn progress(events: &[InstallEvent]) -> Vec<PipelineStage> {
    events
        .iter()
        .filter_map(|e| match e {
            InstallEvent::Progress(stage) => Some(stage.clone()),
            InstallEvent::Finished(_) => None,
        })
        .collect()
}

fn finished(events: &[InstallEvent]) -> Vec<InstallOutcome> {
    events
        .iter()
        .filter_map(|e| match e {
            InstallEvent::Finished(outcome) => Some(outcome.clone()),
            InstallEvent::Progress(_) => None,
        })
        .collect()
}

#[test]
fn test_simulated_run_reports_every_stage_in_order() {
    let executor = Arc::new(SimulatedExecutor::new().with_delay(Duration::ZERO));
    let installer = Installer::new(executor, test_options());

    let config = alice_config("/dev/sda").with_timezone("UTC").with_packages("");
    let mut percents = Vec::new();
    let outcome = installer
        .start(config)
        .expect("installer should be idle")
        .wait(|stage| percents.push(stage.percent));

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.message, "Installation Complete");
    assert_eq!(percents, vec![5, 15, 20, 30, 50, 55, 58, 65, 70, 72, 75, 80, 90, 100]);
    assert!(!installer.is_running());
}

#[test]
fn test_stage_messages() {
    let executor = Arc::new(RecordingExecutor::uefi());
    let events = run_events(executor, alice_config("/dev/sda").with_timezone("Europe/Paris"));
    let messages: Vec<String> = progress(&events).into_iter().map(|s| s.message).collect();

    assert_eq!(
        messages,
        vec![
            "Partitioning /dev/sda...",
            "Formatting partitions...",
            "Mounting filesystems...",
            "Installing system packages...",
            "Generating fstab...",
            "Setting timezone to Europe/Paris...",
            "Configuring locale...",
            "Creating user alice...",
            "Configuring sudoers...",
            "Setting hostname...",
            "Enabling system services...",
            "Installing bootloader (GRUB)...",
            "Replicating environment...",
            "Done!",
        ]
    );
    assert!(matches!(events.last(), Some(InstallEvent::Finished(o)) if o.success));
}

#[test]
fn test_uefi_run_commands() {
    let executor = Arc::new(RecordingExecutor::uefi());
    let events = run_events(Arc::clone(&executor), alice_config("/dev/nvme0n1"));
    assert!(finished(&events)[0].success);

    let lines = executor.command_lines();
    for expected in [
        "parted -s /dev/nvme0n1 mklabel gpt",
        "mkfs.fat -F32 /dev/nvme0n1p1",
        "mkfs.ext4 -F /dev/nvme0n1p2",
        "mkdir -p /mnt",
        "mount /dev/nvme0n1p2 /mnt",
        "mount /dev/nvme0n1p1 /mnt/boot",
        "genfstab -U /mnt",
        "ln -sf /usr/share/zoneinfo/UTC /mnt/etc/localtime",
        "arch-chroot /mnt hwclock --systohc",
        "arch-chroot /mnt locale-gen",
        "arch-chroot /mnt useradd -m -G wheel,video,audio,storage,input -s /bin/bash alice",
        "arch-chroot /mnt grub-install --target=x86_64-efi --efi-directory=/boot \
         --bootloader-id=EndOS",
        "arch-chroot /mnt grub-mkconfig -o /boot/grub/grub.cfg",
        "cp -a /etc/skel/. /mnt/etc/skel/",
        "cp -a /etc/skel/. /mnt/home/alice/",
        "arch-chroot /mnt chown -R alice:alice /home/alice",
    ] {
        assert!(lines.iter().any(|l| l == expected), "missing `{}` in {:#?}", expected, lines);
    }

    // The boot mode is probed exactly once per run.
    let probes = lines.iter().filter(|l| *l == "test -d /sys/firmware/efi").count();
    assert_eq!(probes, 1);

    let format = executor.position("mkfs.ext4").unwrap();
    let mount = executor.position("mount /dev/nvme0n1p2").unwrap();
    let pacstrap = executor.position("pacstrap").unwrap();
    let grub = executor.position("arch-chroot /mnt grub-install").unwrap();
    assert!(format < mount && mount < pacstrap && pacstrap < grub);
}

#[test]
fn test_bios_run_commands() {
    let executor = Arc::new(RecordingExecutor::bios());
    let events = run_events(Arc::clone(&executor), alice_config("/dev/sda"));
    assert!(finished(&events)[0].success);

    let lines = executor.command_lines();
    assert!(lines.contains(&"parted -s /dev/sda mklabel msdos".to_string()));
    assert!(lines.contains(&"mkfs.ext4 -F /dev/sda1".to_string()));
    assert!(lines.contains(&"mount /dev/sda1 /mnt".to_string()));
    assert!(lines.contains(&"arch-chroot /mnt grub-install --target=i386-pc /dev/sda".to_string()));
    assert!(!lines.iter().any(|l| l.starts_with("mkfs.fat")));
    assert!(!lines.iter().any(|l| l.contains("/mnt/boot")));
}

#[test]
fn test_long_running_commands_are_streamed() {
    let executor = Arc::new(RecordingExecutor::uefi());
    run_events(Arc::clone(&executor), alice_config("/dev/sda"));

    for prefix in ["pacstrap", "arch-chroot /mnt grub-install", "arch-chroot /mnt grub-mkconfig"] {
        let call = executor.find(prefix).unwrap();
        assert!(!call.capture, "`{}` should stream its output", prefix);
    }
    assert!(executor.find("genfstab").unwrap().capture);
}

#[test]
fn test_package_resolution_order() {
    let executor = Arc::new(RecordingExecutor::uefi());
    let config = alice_config("/dev/sda").with_packages("base\n# editor\n\nlinux\nhyprland\n");
    run_events(Arc::clone(&executor), config);
    assert_eq!(
        executor.find("pacstrap").unwrap().command_line,
        "pacstrap -K /mnt base linux hyprland"
    );

    let executor = Arc::new(RecordingExecutor::uefi());
    run_events(Arc::clone(&executor), alice_config("/dev/sda"));
    assert_eq!(
        executor.find("pacstrap").unwrap().command_line,
        "pacstrap -K /mnt base linux linux-firmware base-devel vim git networkmanager"
    );
}

#[test]
fn test_passwords_are_fed_on_stdin_with_hidden_args() {
    let executor = Arc::new(RecordingExecutor::uefi());
    run_events(Arc::clone(&executor), alice_config("/dev/sda"));

    let calls = executor.calls();
    let chpasswd: Vec<_> = calls.iter().filter(|c| c.command_line.ends_with("chpasswd")).collect();
    assert_eq!(chpasswd.len(), 2);
    assert_eq!(chpasswd[0].stdin.as_deref(), Some("alice:x"));
    assert_eq!(chpasswd[1].stdin.as_deref(), Some("root:x"));
    for call in &chpasswd {
        assert!(!call.log_args);
        assert_eq!(call.log_line, "arch-chroot ... (args hidden)");
    }

    // Nothing else hides its arguments or receives input.
    for call in calls.iter().filter(|c| !c.command_line.ends_with("chpasswd")) {
        assert!(call.log_args, "`{}` should log its arguments", call.command_line);
        assert!(call.stdin.is_none());
        assert_eq!(call.log_line, call.command_line);
    }
}

#[test]
fn test_configuration_files_written() {
    let executor = Arc::new(RecordingExecutor::uefi());
    run_events(Arc::clone(&executor), alice_config("/dev/sda"));

    let writes = executor.writes();
    let content = |path: &str| {
        writes
            .iter()
            .find(|w| w.path.as_str() == path)
            .map(|w| w.content.clone())
            .unwrap_or_else(|| panic!("{} was not written", path))
    };
    assert_eq!(content("/mnt/etc/fstab"), FSTAB);
    assert_eq!(content("/mnt/etc/locale.conf"), "LANG=en_US.UTF-8\n");
    assert_eq!(content("/mnt/etc/hostname"), "endos\n");
    assert_eq!(content("/mnt/etc/hosts"), HOSTS_CONTENT);
    assert!(writes.iter().all(|w| !w.elevated));
}

#[test]
fn test_elevated_writes_follow_options() {
    let executor = Arc::new(RecordingExecutor::uefi());
    let installer = Installer::new(
        Arc::clone(&executor) as Arc<dyn CommandExecutor>,
        test_options().with_elevated_writes(true).with_mount_point("/tmp/target"),
    );
    let outcome = installer.start(alice_config("/dev/sda")).unwrap().wait(|_| {});
    assert!(outcome.success);

    let writes = executor.writes();
    assert_eq!(writes.len(), 4);
    assert!(writes.iter().all(|w| w.elevated && w.path.starts_with("/tmp/target/etc")));
}

#[test]
fn test_service_failure_does_not_abort() {
    let executor = Arc::new(RecordingExecutor::uefi().failing_on("systemctl enable sddm"));
    let events = run_events(Arc::clone(&executor), alice_config("/dev/sda"));

    let outcomes = finished(&events);
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].success, "{}", outcomes[0].message);

    let lines = executor.command_lines();
    for service in SERVICES {
        let expected = format!("arch-chroot /mnt systemctl enable {}", service);
        assert!(lines.contains(&expected), "missing `{}`", expected);
    }
    assert!(executor.find("arch-chroot /mnt systemctl enable sddm").is_some_and(|c| !c.check));
}

#[test]
fn test_best_effort_wipe_failure_does_not_abort() {
    let executor = Arc::new(RecordingExecutor::uefi().failing_on("wipefs").failing_on("umount"));
    let events = run_events(executor, alice_config("/dev/sda"));
    assert!(finished(&events)[0].success);
}

#[test]
fn test_stage_failure_is_fatal_and_reported_once() {
    let executor = Arc::new(RecordingExecutor::uefi().failing_on("mkfs.ext4"));
    let events = run_events(Arc::clone(&executor), alice_config("/dev/sda"));

    let outcomes = finished(&events);
    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].success);
    assert!(outcomes[0].message.contains("failed to format partitions on /dev/sda"));
    assert!(outcomes[0].message.contains("mkfs.ext4 -F /dev/sda2"));
    assert!(outcomes[0].message.contains("simulated failure"));

    let percents: Vec<u8> = progress(&events).iter().map(|s| s.percent).collect();
    assert_eq!(percents, vec![5, 15]);
    assert!(matches!(events.last(), Some(InstallEvent::Finished(_))));
    assert!(executor.find("mount").is_none());
    assert!(executor.find("pacstrap").is_none());
}

#[test]
fn test_partition_table_failure_is_fatal() {
    let executor = Arc::new(RecordingExecutor::bios().failing_on("mklabel"));
    let events = run_events(Arc::clone(&executor), alice_config("/dev/sda"));

    let outcome = &finished(&events)[0];
    assert!(!outcome.success);
    assert!(outcome.message.contains("failed to partition /dev/sda"));
    assert!(executor.find("mkfs").is_none());
}

#[test]
fn test_invalid_config_touches_nothing() {
    let executor = Arc::new(RecordingExecutor::uefi());
    let events = run_events(Arc::clone(&executor), InstallConfig::new("", "alice", "x"));

    assert_eq!(events.len(), 1);
    let outcome = &finished(&events)[0];
    assert!(!outcome.success);
    assert_eq!(outcome.message, "configuration error: no target disk selected");
    assert!(executor.calls().is_empty());
}

#[test]
fn test_runtime_env_replicated_when_present() {
    let executor = Arc::new(RecordingExecutor::uefi().with_runtime_env());
    run_events(Arc::clone(&executor), alice_config("/dev/sda"));

    let lines = executor.command_lines();
    assert!(lines.contains(&"test -d /usr/share/quickshell/venv".to_string()));
    assert!(lines.contains(&"mkdir -p /mnt/usr/share/quickshell".to_string()));
    assert!(lines.contains(
        &"cp -a /usr/share/quickshell/venv /mnt/usr/share/quickshell/venv".to_string()
    ));
}

#[test]
fn test_runtime_env_skipped_when_absent() {
    let executor = Arc::new(RecordingExecutor::uefi());
    run_events(Arc::clone(&executor), alice_config("/dev/sda"));
    assert!(!executor.command_lines().iter().any(|l| l.contains("quickshell/venv /mnt")));
}

#[test]
fn test_second_start_while_running_is_noop() {
    let executor = Arc::new(RecordingExecutor::uefi().gated());
    let installer = Installer::new(Arc::clone(&executor) as Arc<dyn CommandExecutor>, test_options());

    let first = installer.start(alice_config("/dev/sda")).expect("first start should run");
    assert!(installer.is_running());
    assert!(installer.start(alice_config("/dev/sdb")).is_none());
    assert!(installer.start(alice_config("/dev/sdc")).is_none());

    executor.open();
    let outcome = first.wait(|_| {});
    assert!(outcome.success, "{}", outcome.message);
    assert!(!installer.is_running());

    let lines = executor.command_lines();
    assert_eq!(lines.iter().filter(|l| *l == "test -d /sys/firmware/efi").count(), 1);
    assert!(!lines.iter().any(|l| l.contains("/dev/sdb") || l.contains("/dev/sdc")));
}

#[test]
fn test_events_received_on_another_thread_stay_ordered() {
    let executor = Arc::new(SimulatedExecutor::new().with_delay(Duration::from_millis(1)));
    let installer = Installer::new(executor, test_options());
    let handle = installer.start(alice_config("/dev/vda")).unwrap();

    let observer = thread::spawn(move || {
        let mut percents = Vec::new();
        let outcome = handle.wait(|stage| percents.push(stage.percent));
        (percents, outcome)
    });
    let (percents, outcome) = observer.join().unwrap();

    assert!(outcome.success);
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(percents.last(), Some(&100));
}
