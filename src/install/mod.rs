//! Installation orchestration.
//!
//! [`Installer`] owns the executor and runtime options for one installer
//! instance and runs the [`Pipeline`] on a background worker. Progress and
//! the final outcome arrive over a single ordered channel held by the
//! returned [`InstallHandle`]; the caller drains it on its own thread.

mod chroot;
mod pipeline;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use anyhow::Result;
use tracing::{error, info, warn};

use crate::config::{InstallConfig, InstallerOptions};
use crate::disk::{DiskDescriptor, DiskManager};
use crate::executor::{CommandExecutor, panic_message};

pub use chroot::ArchChroot;
pub use pipeline::{HOSTNAME, HOSTS_CONTENT, Pipeline, SERVICES, Stage};

/// Completion message of a successful run.
pub const SUCCESS_MESSAGE: &str = "Installation Complete";

/// A progress report emitted at a stage boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStage {
    /// 0 to 100
    pub percent: u8,
    pub message: String,
}

impl PipelineStage {
    pub fn new(percent: u8, message: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

/// Final result of a run, delivered exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub success: bool,
    /// [`SUCCESS_MESSAGE`] or the error chain of the failed stage
    pub message: String,
}

impl InstallOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            message: SUCCESS_MESSAGE.to_string(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Events sent by the background worker, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallEvent {
    Progress(PipelineStage),
    /// Always the last event of a run
    Finished(InstallOutcome),
}

/// Clears the running flag when the worker ends, however it ends.
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One installer instance: at most one run at a time.
pub struct Installer {
    executor: Arc<dyn CommandExecutor>,
    options: Arc<InstallerOptions>,
    running: Arc<AtomicBool>,
}

impl Installer {
    pub fn new(executor: Arc<dyn CommandExecutor>, options: InstallerOptions) -> Self {
        Self {
            executor,
            options: Arc::new(options),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn executor(&self) -> &dyn CommandExecutor {
        self.executor.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn disk_manager(&self) -> DiskManager<'_> {
        DiskManager::new(self.executor.as_ref()).with_settle_delay(self.options.settle_delay)
    }

    /// Enumerates candidate target disks; empty when enumeration fails.
    pub fn scan_disks(&self) -> Vec<DiskDescriptor> {
        self.disk_manager().list_disks()
    }

    pub fn is_online(&self) -> bool {
        crate::network::is_online(self.executor.as_ref())
    }

    /// Package list text offered to the user before a run.
    pub fn default_packages(&self) -> String {
        crate::packages::default_package_text(&self.options.package_list)
    }

    /// Runs the pipeline on the calling thread.
    ///
    /// Fails immediately if a background run is active.
    pub fn run_blocking(
        &self,
        config: &InstallConfig,
        progress: &mut dyn FnMut(PipelineStage),
    ) -> Result<()> {
        if !self.try_begin() {
            anyhow::bail!("an installation is already running");
        }
        let _guard = RunGuard(Arc::clone(&self.running));
        Pipeline::new(self.executor.as_ref(), &self.options).run(config, progress)
    }

    fn try_begin(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Starts a run on a background worker.
    ///
    /// Returns `None` without side effects while another run is active.
    pub fn start(&self, config: InstallConfig) -> Option<InstallHandle> {
        if !self.try_begin() {
            warn!("installation already running, ignoring start request");
            return None;
        }

        let guard = RunGuard(Arc::clone(&self.running));
        let executor = Arc::clone(&self.executor);
        let options = Arc::clone(&self.options);
        let (tx, rx) = mpsc::channel();

        let spawned = thread::Builder::new()
            .name("endos-install".to_string())
            .spawn(move || run_worker(executor, options, config, tx, guard));

        match spawned {
            Ok(worker) => Some(InstallHandle {
                events: rx,
                worker: Some(worker),
            }),
            Err(e) => {
                error!("failed to spawn installation worker: {}", e);
                let (tx, rx) = mpsc::channel();
                let outcome =
                    InstallOutcome::failed(format!("failed to start installation: {}", e));
                // The receiver is still in scope, so this cannot fail.
                let _ = tx.send(InstallEvent::Finished(outcome));
                Some(InstallHandle {
                    events: rx,
                    worker: None,
                })
            }
        }
    }
}

fn run_worker(
    executor: Arc<dyn CommandExecutor>,
    options: Arc<InstallerOptions>,
    config: InstallConfig,
    tx: Sender<InstallEvent>,
    guard: RunGuard,
) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut progress = |stage: PipelineStage| {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(InstallEvent::Progress(stage));
        };
        Pipeline::new(executor.as_ref(), &options).run(&config, &mut progress)
    }));

    let outcome = match result {
        Ok(Ok(())) => {
            info!("installation complete");
            InstallOutcome::succeeded()
        }
        Ok(Err(e)) => {
            error!("installation failed: {:#}", e);
            InstallOutcome::failed(format!("{:#}", e))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("installation worker panicked: {}", message);
            InstallOutcome::failed(format!("installation worker panicked: {}", message))
        }
    };

    drop(guard);
    let _ = tx.send(InstallEvent::Finished(outcome));
}

/// Receiving end of one run.
#[derive(Debug)]
pub struct InstallHandle {
    events: Receiver<InstallEvent>,
    worker: Option<JoinHandle<()>>,
}

impl InstallHandle {
    /// Ordered event stream; ends after [`InstallEvent::Finished`].
    pub fn events(&self) -> &Receiver<InstallEvent> {
        &self.events
    }

    /// Blocks until the run finishes, passing each progress event to
    /// `on_progress` on the calling thread, and returns the outcome.
    pub fn wait(mut self, mut on_progress: impl FnMut(&PipelineStage)) -> InstallOutcome {
        let mut outcome = None;
        for event in self.events.iter() {
            match event {
                InstallEvent::Progress(stage) => on_progress(&stage),
                InstallEvent::Finished(finished) => {
                    outcome = Some(finished);
                    break;
                }
            }
        }

        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            error!("installation worker terminated abnormally");
        }

        outcome.unwrap_or_else(|| {
            InstallOutcome::failed("installation worker exited without reporting a result")
        })
    }
}
