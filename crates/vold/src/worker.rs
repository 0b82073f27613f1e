//! Hotplug worker thread
//!
//! Dedicated thread that owns the hotplug core. Kernel datagrams, injected
//! events, eject completions and queries all arrive as [`HotplugCommand`]s on
//! one queue and are handled strictly in order, one at a time.

use crate::hotplug::{Hotplug, HotplugSettings};
use crate::sysfs::AttributeReader;
use crate::volmgr::VolumeManager;
use common::{HotplugCommand, HotplugWorker};
use std::io;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

/// Hotplug worker thread
///
/// Runs the command loop until a Shutdown command is received or every
/// external command sender is dropped.
pub struct HotplugWorkerThread<V, A> {
    hotplug: Hotplug<V, A>,
    /// Communication channel with the Tokio runtime
    worker: HotplugWorker,
}

impl<V: VolumeManager, A: AttributeReader> HotplugWorkerThread<V, A> {
    pub fn new(worker: HotplugWorker, settings: HotplugSettings, volmgr: V, attributes: A) -> Self {
        // Eject tickets complete into our own queue so destroys stay ordered
        let hotplug = Hotplug::new(
            settings,
            volmgr,
            attributes,
            worker.loopback(),
            worker.event_tx.clone(),
        );
        Self { hotplug, worker }
    }

    pub fn run(mut self) {
        info!(
            "Hotplug worker started, handling: {}",
            self.hotplug.router().subsystems().collect::<Vec<_>>().join(", ")
        );

        loop {
            match self.worker.recv_command() {
                Ok(HotplugCommand::Shutdown) => {
                    info!("Hotplug worker shutting down");
                    break;
                }
                Ok(cmd) => self.handle_command(cmd),
                Err(e) => {
                    warn!("Command channel closed: {}", e);
                    break;
                }
            }
        }

        info!("Hotplug worker stopped");
    }

    /// Handle one command
    fn handle_command(&mut self, cmd: HotplugCommand) {
        // A panic while handling one event must not take the whole thread down
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.handle_command_inner(cmd)
        }));

        if let Err(e) = result {
            error!("Panic in hotplug command handler: {:?}", e);
        }
    }

    fn handle_command_inner(&mut self, cmd: HotplugCommand) {
        match cmd {
            HotplugCommand::Uevent { bytes } => {
                if let Err(e) = self.hotplug.process_uevent(&bytes) {
                    warn!("Failed to handle uevent: {}", e);
                }
            }

            HotplugCommand::Simulate { event, response } => {
                let result = self.hotplug.simulate(&event).map_err(|e| e.to_string());
                if let Err(e) = &result {
                    warn!("Simulated {} event failed: {}", event.subsystem, e);
                }
                let _ = response.send(result);
            }

            HotplugCommand::ExpectPartitions {
                disk,
                minors,
                response,
            } => {
                let result = self
                    .hotplug
                    .expect_partitions(disk, &minors)
                    .map_err(|e| e.to_string());
                let _ = response.send(result);
            }

            HotplugCommand::EjectComplete { devno } => {
                if let Err(e) = self.hotplug.finish_eject(devno) {
                    error!("Failed to destroy {} after eject: {}", devno, e);
                }
            }

            HotplugCommand::SetUmsEnabled { enabled } => {
                self.hotplug.set_ums_enabled(enabled);
            }

            HotplugCommand::UmsStatus => {
                self.hotplug.send_ums_status();
            }

            HotplugCommand::Snapshot { response } => {
                let snapshot = self.hotplug.snapshot();
                debug!(
                    "Snapshot: {} media, {} block devices",
                    snapshot.media.len(),
                    snapshot.block_devices.len()
                );
                let _ = response.send(snapshot);
            }

            HotplugCommand::Shutdown => {
                // Handled in the run loop
            }
        }
    }
}

/// Spawn the hotplug worker thread
pub fn spawn_hotplug_worker<V, A>(
    worker: HotplugWorker,
    settings: HotplugSettings,
    volmgr: V,
    attributes: A,
) -> io::Result<JoinHandle<()>>
where
    V: VolumeManager + Send + 'static,
    A: AttributeReader + Send + 'static,
{
    std::thread::Builder::new()
        .name("hotplug-worker".to_string())
        .spawn(move || HotplugWorkerThread::new(worker, settings, volmgr, attributes).run())
}
