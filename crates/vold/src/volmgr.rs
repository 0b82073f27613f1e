//! Volume manager seam
//!
//! The volume manager decides what to do with disks once all of their
//! partitions are known (mount, format, share) and must release a block
//! device before the hotplug core frees it. The core only sees it through
//! [`VolumeManager`].

use crate::topology::BlockDevice;
use async_channel::WeakSender;
use std::fmt;
use common::HotplugCommand;
use thiserror::Error;
use tracing::{debug, info, warn};
use uevent::DeviceNumber;

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("Volume manager rejected disk {disk}: {reason}")]
    DiskRejected { disk: DeviceNumber, reason: String },

    #[error("Device {0} is busy")]
    Busy(DeviceNumber),

    #[error("Volume manager unavailable: {0}")]
    Unavailable(String),
}

/// Permission to destroy one block device, handed to the volume manager
/// with an eject notification
///
/// Completing the ticket queues [`HotplugCommand::EjectComplete`] on the
/// worker's own command queue, so the destroy runs in order with kernel
/// events whether the ticket is completed inline or from another thread.
/// A ticket does not keep the worker's queue open.
pub struct EjectTicket {
    devno: DeviceNumber,
    completions: WeakSender<HotplugCommand>,
    completed: bool,
}

impl fmt::Debug for EjectTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EjectTicket")
            .field("devno", &self.devno)
            .field("completed", &self.completed)
            .finish()
    }
}

impl EjectTicket {
    pub(crate) fn new(devno: DeviceNumber, completions: WeakSender<HotplugCommand>) -> Self {
        Self {
            devno,
            completions,
            completed: false,
        }
    }

    pub fn devno(&self) -> DeviceNumber {
        self.devno
    }

    /// Confirm the device has been released
    pub fn complete(mut self) {
        self.completed = true;
        let Some(completions) = self.completions.upgrade() else {
            warn!("Dropping eject completion for {}: worker queue closed", self.devno);
            return;
        };
        if let Err(e) = completions.try_send(HotplugCommand::EjectComplete { devno: self.devno }) {
            warn!("Dropping eject completion for {}: {}", self.devno, e);
        }
    }
}

impl Drop for EjectTicket {
    fn drop(&mut self) {
        if !self.completed {
            warn!(
                "Eject ticket for {} dropped without completion, record stays until restart",
                self.devno
            );
        }
    }
}

/// Consumer of disk readiness and eject notifications
pub trait VolumeManager {
    /// All partitions of `disk` have been observed
    fn consider_disk(&mut self, disk: DeviceNumber) -> Result<(), VolumeError>;

    /// `device` is going away; complete `ticket` once it is no longer in use
    fn notify_eject(&mut self, device: &BlockDevice, ticket: EjectTicket)
    -> Result<(), VolumeError>;
}

/// Volume manager used when the daemon runs without an external one
///
/// Nothing is ever mounted, so every eject is released immediately.
#[derive(Debug, Default)]
pub struct StandaloneVolumeManager {
    ready_disks: Vec<DeviceNumber>,
}

impl StandaloneVolumeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disks reported ready so far, oldest first
    pub fn ready_disks(&self) -> &[DeviceNumber] {
        &self.ready_disks
    }
}

impl VolumeManager for StandaloneVolumeManager {
    fn consider_disk(&mut self, disk: DeviceNumber) -> Result<(), VolumeError> {
        info!("Disk {} ready, all partitions present", disk);
        self.ready_disks.push(disk);
        Ok(())
    }

    fn notify_eject(
        &mut self,
        device: &BlockDevice,
        ticket: EjectTicket,
    ) -> Result<(), VolumeError> {
        debug!(
            "Releasing {} ({}) immediately",
            device.devno,
            device.devpath.as_deref().unwrap_or("pending")
        );
        self.ready_disks.retain(|d| *d != device.devno);
        ticket.complete();
        Ok(())
    }
}
