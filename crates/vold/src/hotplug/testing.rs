//! Fixtures for hotplug handler tests

use super::{Hotplug, HotplugSettings};
use crate::sysfs::AttributeReader;
use crate::topology::BlockDevice;
use crate::volmgr::{EjectTicket, VolumeError, VolumeManager};
use async_channel::{Receiver, Sender, bounded, unbounded};
use common::test_utils::{TEST_CARD_PATH, mmc_uevent};
use common::{EVENT_QUEUE_CAPACITY, HotplugCommand, HotplugEvent};
use std::collections::HashMap;
use std::io;
use uevent::DeviceNumber;

pub const TEST_CARD_SERIAL: &str = "0x1d3a0e11";

/// Records every call; ejects complete inline unless `hold_tickets` is set
#[derive(Debug, Default)]
pub struct MockVolumeManager {
    pub considered: Vec<DeviceNumber>,
    pub ejects: Vec<DeviceNumber>,
    pub hold_tickets: bool,
    pub fail_consider: bool,
    pub fail_eject: bool,
    held: Vec<EjectTicket>,
}

impl MockVolumeManager {
    pub fn release_all(&mut self) {
        for ticket in self.held.drain(..) {
            ticket.complete();
        }
    }
}

impl VolumeManager for MockVolumeManager {
    fn consider_disk(&mut self, disk: DeviceNumber) -> Result<(), VolumeError> {
        if self.fail_consider {
            return Err(VolumeError::DiskRejected {
                disk,
                reason: "mock".to_string(),
            });
        }
        self.considered.push(disk);
        Ok(())
    }

    fn notify_eject(
        &mut self,
        device: &BlockDevice,
        ticket: EjectTicket,
    ) -> Result<(), VolumeError> {
        if self.fail_eject {
            drop(ticket);
            return Err(VolumeError::Busy(device.devno));
        }
        self.ejects.push(device.devno);
        if self.hold_tickets {
            self.held.push(ticket);
        } else {
            ticket.complete();
        }
        Ok(())
    }
}

/// Attribute values keyed by (devpath, name)
#[derive(Debug, Default)]
pub struct StubAttributes {
    values: HashMap<(String, String), String>,
}

impl StubAttributes {
    pub fn with(mut self, devpath: &str, name: &str, value: &str) -> Self {
        self.values
            .insert((devpath.to_string(), name.to_string()), value.to_string());
        self
    }
}

impl AttributeReader for StubAttributes {
    fn read_attribute(&self, devpath: &str, name: &str) -> io::Result<String> {
        self.values
            .get(&(devpath.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such attribute"))
    }
}

pub struct Harness {
    pub hotplug: Hotplug<MockVolumeManager, StubAttributes>,
    commands: Receiver<HotplugCommand>,
    events: Receiver<HotplugEvent>,
    /// Keeps the completion queue open for the tickets' weak senders
    _completions: Sender<HotplugCommand>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(HotplugSettings::default())
    }

    pub fn with_ignored(ignored: &[&str]) -> Self {
        Self::with_settings(HotplugSettings {
            ignore_subsystems: ignored.iter().map(|s| s.to_string()).collect(),
            ..HotplugSettings::default()
        })
    }

    fn with_settings(settings: HotplugSettings) -> Self {
        let (cmd_tx, commands) = unbounded();
        let (event_tx, events) = bounded(EVENT_QUEUE_CAPACITY);
        let attributes = StubAttributes::default()
            .with(TEST_CARD_PATH, "serial", TEST_CARD_SERIAL)
            .with("/devices/mmc0", "serial", "0x0000beef");
        Self {
            hotplug: Hotplug::new(
                settings,
                MockVolumeManager::default(),
                attributes,
                cmd_tx.downgrade(),
                event_tx,
            ),
            commands,
            events,
            _completions: cmd_tx,
        }
    }

    /// Harness with an SD card already inserted at [`TEST_CARD_PATH`]
    pub fn with_card() -> Self {
        let mut h = Self::new();
        h.hotplug
            .process_uevent(&mmc_uevent("add", TEST_CARD_PATH, "SD", "SU02G"))
            .unwrap();
        h.events();
        h
    }

    /// Apply queued eject completions the way the worker loop would
    pub fn pump_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(cmd) = self.commands.try_recv() {
            if let HotplugCommand::EjectComplete { devno } = cmd {
                self.hotplug.finish_eject(devno).unwrap();
                applied += 1;
            }
        }
        applied
    }

    /// Drain notifications emitted so far
    pub fn events(&self) -> Vec<HotplugEvent> {
        std::iter::from_fn(|| self.events.try_recv().ok()).collect()
    }
}
