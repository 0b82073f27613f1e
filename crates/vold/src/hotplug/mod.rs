//! Hotplug core
//!
//! [`Hotplug`] owns everything that changes in response to kernel events:
//! the dispatch table, the media and block device stores, the volume
//! manager and the mass-storage state. It runs on the hotplug worker thread
//! and processes one event at a time, so none of it is shared or locked.

mod block;
mod error;
mod mmc;
pub mod router;
mod switch;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{HotplugError, Result};
pub use router::{Handler, Router};

use crate::sysfs::AttributeReader;
use crate::topology::Topology;
use crate::ums::UmsState;
use crate::volmgr::VolumeManager;
use async_channel::{Sender, WeakSender};
use common::{HotplugCommand, HotplugEvent, TopologySnapshot};
use tracing::{debug, trace, warn};
use uevent::{DeviceNumber, Event, SyntheticEvent, decode_event};

/// Tunables for the hotplug core
#[derive(Debug, Clone)]
pub struct HotplugSettings {
    /// `SWITCH_NAME` of the USB mass-storage switch
    pub ums_switch_name: String,
    /// Attribute holding the card serial number
    pub serial_attribute: String,
    pub ignore_subsystems: Vec<String>,
}

impl Default for HotplugSettings {
    fn default() -> Self {
        Self {
            ums_switch_name: "usb_mass_storage".to_string(),
            serial_attribute: "serial".to_string(),
            ignore_subsystems: Vec::new(),
        }
    }
}

pub struct Hotplug<V, A> {
    settings: HotplugSettings,
    router: Router,
    topology: Topology,
    volmgr: V,
    attributes: A,
    ums: UmsState,
    /// Where eject tickets deliver their completions
    completions: WeakSender<HotplugCommand>,
    events: Sender<HotplugEvent>,
}

impl<V: VolumeManager, A: AttributeReader> Hotplug<V, A> {
    pub fn new(
        settings: HotplugSettings,
        volmgr: V,
        attributes: A,
        completions: WeakSender<HotplugCommand>,
        events: Sender<HotplugEvent>,
    ) -> Self {
        let router = Router::default().without(&settings.ignore_subsystems);
        Self {
            settings,
            router,
            topology: Topology::default(),
            volmgr,
            attributes,
            ums: UmsState::new(events.clone()),
            completions,
            events,
        }
    }

    /// Decode a kernel datagram and dispatch it
    pub fn process_uevent(&mut self, bytes: &[u8]) -> Result<()> {
        let event = decode_event(bytes)?;
        if event.params.dropped() > 0 {
            warn!(
                "uevent {} for {} had {} parameters over capacity",
                event.seqnum,
                event.path,
                event.params.dropped()
            );
        }
        self.dispatch(&event)
    }

    /// Dispatch an injected event through the same path as kernel events
    pub fn simulate(&mut self, event: &SyntheticEvent) -> Result<()> {
        let event = event.to_event()?;
        debug!("Simulating {} {} on {}", event.subsystem, event.action, event.path);
        self.dispatch(&event)
    }

    pub fn dispatch(&mut self, event: &Event) -> Result<()> {
        let Some(handler) = self.router.resolve(&event.subsystem) else {
            trace!("No handler for subsystem '{}'", event.subsystem);
            return Ok(());
        };

        match handler {
            Handler::Block => self.handle_block(event),
            Handler::Mmc => self.handle_mmc(event),
            Handler::Switch => self.handle_switch(event),
            Handler::Battery | Handler::Bdi | Handler::PowerSupply => {
                dump_event(event);
                Ok(())
            }
        }
    }

    /// Pre-create pending partition records once the partition table of
    /// `disk` is known
    pub fn expect_partitions(&mut self, disk: DeviceNumber, minors: &[u32]) -> Result<()> {
        self.topology.create_pending_partitions(disk, minors)?;
        debug!("Expecting partitions {:?} on {}", minors, disk);
        Ok(())
    }

    pub fn set_ums_enabled(&mut self, enabled: bool) {
        self.ums.set_enabled(enabled);
    }

    pub fn send_ums_status(&self) {
        self.ums.send_status();
    }

    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            ums_host_connected: self.ums.host_connected(),
            ums_enabled: self.ums.enabled(),
            ..self.topology.snapshot()
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn ums(&self) -> &UmsState {
        &self.ums
    }

    pub fn volume_manager(&self) -> &V {
        &self.volmgr
    }

    pub fn volume_manager_mut(&mut self) -> &mut V {
        &mut self.volmgr
    }

    fn notify(&self, event: HotplugEvent) {
        if let Err(e) = self.events.try_send(event) {
            warn!("Dropping hotplug notification: {}", e);
        }
    }
}

/// Log handler for subsystems we watch but never act on
fn dump_event(event: &Event) {
    debug!(
        "uevent {} {} {} {}",
        event.seqnum, event.subsystem, event.action, event.path
    );
    for param in event.params.iter() {
        debug!("  {}", param);
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Harness;
    use common::HotplugEvent;
    use common::test_utils::{UeventBuilder, switch_uevent};
    use uevent::SyntheticEvent;

    #[test]
    fn test_unknown_subsystem_is_noop() {
        let mut h = Harness::new();
        let bytes = UeventBuilder::new("add", "/devices/virtual/net/lo")
            .subsystem("net")
            .build();

        h.hotplug.process_uevent(&bytes).unwrap();
        assert_eq!(h.hotplug.snapshot(), Default::default());
        assert!(h.events().is_empty());
    }

    #[test]
    fn test_missing_subsystem_is_noop() {
        let mut h = Harness::new();
        let bytes = UeventBuilder::new("add", "/devices/x").build();
        h.hotplug.process_uevent(&bytes).unwrap();
        assert!(h.hotplug.topology().media.is_empty());
    }

    #[test]
    fn test_passive_handlers_succeed() {
        let mut h = Harness::new();
        for subsystem in ["battery", "power_supply", "bdi"] {
            let bytes = UeventBuilder::new("change", "/devices/platform/battery")
                .subsystem(subsystem)
                .param("POWER_SUPPLY_CAPACITY", "42")
                .seqnum(7)
                .build();
            h.hotplug.process_uevent(&bytes).unwrap();
        }
        assert_eq!(h.hotplug.snapshot(), Default::default());
    }

    #[test]
    fn test_decode_error_is_reported() {
        let mut h = Harness::new();
        assert!(h.hotplug.process_uevent(b"").is_err());
        assert!(h.hotplug.process_uevent(b"no-at-sign\0ACTION=add\0").is_err());
    }

    #[test]
    fn test_ignored_subsystem() {
        let mut h = Harness::with_ignored(&["switch"]);
        h.hotplug
            .process_uevent(&switch_uevent("usb_mass_storage", "online"))
            .unwrap();
        assert!(!h.hotplug.ums().host_connected());
    }

    #[test]
    fn test_simulate_rejects_bad_action() {
        let mut h = Harness::new();
        let event = SyntheticEvent {
            subsystem: "mmc".to_string(),
            path: "/devices/mmc0".to_string(),
            action: "bind".to_string(),
            params: Vec::new(),
        };
        assert!(h.hotplug.simulate(&event).is_err());
    }

    #[test]
    fn test_snapshot_carries_ums_state() {
        let mut h = Harness::new();
        h.hotplug
            .process_uevent(&switch_uevent("usb_mass_storage", "online"))
            .unwrap();
        h.hotplug.set_ums_enabled(true);

        let snapshot = h.hotplug.snapshot();
        assert!(snapshot.ums_host_connected);
        assert!(snapshot.ums_enabled);

        h.events();
        h.hotplug.send_ums_status();
        assert_eq!(
            h.events(),
            vec![HotplugEvent::UmsEnabled, HotplugEvent::UmsConnected]
        );
    }
}
