//! USB mass-storage state
//!
//! Tracks whether a USB host is connected and whether mass storage is
//! currently exported to it, and tells the rest of the daemon when either
//! changes. Toggling the gadget LUNs themselves happens elsewhere.

use async_channel::Sender;
use common::HotplugEvent;
use tracing::{info, warn};

#[derive(Debug)]
pub struct UmsState {
    host_connected: bool,
    enabled: bool,
    events: Sender<HotplugEvent>,
}

impl UmsState {
    pub fn new(events: Sender<HotplugEvent>) -> Self {
        Self {
            host_connected: false,
            enabled: false,
            events,
        }
    }

    pub fn host_connected(&self) -> bool {
        self.host_connected
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Record the host connection state
    ///
    /// Losing the host also stops exporting mass storage.
    pub fn set_host_connected(&mut self, connected: bool) {
        info!("USB host {}", if connected { "connected" } else { "disconnected" });
        self.host_connected = connected;
        if !connected {
            self.set_enabled(false);
        }
        self.emit(if connected {
            HotplugEvent::UmsConnected
        } else {
            HotplugEvent::UmsDisconnected
        });
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.emit(if enabled {
            HotplugEvent::UmsEnabled
        } else {
            HotplugEvent::UmsDisabled
        });
    }

    /// Re-announce the current state
    pub fn send_status(&self) {
        self.emit(if self.enabled {
            HotplugEvent::UmsEnabled
        } else {
            HotplugEvent::UmsDisabled
        });
        self.emit(if self.host_connected {
            HotplugEvent::UmsConnected
        } else {
            HotplugEvent::UmsDisconnected
        });
    }

    fn emit(&self, event: HotplugEvent) {
        if let Err(e) = self.events.try_send(event) {
            warn!("Dropping mass-storage notification: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_channel::{Receiver, bounded};

    fn drain(rx: &Receiver<HotplugEvent>) -> Vec<HotplugEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[test]
    fn test_connect_emits_once() {
        let (tx, rx) = bounded(16);
        let mut ums = UmsState::new(tx);

        ums.set_host_connected(true);
        assert!(ums.host_connected());
        assert_eq!(drain(&rx), vec![HotplugEvent::UmsConnected]);
    }

    #[test]
    fn test_disconnect_disables_first() {
        let (tx, rx) = bounded(16);
        let mut ums = UmsState::new(tx);
        ums.set_host_connected(true);
        ums.set_enabled(true);
        drain(&rx);

        ums.set_host_connected(false);
        assert!(!ums.host_connected());
        assert!(!ums.enabled());
        assert_eq!(
            drain(&rx),
            vec![HotplugEvent::UmsDisabled, HotplugEvent::UmsDisconnected]
        );
    }

    #[test]
    fn test_send_status() {
        let (tx, rx) = bounded(16);
        let mut ums = UmsState::new(tx);
        ums.set_host_connected(true);
        drain(&rx);

        ums.send_status();
        assert_eq!(
            drain(&rx),
            vec![HotplugEvent::UmsDisabled, HotplugEvent::UmsConnected]
        );
    }

    #[test]
    fn test_full_queue_does_not_block() {
        let (tx, rx) = bounded(1);
        let mut ums = UmsState::new(tx);
        ums.set_host_connected(true);
        ums.set_host_connected(false);

        assert!(!ums.host_connected());
        assert_eq!(drain(&rx), vec![HotplugEvent::UmsConnected]);
    }
}
