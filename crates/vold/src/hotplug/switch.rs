//! `switch` subsystem: USB host connection

use super::{Hotplug, Result};
use crate::sysfs::AttributeReader;
use crate::volmgr::VolumeManager;
use tracing::debug;
use uevent::{DecodeError, Event};

impl<V: VolumeManager, A: AttributeReader> Hotplug<V, A> {
    pub(super) fn handle_switch(&mut self, event: &Event) -> Result<()> {
        let name = event
            .param("SWITCH_NAME")
            .ok_or(DecodeError::MissingParam("SWITCH_NAME"))?;
        if name != self.settings.ums_switch_name {
            debug!("Ignoring switch '{}'", name);
            return Ok(());
        }

        let state = event
            .param("SWITCH_STATE")
            .ok_or(DecodeError::MissingParam("SWITCH_STATE"))?;
        self.ums.set_host_connected(state == "online");
        Ok(())
    }
}
