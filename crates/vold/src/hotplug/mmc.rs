//! `mmc` subsystem: SD/MMC card insertion and removal

use super::{Hotplug, HotplugError, Result};
use crate::sysfs::AttributeReader;
use crate::topology::MediaKind;
use crate::volmgr::VolumeManager;
use common::HotplugEvent;
use tracing::{debug, info, warn};
use uevent::{Action, DecodeError, DeviceNumber, Event};

impl<V: VolumeManager, A: AttributeReader> Hotplug<V, A> {
    pub(super) fn handle_mmc(&mut self, event: &Event) -> Result<()> {
        match event.action {
            Action::Add => self.mmc_add(event),
            Action::Remove => self.mmc_remove(event),
            Action::Change => Ok(()),
        }
    }

    fn mmc_add(&mut self, event: &Event) -> Result<()> {
        match event.param("MMC_TYPE") {
            Some("SD") | Some("MMC") => {}
            other => {
                debug!("Ignoring mmc card type {:?} at {}", other, event.path);
                return Ok(());
            }
        }

        let attribute = &self.settings.serial_attribute;
        let serial = self
            .attributes
            .read_attribute(&event.path, attribute)
            .map_err(|source| HotplugError::Attribute {
                devpath: event.path.clone(),
                name: attribute.clone(),
                source,
            })?;
        let name = event
            .param("MMC_NAME")
            .ok_or(DecodeError::MissingParam("MMC_NAME"))?;

        self.topology
            .media
            .create(&event.path, name, &serial, MediaKind::Mmc)?;
        info!("Media '{}' ({}) inserted at {}", name, serial, event.path);

        self.notify(HotplugEvent::MediaInserted {
            devpath: event.path.clone(),
            name: name.to_string(),
            serial,
        });
        Ok(())
    }

    fn mmc_remove(&mut self, event: &Event) -> Result<()> {
        if self.topology.media.lookup_by_path(&event.path).is_none() {
            return Err(HotplugError::UnknownMedia(event.path.clone()));
        }

        let media = self.topology.media.destroy(&event.path)?;
        let orphaned: Vec<DeviceNumber> = media.block_devices().collect();
        if orphaned.is_empty() {
            info!("Media '{}' removed from {}", media.name, media.devpath);
        } else {
            // Block devices are not ejected first; their records outlive the media
            warn!(
                "Media '{}' removed from {} with block devices {:?} still attached",
                media.name, media.devpath, orphaned
            );
        }

        self.notify(HotplugEvent::MediaRemoved {
            devpath: media.devpath,
            orphaned,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{Harness, TEST_CARD_SERIAL};
    use super::*;
    use common::test_utils::{TEST_CARD_PATH, UeventBuilder, disk_uevent, mmc_uevent};

    #[test]
    fn test_sd_insert() {
        let mut h = Harness::new();
        h.hotplug
            .process_uevent(&mmc_uevent("add", "/devices/mmc0", "SD", "SDCard"))
            .unwrap();

        let media = h.hotplug.topology().media.lookup_by_path("/devices/mmc0").unwrap();
        assert_eq!(media.name, "SDCard");
        assert_eq!(media.serial, "0x0000beef");
        assert_eq!(media.kind, MediaKind::Mmc);
        assert_eq!(
            h.events(),
            vec![HotplugEvent::MediaInserted {
                devpath: "/devices/mmc0".to_string(),
                name: "SDCard".to_string(),
                serial: "0x0000beef".to_string(),
            }]
        );
    }

    #[test]
    fn test_mmc_type_accepted() {
        let mut h = Harness::new();
        h.hotplug
            .process_uevent(&mmc_uevent("add", TEST_CARD_PATH, "MMC", "eMMC"))
            .unwrap();
        assert_eq!(
            h.hotplug.topology().media.lookup_by_path(TEST_CARD_PATH).unwrap().serial,
            TEST_CARD_SERIAL
        );
    }

    #[test]
    fn test_other_card_types_ignored() {
        let mut h = Harness::new();
        h.hotplug
            .process_uevent(&mmc_uevent("add", "/devices/mmc0", "SDIO", "wifi"))
            .unwrap();

        let untyped = UeventBuilder::new("add", "/devices/mmc0")
            .subsystem("mmc")
            .param("MMC_NAME", "card")
            .build();
        h.hotplug.process_uevent(&untyped).unwrap();

        assert!(h.hotplug.topology().media.is_empty());
        assert!(h.events().is_empty());
    }

    #[test]
    fn test_serial_read_failure() {
        let mut h = Harness::new();
        let err = h
            .hotplug
            .process_uevent(&mmc_uevent("add", "/devices/mmc9", "SD", "card"))
            .unwrap_err();
        assert!(matches!(err, HotplugError::Attribute { ref name, .. } if name == "serial"));
        assert!(h.hotplug.topology().media.is_empty());
    }

    #[test]
    fn test_missing_name() {
        let mut h = Harness::new();
        let bytes = UeventBuilder::new("add", "/devices/mmc0")
            .subsystem("mmc")
            .param("MMC_TYPE", "SD")
            .build();
        assert!(matches!(
            h.hotplug.process_uevent(&bytes),
            Err(HotplugError::Decode(DecodeError::MissingParam("MMC_NAME")))
        ));
        assert!(h.hotplug.topology().media.is_empty());
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut h = Harness::with_card();
        let err = h
            .hotplug
            .process_uevent(&mmc_uevent("add", TEST_CARD_PATH, "SD", "other"))
            .unwrap_err();
        assert!(matches!(err, HotplugError::Topology(_)));
        assert_eq!(
            h.hotplug.topology().media.lookup_by_path(TEST_CARD_PATH).unwrap().name,
            "SU02G"
        );
    }

    #[test]
    fn test_remove_untracked() {
        let mut h = Harness::with_card();
        let err = h
            .hotplug
            .process_uevent(&mmc_uevent("remove", "/devices/mmc0", "SD", "SDCard"))
            .unwrap_err();
        assert!(matches!(err, HotplugError::UnknownMedia(p) if p == "/devices/mmc0"));
        assert_eq!(h.hotplug.topology().media.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut h = Harness::with_card();
        h.hotplug
            .process_uevent(&mmc_uevent("remove", TEST_CARD_PATH, "SD", "SU02G"))
            .unwrap();
        assert!(h.hotplug.topology().media.is_empty());
        assert_eq!(
            h.events(),
            vec![HotplugEvent::MediaRemoved {
                devpath: TEST_CARD_PATH.to_string(),
                orphaned: vec![],
            }]
        );
    }

    #[test]
    fn test_remove_with_attached_block_devices() {
        let mut h = Harness::with_card();
        let disk = DeviceNumber::new(179, 0);
        h.hotplug
            .process_uevent(&disk_uevent("add", TEST_CARD_PATH, "mmcblk0", disk))
            .unwrap();

        h.hotplug
            .process_uevent(&mmc_uevent("remove", TEST_CARD_PATH, "SD", "SU02G"))
            .unwrap();

        assert!(h.hotplug.topology().media.is_empty());
        // Not coordinated with the eject protocol: the block record lingers
        assert!(h.hotplug.topology().block_devices.lookup(disk).is_some());
        assert!(h.hotplug.volume_manager().ejects.is_empty());
        assert_eq!(
            h.events(),
            vec![HotplugEvent::MediaRemoved {
                devpath: TEST_CARD_PATH.to_string(),
                orphaned: vec![disk],
            }]
        );
    }
}
