//! Async channel bridge between the Tokio runtime and the hotplug worker thread
//!
//! The worker thread owns all topology state and handles one command at a
//! time. Everything else (the netlink listener, the CLI, volume manager
//! completions) talks to it through [`HotplugCommand`]s.

use crate::storage_types::TopologySnapshot;
use async_channel::{Receiver, Sender, WeakSender, bounded, unbounded};
use uevent::{DeviceNumber, SyntheticEvent};

/// Capacity of the worker -> runtime notification queue
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// Commands into the hotplug worker
#[derive(Debug)]
pub enum HotplugCommand {
    /// Raw datagram as received from the kernel
    Uevent { bytes: Vec<u8> },

    /// Inject an event without a kernel source
    Simulate {
        event: SyntheticEvent,
        /// Channel to send the dispatch result back
        response: tokio::sync::oneshot::Sender<Result<(), String>>,
    },

    /// Pre-create pending partition records for a disk
    ///
    /// Issued by the volume manager after it has read the partition table.
    ExpectPartitions {
        disk: DeviceNumber,
        minors: Vec<u32>,
        response: tokio::sync::oneshot::Sender<Result<(), String>>,
    },

    /// The volume manager released a device; it may now be destroyed
    EjectComplete { devno: DeviceNumber },

    /// Record whether mass storage is exported to the host
    SetUmsEnabled { enabled: bool },

    /// Re-broadcast the current mass-storage state
    UmsStatus,

    /// Take a snapshot of the topology
    Snapshot {
        response: tokio::sync::oneshot::Sender<TopologySnapshot>,
    },

    /// Shutdown the worker thread gracefully
    Shutdown,
}

/// Notifications out of the hotplug worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotplugEvent {
    UmsConnected,
    UmsDisconnected,
    UmsEnabled,
    UmsDisabled,
    MediaInserted {
        devpath: String,
        name: String,
        serial: String,
    },
    MediaRemoved {
        devpath: String,
        /// Block devices still attached when the media went away
        orphaned: Vec<DeviceNumber>,
    },
}

/// Handle for Tokio runtime (async)
#[derive(Clone)]
pub struct HotplugBridge {
    cmd_tx: Sender<HotplugCommand>,
    event_rx: Receiver<HotplugEvent>,
}

impl HotplugBridge {
    /// Send a command to the hotplug thread
    pub async fn send_command(&self, cmd: HotplugCommand) -> crate::Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Receive a notification from the hotplug thread
    pub async fn recv_event(&self) -> crate::Result<HotplugEvent> {
        self.event_rx
            .recv()
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Raw command sender for producers running on their own threads
    pub fn command_sender(&self) -> Sender<HotplugCommand> {
        self.cmd_tx.clone()
    }
}

/// Handle for the hotplug thread (blocking)
pub struct HotplugWorker {
    pub(crate) cmd_rx: Receiver<HotplugCommand>,
    /// Weak so the queue closes once every external sender is gone
    pub(crate) loopback: WeakSender<HotplugCommand>,
    /// Event sender (public so the worker's state holders can emit directly)
    pub event_tx: Sender<HotplugEvent>,
}

impl HotplugWorker {
    /// Receive a command (blocking)
    pub fn recv_command(&self) -> crate::Result<HotplugCommand> {
        self.cmd_rx
            .recv_blocking()
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Try to receive a command without blocking
    pub fn try_recv_command(&self) -> Option<HotplugCommand> {
        self.cmd_rx.try_recv().ok()
    }

    /// Send a notification without blocking the hotplug loop
    pub fn send_event(&self, event: HotplugEvent) -> crate::Result<()> {
        self.event_tx
            .try_send(event)
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Sender that feeds back into this worker's own queue
    ///
    /// Used for completions that must be applied in order with kernel events.
    /// The sender does not keep the queue open: upgrading it fails once the
    /// bridge and every [`HotplugBridge::command_sender`] clone are dropped.
    pub fn loopback(&self) -> WeakSender<HotplugCommand> {
        self.loopback.clone()
    }
}

/// Create the channel bridge between Tokio and the hotplug thread
///
/// Returns (HotplugBridge for Tokio, HotplugWorker for the hotplug thread).
/// The command queue is unbounded: the kernel never resends a uevent, and the
/// worker must be able to enqueue its own eject completions.
pub fn create_hotplug_bridge() -> (HotplugBridge, HotplugWorker) {
    let (cmd_tx, cmd_rx) = unbounded();
    let (event_tx, event_rx) = bounded(EVENT_QUEUE_CAPACITY);
    let loopback = cmd_tx.downgrade();

    (
        HotplugBridge { cmd_tx, event_rx },
        HotplugWorker {
            cmd_rx,
            loopback,
            event_tx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_bridge() {
        let (bridge, worker) = create_hotplug_bridge();

        let handle = std::thread::spawn(move || {
            let cmd = worker.recv_command().unwrap();
            matches!(cmd, HotplugCommand::Uevent { .. })
        });

        bridge
            .send_command(HotplugCommand::Uevent {
                bytes: b"add@/devices/x\0".to_vec(),
            })
            .await
            .unwrap();

        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_loopback_reaches_own_queue() {
        let (_bridge, worker) = create_hotplug_bridge();
        let devno = DeviceNumber::new(179, 1);

        worker
            .loopback()
            .upgrade()
            .unwrap()
            .send_blocking(HotplugCommand::EjectComplete { devno })
            .unwrap();

        match worker.try_recv_command() {
            Some(HotplugCommand::EjectComplete { devno: got }) => assert_eq!(got, devno),
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(worker.try_recv_command().is_none());
    }

    #[test]
    fn test_queue_closes_when_bridge_dropped() {
        let (bridge, worker) = create_hotplug_bridge();
        let loopback = worker.loopback();
        drop(bridge);

        assert!(loopback.upgrade().is_none());
        assert!(worker.recv_command().is_err());
    }

    #[test]
    fn test_send_event_full_queue() {
        let (_bridge, worker) = create_hotplug_bridge();
        for _ in 0..EVENT_QUEUE_CAPACITY {
            worker.send_event(HotplugEvent::UmsConnected).unwrap();
        }
        assert!(worker.send_event(HotplugEvent::UmsDisconnected).is_err());
    }
}
