//! Kernel uevent listener
//!
//! Owns the `NETLINK_KOBJECT_UEVENT` socket on its own thread and forwards
//! every datagram, undecoded, to the hotplug worker.

use async_channel::Sender;
use common::HotplugCommand;
use nix::errno::Errno;
use nix::sys::socket::{
    AddressFamily, MsgFlags, NetlinkAddr, SockFlag, SockProtocol, SockType, bind, recv,
    setsockopt, socket, sockopt,
};
use nix::sys::time::{TimeVal, TimeValLike};
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uevent::MAX_UEVENT_SIZE;

/// Kernel-originated uevents (group 2 carries udev's rebroadcasts)
const KERNEL_GROUP: u32 = 1;

/// How often a blocked receive wakes up to check for shutdown
const POLL_INTERVAL_MS: i64 = 500;

/// Bound netlink socket subscribed to kernel uevents
#[derive(Debug)]
pub struct UeventSocket {
    fd: OwnedFd,
}

impl UeventSocket {
    /// Open and bind the socket with a `receive_buffer` byte SO_RCVBUF
    pub fn open(receive_buffer: usize) -> nix::Result<Self> {
        let fd = socket(
            AddressFamily::Netlink,
            SockType::Datagram,
            SockFlag::SOCK_CLOEXEC,
            SockProtocol::NetlinkKObjectUEvent,
        )?;
        setsockopt(&fd, sockopt::RcvBuf, &receive_buffer)?;
        setsockopt(
            &fd,
            sockopt::ReceiveTimeout,
            &TimeVal::milliseconds(POLL_INTERVAL_MS),
        )?;
        bind(fd.as_raw_fd(), &NetlinkAddr::new(0, KERNEL_GROUP))?;
        Ok(Self { fd })
    }

    /// Receive one datagram; `EAGAIN` when the poll interval elapses
    pub fn recv(&self, buf: &mut [u8]) -> nix::Result<usize> {
        recv(self.fd.as_raw_fd(), buf, MsgFlags::empty())
    }
}

/// Spawn the listener thread
///
/// Runs until `stop` is set or the worker's command queue is closed.
pub fn spawn_uevent_listener(
    socket: UeventSocket,
    commands: Sender<HotplugCommand>,
    stop: Arc<AtomicBool>,
) -> io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("uevent-listener".to_string())
        .spawn(move || listen(socket, commands, stop))
}

fn listen(socket: UeventSocket, commands: Sender<HotplugCommand>, stop: Arc<AtomicBool>) {
    info!("uevent listener started");
    let mut buf = vec![0u8; MAX_UEVENT_SIZE];

    while !stop.load(Ordering::Relaxed) {
        match socket.recv(&mut buf) {
            Ok(0) => {}
            Ok(len) => {
                let bytes = buf[..len].to_vec();
                if commands.send_blocking(HotplugCommand::Uevent { bytes }).is_err() {
                    debug!("Hotplug worker gone, stopping listener");
                    break;
                }
            }
            Err(Errno::EAGAIN) | Err(Errno::EINTR) => {}
            Err(Errno::ENOBUFS) => {
                warn!("Kernel dropped uevents, receive buffer overrun");
            }
            Err(e) => {
                error!("uevent receive failed: {}", e);
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }

    info!("uevent listener stopped");
}
