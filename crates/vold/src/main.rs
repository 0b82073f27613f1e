//! vold
//!
//! Storage hotplug daemon: watches kernel uevents for SD/MMC cards, their
//! block devices and the USB mass-storage switch.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use common::{HotplugBridge, HotplugCommand, HotplugEvent, create_hotplug_bridge, setup_logging};
use std::path::PathBuf;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use uevent::SyntheticEvent;
use vold::config::{self, VoldConfig};
use vold::replay::read_replay_file;
use vold::service;
use vold::{StandaloneVolumeManager, SysfsReader, spawn_hotplug_worker};

#[derive(Parser, Debug)]
#[command(name = "vold")]
#[command(author, version, about = "Storage hotplug daemon")]
#[command(long_about = "
Watches kernel uevents for removable SD/MMC media and their block devices,
tracks disk and partition topology, and follows the USB mass-storage switch.

EXAMPLES:
    # Run the daemon with default config
    vold

    # Inject a card insertion and print the resulting topology
    vold --simulate mmc --devpath /devices/mmc0 --param MMC_TYPE=SD --param MMC_NAME=SDCard

    # Replay a recorded event sequence (one JSON event per line)
    vold --replay events.jsonl

CONFIGURATION:
    The daemon looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/vold/vold.toml
    3. /etc/vold/vold.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Inject one event for SUBSYSTEM instead of listening to the kernel
    #[arg(long, value_name = "SUBSYSTEM", requires = "devpath", conflicts_with = "replay")]
    simulate: Option<String>,

    /// Device path of the simulated event
    #[arg(long, value_name = "PATH")]
    devpath: Option<String>,

    /// Action of the simulated event (add, change, remove)
    #[arg(long, default_value = "add")]
    action: String,

    /// KEY=VALUE parameter of the simulated event (repeatable)
    #[arg(long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Replay events from a JSON-lines file
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = VoldConfig::default();
        let path = VoldConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        config::load_config(path).context("Failed to load configuration")?
    } else {
        VoldConfig::load_or_default()
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.daemon.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("vold v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", log_level);

    let (bridge, worker) = create_hotplug_bridge();
    let worker_handle = spawn_hotplug_worker(
        worker,
        config.hotplug_settings(),
        StandaloneVolumeManager::new(),
        SysfsReader::new(&config.sysfs.root),
    )
    .context("Failed to spawn hotplug worker")?;

    let result = if let Some(subsystem) = args.simulate.clone() {
        let event = SyntheticEvent {
            subsystem,
            path: args.devpath.clone().unwrap_or_default(),
            action: args.action.clone(),
            params: args.params.clone(),
        };
        simulate_mode(&bridge, vec![(0, event)]).await
    } else if let Some(ref path) = args.replay {
        match read_replay_file(path) {
            Ok(entries) => {
                let events = entries.into_iter().map(|e| (e.line, e.event)).collect();
                simulate_mode(&bridge, events).await
            }
            Err(e) => Err(e),
        }
    } else {
        run_daemon(&config, &bridge).await
    };

    info!("Shutting down hotplug worker...");
    if let Err(e) = bridge.send_command(HotplugCommand::Shutdown).await {
        error!("Error shutting down hotplug worker: {:#}", e);
    }
    if let Err(e) = worker_handle.join() {
        error!("Hotplug worker thread panicked: {:?}", e);
    }

    result
}

/// Feed synthetic events through the worker and print the final topology
async fn simulate_mode(bridge: &HotplugBridge, events: Vec<(usize, SyntheticEvent)>) -> Result<()> {
    let mut failures = 0;
    for (line, event) in events {
        let (tx, rx) = oneshot::channel();
        let label = format!("{} {} {}", event.subsystem, event.action, event.path);
        bridge
            .send_command(HotplugCommand::Simulate {
                event,
                response: tx,
            })
            .await
            .context("Failed to send Simulate command")?;

        match rx.await.context("Failed to receive simulate result")? {
            Ok(()) => info!("{}: ok", label),
            Err(e) if line > 0 => {
                failures += 1;
                eprintln!("line {}: {}: {}", line, label, e);
            }
            Err(e) => {
                failures += 1;
                eprintln!("{}: {}", label, e);
            }
        }
    }

    let (tx, rx) = oneshot::channel();
    bridge
        .send_command(HotplugCommand::Snapshot { response: tx })
        .await
        .context("Failed to send Snapshot command")?;
    let snapshot = rx.await.context("Failed to receive snapshot")?;
    println!(
        "{}",
        serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")?
    );

    if failures > 0 {
        return Err(anyhow!("{} event(s) failed", failures));
    }
    Ok(())
}

/// Listen to the kernel until Ctrl+C
#[cfg(target_os = "linux")]
async fn run_daemon(config: &VoldConfig, bridge: &HotplugBridge) -> Result<()> {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use vold::netlink::{UeventSocket, spawn_uevent_listener};

    let socket = UeventSocket::open(config.uevent.receive_buffer_bytes)
        .context("Failed to open kernel uevent socket")?;
    let stop = Arc::new(AtomicBool::new(false));
    let listener_handle = spawn_uevent_listener(socket, bridge.command_sender(), stop.clone())
        .context("Failed to spawn uevent listener")?;

    let service_mode = config.daemon.service_mode && service::is_systemd();
    let watchdog_handle = service_mode.then(service::spawn_watchdog_task);
    if service_mode {
        service::notify_ready().context("Failed to notify systemd ready")?;
        service::notify_status("Watching for storage hotplug events")
            .context("Failed to send status to systemd")?;
    }

    info!("Press Ctrl+C to shutdown");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => info!("Received Ctrl+C, shutting down gracefully..."),
                    Err(e) => error!("Error waiting for Ctrl+C: {}", e),
                }
                break;
            }
            event = bridge.recv_event() => match event {
                Ok(event) => log_event(&event),
                Err(e) => {
                    warn!("Hotplug notifications closed: {:#}", e);
                    break;
                }
            }
        }
    }

    if service_mode {
        service::notify_stopping().context("Failed to notify systemd stopping")?;
    }
    if let Some(handle) = watchdog_handle {
        handle.abort();
    }

    stop.store(true, Ordering::Relaxed);
    if let Err(e) = listener_handle.join() {
        error!("uevent listener thread panicked: {:?}", e);
    }

    info!("Daemon shutdown complete");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
async fn run_daemon(_config: &VoldConfig, _bridge: &HotplugBridge) -> Result<()> {
    Err(anyhow!(
        "Kernel uevents are only available on Linux; use --simulate or --replay"
    ))
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn log_event(event: &HotplugEvent) {
    match event {
        HotplugEvent::MediaInserted {
            devpath,
            name,
            serial,
        } => info!("Media inserted: {} ({}) at {}", name, serial, devpath),
        HotplugEvent::MediaRemoved { devpath, orphaned } if orphaned.is_empty() => {
            info!("Media removed: {}", devpath)
        }
        HotplugEvent::MediaRemoved { devpath, orphaned } => warn!(
            "Media removed: {} with {} block device(s) still tracked",
            devpath,
            orphaned.len()
        ),
        HotplugEvent::UmsConnected => info!("USB host connected"),
        HotplugEvent::UmsDisconnected => info!("USB host disconnected"),
        HotplugEvent::UmsEnabled => info!("Mass storage enabled"),
        HotplugEvent::UmsDisabled => info!("Mass storage disabled"),
    }
}
