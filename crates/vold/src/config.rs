//! Daemon configuration management

use crate::hotplug::HotplugSettings;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoldConfig {
    #[serde(default)]
    pub daemon: DaemonSettings,
    #[serde(default)]
    pub uevent: UeventSettings,
    #[serde(default)]
    pub sysfs: SysfsSettings,
    #[serde(default)]
    pub ums: UmsSettings,
    #[serde(default)]
    pub hotplug: HotplugRoutes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonSettings {
    #[serde(default = "DaemonSettings::default_log_level")]
    pub log_level: String,
    /// Report readiness and keepalives to systemd
    #[serde(default = "DaemonSettings::default_service_mode")]
    pub service_mode: bool,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            service_mode: Self::default_service_mode(),
        }
    }
}

impl DaemonSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }

    fn default_service_mode() -> bool {
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UeventSettings {
    /// SO_RCVBUF for the netlink socket; bursts at boot need headroom
    #[serde(default = "UeventSettings::default_receive_buffer")]
    pub receive_buffer_bytes: usize,
}

impl Default for UeventSettings {
    fn default() -> Self {
        Self {
            receive_buffer_bytes: Self::default_receive_buffer(),
        }
    }
}

impl UeventSettings {
    fn default_receive_buffer() -> usize {
        64 * 1024
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysfsSettings {
    #[serde(default = "SysfsSettings::default_root")]
    pub root: PathBuf,
    /// Card attribute read as the media serial number
    #[serde(default = "SysfsSettings::default_serial_attribute")]
    pub serial_attribute: String,
}

impl Default for SysfsSettings {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
            serial_attribute: Self::default_serial_attribute(),
        }
    }
}

impl SysfsSettings {
    fn default_root() -> PathBuf {
        PathBuf::from("/sys")
    }

    fn default_serial_attribute() -> String {
        "serial".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UmsSettings {
    /// `SWITCH_NAME` reported by the USB gadget driver
    #[serde(default = "UmsSettings::default_switch_name")]
    pub switch_name: String,
}

impl Default for UmsSettings {
    fn default() -> Self {
        Self {
            switch_name: Self::default_switch_name(),
        }
    }
}

impl UmsSettings {
    fn default_switch_name() -> String {
        "usb_mass_storage".to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HotplugRoutes {
    /// Subsystems to drop before dispatch
    #[serde(default)]
    pub ignore_subsystems: Vec<String>,
}

impl VoldConfig {
    /// Load configuration from file
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            // Try standard locations in order
            let candidates = vec![Self::default_path(), PathBuf::from("/etc/vold/vold.toml")];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: VoldConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("vold").join("vold.toml")
        } else {
            PathBuf::from(".config/vold/vold.toml")
        }
    }

    fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.daemon.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.daemon.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.uevent.receive_buffer_bytes == 0 {
            return Err(anyhow!("uevent.receive_buffer_bytes must be greater than 0"));
        }

        if self.sysfs.root.as_os_str().is_empty() {
            return Err(anyhow!("sysfs.root must not be empty"));
        }

        let attribute = &self.sysfs.serial_attribute;
        if attribute.is_empty() || attribute.contains('/') {
            return Err(anyhow!("Invalid sysfs.serial_attribute '{}'", attribute));
        }

        if self.ums.switch_name.trim().is_empty() {
            return Err(anyhow!("ums.switch_name must not be empty"));
        }

        if self
            .hotplug
            .ignore_subsystems
            .iter()
            .any(|s| s.trim().is_empty())
        {
            return Err(anyhow!("Empty entry in hotplug.ignore_subsystems"));
        }

        Ok(())
    }

    /// Settings for the hotplug core
    pub fn hotplug_settings(&self) -> HotplugSettings {
        HotplugSettings {
            ums_switch_name: self.ums.switch_name.clone(),
            serial_attribute: self.sysfs.serial_attribute.clone(),
            ignore_subsystems: self.hotplug.ignore_subsystems.clone(),
        }
    }
}

/// Load configuration from a path that may start with `~`
pub fn load_config(path: &str) -> Result<VoldConfig> {
    let path_buf = PathBuf::from(shellexpand::tilde(path).as_ref());
    VoldConfig::load(Some(path_buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VoldConfig::default();
        assert_eq!(config.daemon.log_level, "info");
        assert!(config.daemon.service_mode);
        assert_eq!(config.uevent.receive_buffer_bytes, 65536);
        assert_eq!(config.sysfs.root, PathBuf::from("/sys"));
        assert_eq!(config.ums.switch_name, "usb_mass_storage");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = VoldConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: VoldConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.sysfs.serial_attribute, config.sysfs.serial_attribute);
        assert_eq!(
            parsed.uevent.receive_buffer_bytes,
            config.uevent.receive_buffer_bytes
        );
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: VoldConfig = toml::from_str(
            r#"
            [daemon]
            log_level = "debug"

            [hotplug]
            ignore_subsystems = ["battery", "power_supply"]
            "#,
        )
        .unwrap();

        assert_eq!(config.daemon.log_level, "debug");
        assert!(config.daemon.service_mode);
        assert_eq!(config.ums.switch_name, "usb_mass_storage");

        let settings = config.hotplug_settings();
        assert_eq!(settings.ignore_subsystems, vec!["battery", "power_supply"]);
        assert_eq!(settings.serial_attribute, "serial");
    }

    #[test]
    fn test_validation() {
        let mut config = VoldConfig::default();
        config.daemon.log_level = "verbose".to_string();
        assert!(config.validate().is_err());

        let mut config = VoldConfig::default();
        config.uevent.receive_buffer_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = VoldConfig::default();
        config.sysfs.serial_attribute = "../serial".to_string();
        assert!(config.validate().is_err());

        let mut config = VoldConfig::default();
        config.ums.switch_name = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = VoldConfig::default();
        config.hotplug.ignore_subsystems = vec![String::new()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vold.toml");

        let mut config = VoldConfig::default();
        config.sysfs.root = dir.path().to_path_buf();
        config.save(&path).unwrap();

        let loaded = VoldConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.sysfs.root, dir.path());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vold.toml");
        fs::write(&path, "[uevent]\nreceive_buffer_bytes = 0\n").unwrap();

        assert!(load_config(path.to_str().unwrap()).is_err());
    }
}
