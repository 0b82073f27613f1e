//! sysfs attribute access

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Attribute values longer than this are truncated
pub const MAX_ATTRIBUTE_LEN: usize = 80;

/// Reads small text attributes of a device
pub trait AttributeReader {
    /// Read attribute `name` of the device at `devpath`, trimmed
    fn read_attribute(&self, devpath: &str, name: &str) -> io::Result<String>;
}

/// Reads attributes from `<root>/<devpath>/<name>`
#[derive(Debug, Clone)]
pub struct SysfsReader {
    root: PathBuf,
}

impl SysfsReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn attribute_path(&self, devpath: &str, name: &str) -> io::Result<PathBuf> {
        // Device paths come off the wire; keep them under the root
        let escapes = devpath.split('/').any(|c| c == "..");
        if escapes || name.is_empty() || name.contains('/') || name == ".." {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Refusing attribute {:?} of {:?}", name, devpath),
            ));
        }
        Ok(self.root.join(devpath.trim_start_matches('/')).join(name))
    }
}

impl Default for SysfsReader {
    fn default() -> Self {
        Self::new("/sys")
    }
}

impl AttributeReader for SysfsReader {
    fn read_attribute(&self, devpath: &str, name: &str) -> io::Result<String> {
        let path = self.attribute_path(devpath, name)?;
        let mut buf = Vec::with_capacity(MAX_ATTRIBUTE_LEN);
        File::open(&path)?
            .take(MAX_ATTRIBUTE_LEN as u64)
            .read_to_end(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).trim().to_string())
    }
}
