//! Block device tunables under `/sys/block`

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Default location of per-device queue tunables
pub const SYS_BLOCK: &str = "/sys/block";

/// Lookup of devices in the tunable namespace
pub trait DeviceTopology {
    /// Canonical key for `device` (a name or path, symlinks resolved), or
    /// `None` if the device has no tunables.
    fn locate(&self, device: &str) -> Option<String>;

    /// Devices underneath a composite device; empty for plain disks
    fn members(&self, key: &str) -> Vec<String>;
}

/// Write access to per-device tunables
pub trait TunableWriter {
    /// Write `value` to tunable `variable` (e.g. `queue/read_ahead_kb`) of `key`
    fn write(&mut self, key: &str, variable: &str, value: &str) -> io::Result<()>;
}

/// sysfs-backed device lookup and tunable writes
#[derive(Debug, Clone)]
pub struct SysfsBlock {
    root: PathBuf,
}

impl SysfsBlock {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for SysfsBlock {
    fn default() -> Self {
        Self::new(SYS_BLOCK)
    }
}

impl DeviceTopology for SysfsBlock {
    fn locate(&self, device: &str) -> Option<String> {
        let path = Path::new(device);
        let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let key = resolved.file_name()?.to_str()?;
        self.root.join(key).is_dir().then(|| key.to_string())
    }

    fn members(&self, key: &str) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.root.join(key).join("slaves")) else {
            return Vec::new();
        };
        let mut members: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path().to_string_lossy().into_owned())
            .collect();
        members.sort();
        members
    }
}

impl TunableWriter for SysfsBlock {
    fn write(&mut self, key: &str, variable: &str, value: &str) -> io::Result<()> {
        // Tunables always exist; never create files
        let mut file = OpenOptions::new()
            .write(true)
            .open(self.root.join(key).join(variable))?;
        file.write_all(value.as_bytes())
    }
}

/// Writer that only logs what would be written
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRun;

impl TunableWriter for DryRun {
    fn write(&mut self, key: &str, variable: &str, value: &str) -> io::Result<()> {
        info!("Dry run: would set {}/{} to {}", key, variable, value);
        Ok(())
    }
}
