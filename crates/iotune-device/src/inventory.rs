//! Storage inventory parsing (`SMdevices` output)
//!
//! Only lines naming a device path and a logical drive are used, e.g.
//!
//! ```text
//!   /dev/sdc (/dev/sg3) [Storage Array fs1, Array Disk 0, Logical Drive g01DSB3, LUN 2, ...]
//! ```

use crate::command::lossy_lines;
use std::collections::HashMap;
use std::io::BufRead;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

static INVENTORY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(/dev/\S+).*Logical Drive\s+(\S+),").expect("inventory pattern compiles")
});

/// Map of raw device path (`/dev/sdc`) to LUN display name
#[derive(Debug, Clone, Default)]
pub struct DeviceLuns {
    luns: HashMap<String, String>,
}

impl DeviceLuns {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a LUN name; a later entry for the same path replaces the earlier one
    pub fn insert(&mut self, device: impl Into<String>, lun: impl Into<String>) {
        self.luns.insert(device.into(), lun.into());
    }

    /// LUN name for a raw device path
    #[must_use]
    pub fn get(&self, device: &str) -> Option<&str> {
        self.luns.get(device).map(String::as_str)
    }

    /// LUN name for a SCSI member as named in the topology (`sdc` → `/dev/sdc`)
    #[must_use]
    pub fn lookup_member(&self, scsi: &str) -> Option<&str> {
        self.get(&format!("/dev/{scsi}"))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.luns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.luns.is_empty()
    }
}

/// Extract the (device path, LUN name) pair from one inventory line
#[must_use]
pub fn parse_inventory_line(line: &str) -> Option<(&str, &str)> {
    let caps = INVENTORY_LINE.captures(line)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// Build the device to LUN map from inventory output. Lines that do not
/// carry a device and a logical drive are skipped.
pub fn parse_inventory<R: BufRead>(reader: R) -> DeviceLuns {
    let mut luns = DeviceLuns::new();
    for line in lossy_lines(reader) {
        if let Some((device, lun)) = parse_inventory_line(&line) {
            debug!("{} is LUN {}", device, lun);
            luns.insert(device, lun);
        }
    }
    luns
}
