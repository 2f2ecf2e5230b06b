//! Host discovery: which multipath device carries which LUN

use crate::command::stream_command;
use crate::inventory::{parse_inventory, DeviceLuns};
use crate::topology::{parse_topology, MultipathBinding};
use tracing::{error, info};

/// Storage inventory command
pub const DEFAULT_INVENTORY_COMMAND: &str = "SMdevices";
/// Multipath topology command
pub const DEFAULT_TOPOLOGY_COMMAND: &str = "multipath -ll";

/// Runs the inventory and topology commands.
///
/// Discovery is best-effort: a command that cannot be run is logged and
/// contributes nothing.
#[derive(Debug, Clone)]
pub struct Discovery {
    inventory_command: String,
    topology_command: String,
}

impl Default for Discovery {
    fn default() -> Self {
        Self::new(DEFAULT_INVENTORY_COMMAND, DEFAULT_TOPOLOGY_COMMAND)
    }
}

impl Discovery {
    pub fn new(inventory_command: impl Into<String>, topology_command: impl Into<String>) -> Self {
        Self {
            inventory_command: inventory_command.into(),
            topology_command: topology_command.into(),
        }
    }

    /// Collect the raw device to LUN name map
    #[must_use]
    pub fn collect_device_luns(&self) -> DeviceLuns {
        match stream_command(&self.inventory_command, |reader| parse_inventory(reader)) {
            Ok(luns) => {
                info!("Found {} LUN paths", luns.len());
                luns
            }
            Err(e) => {
                error!("{}", e);
                DeviceLuns::new()
            }
        }
    }

    /// Collect multipath devices whose LUN name is known
    #[must_use]
    pub fn collect_bindings(&self, luns: &DeviceLuns) -> Vec<MultipathBinding> {
        match stream_command(&self.topology_command, |reader| parse_topology(reader, luns)) {
            Ok(bindings) => {
                info!("Found {} multipath devices with a LUN name", bindings.len());
                bindings
            }
            Err(e) => {
                error!("{}", e);
                Vec::new()
            }
        }
    }

    /// Run both commands; the inventory is complete before topology parsing starts
    #[must_use]
    pub fn discover(&self) -> Vec<MultipathBinding> {
        let luns = self.collect_device_luns();
        self.collect_bindings(&luns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_discover_from_commands() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = dir.path().join("smdevices.txt");
        let topology = dir.path().join("multipath.txt");
        writeln!(
            std::fs::File::create(&inventory).unwrap(),
            "  /dev/sdc (/dev/sg3) [Storage Array fs1, Logical Drive g01DSB3, LUN 1]"
        )
        .unwrap();
        writeln!(
            std::fs::File::create(&topology).unwrap(),
            "3600a0b dm-4 NETAPP,INF\n| `- 1:0:0:1 sdc 8:32 active ready running"
        )
        .unwrap();

        let discovery = Discovery::new(
            format!("cat '{}'", inventory.display()),
            format!("cat '{}'", topology.display()),
        );
        let bindings = discovery.discover();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].device, "dm-4");
        assert_eq!(bindings[0].lun, "g01DSB3");
    }

    #[test]
    fn test_failing_commands_yield_nothing() {
        let discovery = Discovery::new("exit 1", "false");
        assert!(discovery.collect_device_luns().is_empty());
        assert!(discovery.discover().is_empty());
    }
}
