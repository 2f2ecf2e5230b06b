//! Multipath topology parsing (`multipath -ll` output)
//!
//! A device header names the WWN and the device-mapper node; the path lines
//! below it name the SCSI devices:
//!
//! ```text
//! 360080e50001b0c6e000001a74d3f5f1c dm-4 NETAPP,INF-01-00
//! size=2.0T features='0' hwhandler='1 rdac' wp=rw
//! |-+- policy='round-robin 0' prio=6 status=active
//! | `- 1:0:0:1 sdc 8:32 active ready running
//! `-+- policy='round-robin 0' prio=1 status=enabled
//!   `- 2:0:0:1 sdg 8:96 active ready running
//! ```
//!
//! The first path of a device whose SCSI node has a known LUN name decides the
//! binding for that device.

use crate::command::lossy_lines;
use crate::inventory::DeviceLuns;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

static HEADER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<wwn>[0-9a-f]+)\s+(?P<dev>dm-\S+)(?:\s|$)").expect("header pattern compiles")
});

static MEMBER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\|.*\s+(?P<scsi>sd\S+)(?:\s|$)").expect("member pattern compiles")
});

/// A multipath device resolved to the LUN behind it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipathBinding {
    /// Device-mapper node, e.g. `dm-4`
    pub device: String,
    /// World wide name from the header line
    pub wwn: String,
    /// SCSI path that resolved the LUN name, e.g. `sdc`
    pub member: String,
    /// LUN display name
    pub lun: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParseState {
    /// No header waiting for a path
    Idle,
    /// Header seen, no path of it resolved yet
    PendingMember { wwn: String, device: String },
}

/// Line-by-line topology parser
#[derive(Debug)]
pub struct TopologyParser<'a> {
    luns: &'a DeviceLuns,
    state: ParseState,
    bindings: BTreeMap<String, MultipathBinding>,
}

impl<'a> TopologyParser<'a> {
    #[must_use]
    pub const fn new(luns: &'a DeviceLuns) -> Self {
        Self {
            luns,
            state: ParseState::Idle,
            bindings: BTreeMap::new(),
        }
    }

    /// Feed one line of `multipath -ll` output
    pub fn feed_line(&mut self, line: &str) {
        if let Some(caps) = HEADER_LINE.captures(line) {
            self.abandon_pending();
            self.state = ParseState::PendingMember {
                wwn: caps["wwn"].to_string(),
                device: caps["dev"].to_string(),
            };
            return;
        }

        let ParseState::PendingMember { wwn, device } = &self.state else {
            return;
        };
        let Some(caps) = MEMBER_LINE.captures(line) else {
            return;
        };
        let scsi = &caps["scsi"];

        match self.luns.lookup_member(scsi) {
            Some(lun) => {
                debug!("{} ({}) is LUN {} via {}", device, wwn, lun, scsi);
                let binding = MultipathBinding {
                    device: device.clone(),
                    wwn: wwn.clone(),
                    member: scsi.to_string(),
                    lun: lun.to_string(),
                };
                self.bindings.insert(binding.device.clone(), binding);
                self.state = ParseState::Idle;
            }
            None => debug!("{} path {} has no known LUN name", device, scsi),
        }
    }

    /// Finish parsing and return one binding per device, ordered by device name
    #[must_use]
    pub fn finish(mut self) -> Vec<MultipathBinding> {
        self.abandon_pending();
        self.bindings.into_values().collect()
    }

    fn abandon_pending(&mut self) {
        if let ParseState::PendingMember { wwn, device } = &self.state {
            warn!(
                "No LUN name found for any path of {} ({}), leaving it untuned",
                device, wwn
            );
        }
        self.state = ParseState::Idle;
    }
}

/// Parse topology output into device bindings, resolving SCSI paths through
/// the inventory map. Unrecognized lines are skipped.
pub fn parse_topology<R: BufRead>(reader: R, luns: &DeviceLuns) -> Vec<MultipathBinding> {
    let mut parser = TopologyParser::new(luns);
    for line in lossy_lines(reader) {
        parser.feed_line(&line);
    }
    parser.finish()
}
