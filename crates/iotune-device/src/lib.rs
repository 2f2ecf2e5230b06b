//! iotune Device - discovery and tunables
//!
//! This crate finds the multipath devices on the host together with the LUN
//! name behind each of them, and writes block queue tunables for a device and
//! all of its underlying paths.
//!
//! # Architecture
//!
//! ```text
//! SMdevices ──► inventory ──► DeviceLuns ─┐
//!                                          ├──► MultipathBinding (dm-N → LUN)
//! multipath -ll ──► topology ─────────────┘
//!
//! ResolvedTuning ──► Applier ──► DeviceTopology + TunableWriter (/sys/block)
//! ```

pub mod apply;
pub mod command;
pub mod discovery;
pub mod error;
pub mod inventory;
pub mod sysfs;
pub mod topology;

pub use apply::{ApplyReport, Applier};
pub use discovery::Discovery;
pub use error::{DiscoveryError, DiscoveryResult};
pub use inventory::{parse_inventory, DeviceLuns};
pub use sysfs::{DeviceTopology, DryRun, SysfsBlock, TunableWriter};
pub use topology::{parse_topology, MultipathBinding};
