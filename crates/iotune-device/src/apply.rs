//! Applying resolved tuning to a device and its paths

use crate::sysfs::{DeviceTopology, TunableWriter};
use crate::topology::MultipathBinding;
use iotune_rules::{ResolvedTuning, RuleTable};
use tracing::{debug, info, warn};

/// I/O scheduler selection
pub const SCHEDULER: &str = "queue/scheduler";
/// Maximum transfer size (KiB)
pub const MAX_SECTORS_KB: &str = "queue/max_sectors_kb";
/// Read-ahead window (KiB)
pub const READ_AHEAD_KB: &str = "queue/read_ahead_kb";
/// Deadline scheduler batch size
pub const FIFO_BATCH: &str = "queue/iosched/fifo_batch";

/// Outcome counters for one run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyReport {
    /// Tunable writes that succeeded
    pub written: usize,
    /// Tunable writes that failed
    pub failed: usize,
    /// Tunable writes not attempted because the device (or one of its
    /// members) was not found; one per write, not per device
    pub skipped: usize,
}

/// Writes tunables to devices, paths first
#[derive(Debug)]
pub struct Applier<T, W> {
    topology: T,
    writer: W,
    report: ApplyReport,
}

impl<T: DeviceTopology, W: TunableWriter> Applier<T, W> {
    pub fn new(topology: T, writer: W) -> Self {
        Self {
            topology,
            writer,
            report: ApplyReport::default(),
        }
    }

    /// Classify every bound device and apply the matching rule.
    ///
    /// Devices whose LUN matches no rule are left alone. Returns the number
    /// of devices that matched a rule.
    pub fn tune(&mut self, table: &RuleTable, bindings: &[MultipathBinding]) -> usize {
        let mut tuned = 0;
        for binding in bindings {
            let Some(rule) = table.classify(&binding.lun) else {
                debug!("{} (LUN {}) matches no rule", binding.device, binding.lun);
                continue;
            };
            info!("{} (LUN {}) matches {}", binding.device, binding.lun, rule);
            self.apply(&ResolvedTuning::new(binding.device.as_str(), rule));
            tuned += 1;
        }
        tuned
    }

    /// Apply every tunable of `tuning` to its device.
    ///
    /// The scheduler goes first so that the deadline `iosched` directory
    /// exists before fifo_batch is written. Failures are logged and counted.
    pub fn apply(&mut self, tuning: &ResolvedTuning) {
        let device = tuning.device.as_str();

        if let Some(scheduler) = &tuning.scheduler {
            self.set_variable(device, SCHEDULER, scheduler.name());
        }
        self.set_variable(device, MAX_SECTORS_KB, &tuning.transfer_kb.to_string());
        self.set_variable(device, READ_AHEAD_KB, &tuning.readahead_kb.to_string());
        if let Some(fifo_batch) = tuning.fifo_batch() {
            self.set_variable(device, FIFO_BATCH, &fifo_batch.to_string());
        }
    }

    /// Set one tunable on `device`, after setting it on every member device
    pub fn set_variable(&mut self, device: &str, variable: &str, value: &str) {
        let Some(key) = self.topology.locate(device) else {
            warn!("Unable to manipulate I/O tunable {} for {}", variable, device);
            self.report.skipped += 1;
            return;
        };

        for member in self.topology.members(&key) {
            self.set_variable(&member, variable, value);
        }

        match self.writer.write(&key, variable, value) {
            Ok(()) => {
                info!("Update {}/{} to {}", key, variable, value);
                self.report.written += 1;
            }
            Err(e) => {
                warn!("Failed to update {}/{} to {}: {}", key, variable, value, e);
                self.report.failed += 1;
            }
        }
    }

    #[must_use]
    pub const fn report(&self) -> ApplyReport {
        self.report
    }

    pub fn into_parts(self) -> (T, W, ApplyReport) {
        (self.topology, self.writer, self.report)
    }
}
