//! Tuning rule and resolved tuning values

use regex::Regex;
use std::fmt;

/// Scheduler name used by the deadline elevator
pub const DEADLINE: &str = "deadline";

/// Scheduler-specific extra parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerOptions {
    /// Scheduler takes no extra parameters
    NoExtra,
    /// Deadline elevator; `None` leaves the device's fifo_batch untouched
    Deadline { fifo_batch: Option<u32> },
}

/// I/O scheduler to select, together with its options
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerSpec {
    name: String,
    options: SchedulerOptions,
}

impl SchedulerSpec {
    /// Build a scheduler spec. `fifo_batch` is only kept for `deadline`.
    pub fn new(name: impl Into<String>, fifo_batch: Option<u32>) -> Self {
        let name = name.into();
        let options = if name == DEADLINE {
            SchedulerOptions::Deadline { fifo_batch }
        } else {
            SchedulerOptions::NoExtra
        };
        Self { name, options }
    }

    pub fn noop() -> Self {
        Self::new("noop", None)
    }

    pub fn deadline(fifo_batch: u32) -> Self {
        Self::new(DEADLINE, Some(fifo_batch))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn options(&self) -> SchedulerOptions {
        self.options
    }

    /// fifo_batch to apply, if this is deadline with a value
    #[must_use]
    pub const fn fifo_batch(&self) -> Option<u32> {
        match self.options {
            SchedulerOptions::Deadline { fifo_batch } => fifo_batch,
            SchedulerOptions::NoExtra => None,
        }
    }
}

impl fmt::Display for SchedulerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.options {
            SchedulerOptions::Deadline {
                fifo_batch: Some(batch),
            } => write!(f, "{} (fifo_batch={})", self.name, batch),
            SchedulerOptions::Deadline { fifo_batch: None } => {
                write!(f, "{} (fifo_batch=default)", self.name)
            }
            SchedulerOptions::NoExtra => f.write_str(&self.name),
        }
    }
}

/// Compile `pattern` so that it only matches at the start of the input
pub(crate) fn anchor(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})"))
}

/// One entry of the rule table
#[derive(Clone, Debug)]
pub struct TuningRule {
    /// Pattern as written in the configuration
    source: String,
    /// Pattern anchored at the start of the LUN name
    anchored: Regex,
    /// Maximum transfer size (KiB)
    pub transfer_kb: u32,
    /// Read-ahead window (KiB)
    pub readahead_kb: u32,
    /// Scheduler to select; `None` leaves the current one
    pub scheduler: Option<SchedulerSpec>,
}

impl TuningRule {
    /// Compile a rule. The pattern matches at the start of the LUN name, not
    /// the whole name.
    pub fn new(
        pattern: &str,
        transfer_kb: u32,
        readahead_kb: u32,
        scheduler: Option<SchedulerSpec>,
    ) -> Result<Self, regex::Error> {
        Ok(Self::from_parts(
            pattern,
            anchor(pattern)?,
            transfer_kb,
            readahead_kb,
            scheduler,
        ))
    }

    pub(crate) fn from_parts(
        pattern: &str,
        anchored: Regex,
        transfer_kb: u32,
        readahead_kb: u32,
        scheduler: Option<SchedulerSpec>,
    ) -> Self {
        Self {
            source: pattern.to_string(),
            anchored,
            transfer_kb,
            readahead_kb,
            scheduler,
        }
    }

    /// Pattern text as configured
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.source
    }

    /// Check whether the pattern matches at the start of `lun_name`
    #[must_use]
    pub fn matches(&self, lun_name: &str) -> bool {
        self.anchored.is_match(lun_name)
    }
}

impl fmt::Display for TuningRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> transfer={}KB readahead={}KB scheduler=",
            self.source, self.transfer_kb, self.readahead_kb
        )?;
        match &self.scheduler {
            Some(sched) => write!(f, "{sched}"),
            None => f.write_str("unchanged"),
        }
    }
}

/// Tuning values resolved for one multipath device
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedTuning {
    /// Logical device, e.g. `dm-4`
    pub device: String,
    pub transfer_kb: u32,
    pub readahead_kb: u32,
    pub scheduler: Option<SchedulerSpec>,
}

impl ResolvedTuning {
    pub fn new(device: impl Into<String>, rule: &TuningRule) -> Self {
        Self {
            device: device.into(),
            transfer_kb: rule.transfer_kb,
            readahead_kb: rule.readahead_kb,
            scheduler: rule.scheduler.clone(),
        }
    }

    /// fifo_batch to write, only for deadline with a configured value
    #[must_use]
    pub fn fifo_batch(&self) -> Option<u32> {
        self.scheduler.as_ref().and_then(SchedulerSpec::fifo_batch)
    }
}
