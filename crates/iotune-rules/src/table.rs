//! Ordered rule table and LUN classifier

use crate::rule::{SchedulerSpec, TuningRule};
use std::fmt;

/// Built-in naming conventions: (pattern, transfer KiB, readahead KiB, scheduler, fifo_batch)
const BUILTIN_RULES: &[(&str, u32, u32, &str, Option<u32>)] = &[
    // general, data
    (r"[gG].*[0-9]A[0-9]+D", 8192, 16384, "noop", None),
    // general, metadata
    (r"[gG].*[0-9][AT][0-9]+M", 1024, 2048, "noop", None),
    // DBHome, data
    (r"[gG].*[0-9]DBH[0-9]+D", 1024, 2048, "noop", None),
    // DBHome, metadata
    (r"[gG].*[0-9]DBH[0-9]+M", 1024, 2048, "noop", None),
    // BGSYS, data
    (r"[gG].*[0-9]BGS[0-9]+D", 1024, 2048, "noop", None),
    // BGSYS, metadata
    (r"[gG].*[0-9]BGS[0-9]+M", 1024, 2048, "noop", None),
    // admin
    (r"[gG].*[0-9]A[0-9]+A", 8192, 16384, "noop", None),
    // sb, data
    (r"[gG].*[0-9][dD][sS][Bb][0-9]+", 4096, 8192, "deadline", Some(32)),
    // sb, metadata
    (r"[gG].*[0-9][mM][sS][Bb][0-9]+", 4096, 8192, "deadline", Some(16)),
    // lb, data
    (r"[gG].*[0-9][dD][lL][Bb][0-9]+", 8192, 16384, "deadline", Some(32)),
    // lb, metadata
    (r"[gG].*[0-9][mM][lL][Bb][0-9]+", 4096, 8192, "deadline", Some(16)),
];

/// Ordered list of tuning rules; the first matching rule wins
#[derive(Clone, Debug, Default)]
pub struct RuleTable {
    rules: Vec<TuningRule>,
}

impl RuleTable {
    #[must_use]
    pub const fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// The default table used when no configuration file is given
    #[must_use]
    pub fn builtin() -> Self {
        let rules = BUILTIN_RULES
            .iter()
            .map(|&(pattern, transfer, readahead, sched, fifo_batch)| {
                TuningRule::new(
                    pattern,
                    transfer,
                    readahead,
                    Some(SchedulerSpec::new(sched, fifo_batch)),
                )
                .expect("built-in pattern compiles")
            })
            .collect();
        Self { rules }
    }

    /// Append a rule after all existing ones
    pub fn push(&mut self, rule: TuningRule) {
        self.rules.push(rule);
    }

    /// Find the rule for a LUN name.
    ///
    /// Rules are tried in order and the first whose pattern matches at the
    /// start of `lun_name` is returned. `None` means the device is left alone.
    #[must_use]
    pub fn classify(&self, lun_name: &str) -> Option<&TuningRule> {
        self.rules.iter().find(|rule| rule.matches(lun_name))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TuningRule> {
        self.rules.iter()
    }
}

impl FromIterator<TuningRule> for RuleTable {
    fn from_iter<I: IntoIterator<Item = TuningRule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for RuleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, rule) in self.rules.iter().enumerate() {
            writeln!(f, "{:>3}  {}", idx + 1, rule)?;
        }
        Ok(())
    }
}
