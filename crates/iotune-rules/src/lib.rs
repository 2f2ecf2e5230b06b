//! iotune Rules - LUN classification
//!
//! This crate holds the ordered table of tuning rules, the classifier that
//! resolves a LUN name to a rule, and the compiler that builds a rule table
//! from a TOML configuration file.
//!
//! # Matching policy
//!
//! Rules are evaluated in declaration order and the first rule whose pattern
//! matches at the start of the LUN name wins. There is no priority field and
//! no longest-match: specific patterns must be listed before general ones.

pub mod compile;
pub mod error;
pub mod rule;
pub mod table;

pub use compile::{compile, load, Compiled};
pub use error::{ConfigError, RuleError};
pub use rule::{ResolvedTuning, SchedulerOptions, SchedulerSpec, TuningRule};
pub use table::RuleTable;
