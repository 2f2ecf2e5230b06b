//! Error types for rule compilation

use std::path::PathBuf;
use thiserror::Error;

/// A configuration section that could not be turned into a rule.
///
/// These are entry-scoped: the section is dropped and compilation continues.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("section \"{section}\" is not a table")]
    NotATable { section: String },

    #[error("section \"{section}\" missing \"regex\" option")]
    MissingRegex { section: String },

    #[error("section \"{section}\" invalid \"regex\" option: {source}")]
    InvalidRegex {
        section: String,
        #[source]
        source: Box<regex::Error>,
    },

    #[error("section \"{section}\", \"{option}\" option must be integer")]
    NotAnInteger { section: String, option: String },

    #[error("section \"{section}\", \"{option}\" option must be between {min} and {max}, got {value}", max = u32::MAX)]
    OutOfRange {
        section: String,
        option: String,
        min: u32,
        value: i64,
    },

    #[error("section \"{section}\", \"{option}\" option must be a string")]
    NotAString { section: String, option: String },

    #[error("section \"{section}\", default \"readahead\" overflows for transfer {transfer}")]
    ReadaheadOverflow { section: String, transfer: u32 },
}

impl RuleError {
    /// Name of the section the error belongs to
    #[must_use]
    pub fn section(&self) -> &str {
        match self {
            Self::NotATable { section }
            | Self::MissingRegex { section }
            | Self::InvalidRegex { section, .. }
            | Self::NotAnInteger { section, .. }
            | Self::OutOfRange { section, .. }
            | Self::NotAString { section, .. }
            | Self::ReadaheadOverflow { section, .. } => section,
        }
    }
}

/// Failure to read or parse the configuration file as a whole
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },
}
