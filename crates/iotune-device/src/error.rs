//! Discovery error types

use thiserror::Error;

/// Failure running one of the discovery commands
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Command could not be started
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Command started without a readable stdout
    #[error("No output stream from `{command}`")]
    NoStdout { command: String },

    /// Waiting for the command to exit failed
    #[error("Failed to wait for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for discovery operations
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
