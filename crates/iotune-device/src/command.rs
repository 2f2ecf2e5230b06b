//! Streaming the output of discovery commands

use crate::error::{DiscoveryError, DiscoveryResult};
use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Run `command` through `sh -c` and hand its stdout to `parse` as it is
/// produced. A nonzero exit status is logged; whatever was parsed is kept.
pub fn stream_command<T, F>(command: &str, parse: F) -> DiscoveryResult<T>
where
    F: FnOnce(&mut dyn BufRead) -> T,
{
    debug!("Running `{}`", command);
    let mut child = Command::new("sh")
        .args(["-c", command])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|source| DiscoveryError::Spawn {
            command: command.to_string(),
            source,
        })?;

    let Some(stdout) = child.stdout.take() else {
        let _ = child.kill();
        let _ = child.wait();
        return Err(DiscoveryError::NoStdout {
            command: command.to_string(),
        });
    };

    let mut reader = BufReader::new(stdout);
    let parsed = parse(&mut reader);
    // Drain so the child never blocks on a full pipe
    let _ = std::io::copy(&mut reader, &mut std::io::sink());

    let status = child.wait().map_err(|source| DiscoveryError::Wait {
        command: command.to_string(),
        source,
    })?;
    if !status.success() {
        warn!("`{}` exited with {}", command, status);
    }

    Ok(parsed)
}

/// Iterate over the lines of `reader`, replacing invalid UTF-8.
///
/// Stops at the first read error.
pub fn lossy_lines<R: BufRead>(reader: R) -> impl Iterator<Item = String> {
    reader.split(b'\n').map_while(|chunk| match chunk {
        Ok(bytes) => Some(
            String::from_utf8_lossy(&bytes)
                .trim_end_matches('\r')
                .to_string(),
        ),
        Err(e) => {
            debug!("Stopped reading command output: {}", e);
            None
        }
    })
}
