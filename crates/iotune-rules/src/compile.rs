//! Rule configuration compiler
//!
//! Each top-level table of the TOML configuration describes one rule, in the
//! order the rules are tried:
//!
//! ```toml
//! [sb_data]
//! regex = '[gG].*[0-9][dD][sS][Bb][0-9]+'
//! transfer = 4096
//! readahead = 8192
//! scheduler = "deadline"
//! fifo_batch = 32
//! ```
//!
//! A broken section is logged and dropped; it never stops the remaining
//! sections from being compiled.

use crate::error::{ConfigError, RuleError};
use crate::rule::{anchor, SchedulerSpec, TuningRule, DEADLINE};
use crate::table::RuleTable;
use std::fs;
use std::path::Path;
use toml::{Table, Value};
use tracing::{debug, error, info, warn};

/// Transfer size used when a section does not set one (KiB)
pub const DEFAULT_TRANSFER_KB: u32 = 512;

const KNOWN_OPTIONS: &[&str] = &["regex", "transfer", "readahead", "scheduler", "fifo_batch"];

/// Result of compiling a configuration source
#[derive(Debug, Default)]
pub struct Compiled {
    /// Rules in configuration order
    pub table: RuleTable,
    /// Sections that were dropped, in configuration order
    pub rejected: Vec<RuleError>,
}

/// Read and compile a rule configuration file
pub fn load(path: impl AsRef<Path>) -> Result<Compiled, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let source: Table = text.parse().map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;

    let compiled = compile(&source);
    info!(
        "Loaded {} rules from {} ({} sections rejected)",
        compiled.table.len(),
        path.display(),
        compiled.rejected.len()
    );
    Ok(compiled)
}

/// Compile every section of `source` into a rule table
#[must_use]
pub fn compile(source: &Table) -> Compiled {
    let mut compiled = Compiled::default();

    for (section, value) in source {
        match compile_section(section, value) {
            Ok(rule) => {
                debug!("Section \"{}\": {}", section, rule);
                compiled.table.push(rule);
            }
            Err(e) => {
                error!("{}", e);
                compiled.rejected.push(e);
            }
        }
    }

    compiled
}

fn compile_section(section: &str, value: &Value) -> Result<TuningRule, RuleError> {
    let Value::Table(options) = value else {
        return Err(RuleError::NotATable {
            section: section.to_string(),
        });
    };

    for key in options.keys() {
        if !KNOWN_OPTIONS.contains(&key.as_str()) {
            warn!("Section \"{}\" unknown option \"{}\" ignored", section, key);
        }
    }

    let pattern = get_string(section, options, "regex")?.ok_or_else(|| RuleError::MissingRegex {
        section: section.to_string(),
    })?;
    let anchored = anchor(pattern).map_err(|e| RuleError::InvalidRegex {
        section: section.to_string(),
        source: Box::new(e),
    })?;

    let transfer_kb = match get_integer(section, options, "transfer", 1)? {
        Some(transfer) => transfer,
        None => {
            info!(
                "Section \"{}\" missing \"transfer\" option, using {}",
                section, DEFAULT_TRANSFER_KB
            );
            DEFAULT_TRANSFER_KB
        }
    };

    let readahead_kb = match get_integer(section, options, "readahead", 1)? {
        Some(readahead) => readahead,
        None => {
            let readahead =
                transfer_kb
                    .checked_mul(2)
                    .ok_or_else(|| RuleError::ReadaheadOverflow {
                        section: section.to_string(),
                        transfer: transfer_kb,
                    })?;
            info!(
                "Section \"{}\" missing \"readahead\" option, using {}",
                section, readahead
            );
            readahead
        }
    };

    let scheduler = match get_string(section, options, "scheduler")? {
        Some(name) if name == DEADLINE => {
            let fifo_batch = get_integer(section, options, "fifo_batch", 0)?;
            if fifo_batch.is_none() {
                info!(
                    "Section \"{}\" missing \"fifo_batch\" option, leaving device default",
                    section
                );
            }
            Some(SchedulerSpec::new(name, fifo_batch))
        }
        Some(name) => {
            if options.contains_key("fifo_batch") {
                debug!(
                    "Section \"{}\" \"fifo_batch\" ignored for scheduler {}",
                    section, name
                );
            }
            Some(SchedulerSpec::new(name, None))
        }
        None => {
            info!("Section \"{}\" missing \"scheduler\" option", section);
            None
        }
    };

    Ok(TuningRule::from_parts(
        pattern,
        anchored,
        transfer_kb,
        readahead_kb,
        scheduler,
    ))
}

fn get_string<'a>(
    section: &str,
    options: &'a Table,
    option: &str,
) -> Result<Option<&'a str>, RuleError> {
    match options.get(option) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim())),
        Some(_) => Err(RuleError::NotAString {
            section: section.to_string(),
            option: option.to_string(),
        }),
    }
}

/// Read an integer option of at least `min`; quoted decimal strings are accepted
fn get_integer(
    section: &str,
    options: &Table,
    option: &str,
    min: u32,
) -> Result<Option<u32>, RuleError> {
    let not_an_integer = || RuleError::NotAnInteger {
        section: section.to_string(),
        option: option.to_string(),
    };

    let value = match options.get(option) {
        None => return Ok(None),
        Some(Value::Integer(n)) => *n,
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| not_an_integer())?,
        Some(_) => return Err(not_an_integer()),
    };

    match u32::try_from(value) {
        Ok(n) if n >= min => Ok(Some(n)),
        _ => Err(RuleError::OutOfRange {
            section: section.to_string(),
            option: option.to_string(),
            min,
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::SchedulerOptions;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    fn compile_str(text: &str) -> Compiled {
        compile(&text.parse::<Table>().unwrap())
    }

    /// Log sink shared with a test subscriber
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn lines(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.0.lock().unwrap())
                .lines()
                .map(ToString::to_string)
                .collect()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Compile `text` and return the error-level log lines it produced
    fn compile_logging_errors(text: &str) -> (Compiled, Vec<String>) {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::ERROR)
            .with_ansi(false)
            .with_writer(captured.clone())
            .finish();
        let compiled = tracing::subscriber::with_default(subscriber, || compile_str(text));
        (compiled, captured.lines())
    }

    #[test]
    fn test_full_section() {
        let compiled = compile_str(
            r#"
            [sb_data]
            regex = '[gG].*[0-9][dD][sS][Bb][0-9]+'
            transfer = 4096
            readahead = 8192
            scheduler = "deadline"
            fifo_batch = 32
            "#,
        );
        assert!(compiled.rejected.is_empty());
        let rule = compiled.table.classify("g2DSB3").unwrap();
        assert_eq!(rule.transfer_kb, 4096);
        assert_eq!(rule.readahead_kb, 8192);
        assert_eq!(rule.scheduler, Some(SchedulerSpec::deadline(32)));
    }

    #[test]
    fn test_missing_regex_drops_only_that_section() {
        let (compiled, errors) = compile_logging_errors(
            r#"
            [first]
            regex = "a"

            [broken]
            transfer = 1024

            [last]
            regex = "c"
            "#,
        );
        assert_eq!(compiled.table.len(), 2);
        assert_eq!(compiled.rejected.len(), 1);
        assert!(matches!(
            &compiled.rejected[0],
            RuleError::MissingRegex { section } if section == "broken"
        ));
        let patterns: Vec<&str> = compiled.table.iter().map(TuningRule::pattern).collect();
        assert_eq!(patterns, vec!["a", "c"]);

        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(errors[0].contains("ERROR"));
        assert!(errors[0].contains(r#"section "broken" missing "regex" option"#));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let compiled = compile_str(
            r#"
            [bad]
            regex = "g(["
            "#,
        );
        assert!(compiled.table.is_empty());
        assert!(matches!(
            compiled.rejected[0],
            RuleError::InvalidRegex { .. }
        ));
    }

    #[test]
    fn test_deadline_without_fifo_batch_is_kept() {
        let compiled = compile_str(
            r#"
            [dl]
            regex = "g"
            scheduler = "deadline"
            "#,
        );
        assert!(compiled.rejected.is_empty());
        let rule = compiled.table.classify("g1").unwrap();
        let sched = rule.scheduler.as_ref().unwrap();
        assert_eq!(sched.name(), "deadline");
        assert_eq!(
            sched.options(),
            SchedulerOptions::Deadline { fifo_batch: None }
        );
    }

    #[test]
    fn test_deadline_fifo_batch_zero_is_kept() {
        let compiled = compile_str(
            r#"
            [dl]
            regex = "g"
            scheduler = "deadline"
            fifo_batch = 0

            [negative]
            regex = "h"
            scheduler = "deadline"
            fifo_batch = -1
            "#,
        );
        assert_eq!(compiled.table.len(), 1);
        let rule = compiled.table.classify("g1").unwrap();
        assert_eq!(
            rule.scheduler.as_ref().unwrap().options(),
            SchedulerOptions::Deadline {
                fifo_batch: Some(0)
            }
        );

        assert_eq!(compiled.rejected.len(), 1);
        assert!(matches!(
            &compiled.rejected[0],
            RuleError::OutOfRange { section, min: 0, value: -1, .. } if section == "negative"
        ));
    }

    #[test]
    fn test_readahead_defaults_to_twice_transfer() {
        let compiled = compile_str(
            r#"
            [only_transfer]
            regex = "g"
            transfer = 1000
            "#,
        );
        let rule = compiled.table.iter().next().unwrap();
        assert_eq!(rule.transfer_kb, 1000);
        assert_eq!(rule.readahead_kb, 2000);
        assert!(rule.scheduler.is_none());
    }

    #[test]
    fn test_defaults_without_numbers() {
        let compiled = compile_str(
            r#"
            [bare]
            regex = "g"
            "#,
        );
        let rule = compiled.table.iter().next().unwrap();
        assert_eq!(rule.transfer_kb, DEFAULT_TRANSFER_KB);
        assert_eq!(rule.readahead_kb, 2 * DEFAULT_TRANSFER_KB);
    }

    #[test]
    fn test_non_integer_options_are_rejected() {
        let compiled = compile_str(
            r#"
            [transfer]
            regex = "a"
            transfer = "big"

            [readahead]
            regex = "b"
            readahead = 1.5

            [fifo]
            regex = "c"
            scheduler = "deadline"
            fifo_batch = "many"

            [quoted]
            regex = "d"
            transfer = "2048"
            "#,
        );
        assert_eq!(compiled.table.len(), 1);
        assert_eq!(compiled.table.iter().next().unwrap().transfer_kb, 2048);

        let sections: Vec<&str> = compiled.rejected.iter().map(RuleError::section).collect();
        assert_eq!(sections, vec!["transfer", "readahead", "fifo"]);
        assert!(compiled
            .rejected
            .iter()
            .all(|e| matches!(e, RuleError::NotAnInteger { .. })));
    }

    #[test]
    fn test_out_of_range_values() {
        let compiled = compile_str(
            r#"
            [zero]
            regex = "a"
            transfer = 0

            [negative]
            regex = "b"
            readahead = -8

            [overflow]
            regex = "c"
            transfer = 4294967295
            "#,
        );
        assert!(compiled.table.is_empty());
        assert!(matches!(
            compiled.rejected[0],
            RuleError::OutOfRange { min: 1, value: 0, .. }
        ));
        assert!(matches!(
            compiled.rejected[1],
            RuleError::OutOfRange { value: -8, .. }
        ));
        assert!(matches!(
            compiled.rejected[2],
            RuleError::ReadaheadOverflow { .. }
        ));
    }

    #[test]
    fn test_fifo_batch_ignored_for_other_schedulers() {
        let compiled = compile_str(
            r#"
            [noop]
            regex = "g"
            scheduler = "noop"
            fifo_batch = "not even a number"
            "#,
        );
        assert!(compiled.rejected.is_empty());
        let rule = compiled.table.iter().next().unwrap();
        assert_eq!(rule.scheduler, Some(SchedulerSpec::noop()));
    }

    #[test]
    fn test_non_table_entry_is_rejected() {
        let compiled = compile_str(
            r#"
            stray = 1

            [ok]
            regex = "g"
            "#,
        );
        assert_eq!(compiled.table.len(), 1);
        assert!(matches!(
            &compiled.rejected[0],
            RuleError::NotATable { section } if section == "stray"
        ));
    }

    #[test]
    fn test_section_order_is_rule_order() {
        let compiled = compile_str(
            r#"
            [zzz_specific]
            regex = "gA1D"
            transfer = 8192

            [aaa_general]
            regex = "g"
            transfer = 512
            "#,
        );
        assert_eq!(compiled.table.classify("gA1D-primary").unwrap().transfer_kb, 8192);
        assert_eq!(compiled.table.classify("gB").unwrap().transfer_kb, 512);
    }

    #[test]
    fn test_sample_config_matches_builtin() {
        let compiled = compile_str(include_str!("../../../config/iotune.toml"));
        assert!(compiled.rejected.is_empty());

        let builtin = RuleTable::builtin();
        assert_eq!(compiled.table.len(), builtin.len());
        for (ours, theirs) in compiled.table.iter().zip(builtin.iter()) {
            assert_eq!(ours.pattern(), theirs.pattern());
            assert_eq!(ours.transfer_kb, theirs.transfer_kb);
            assert_eq!(ours.readahead_kb, theirs.readahead_kb);
            assert_eq!(ours.scheduler, theirs.scheduler);
        }
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[data]\nregex = 'g.*D'\ntransfer = 8192").unwrap();

        let compiled = load(file.path()).unwrap();
        assert_eq!(compiled.table.len(), 1);
        assert_eq!(compiled.table.iter().next().unwrap().readahead_kb, 16384);
    }

    #[test]
    fn test_load_errors() {
        let err = load("/nonexistent/iotune.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[data\nregex = ").unwrap();
        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
