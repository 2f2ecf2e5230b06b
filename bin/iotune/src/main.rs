//! iotune - block device I/O tuning for multipath LUNs
//!
//! Finds the multipath devices on this host, classifies each one by the name
//! of the LUN behind it and writes the matching queue tunables (scheduler,
//! max transfer size, read-ahead, deadline fifo_batch) to the device and all
//! of its paths.
//!
//! Usage:
//!   iotune -v
//!   iotune --config /etc/iotune/rules.toml --log /var/log/iotune.log
//!   iotune --list-rules

mod logging;

use anyhow::Result;
use clap::{ArgAction, Parser};
use iotune_device::discovery::{DEFAULT_INVENTORY_COMMAND, DEFAULT_TOPOLOGY_COMMAND};
use iotune_device::sysfs::SYS_BLOCK;
use iotune_device::{
    Applier, ApplyReport, DeviceTopology, Discovery, DryRun, MultipathBinding, SysfsBlock,
    TunableWriter,
};
use iotune_rules::RuleTable;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "iotune")]
#[command(about = "Tune block device I/O elevators of multipath LUNs by LUN name")]
#[command(version, disable_help_flag = true)]
struct Args {
    /// Display this help
    #[arg(short = 'h', long, short_alias = '?', action = ArgAction::Help)]
    help: Option<bool>,

    /// Rule configuration file (built-in rules when omitted)
    #[arg(short, long, value_name = "FNAME")]
    config: Option<PathBuf>,

    /// Log destination: "-" or "stderr", or a file to append to
    #[arg(short, long, value_name = "LNAME")]
    log: Option<String>,

    /// Verbose logging (repeat for debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Log the tunables that would be written without writing them
    #[arg(long)]
    dry_run: bool,

    /// Print the effective rule table and exit
    #[arg(long)]
    list_rules: bool,

    /// Directory holding per-device tunables
    #[arg(long, default_value = SYS_BLOCK)]
    sysfs_root: PathBuf,

    /// Command listing device paths and LUN names
    #[arg(long, default_value = DEFAULT_INVENTORY_COMMAND)]
    inventory_cmd: String,

    /// Command listing multipath topology
    #[arg(long, default_value = DEFAULT_TOPOLOGY_COMMAND)]
    topology_cmd: String,
}

fn main() -> Result<ExitCode> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // Help and version are not errors
            return Ok(if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            });
        }
    };

    logging::init(args.log.as_deref(), args.verbose)?;

    let table = load_rules(args.config.as_deref());
    if args.list_rules {
        print!("{table}");
        return Ok(ExitCode::SUCCESS);
    }

    let discovery = Discovery::new(&args.inventory_cmd, &args.topology_cmd);
    let bindings = discovery.discover();

    let topology = SysfsBlock::new(&args.sysfs_root);
    let (tuned, report) = if args.dry_run {
        info!("Dry run, no tunables will be written");
        tune(&table, &bindings, Applier::new(topology, DryRun))
    } else {
        tune(&table, &bindings, Applier::new(topology.clone(), topology))
    };

    info!(
        "Tuned {} of {} multipath devices: {} writes, {} failed, {} writes skipped",
        tuned,
        bindings.len(),
        report.written,
        report.failed,
        report.skipped
    );

    Ok(ExitCode::SUCCESS)
}

/// Rule table from the configuration file, or the built-in one.
///
/// An unusable configuration file yields an empty table so nothing is changed.
fn load_rules(config: Option<&Path>) -> RuleTable {
    let Some(path) = config else {
        info!("No configuration file, using built-in rules");
        return RuleTable::builtin();
    };

    match iotune_rules::load(path) {
        Ok(compiled) => compiled.table,
        Err(e) => {
            error!("{}", e);
            RuleTable::new()
        }
    }
}

fn tune<T: DeviceTopology, W: TunableWriter>(
    table: &RuleTable,
    bindings: &[MultipathBinding],
    mut applier: Applier<T, W>,
) -> (usize, ApplyReport) {
    let tuned = applier.tune(table, bindings);
    (tuned, applier.report())
}
