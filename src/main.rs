//! edbridge - replay editor scripts through an editor-state bridge.
//!
//! # Usage
//!
//! ```bash
//! edbridge edits.script
//! edbridge --ignore-selection-change --subscribers 2 edits.script
//! edbridge --watch edits.script
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use edbridge::config::{
    ConfigFlags, clear_config_flags, global_config_path, load_config_flags, local_override_path,
    parse_flag_tokens, save_config_flags,
};
use edbridge::replay::{ReplayReport, replay};
use edbridge::script::Script;
use edbridge::watcher::ScriptWatcher;

/// Replay an editor script and print what bridge subscribers receive
#[derive(Parser, Debug)]
#[command(name = "edbridge", version, about, long_about = None)]
struct Cli {
    /// Script of editor commands to replay
    #[arg(value_name = "SCRIPT")]
    script: PathBuf,

    /// Drop updates that only move the cursor
    #[arg(long)]
    ignore_selection_change: bool,

    /// Publish the editor's first transition out of the empty state
    #[arg(long)]
    keep_initial_change: bool,

    /// Number of subscribers attached before the replay starts
    #[arg(long, value_name = "N")]
    subscribers: Option<usize>,

    /// Pretty-print each delivery
    #[arg(long)]
    pretty: bool,

    /// Re-run the replay whenever the script changes
    #[arg(short, long)]
    watch: bool,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

const WATCH_DEBOUNCE: Duration = Duration::from_millis(200);
const WATCH_POLL: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries deliveries only.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    if !cli.script.exists() {
        anyhow::bail!("Script not found: {}", cli.script.display());
    }

    if !effective.watch {
        return run_once(&cli.script, &effective);
    }

    let mut watcher = ScriptWatcher::new(&cli.script, WATCH_DEBOUNCE)
        .with_context(|| format!("Failed to watch {}", cli.script.display()))?;
    tracing::info!(script = %watcher.script_path().display(), "watching script");
    loop {
        if let Err(err) = run_once(&cli.script, &effective) {
            eprintln!("[error] {err:#}");
        }
        while !watcher.poll() {
            std::thread::sleep(WATCH_POLL);
        }
    }
}

fn run_once(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let script = Script::from_file(path)?;
    let report = replay(&script, flags.bridge_options(), flags.subscribers.unwrap_or(1))
        .with_context(|| format!("Replay of {} failed", path.display()))?;
    print_report(&report, flags.pretty)
}

fn print_report(report: &ReplayReport, pretty: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for delivery in &report.deliveries {
        if pretty {
            serde_json::to_writer_pretty(&mut out, delivery)?;
        } else {
            serde_json::to_writer(&mut out, delivery)?;
        }
        writeln!(out)?;
    }
    out.flush()?;

    let stats = report.stats;
    eprintln!(
        "[stats] steps={} received={} published={} skipped_selection={} skipped_initial={}",
        report.steps, stats.received, stats.published, stats.skipped_selection, stats.skipped_initial,
    );
    Ok(())
}
