//! eraexport CLI — validate exporter configuration and manage the era
//! checkpoint.
//!
//! Usage:
//! ```bash
//! # Check a config file and print the effective settings
//! eraexport validate config.json
//!
//! # Show or overwrite the era-scanner checkpoint
//! eraexport checkpoint show config.json
//! eraexport checkpoint set config.json 1200
//! ```

use std::env;
use std::process;

use anyhow::{bail, Context, Result};

use eraexport_core::checkpoint::{CheckpointStore, FileCheckpointStore};
use eraexport_core::config::{ExporterConfig, HISTORIC_ERA_CHUNK};
use eraexport_core::error::ConfigError;
use eraexport_core::types::EraIndex;
use eraexport_scheduler::catchup::checkpoint_store;
use eraexport_scheduler::{init_tracing, Mode};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "validate" => cmd_validate(&args[2..]),
        "checkpoint" => cmd_checkpoint(&args[2..]).await,
        "info" => {
            cmd_info();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("eraexport {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        let code = if e.downcast_ref::<ConfigError>().is_some() { 2 } else { 1 };
        process::exit(code);
    }
}

fn print_usage() {
    println!("eraexport {}", env!("CARGO_PKG_VERSION"));
    println!("Staking era and session export scheduler\n");
    println!("USAGE:");
    println!("    eraexport <COMMAND>\n");
    println!("COMMANDS:");
    println!("    validate <CONFIG>                  Validate a config and print the settings");
    println!("    checkpoint show <CONFIG>           Print the era-scanner checkpoint");
    println!("    checkpoint set <CONFIG> <ERA>      Overwrite the era-scanner checkpoint");
    println!("    info                               Show defaults");
    println!("    version                            Print version");
    println!("    help                               Print this help");
}

fn load_config(args: &[String]) -> Result<ExporterConfig> {
    let path = args.first().context("missing <CONFIG> argument")?;
    let config = ExporterConfig::from_json_file(path)?;
    Ok(config)
}

fn cmd_validate(args: &[String]) -> Result<()> {
    let config = load_config(args)?;
    println!("Config OK ({} mode)", Mode::from_config(&config));
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

async fn cmd_checkpoint(args: &[String]) -> Result<()> {
    let Some(action) = args.first() else {
        bail!("expected `checkpoint show <CONFIG>` or `checkpoint set <CONFIG> <ERA>`");
    };
    let config = load_config(&args[1..])?;
    let store = checkpoint_store(&config);

    match action.as_str() {
        "show" => {
            match store.read().await? {
                Some(era) => println!("{era}"),
                None => println!("no checkpoint at {}", store.location()),
            }
            Ok(())
        }
        "set" => {
            let era: EraIndex = args
                .get(2)
                .context("missing <ERA> argument")?
                .parse()
                .context("<ERA> must be a non-negative integer")?;
            set_checkpoint(&config, &store, era).await
        }
        other => bail!("unknown checkpoint action: {other}"),
    }
}

async fn set_checkpoint(
    config: &ExporterConfig,
    store: &FileCheckpointStore,
    era: EraIndex,
) -> Result<()> {
    if let Err(e) = init_tracing(config) {
        eprintln!("Logging disabled: {e}");
    }
    let previous = match store.read().await {
        Ok(previous) => previous,
        Err(e) => {
            tracing::warn!(error = %e, "Existing checkpoint is unreadable, overwriting it");
            None
        }
    };
    store.write(era).await?;
    tracing::info!(era, ?previous, location = %store.location(), "Checkpoint overwritten");
    println!("checkpoint set to {era}");
    Ok(())
}

fn cmd_info() {
    let defaults = ExporterConfig::default();
    println!("EraExport v{}", env!("CARGO_PKG_VERSION"));
    println!("  Boundary threshold: {} blocks", defaults.end_session_block_distance);
    println!("  API chunk size: {} addresses/call", defaults.api_chunk_size);
    println!(
        "  Retry: {} attempts, {} ms apart",
        defaults.retry.max_attempts, defaults.retry.delay_ms
    );
    println!("  Checkpoint file: {}", defaults.era_scanner.checkpoint_file_name);
    println!(
        "  Historic export: last {} eras, {HISTORIC_ERA_CHUNK} per request",
        defaults.historic.history_size
    );
    println!("  Modes: era-scanner (catch-up), head-subscription");
}
