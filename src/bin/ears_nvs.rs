// CLASSIFICATION: COMMUNITY
// Filename: ears_nvs.rs v0.2
// Date Modified: 2026-10-19
// Author: Lukas Bower

//! Host tool for inspecting and provisioning an EARS NVS image.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::LevelFilter;

use ears_nvs::config::{NvsConfig, DEFAULT_CONFIG_PATH};
use ears_nvs::report::log_reporter;
use ears_nvs::{boot, FilePartition, KeyValueStore, Provisioner};

#[derive(Debug, Parser)]
#[command(name = "ears-nvs", about = "EARS NVS validation and provisioning")]
struct Cli {
    /// Configuration file.
    #[arg(long, env = "EARS_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Partition image, overriding the configured path.
    #[arg(long)]
    store: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the boot validation handoff and print the decision.
    Validate {
        /// Emit the verdict and decision as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
        /// Bound on the loader's wait, overriding the configured value.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// First-time setup.
    Provision {
        #[arg(long)]
        zap_number: String,
        #[arg(long)]
        password: String,
    },
    /// Check a password against the stored hash.
    Login {
        #[arg(long)]
        password: String,
    },
    /// Wipe the namespace.
    Reset,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
    builder.format_timestamp_millis();
    let _ = builder.try_init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut cfg = NvsConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(path) = cli.store {
        cfg.storage_path = path;
    }
    let mut store = KeyValueStore::new(FilePartition::new(&cfg.storage_path), log_reporter());

    match cli.command {
        Command::Validate { json, timeout_ms } => {
            let timeout = timeout_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| cfg.handoff_timeout());
            let report = boot(store, cfg.validation_policy(), timeout)
                .context("spawning validator worker")?;
            if json {
                let doc = serde_json::json!({
                    "result": report.result.as_deref(),
                    "decision": &report.decision,
                });
                println!("{}", serde_json::to_string_pretty(&doc)?);
            } else {
                if let Some(result) = &report.result {
                    print!("{result}");
                }
                println!("Decision: {}", report.decision);
            }
            let usable = report
                .result
                .as_ref()
                .is_some_and(|r| r.status.is_usable());
            Ok(if usable {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            })
        }
        Command::Provision {
            zap_number,
            password,
        } => {
            let crc = Provisioner::new(&mut store)
                .with_policy(cfg.zap_number)
                .provision(&zap_number, &password)?;
            println!("Provisioned {zap_number} (CRC 0x{crc:08X})");
            Ok(ExitCode::SUCCESS)
        }
        Command::Login { password } => {
            if Provisioner::new(&mut store).verify_password(&password)? {
                println!("Login SUCCESS");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("Login FAILED - incorrect password");
                Ok(ExitCode::from(1))
            }
        }
        Command::Reset => {
            Provisioner::new(&mut store).factory_reset()?;
            println!("Factory reset complete");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
