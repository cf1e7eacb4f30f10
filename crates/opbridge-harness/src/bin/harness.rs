//! CLI entrypoint for the opbridge plugin harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use opbridge::{BridgeConfig, BridgeRegistry};
use opbridge_harness::structured_log::{LogEmitter, validate_log_file};
use opbridge_harness::{PluginManifest, probe};

/// Plugin tooling for opbridge.
#[derive(Debug, Parser)]
#[command(name = "opbridge-harness")]
#[command(about = "Resolve, probe and audit native operator plugins")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve a library path the way the bridge would, without loading it.
    Resolve {
        /// Library path or bare name (e.g. "dummy_op").
        #[arg(long)]
        input: String,
        /// Search root for relative inputs (overrides OPBRIDGE_SEARCH_ROOT).
        #[arg(long)]
        search_root: Option<PathBuf>,
    },
    /// Load a plugin per its manifest, check every declared symbol, unload.
    Probe {
        /// Plugin manifest JSON path.
        #[arg(long)]
        manifest: PathBuf,
        /// Structured JSONL log path (if omitted, logs go to stderr).
        #[arg(long)]
        log: Option<PathBuf>,
        /// Output path for the JSON report (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
        /// Run identifier embedded in trace ids.
        #[arg(long, default_value = "local")]
        run_id: String,
    },
    /// Validate a structured JSONL log produced by `probe`.
    ValidateLog {
        /// JSONL log path.
        #[arg(long)]
        log: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Resolve { input, search_root } => {
            let mut config = BridgeConfig::from_env();
            if let Some(root) = search_root {
                config = config.with_search_root(root);
            }
            let resolved = BridgeRegistry::new(config).resolve_path(&input)?;
            println!("{}", resolved.display());
        }
        Command::Probe {
            manifest,
            log,
            output,
            run_id,
        } => {
            let plugin = PluginManifest::from_file(&manifest)?;
            let mut emitter = match &log {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    LogEmitter::to_file(path, "probe", &run_id)?
                }
                None => LogEmitter::to_stderr("probe", &run_id),
            };
            let report = probe(&plugin, &BridgeConfig::from_env(), &mut emitter)?;
            let body = report.to_json()?;

            if let Some(path) = output {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, body)?;
            } else {
                println!("{body}");
            }

            if !report.passed() {
                let missing = report.symbols.iter().filter(|s| !s.resolved).count();
                return Err(match &report.failure {
                    Some(failure) => {
                        format!("Probe of '{}' failed: {}", report.plugin, failure.message)
                    }
                    None => format!(
                        "Probe of '{}' failed: {missing} symbol(s) missing",
                        report.plugin
                    ),
                }
                .into());
            }
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            for err in &errors {
                eprintln!("{err}");
            }
            if !errors.is_empty() {
                return Err(format!(
                    "{}: {} violation(s) in {lines} line(s)",
                    log.display(),
                    errors.len()
                )
                .into());
            }
            eprintln!("{}: {lines} line(s) OK", log.display());
        }
    }

    Ok(())
}

