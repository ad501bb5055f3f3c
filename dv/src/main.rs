//! dv - Drakvuf sandbox task manager
//!
//! CLI entry point for submitting samples and decoding results.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use tracing::{debug, info, warn};

use drakvufd::cli::{Cli, Command};
use drakvufd::config::Config;
use drakvufd::{AnalysisResult, PollOptions, ReportError, TaskManager, decoder, identify, wait_for_completion};

fn setup_logging(cli_log_level: Option<&str>, config: &Config) -> Result<()> {
    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config.log.level.as_deref()) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    match &config.log.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).context("Failed to create log directory")?;
            }
            let log_file = fs::File::create(path).context("Failed to create log file")?;
            tracing_subscriber::fmt()
                .with_writer(log_file)
                .with_ansi(false)
                .with_env_filter(filter)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
    }

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    setup_logging(cli.log_level.as_deref(), &config).context("Failed to setup logging")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Analyze {
            file,
            name,
            interval,
            timeout,
        } => {
            let options = PollOptions {
                interval: Duration::from_secs(interval.max(1)),
                timeout: Duration::from_secs(timeout),
            };
            cmd_analyze(&config, &file, name, options).await
        }
        Command::Decode { file } => cmd_decode(&config, &file),
        Command::Identify { file } => {
            let bytes = fs::read(&file).context(format!("Failed to read {}", file.display()))?;
            println!("{}", identify(&bytes));
            Ok(())
        }
        Command::Config => {
            print!("{}", config.to_yaml()?);
            Ok(())
        }
    }
}

async fn cmd_analyze(config: &Config, file: &Path, name: Option<String>, options: PollOptions) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .context(format!("Failed to read {}", file.display()))?;
    let name = match name {
        Some(name) => name,
        None => file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| eyre!("Cannot derive a sample name from {}", file.display()))?,
    };

    let manager = TaskManager::from_config(config).context("Failed to open storage layout")?;
    let id = manager.submit(&bytes, &name).await?;
    eprintln!("{} Submitted {} as task {}", "✓".green(), name, id.to_string().cyan());

    let probes = wait_for_completion(&manager, &id, options).await?;
    info!(%id, probes, "Sandbox finished");

    // The result file can trail the processing area by a moment
    let started = tokio::time::Instant::now();
    let result = loop {
        match manager.report(&id).await {
            Err(ReportError::ResultNotFound(_)) if started.elapsed() < options.timeout => {
                debug!(%id, "cmd_analyze: result not written yet");
                tokio::time::sleep(options.interval).await;
            }
            other => break other?,
        }
    };

    print_result(&result)?;

    manager.delete(&id).await;
    if let Err(e) = manager.shutdown().await {
        warn!(error = %e, "Registry already stopped");
    }
    Ok(())
}

fn cmd_decode(config: &Config, file: &Path) -> Result<()> {
    let bytes = fs::read(file).context(format!("Failed to read {}", file.display()))?;
    let result = decoder::decode_result(&bytes, config.tasks.result_mode)
        .context(format!("Failed to decode {}", file.display()))?;
    print_result(&result)
}

fn print_result(result: &AnalysisResult) -> Result<()> {
    match result {
        AnalysisResult::Syscall(report) => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        AnalysisResult::Raw(bytes) => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}
