use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

mod cli;
mod config;

use cli::{Cli, Commands};
use config::Config;

use looprun::{
    CommandExecutor, CompletionCriteria, LoopContext, LoopController, LoopStatus, TaskLog, TaskLogRecord,
    WorkspaceLock,
};

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("looprun")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("looprun.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn handle_run_command(
    workspace: &Path,
    command: Option<&str>,
    max_iterations: Option<u32>,
    timeout_secs: Option<u64>,
    max_cost: Option<f64>,
    max_tokens: Option<u64>,
    max_failures: Option<u32>,
    confirmations: Option<u32>,
    marker: Option<&str>,
    config: &Config,
) -> Result<()> {
    let mut criteria: CompletionCriteria = config.limits.criteria();
    if let Some(max) = max_iterations {
        criteria = criteria.with_max_iterations(max);
    }
    if let Some(secs) = timeout_secs {
        criteria = criteria.with_timeout(Duration::from_secs(secs));
    }
    if let Some(max) = max_cost {
        criteria = criteria.with_max_cost(max);
    }
    if let Some(max) = max_tokens {
        criteria = criteria.with_max_tokens(max);
    }
    if let Some(max) = max_failures {
        criteria = criteria.with_max_consecutive_failures(max);
    }
    if let Some(count) = confirmations {
        criteria = criteria.with_required_confirmations(count);
    }

    let command = command.unwrap_or(&config.executor.command).to_string();
    let mut executor = CommandExecutor::new(&command, workspace);
    if config.executor.command_timeout_ms > 0 {
        executor = executor.with_command_timeout(Duration::from_millis(config.executor.command_timeout_ms));
    }
    if let Some(marker) = marker.or(config.executor.completion_marker.as_deref()) {
        executor = executor.with_completion_marker(marker);
    }

    let context = LoopContext::new(workspace);
    info!("starting loop {} in {}", context.id, workspace.display());
    println!("{} {} in {}", "Running:".cyan(), command, workspace.display());

    let mut controller = LoopController::new(context, criteria, Arc::new(executor))?;

    // Ctrl-C stops at the next iteration boundary
    let control = controller.control();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            control.request_stop("interrupted by ctrl-c");
        }
    });

    let outcome = controller.run().await?;

    let label = match outcome.status {
        LoopStatus::Completed => "Completed:".green(),
        LoopStatus::Terminated => "Terminated:".yellow(),
        _ => "Failed:".red(),
    };
    println!("{} {}", label, outcome.reason);
    println!(
        "  {} iteration(s), {:.1}s, cost {:.4}, {} token(s)",
        outcome.snapshot.iteration,
        outcome.snapshot.elapsed_ms as f64 / 1000.0,
        outcome.snapshot.cumulative_cost,
        outcome.snapshot.cumulative_tokens
    );
    Ok(())
}

fn handle_status_command(workspace: &Path) -> Result<()> {
    let context = LoopContext::new(workspace);

    match WorkspaceLock::read_info(&context.lock_path())? {
        Some(lock) => {
            println!(
                "{} pid {} on {} since {}",
                "Locked:".yellow(),
                lock.pid,
                lock.host,
                lock.acquired_at
            );
        }
        None => println!("{}", "Not running".green()),
    }

    // Latest run is the most recently modified task log
    let tasks_dir = context.tasks_dir();
    if !tasks_dir.is_dir() {
        println!("No runs recorded");
        return Ok(());
    }
    let mut logs: Vec<PathBuf> = fs::read_dir(&tasks_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "jsonl"))
        .collect();
    logs.sort_by_key(|path| path.metadata().and_then(|m| m.modified()).ok());

    let Some(latest) = logs.last() else {
        println!("No runs recorded");
        return Ok(());
    };

    let log = TaskLog::open(latest)?;
    match log.final_record()? {
        Some(TaskLogRecord::Final {
            run_id,
            status,
            reason,
            snapshot,
            ..
        }) => {
            println!("{} {} {} ({})", "Last run:".cyan(), run_id, status, reason);
            println!(
                "  {} iteration(s), cost {:.4}, {} token(s)",
                snapshot.iteration, snapshot.cumulative_cost, snapshot.cumulative_tokens
            );
        }
        _ => {
            let records = log.read_all()?;
            println!("{} {} record(s), no terminal record yet", "In flight:".yellow(), records.len());
        }
    }
    Ok(())
}

fn handle_stop_command(workspace: &Path, reason: Option<&str>) -> Result<()> {
    let reason = reason.unwrap_or("stop requested via cli");
    LoopContext::write_stop_flag(workspace, reason).context("Failed to write stop flag")?;
    info!("stop flag written for {}", workspace.display());
    println!("{} {}", "Stop requested:".yellow(), reason);
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.verbose {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run {
            workspace,
            command,
            max_iterations,
            timeout_secs,
            max_cost,
            max_tokens,
            max_failures,
            confirmations,
            marker,
        } => {
            handle_run_command(
                workspace,
                command.as_deref(),
                *max_iterations,
                *timeout_secs,
                *max_cost,
                *max_tokens,
                *max_failures,
                *confirmations,
                marker.as_deref(),
                config,
            )
            .await
        }
        Commands::Status { workspace } => handle_status_command(workspace),
        Commands::Stop { workspace, reason } => handle_stop_command(workspace, reason.as_deref()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
