//! Crystal - Personal assistant with hybrid local/remote models
//!
//! This is the main entry point for the `crystal` binary. It parses the
//! command line, loads configuration, initializes logging and dispatches to
//! the orchestrator, the file organizer, the scheduler or the HTTP server.

mod api;
mod backend;
mod cli;
mod config;
mod coordinator;
mod error;
mod files;
mod logging;
mod orchestrator;
mod persona;
mod scheduler;
mod system;
mod types;
mod version;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cli::{AssistantsSubcommand, Cli, Commands, ConfigSubcommand};
use crate::config::CrystalConfig;
use crate::error::{Error, Result};
use crate::files::{FileOpResult, FileOrganizer};
use crate::orchestrator::Orchestrator;
use crate::scheduler::{JobAction, TaskScheduler, Trigger};

fn main() {
    if let Err(e) = run() {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    // Short-lived commands use simple logging
    match &cli.command {
        Commands::Version => {
            version::print_version();
            return Ok(());
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            return handle_config_command(subcommand.clone(), cli.config.as_deref());
        }
        Commands::Assistants { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            return handle_assistants_command(subcommand.clone(), cli.config.as_deref());
        }
        _ => {}
    }

    let config = CrystalConfig::load(cli.config.as_deref())?;

    // The guards must be kept alive for the lifetime of the program
    let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    let build = version::build_info();
    info!(
        version = %build.full_version(),
        target = %build.target,
        profile = %build.profile,
        "Starting Crystal"
    );

    match cli.command {
        Commands::Organize {
            directory,
            no_subdirs,
        } => {
            let files = FileOrganizer::new(&config.files);
            print_file_op(files.organize(&expand(&directory), !no_subdirs))
        }
        Commands::Duplicates { directory } => {
            let files = FileOrganizer::new(&config.files);
            print_file_op(files.find_duplicates(&expand(&directory)))
        }
        Commands::Search {
            directory,
            pattern,
            content,
        } => {
            let files = FileOrganizer::new(&config.files);
            print_file_op(files.search(&expand(&directory), &pattern, content))
        }
        command => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .thread_name("crystal")
                .build()
                .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;
            runtime.block_on(async_main(command, config))
        }
    }
}

async fn async_main(command: Commands, config: CrystalConfig) -> Result<()> {
    match command {
        Commands::Chat {
            message,
            assistant,
            details,
        } => run_chat(&config, &assistant, &message, details).await,
        Commands::Status { assistant } => run_status(&config, assistant.as_deref()).await,
        Commands::Schedule {
            description,
            when,
            id,
        } => run_schedule(&config, &description, &when, id).await,
        Commands::Serve { host, port } => {
            let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            api::serve(
                orchestrator,
                &config.app.name,
                &config.server.cors_origins,
                &host,
                port,
            )
            .await
        }
        Commands::Organize { .. }
        | Commands::Duplicates { .. }
        | Commands::Search { .. }
        | Commands::Assistants { .. }
        | Commands::Config { .. }
        | Commands::Version => {
            // Already handled synchronously
            unreachable!();
        }
    }
}

fn expand(path: &Path) -> std::path::PathBuf {
    std::path::PathBuf::from(config::expand_path(&path.to_string_lossy()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the `{success, error?, ...}` rendering and exit non-zero on failure
fn print_file_op<T: Serialize>(result: Result<T>) -> Result<()> {
    let exit_code = result.as_ref().err().map(Error::exit_code);
    print_json(&FileOpResult::from(result))?;
    if let Some(code) = exit_code {
        std::process::exit(code);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// Assistant commands
// ─────────────────────────────────────────────────────────────────

async fn run_chat(config: &CrystalConfig, assistant: &str, message: &str, details: bool) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config)?;
    let reply = orchestrator.route(assistant, message, None).await;
    orchestrator.shutdown().await;

    if details {
        print_json(&reply)?;
    } else {
        println!("{}", reply.message);
    }

    if reply.error {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_status(config: &CrystalConfig, assistant: Option<&str>) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config)?;
    orchestrator.initialize().await?;
    let report = orchestrator.status(assistant);
    orchestrator.shutdown().await;
    print_json(&report?)
}

/// Schedule a reminder and stay in the foreground. A one-time reminder
/// returns once it fired; recurring ones run until Ctrl-C.
async fn run_schedule(
    config: &CrystalConfig,
    description: &str,
    when: &str,
    id: Option<String>,
) -> Result<()> {
    let trigger = Trigger::parse(when, Utc::now())?;
    let one_shot = matches!(trigger, Trigger::OneTime { .. });
    let id = id.unwrap_or_else(|| format!("reminder-{}", &Uuid::new_v4().simple().to_string()[..8]));

    let scheduler = TaskScheduler::new(config.scheduler_offset()?);
    scheduler.start().await?;

    let fired = Arc::new(Notify::new());
    let job = scheduler
        .schedule(&id, trigger, description, print_reminder(description, fired.clone()))
        .await?;
    print_json(&job)?;

    tokio::select! {
        _ = fired.notified(), if one_shot => {
            info!(job = %id, "One-time reminder completed");
        }
        _ = api::shutdown_signal() => {}
    }

    if let Err(e) = scheduler.shutdown().await {
        warn!(error = %e, "Scheduler shutdown failed");
    }
    Ok(())
}

fn print_reminder(description: &str, fired: Arc<Notify>) -> JobAction {
    let description: Arc<str> = Arc::from(description);
    Arc::new(move || {
        let description = description.clone();
        let fired = fired.clone();
        Box::pin(async move {
            println!("[{}] Reminder: {}", Utc::now().format("%Y-%m-%d %H:%M:%S"), description);
            fired.notify_one();
        })
    })
}

fn handle_assistants_command(subcommand: AssistantsSubcommand, config_path: Option<&str>) -> Result<()> {
    let cfg = CrystalConfig::load(config_path)?;

    match subcommand {
        AssistantsSubcommand::List => {
            println!("Configured assistants:");
            for assistant in &cfg.assistants {
                let model = assistant.preferred_model.as_deref().unwrap_or("auto");
                println!("  {:<12} {:<16} {}", assistant.name, model, assistant.description);
            }
            println!();
            println!("Bundled personas:");
            for persona in persona::bundled_personas() {
                let installed = cfg.instructions_dir().join(persona.file_name()).exists();
                println!(
                    "  {:<12} {:<16} {}",
                    persona.name,
                    if installed { "installed" } else { "not installed" },
                    persona.description
                );
            }
        }
        AssistantsSubcommand::Install { name, force } => {
            let path = persona::install_instructions(&name, &cfg.instructions_dir(), force)?;
            println!("Instructions written to {}", path.display());
        }
    }

    Ok(())
}

/// Handle configuration subcommands
fn handle_config_command(subcommand: ConfigSubcommand, config_path: Option<&str>) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show => {
            let cfg = CrystalConfig::load(config_path)?;
            println!("{}", toml::to_string_pretty(&cfg.redacted())?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = config::init_config(path.as_deref(), force)?;
            println!("Configuration written to {}", written.display());
        }
        ConfigSubcommand::Validate => {
            CrystalConfig::load(config_path)?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
