//! mta-deployer: run and inspect deployment processes
//!
//! Usage:
//!   mta-deployer init                 Write deployer.toml and create the database
//!   mta-deployer deploy --app web ... Run a deployment against the simulated platform
//!   mta-deployer status <process>     Show where a process stopped
//!   mta-deployer progress <process>   Print the progress messages of a process
//!   mta-deployer logs <process>       Print the step logs of a process
//!   mta-deployer abort <process>      Ask a running process to stop
//!   mta-deployer resume <process>     Continue a process where it stopped

mod config;
mod demo;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use db::{ProcessContextRepository, ProcessLogRepository, ProgressMessageRepository};
use events::{Event, EventBus, ProcessEventStream};
use orchestrator::variables::{CURRENT_STEP_INDEX, ERROR_TYPE, PROCESS_ABORTED, STEP_PHASE};
use orchestrator::{
    DbContextStore, LoggingHookRunner, ProcessContext, ProcessRunner, StepExecutor, StepHelper,
};
use sqlx::SqlitePool as Pool;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{CliConfig, CONFIG_FILE};
use demo::DemoDeployment;

#[derive(Parser)]
#[command(name = "mta-deployer")]
#[command(about = "Run and inspect multi-target application deployment processes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Override the database URL from the config file
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Override the space the process belongs to
    #[arg(long, global = true)]
    space: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file and create the database
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Run a deployment against the simulated platform
    Deploy {
        /// Application the steps operate on
        #[arg(long)]
        app: String,

        /// Name of the task to run
        #[arg(long, default_value = "migrate")]
        task: String,

        /// Command of the task
        #[arg(long, default_value = "bin/migrate")]
        command: String,

        /// Service operation to wait for, as <name>:<create|update|delete>
        #[arg(long = "service")]
        services: Vec<String>,

        /// Platform reads until each operation settles
        #[arg(long, default_value_t = 3)]
        polls: usize,

        /// Let the task fail on the platform
        #[arg(long)]
        fail_task: bool,

        /// Task execution timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Attach before/after stop hooks to the module
        #[arg(long)]
        hooks: bool,

        /// Process id, generated when omitted
        #[arg(long)]
        process_id: Option<String>,
    },

    /// Show the step, phase and error of a process
    Status { process_id: String },

    /// Print the progress messages of a process
    Progress { process_id: String },

    /// Print the step logs of a process
    Logs { process_id: String },

    /// Ask a process to stop before its next step
    Abort { process_id: String },

    /// Continue a stored process at the step it stopped in
    Resume {
        process_id: String,

        /// Platform reads until each operation settles
        #[arg(long, default_value_t = 3)]
        polls: usize,
    },

    /// List stored processes
    List,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mta_deployer=info,orchestrator=info,db=warn".into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = CliConfig::load(&cli.config).await?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }
    if let Some(space) = cli.space {
        config.space_id = space;
    }

    match cli.command {
        Commands::Init { force } => init(&cli.config, &config, force).await,
        Commands::Deploy {
            app,
            task,
            command,
            services,
            polls,
            fail_task,
            timeout_secs,
            hooks,
            process_id,
        } => {
            let demo = DemoDeployment {
                app,
                task_name: task,
                command,
                services,
                task_polls: polls.max(1),
                fail_task,
                task_timeout: timeout_secs.map(Duration::from_secs),
                with_hooks: hooks,
            };
            deploy(&config, demo, process_id).await
        }
        Commands::Status { process_id } => status(&config, &process_id).await,
        Commands::Progress { process_id } => progress(&config, &process_id).await,
        Commands::Logs { process_id } => logs(&config, &process_id).await,
        Commands::Abort { process_id } => abort(&config, &process_id).await,
        Commands::Resume { process_id, polls } => resume(&config, &process_id, polls.max(1)).await,
        Commands::List => list(&config).await,
    }
}

async fn connect(config: &CliConfig) -> Result<Pool> {
    let pool = db::create_pool(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    Ok(pool)
}

fn runner(pool: &Pool, config: &CliConfig, bus: Option<EventBus>) -> ProcessRunner {
    let mut helper = StepHelper::new(
        Arc::new(ProgressMessageRepository::new(pool.clone())),
        Arc::new(ProcessLogRepository::new(pool.clone())),
    );
    if let Some(bus) = bus {
        helper = helper.with_event_bus(bus);
    }
    ProcessRunner::new(
        StepExecutor::new(helper),
        Arc::new(DbContextStore::new(ProcessContextRepository::new(
            pool.clone(),
        ))),
        config.orchestrator.clone(),
    )
    .with_hook_runner(Arc::new(LoggingHookRunner))
}

async fn init(path: &std::path::Path, config: &CliConfig, force: bool) -> Result<()> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) && !force {
        println!("{} already exists, use --force to overwrite", path.display());
    } else {
        config.save(path).await?;
        println!("Wrote {}", path.display());
    }

    connect(config).await?;
    println!("Database ready at {}", config.database_url);
    Ok(())
}

async fn deploy(config: &CliConfig, demo: DemoDeployment, process_id: Option<String>) -> Result<()> {
    let pool = connect(config).await?;
    let process_id = process_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let bus = EventBus::new();
    let printer = tokio::spawn(print_events(bus.subscribe_process(&process_id)));

    let platform = Arc::new(demo.platform()?);
    let runner = runner(&pool, config, Some(bus))
        .with_steps(demo.steps(platform, &config.orchestrator));
    info!(process_id = %process_id, steps = ?runner.step_names(), "Deploying");

    let result = runner
        .start(demo.context(&process_id, &config.space_id)?)
        .await;
    finish_printing(runner, printer).await;
    report(&process_id, result)
}

async fn resume(config: &CliConfig, process_id: &str, polls: usize) -> Result<()> {
    let pool = connect(config).await?;
    let stored = runner(&pool, config, None).load(process_id).await?;
    let demo = DemoDeployment::from_context(&stored, polls)?;

    let bus = EventBus::new();
    let printer = tokio::spawn(print_events(bus.subscribe_process(process_id)));
    let platform = Arc::new(demo.platform()?);
    let runner = runner(&pool, config, Some(bus))
        .with_steps(demo.steps(platform, &config.orchestrator));

    let result = runner.resume(process_id).await;
    finish_printing(runner, printer).await;
    report(process_id, result)
}

/// Drops the runner, which holds the last handle to the event bus, and
/// waits for the printer to drain the events still queued.
async fn finish_printing(runner: ProcessRunner, printer: JoinHandle<()>) {
    drop(runner);
    if let Err(e) = printer.await {
        warn!(error = %e, "Event printer stopped unexpectedly");
    }
}

fn report(process_id: &str, result: orchestrator::Result<ProcessContext>) -> Result<()> {
    match result {
        Ok(_) => {
            println!("Process {process_id} finished");
            Ok(())
        }
        Err(e) => {
            error!(process_id = %process_id, error = %e, "Deployment failed");
            println!("Run `mta-deployer status {process_id}` for details");
            Err(e).with_context(|| format!("Process {process_id} stopped"))
        }
    }
}

async fn print_events(mut events: ProcessEventStream) {
    while let Some(envelope) = events.next().await {
        match envelope.event {
            Event::StepStarted { step, .. } => println!("> {step}"),
            Event::PollingProgress {
                finished, total, ..
            } => println!("  {finished}/{total} finished"),
            Event::HooksScheduled { timing, hooks, .. } => {
                println!("  hooks {timing}: {}", hooks.join(", "))
            }
            Event::StepFailed {
                error_type,
                message,
                ..
            } => println!("  {error_type}: {message}"),
            Event::ProcessAborted { .. } => println!("  aborted"),
            _ => {}
        }
    }
}

async fn status(config: &CliConfig, process_id: &str) -> Result<()> {
    let pool = connect(config).await?;
    let ctx = runner(&pool, config, None).load(process_id).await?;

    println!("Process:  {process_id}");
    println!("Step:     {}", ctx.get(&CURRENT_STEP_INDEX)?.unwrap_or(0));
    println!("Task:     {}", ctx.task_id());
    if let Some(phase) = ctx.get(&STEP_PHASE)? {
        println!("Phase:    {phase}");
    }
    if ctx.get(&PROCESS_ABORTED)?.unwrap_or(false) {
        println!("Aborted:  yes");
    }
    if let Some(error_type) = ctx.get(&ERROR_TYPE)? {
        println!("Error:    {error_type}");
        let last = ProgressMessageRepository::new(pool)
            .find_last_error(process_id)
            .await?;
        if let Some(message) = last {
            println!("          {}", message.text);
        }
    }
    Ok(())
}

async fn progress(config: &CliConfig, process_id: &str) -> Result<()> {
    let pool = connect(config).await?;
    let messages = ProgressMessageRepository::new(pool)
        .find_by_process_id(process_id)
        .await?;
    if messages.is_empty() {
        println!("No progress messages for {process_id}");
    }
    for message in messages {
        println!(
            "{} [{}] {:<8} {}",
            message.timestamp.format("%H:%M:%S"),
            message.task_id,
            message.message_type.as_str(),
            message.text
        );
    }
    Ok(())
}

async fn logs(config: &CliConfig, process_id: &str) -> Result<()> {
    let pool = connect(config).await?;
    let lines = ProcessLogRepository::new(pool)
        .find_by_process_id(process_id)
        .await?;
    if lines.is_empty() {
        println!("No logs for {process_id}");
    }
    for stored in lines {
        println!(
            "{} [{}] {:<5} {}",
            stored.line.timestamp.format("%H:%M:%S%.3f"),
            stored.key.task_id,
            stored.line.level.as_str(),
            stored.line.message
        );
    }
    Ok(())
}

async fn abort(config: &CliConfig, process_id: &str) -> Result<()> {
    let pool = connect(config).await?;
    runner(&pool, config, None).abort(process_id).await?;
    println!("Abort requested for {process_id}");
    Ok(())
}

async fn list(config: &CliConfig) -> Result<()> {
    let pool = connect(config).await?;
    let ids = ProcessContextRepository::new(pool)
        .list_process_ids()
        .await?;
    if ids.is_empty() {
        println!("No processes");
    }
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_printer_finishes_once_bus_is_gone() {
        let bus = EventBus::new();
        let printer = tokio::spawn(print_events(bus.subscribe_process("proc-1")));
        bus.emit(Event::StepStarted {
            process_id: "proc-1".to_string(),
            task_id: "runTask".to_string(),
            step: "runTask".to_string(),
        });
        drop(bus);

        tokio::time::timeout(Duration::from_secs(5), printer)
            .await
            .expect("printer kept waiting after the bus was dropped")
            .unwrap();
    }
}
