use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use taskplan::config::Config;
use taskplan::core::ProjectId;
use taskplan::orchestration::{SimulationRequest, SimulationService, TopologicalScheduler};
use taskplan::store::{JsonFileStore, ProjectStore};
use taskplan::{tplog, tplog_warn, Error, Result};

/// taskplan - dependency-aware task scheduling and execution simulation
#[derive(Parser, Debug)]
#[command(name = "taskplan")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    TASKPLAN_DEBUG=1     Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.taskplan/taskplan.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Simulate execution of a stored project and print the response as JSON
    Simulate {
        /// Project ID (file name without .json in the store directory)
        project_id: String,

        /// Maximum concurrent tasks per agent type (1-10)
        #[arg(long, short = 'c')]
        capacity: Option<usize>,

        /// Project store directory (defaults to ~/.taskplan/projects)
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Print the execution order of a stored project
    Order {
        /// Project ID
        project_id: String,

        /// Project store directory (defaults to ~/.taskplan/projects)
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    taskplan::log::init_with_debug(cli.debug);
    let config = Config::load()?;

    match cli.command {
        Command::Simulate {
            project_id,
            capacity,
            store,
        } => run_simulate(&config, project_id, capacity, store),
        Command::Order { project_id, store } => run_order(&config, project_id, store),
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn open_store(config: &Config, store: Option<PathBuf>) -> Result<JsonFileStore> {
    let dir = match store {
        Some(dir) => dir,
        None => config.projects_dir()?,
    };
    Ok(JsonFileStore::new(dir))
}

fn run_simulate(
    config: &Config,
    project_id: String,
    capacity: Option<usize>,
    store: Option<PathBuf>,
) -> Result<()> {
    tplog!("Simulate command: project={}, capacity={:?}", project_id, capacity);

    let store = open_store(config, store)?;
    let service = SimulationService::new(
        Arc::new(store),
        Arc::new(config.router()?),
        config.to_simulation_config(),
    )?;
    let request = SimulationRequest::new(project_id)
        .with_capacity(capacity.unwrap_or(config.simulation.default_agent_capacity));

    let rt = tokio::runtime::Runtime::new()?;
    let response = rt.block_on(async {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tplog_warn!("Interrupted, stopping after the current round");
                on_interrupt.cancel();
            }
        });

        let response = service.simulate(&request, &cancel).await;
        cancel.cancel();
        response
    });

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn run_order(config: &Config, project_id: String, store: Option<PathBuf>) -> Result<()> {
    tplog!("Order command: project={}", project_id);

    let store = open_store(config, store)?;
    let id = ProjectId::new(project_id);

    let rt = tokio::runtime::Runtime::new()?;
    let mut project = rt
        .block_on(store.load(&id))?
        .ok_or_else(|| Error::ProjectNotFound(id.to_string()))?;
    project.validate()?;

    let schedule = TopologicalScheduler::new().plan(&project.tasks);
    for (i, task) in schedule.ordered.iter().enumerate() {
        let marker = match schedule.drain_from {
            Some(from) if i >= from => " (cycle)",
            _ => "",
        };
        println!(
            "{:>3}. [P{}] {} {}{}",
            i + 1,
            task.priority.value(),
            task.id,
            task.title,
            marker
        );
    }
    Ok(())
}
