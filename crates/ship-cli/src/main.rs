mod settings;

use clap::{Parser, Subcommand};
use settings::{ShipConfig, TaskFile};
use ship_agents::{
    available_providers, build_gateway, builtin_descriptors, create_orchestrator,
    models_by_provider, ModelProvider, MODELS,
};
use ship_orchestrator::{Task, TaskStatus};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ship", about = "Ship: priority-queued AI task orchestration")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "ship.toml")]
    config: PathBuf,

    /// Human-readable logs instead of JSON
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a batch of tasks and wait for all of them to finish
    Run {
        /// TOML file with [[tasks]] entries
        #[arg(short, long)]
        tasks: PathBuf,
        /// Also print per-kind execution metrics
        #[arg(long)]
        metrics: bool,
    },
    /// List the built-in agents
    Agents,
    /// List known models, marking those whose provider is configured
    Models {
        /// Only show models of this provider
        #[arg(short, long)]
        provider: Option<ModelProvider>,
    },
    /// Print the effective configuration, API key redacted
    Config,
}

fn init_tracing(pretty: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr);
    if pretty {
        builder.init();
    } else {
        builder.json().init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.pretty);
    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded .env"),
        Err(e) => debug!(error = %e, "No .env loaded"),
    }

    let config = ShipConfig::load(&cli.config)?;

    match cli.command {
        Commands::Run { tasks, metrics } => run(config, tasks, metrics).await?,
        Commands::Agents => {
            let agents = builtin_descriptors();
            println!("Built-in agents:");
            for agent in &agents {
                println!("  {:<9} {}: {}", agent.kind, agent.name, agent.description);
            }
            println!("\nTotal: {} agent(s). Tasks of kind 'deploy' need a custom agent.", agents.len());
        }
        Commands::Models { provider } => list_models(&config, provider),
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config.redacted())?);
            let providers: Vec<String> = available_providers(&config.model)
                .iter()
                .map(ToString::to_string)
                .collect();
            let shown = if providers.is_empty() {
                "none".to_string()
            } else {
                providers.join(", ")
            };
            println!("# configured providers: {shown}");
        }
    }

    Ok(())
}

fn list_models(config: &ShipConfig, provider: Option<ModelProvider>) {
    let configured = available_providers(&config.model);
    let models = match provider {
        Some(provider) => models_by_provider(provider),
        None => MODELS.iter().collect(),
    };

    println!("Available models:");
    for model in models {
        let mark = if configured.contains(&model.provider) { "+" } else { " " };
        println!(
            "  {mark} {:<28} {:<26} {:<11} {} tokens",
            model.id,
            model.name,
            model.provider.to_string(),
            model.context_window
        );
    }
    println!("\n+ = provider configured");
}

async fn run(config: ShipConfig, tasks_path: PathBuf, metrics: bool) -> anyhow::Result<()> {
    let file = TaskFile::load(&tasks_path)?;
    let gateway = build_gateway(&config.model)?;
    let orchestrator = create_orchestrator(config.orchestrator, gateway)?;

    info!(count = file.tasks.len(), file = %tasks_path.display(), "Submitting tasks");
    let mut ids = Vec::with_capacity(file.tasks.len());
    for entry in &file.tasks {
        let task = orchestrator.create_task_from_json(&entry.kind, entry.input.clone(), entry.options())?;
        ids.push(task.id);
    }

    orchestrator.wait_until_idle().await;

    let finished: Vec<Task> = ids
        .iter()
        .filter_map(|id| orchestrator.get_task(*id))
        .collect();
    println!("{}", serde_json::to_string_pretty(&finished)?);
    if metrics {
        println!("{}", serde_json::to_string_pretty(&orchestrator.monitor().to_json())?);
    }

    let count = |status: TaskStatus| finished.iter().filter(|t| t.status == status).count();
    let failed = count(TaskStatus::Failed);
    println!(
        "{} completed, {} failed, {} cancelled",
        count(TaskStatus::Completed),
        failed,
        count(TaskStatus::Cancelled)
    );

    if failed > 0 {
        anyhow::bail!("{failed} task(s) failed");
    }
    Ok(())
}
