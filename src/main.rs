//! Collab Orchestrator - AI agent routing with cost governance.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use collab_orchestrator::ai::{AiClient, CompletionRequest};
use collab_orchestrator::config::{ConfigLoader, PlatformConfig};
use collab_orchestrator::cost::CostTracker;
use collab_orchestrator::directory::InMemoryDirectory;
use collab_orchestrator::display;
use collab_orchestrator::router::{render_introduction, AgentRouter, IntroductionContext};
use collab_orchestrator::templates::{validate, TemplateCategory, TemplateRegistry};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CategoryArg {
    Agent,
    Task,
    Communication,
    Analysis,
}

impl From<CategoryArg> for TemplateCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Agent => TemplateCategory::Agent,
            CategoryArg::Task => TemplateCategory::Task,
            CategoryArg::Communication => TemplateCategory::Communication,
            CategoryArg::Analysis => TemplateCategory::Analysis,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "collab-orchestrator",
    about = "AI agent routing with cost governance",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one prompt to the generative backend.
    Chat {
        prompt: String,
        #[arg(long)]
        system: Option<String>,
        #[arg(long)]
        temperature: Option<f32>,
        #[arg(long)]
        max_tokens: Option<u32>,
        #[arg(long)]
        model: Option<String>,
    },
    /// Probe the generative backend.
    Health,
    /// Inspect and render prompt templates.
    Templates {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Analyze a task from a directory snapshot.
    AnalyzeTask {
        task_id: String,
        /// JSON file with `agents` and `tasks` arrays.
        #[arg(long)]
        directory: PathBuf,
    },
    /// Recommend an active agent for a task.
    SuggestAgent {
        task_id: String,
        #[arg(long)]
        directory: PathBuf,
    },
    /// Render an agent's introduction.
    Introduce {
        agent_id: String,
        #[arg(long)]
        directory: PathBuf,
        #[arg(long)]
        task_id: Option<String>,
        #[arg(long)]
        team: Option<String>,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// List registered templates.
    List {
        #[arg(long, value_enum)]
        category: Option<CategoryArg>,
    },
    /// Render a template with `--var name=value` bindings.
    Render {
        id: String,
        #[arg(long = "var", value_parser = parse_binding)]
        vars: Vec<(String, String)>,
    },
    /// Check a template file against its declared variables.
    Validate {
        file: PathBuf,
        #[arg(long = "var")]
        vars: Vec<String>,
    },
}

fn parse_binding(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got `{s}`"))
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<PlatformConfig, Box<dyn std::error::Error>> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    Ok(loader.load_with_env()?)
}

fn build_router(
    config: &PlatformConfig,
    directory: Option<&Path>,
) -> Result<AgentRouter, Box<dyn std::error::Error>> {
    let ai = Arc::new(AiClient::from_config(config)?);
    assemble_router(ai, config, directory)
}

/// Router over a directory snapshot, or an empty directory for plain chat.
fn assemble_router(
    ai: Arc<AiClient>,
    config: &PlatformConfig,
    directory: Option<&Path>,
) -> Result<AgentRouter, Box<dyn std::error::Error>> {
    let directory = Arc::new(match directory {
        Some(path) => InMemoryDirectory::load(path)?,
        None => InMemoryDirectory::new(),
    });
    Ok(AgentRouter::new(
        ai,
        Arc::new(CostTracker::new(&config.budget)),
        Arc::new(TemplateRegistry::new()),
        directory,
    ))
}

async fn run(cli: Cli) -> CliResult {
    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Chat {
            prompt,
            system,
            temperature,
            max_tokens,
            model,
        } => {
            let router = build_router(&config, None)?;
            let request = CompletionRequest {
                prompt,
                system_prompt: system,
                temperature,
                max_tokens,
                model,
            };
            display::print_completion(&router.chat(request, None).await?);
        }
        Commands::Health => {
            let client = AiClient::from_config(&config)?;
            display::print_health(client.health_check().await);
        }
        Commands::Templates { command } => run_templates(command)?,
        Commands::AnalyzeTask { task_id, directory } => {
            let router = build_router(&config, Some(&directory))?;
            display::print_analysis(&router.analyze_task_with_ai(&task_id).await?);
        }
        Commands::SuggestAgent { task_id, directory } => {
            let router = build_router(&config, Some(&directory))?;
            display::print_suggestion(&router.suggest_agent_for_task(&task_id).await?);
        }
        Commands::Introduce {
            agent_id,
            directory,
            task_id,
            team,
        } => {
            let context = IntroductionContext {
                task_id,
                team_name: team,
            };
            println!("{}", introduce(&directory, &agent_id, &context).await?);
        }
    }
    Ok(())
}

/// Introductions only need the directory and templates, never the backend.
async fn introduce(
    directory: &Path,
    agent_id: &str,
    context: &IntroductionContext,
) -> Result<String, Box<dyn std::error::Error>> {
    let directory = InMemoryDirectory::load(directory)?;
    Ok(render_introduction(&directory, &TemplateRegistry::new(), agent_id, context).await?)
}

fn run_templates(command: TemplateCommands) -> CliResult {
    let registry = TemplateRegistry::new();
    match command {
        TemplateCommands::List { category } => {
            let templates = match category {
                Some(category) => registry.list_by_category(category.into()),
                None => registry.list_all(),
            };
            display::print_templates(&templates);
        }
        TemplateCommands::Render { id, vars } => {
            let bindings: HashMap<String, String> = vars.into_iter().collect();
            println!("{}", registry.render(&id, &bindings)?);
        }
        TemplateCommands::Validate { file, vars } => {
            let text = std::fs::read_to_string(&file)?;
            display::print_validation(&validate(&text, &vars));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display::print_error(e.as_ref());
            ExitCode::FAILURE
        }
    }
}
