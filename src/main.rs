//! noesis CLI: goal analysis, planning and knowledge-graph inference.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use noesis::atomspace::{AtomId, AtomType, Atomspace};
use noesis::config::EngineConfig;
use noesis::orchestrator::{
    InferenceParams, InferenceRequest, KnowledgeBase, KnowledgeQuery, Orchestrator,
};
use noesis::plan::OrchestrationContext;
use noesis::pln::PlnEngine;

const DEFAULT_CONFIG: &str = "noesis.toml";

#[derive(Parser)]
#[command(name = "noesis", version, about = "Cognitive orchestration engine")]
struct Cli {
    /// Engine configuration file (default: ./noesis.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Knowledge-graph snapshot file to work against.
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a goal: complexity, feasibility, risks and decomposition.
    Analyze {
        goal: String,
        /// Tools available to the plan (comma-separated).
        #[arg(long, value_delimiter = ',')]
        tools: Vec<String>,
    },

    /// Reason about a single task description.
    Reason {
        description: String,
    },

    /// Create a plan for a goal and index it into the snapshot.
    Plan {
        goal: String,
    },

    /// Query the knowledge graph.
    Query {
        /// Atom type, e.g. GoalNode.
        #[arg(long = "type")]
        atom_type: Option<String>,
        /// Exact atom name.
        #[arg(long)]
        name: Option<String>,
        /// Regex over atom names.
        #[arg(long)]
        pattern: Option<String>,
        #[arg(long)]
        min_confidence: Option<f64>,
        #[arg(long)]
        min_strength: Option<f64>,
        /// Minimum short-term importance.
        #[arg(long)]
        min_sti: Option<f64>,
        #[arg(long)]
        limit: Option<usize>,
        /// Also list stored goals similar to this text.
        #[arg(long)]
        similar: Option<String>,
    },

    /// Run probabilistic inference over the knowledge graph.
    Infer {
        /// Write derived atoms back to the snapshot.
        #[arg(long)]
        write: bool,
        #[command(subcommand)]
        mode: InferMode,
    },

    /// Show engine statistics.
    Stats,

    /// Manage the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum InferMode {
    /// Derive new relationships until nothing new appears.
    Forward {
        #[arg(long)]
        max_iterations: Option<usize>,
        #[arg(long)]
        max_new_atoms: Option<usize>,
        #[arg(long)]
        min_confidence: Option<f64>,
    },
    /// Search for proof paths supporting a target atom.
    Backward {
        /// Numeric atom id.
        target: u64,
        #[arg(long)]
        max_depth: Option<usize>,
        #[arg(long)]
        min_confidence: Option<f64>,
    },
    /// Estimate the success probability of a task description.
    #[command(name = "task_success", alias = "task-success")]
    TaskSuccess {
        description: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration.
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok();

    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = if config_path.exists() {
        EngineConfig::load(&config_path)?
    } else {
        EngineConfig::default()
    };

    if let Commands::Config { action } = &cli.command {
        return run_config(action, &config_path, &config);
    }

    let snapshot = cli.snapshot.as_deref();
    let orchestrator = Orchestrator::builder(config.clone())
        .with_knowledge(load_knowledge(snapshot)?)
        .build();

    match cli.command {
        Commands::Analyze { goal, tools } => {
            let context = OrchestrationContext::with_tools(tools);
            print_json(&orchestrator.analyze_goal(&goal, &context)?)?;
        }

        Commands::Reason { description } => {
            let context = OrchestrationContext::default();
            print_json(&orchestrator.reason_about_task(&description, &context)?)?;
        }

        Commands::Plan { goal } => {
            let plan = orchestrator
                .create_plan(&goal, OrchestrationContext::default())
                .await?;
            print_json(&plan)?;
            save_knowledge(&orchestrator, snapshot)?;
        }

        Commands::Query {
            atom_type,
            name,
            pattern,
            min_confidence,
            min_strength,
            min_sti,
            limit,
            similar,
        } => {
            let atom_type = atom_type
                .map(|t| t.parse::<AtomType>())
                .transpose()?;
            let query = KnowledgeQuery {
                atom_type,
                name,
                name_pattern: pattern,
                min_confidence,
                min_strength,
                min_sti,
                limit,
                find_similar: similar,
            };
            print_json(&orchestrator.query_knowledge(&query)?)?;
        }

        Commands::Infer { write, mode } => {
            let (mode, params) = match mode {
                InferMode::Forward {
                    max_iterations,
                    max_new_atoms,
                    min_confidence,
                } => (
                    "forward",
                    InferenceParams {
                        max_iterations: Some(max_iterations.unwrap_or(config.pln_max_iterations)),
                        max_new_atoms,
                        min_confidence: Some(min_confidence.unwrap_or(config.pln_min_confidence)),
                        ..Default::default()
                    },
                ),
                InferMode::Backward {
                    target,
                    max_depth,
                    min_confidence,
                } => (
                    "backward",
                    InferenceParams {
                        target: Some(AtomId::new(target)),
                        max_depth,
                        min_confidence,
                        ..Default::default()
                    },
                ),
                InferMode::TaskSuccess { description } => (
                    "task_success",
                    InferenceParams {
                        task_description: Some(description),
                        ..Default::default()
                    },
                ),
            };
            let request = InferenceRequest::from_mode(mode, params)?;
            print_json(&orchestrator.infer(request)?)?;
            if write {
                save_knowledge(&orchestrator, snapshot)?;
            }
        }

        Commands::Stats => {
            print_json(&orchestrator.stats())?;
        }

        Commands::Config { .. } => {}
    }

    Ok(())
}

fn run_config(action: &ConfigAction, path: &Path, config: &EngineConfig) -> Result<()> {
    match action {
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                miette::bail!(
                    help = "pass --force to overwrite it",
                    "{} already exists",
                    path.display()
                );
            }
            EngineConfig::default().save(path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        ConfigAction::Show => {
            print!("{}", config.to_toml()?);
        }
    }
    Ok(())
}

/// Knowledge base seeded from a snapshot when one exists.
fn load_knowledge(path: Option<&Path>) -> Result<KnowledgeBase> {
    let atomspace = match path {
        Some(p) if p.exists() => Atomspace::load_snapshot(p)?,
        _ => Atomspace::new(),
    };
    Ok(KnowledgeBase::new(atomspace, PlnEngine::new()))
}

fn save_knowledge(orchestrator: &Orchestrator, path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        orchestrator.with_knowledge(|kb| kb.atomspace.save_snapshot(path))?;
        tracing::info!(path = %path.display(), "snapshot written");
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}
