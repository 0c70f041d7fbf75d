//! Dockhand CLI
//!
//! The `dockhand` command runs the containerization pipeline against a local
//! repository using the dry-run collaborators.
//!
//! ## Commands
//!
//! - `run`: analyze, generate, build, scan, and deploy (dry run)
//! - `schema`: print the JSON schema of the workflow params or result
//! - `config`: print the effective configuration

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dockhand_core::telemetry::init_tracing;
use dockhand_core::{DockhandConfig, Environment, SamplingOrchestrator, METRICS};
use dockhand_session::SessionStore;
use dockhand_workflow::contract::{params_schema, result_schema};
use dockhand_workflow::{
    AbortController, Collaborators, ContainerizationPipeline, WorkflowOrchestrator,
    WorkflowParams, WORKFLOW_NAME,
};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "dockhand")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Containerize a repository: Dockerfile, image, manifests, deployment", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Path to a dockhand.toml configuration file
    #[arg(short, long, global = true, env = "DOCKHAND_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the containerization pipeline against a repository
    Run {
        /// Repository to containerize
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Kubernetes namespace to deploy into
        #[arg(short, long, default_value = "default")]
        namespace: String,

        /// Image name (default: derived from the repository directory)
        #[arg(short, long)]
        image: Option<String>,

        /// Image tag
        #[arg(short, long, default_value = "0.1.0")]
        tag: String,

        /// Target environment (development, staging, production)
        #[arg(short, long, default_value = "production")]
        env: Environment,

        /// Number of replicas in the generated Deployment
        #[arg(long, default_value_t = 1)]
        replicas: u32,

        /// Reuse or create a session with this id
        #[arg(long)]
        session: Option<String>,

        /// Stop after manifest generation
        #[arg(long)]
        no_deploy: bool,

        /// Skip the vulnerability scan and remediation
        #[arg(long)]
        no_scan: bool,

        /// Generate one candidate per artifact instead of sampling
        #[arg(long)]
        single: bool,
    },

    /// Print the JSON schema of the host contract
    Schema {
        #[arg(value_enum, default_value_t = SchemaKind::Params)]
        kind: SchemaKind,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SchemaKind {
    Params,
    Result,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config.log_level()
    };
    init_tracing(cli.json || config.logging.json, level);

    match cli.command {
        Commands::Run {
            path,
            namespace,
            image,
            tag,
            env,
            replicas,
            session,
            no_deploy,
            no_scan,
            single,
        } => {
            let mut params = WorkflowParams::new(path);
            params.namespace = namespace;
            params.image_name = image;
            params.image_tag = tag;
            params.environment = env;
            params.replicas = replicas;
            params.session_id = session;
            params.deploy = !no_deploy;
            params.scan = !no_scan;
            params.sampling = !single;
            cmd_run(&config, params).await
        }
        Commands::Schema { kind } => cmd_schema(kind),
        Commands::Config => cmd_config(&config),
    }
}

/// Defaults, then the file (if any), then `DOCKHAND_*` variables.
fn load_config(path: Option<&Path>) -> Result<DockhandConfig> {
    let mut config = match path {
        Some(path) => DockhandConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => DockhandConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid DOCKHAND_* environment override")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn cmd_run(config: &DockhandConfig, params: WorkflowParams) -> Result<()> {
    let store = Arc::new(SessionStore::new(config.session_store_config()));
    let sweeper = store.start_sweeper();

    let pipeline = ContainerizationPipeline::new(
        Collaborators::dry_run(),
        SamplingOrchestrator::new(config.sampling_config()),
    );
    let orchestrator = WorkflowOrchestrator::new(Arc::clone(&store)).with_name(WORKFLOW_NAME);
    let controller = AbortController::new();
    let signal = controller.signal();

    info!(repo = %params.repo_path.display(), image = %params.image_ref(), "Starting dry run");

    let run = pipeline.run(&orchestrator, &params, &signal);
    tokio::pin!(run);
    let result = tokio::select! {
        result = &mut run => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; aborting after the current step");
            controller.abort();
            run.await
        }
    };

    let expired = store.sweep_expired();
    METRICS.add_sessions_expired(expired as u64);
    sweeper.shutdown().await;
    METRICS.flush();

    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        anyhow::bail!(
            "Workflow failed at {}: {}",
            result.failed_step.as_deref().unwrap_or("start"),
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn cmd_schema(kind: SchemaKind) -> Result<()> {
    let schema = match kind {
        SchemaKind::Params => params_schema(),
        SchemaKind::Result => result_schema(),
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn cmd_config(config: &DockhandConfig) -> Result<()> {
    let text = config
        .to_toml_string()
        .context("Failed to serialize configuration")?;
    print!("{text}");
    Ok(())
}
