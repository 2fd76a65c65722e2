use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reset SIGPIPE to default behavior so piping (e.g. `pgstack graph | dot`) exits cleanly
/// instead of panicking on broken pipe.
#[cfg(unix)]
fn reset_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use pgstack::config::{loader, ProjectFile};
use pgstack::dag::resource_graph;
use pgstack::executor::cluster::{ClusterClient, KubeCluster};
use pgstack::executor::engine::ResourceEngine;
use pgstack::output::formatter;
use pgstack::stack::{self, LoadedStack};
use pgstack::state::models::ResourceFilter;
use pgstack::state::{FileLock, SqliteBackend, StateBackend, STATE_DB};

/// pgstack - StackGres Postgres stack provisioning
#[derive(Parser)]
#[command(name = "pgstack", version, about, long_about = None)]
struct Cli {
    /// Project directory containing pgstack.yaml, stack files and alerts.yaml
    #[arg(short = 'c', long, default_value = ".")]
    project_dir: String,

    /// Stack to operate on (reads pgstack.<stack>.yaml)
    #[arg(short, long, default_value = "dev")]
    stack: String,

    /// Working directory for state and locks [default: settings.working_dir]
    #[arg(short, long)]
    working_dir: Option<String>,

    /// Maximum parallelism for resource operations [default: settings.parallelism]
    #[arg(short, long)]
    parallelism: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and the declared stack without touching the cluster
    Validate,

    /// Show the dependency graph as DOT
    Graph,

    /// Show the execution plan (create/update/delete per resource)
    Plan {
        /// Check recorded resources against the cluster
        #[arg(long)]
        refresh: bool,
    },

    /// Apply the stack with resource-level parallelism
    Apply {
        /// Skip confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },

    /// Destroy every recorded resource in reverse dependency order
    Destroy {
        /// Skip confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },

    /// Inspect and edit recorded state
    State {
        #[command(subcommand)]
        command: StateCommands,
    },

    /// Show recent apply and destroy runs
    Runs {
        /// Number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum StateCommands {
    /// List all resources in state
    List {
        /// Filter like "kind=sg_cluster" or "status=failed"
        #[arg(long)]
        filter: Option<String>,
    },

    /// Show details for a specific resource
    Show {
        /// Resource address (e.g. sg_cluster.stackgres-cluster)
        address: String,
    },

    /// Remove a resource from state without deleting it from the cluster
    Rm {
        /// Resource address to remove
        address: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    #[cfg(unix)]
    reset_sigpipe();

    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Validate => cmd_validate(&cli),
        Commands::Graph => cmd_graph(&cli),
        Commands::Plan { refresh } => cmd_plan(&cli, refresh).await,
        Commands::Apply { auto_approve } => cmd_apply(&cli, auto_approve).await,
        Commands::Destroy { auto_approve } => cmd_destroy(&cli, auto_approve).await,
        Commands::State { ref command } => cmd_state(&cli, command).await,
        Commands::Runs { limit } => cmd_runs(&cli, limit).await,
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn project_dir(cli: &Cli) -> &Path {
    Path::new(&cli.project_dir)
}

fn load_stack(cli: &Cli) -> Result<LoadedStack> {
    stack::load(project_dir(cli), &cli.stack)
        .with_context(|| format!("Failed to load stack '{}'", cli.stack))
}

/// Working directory from the flag, else from project settings relative to
/// the project directory.
fn working_dir(cli: &Cli) -> Result<PathBuf> {
    if let Some(ref dir) = cli.working_dir {
        return Ok(PathBuf::from(dir));
    }
    let project = loader::load_project(project_dir(cli))?;
    Ok(project_dir(cli).join(project.settings.working_dir))
}

async fn open_backend(working_dir: &Path) -> Result<SqliteBackend> {
    let backend = SqliteBackend::open(&working_dir.join(STATE_DB))?;
    backend.initialize().await?;
    Ok(backend)
}

fn parallelism(cli: &Cli, project: &ProjectFile) -> usize {
    cli.parallelism.unwrap_or(project.settings.parallelism)
}

async fn connect(context: &str, project: &ProjectFile) -> Result<Arc<dyn ClusterClient>> {
    let cluster = KubeCluster::connect(context, &project.settings).await?;
    Ok(Arc::new(cluster))
}

fn confirm(prompt: &str) -> Result<bool> {
    use std::io::Write;
    println!("\n{} Only '{}' will be accepted.", prompt, "yes".bold());
    print!("  Enter a value: ");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim() == "yes")
}

// ─── Commands ────────────────────────────────────────────────────────────────

fn cmd_validate(cli: &Cli) -> Result<()> {
    let loaded = load_stack(cli)?;
    let (graph, _) = resource_graph::build_resource_dag(&loaded.declaration)?;

    println!(
        "  {} project {}, stack {}, context {}",
        "→".blue(),
        loaded.project.name.bold(),
        loaded.config.stack.bold(),
        loaded.config.kubeconfig_context.bold()
    );
    println!(
        "  {} {} resource(s), {} dependency edge(s)",
        "→".blue(),
        loaded.declaration.resources().len(),
        graph.edge_count()
    );

    formatter::print_success("Configuration is valid.");
    Ok(())
}

fn cmd_graph(cli: &Cli) -> Result<()> {
    let loaded = load_stack(cli)?;
    let (graph, _) = resource_graph::build_resource_dag(&loaded.declaration)?;
    println!("{}", resource_graph::to_dot(&graph));
    Ok(())
}

async fn cmd_plan(cli: &Cli, refresh: bool) -> Result<()> {
    let loaded = load_stack(cli)?;
    let backend = open_backend(&working_dir(cli)?).await?;
    let stack_id = backend.ensure_stack(&cli.stack).await?;

    let engine = ResourceEngine::new(
        connect(&loaded.config.kubeconfig_context, &loaded.project).await?,
        parallelism(cli, &loaded.project),
    );
    let plan = engine
        .plan(&loaded.declaration, &backend, &stack_id, refresh)
        .await?;

    formatter::print_resource_plan(&plan);
    Ok(())
}

async fn cmd_apply(cli: &Cli, auto_approve: bool) -> Result<()> {
    let loaded = load_stack(cli)?;
    let work_dir = working_dir(cli)?;
    let lock = FileLock::acquire(&work_dir, &cli.stack)?;

    let backend = open_backend(&work_dir).await?;
    let stack_id = backend.ensure_stack(&cli.stack).await?;

    let engine = ResourceEngine::new(
        connect(&loaded.config.kubeconfig_context, &loaded.project).await?,
        parallelism(cli, &loaded.project),
    );

    // Plan first
    let plan = engine
        .plan(&loaded.declaration, &backend, &stack_id, false)
        .await?;
    formatter::print_resource_plan(&plan);

    if !plan.has_changes() {
        lock.release()?;
        return Ok(());
    }

    if !auto_approve && !confirm("Do you want to perform these actions?")? {
        println!("\n{}", "Apply cancelled.".yellow());
        lock.release()?;
        return Ok(());
    }

    let backend: Arc<dyn StateBackend> = Arc::new(backend);
    let summary = engine
        .apply(&loaded.declaration, Arc::clone(&backend), &stack_id, &plan)
        .await?;
    lock.release()?;

    println!();
    println!("{}", summary);

    if let Some((address, message)) = summary.first_error() {
        bail!("Apply failed at {}: {}", address, message);
    }
    Ok(())
}

async fn cmd_destroy(cli: &Cli, auto_approve: bool) -> Result<()> {
    let project = loader::load_project(project_dir(cli))?;
    let context = loader::load_kubeconfig_context(project_dir(cli), &project.name, &cli.stack)
        .with_context(|| format!("Failed to load stack '{}'", cli.stack))?;
    let work_dir = working_dir(cli)?;
    let lock = FileLock::acquire(&work_dir, &cli.stack)?;

    let backend = open_backend(&work_dir).await?;
    let stack_id = backend.ensure_stack(&cli.stack).await?;

    let resources = backend
        .list_resources(&stack_id, &ResourceFilter::default())
        .await?;
    if resources.is_empty() {
        println!("{}", "No resources in state. Nothing to destroy.".dimmed());
        lock.release()?;
        return Ok(());
    }

    println!("\nDestruction Plan");
    println!("{}", "─".repeat(60));
    for r in &resources {
        println!("  {} {}", "-".red().bold(), r.address.red());
    }
    println!("{}", "─".repeat(60));
    println!(
        "\n{} This will destroy {} resource(s).",
        "⚠".yellow().bold(),
        resources.len().to_string().red().bold()
    );

    if !auto_approve && !confirm("Do you really want to destroy all resources?")? {
        println!("\n{}", "Destroy cancelled.".yellow());
        lock.release()?;
        return Ok(());
    }

    let engine = ResourceEngine::new(
        connect(&context, &project).await?,
        parallelism(cli, &project),
    );
    let backend: Arc<dyn StateBackend> = Arc::new(backend);
    let summary = engine.destroy(Arc::clone(&backend), &stack_id).await?;
    lock.release()?;

    println!();
    println!("{}", summary);

    if let Some((address, message)) = summary.first_error() {
        bail!("Destroy failed at {}: {}", address, message);
    }
    Ok(())
}

async fn cmd_state(cli: &Cli, command: &StateCommands) -> Result<()> {
    let backend = open_backend(&working_dir(cli)?).await?;
    let stack_id = backend
        .get_stack(&cli.stack)
        .await?
        .map(|s| s.id)
        .with_context(|| format!("Stack '{}' has no recorded state.", cli.stack))?;

    match command {
        StateCommands::List { filter } => {
            let mut resource_filter = ResourceFilter::default();
            if let Some(f) = filter {
                for part in f.split(',') {
                    let Some((key, value)) = part.split_once('=') else {
                        bail!("Invalid filter '{}'. Use key=value.", part);
                    };
                    match key.trim() {
                        "kind" => resource_filter.kind_token = Some(value.trim().to_string()),
                        "status" => resource_filter.status = Some(value.trim().to_string()),
                        other => bail!("Unknown filter key '{}'. Use 'kind' or 'status'.", other),
                    }
                }
            }

            let resources = backend.list_resources(&stack_id, &resource_filter).await?;
            formatter::print_resource_list(&resources);
        }

        StateCommands::Show { address } => {
            let resource = backend
                .get_resource(&stack_id, address)
                .await?
                .with_context(|| format!("Resource '{}' not found in state.", address))?;
            let dependencies = backend.get_dependencies(&resource.id).await?;
            formatter::print_resource_detail(&resource, &dependencies);
        }

        StateCommands::Rm { address } => {
            let lock = FileLock::acquire(&working_dir(cli)?, &cli.stack)?;
            let resource = backend.get_resource(&stack_id, address).await?;
            if resource.is_none() {
                bail!("Resource '{}' not found in state.", address);
            }
            backend.delete_resource(&stack_id, address).await?;
            lock.release()?;
            formatter::print_success(&format!(
                "Removed {} from state (cluster unchanged).",
                address
            ));
        }
    }

    Ok(())
}

async fn cmd_runs(cli: &Cli, limit: usize) -> Result<()> {
    let backend = open_backend(&working_dir(cli)?).await?;
    let Some(stack) = backend.get_stack(&cli.stack).await? else {
        println!("{}", "No runs recorded.".dimmed());
        return Ok(());
    };

    let runs = backend.list_runs(&stack.id, limit).await?;
    formatter::print_runs(&runs);

    if let Some(latest) = backend.get_latest_run(&stack.id).await? {
        let results = backend.list_run_results(&latest.id).await?;
        if !results.is_empty() {
            println!("{} ({})", "Latest run".bold(), latest.operation);
            formatter::print_run_results(&results);
        }
    }
    Ok(())
}
