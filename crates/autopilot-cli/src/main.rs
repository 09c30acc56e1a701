mod config;
mod draft;
mod plan_cmds;
mod run_cmd;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use autopilot_core::plan::{Mode, Section};
use autopilot_core::task::TaskKind;

use config::AutopilotConfig;

#[derive(Parser)]
#[command(name = "autopilot", about = "Assemble, validate and submit automation plans")]
struct Cli {
    /// Plan draft file
    #[arg(long, global = true, default_value = draft::DEFAULT_DRAFT_PATH)]
    plan_file: PathBuf,

    /// Execution backend base URL (overrides AUTOPILOT_BACKEND_URL env var)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write an autopilot config file (uses --backend-url if given)
    Init {
        /// Subscription plan name
        #[arg(long, default_value = "basic")]
        plan: String,
        /// Maximum number of tasks the subscription allows
        #[arg(long, default_value_t = 5)]
        max_tasks: usize,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Plan draft editing
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Validate the draft and submit it to the backend
    Run,
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Create an empty plan draft
    New {
        /// basic (only pre is edited) or advanced (pre and post)
        #[arg(long, default_value = "basic")]
        mode: Mode,
        /// Overwrite an existing draft
        #[arg(long)]
        force: bool,
    },
    /// Append a default api task to a section
    Add {
        /// pre or post
        section: Section,
    },
    /// Remove a task
    Remove {
        section: Section,
        /// Task number (1-based)
        n: usize,
    },
    /// Change a task's kind, resetting its fields
    Kind {
        section: Section,
        /// Task number (1-based)
        n: usize,
        /// api, shell, or db
        kind: TaskKind,
    },
    /// Set a task field from text
    Set {
        section: Section,
        /// Task number (1-based)
        n: usize,
        /// Field name, e.g. url, method, headers, serverIp, dbUrl
        field: String,
        /// New value (JSON text for headers and body)
        value: String,
    },
    /// Upload a file and store its server path in a task field
    Attach {
        section: Section,
        /// Task number (1-based)
        n: usize,
        /// File field, e.g. privateKeyPemFilepath, shellScriptFilepath, sqlFilepath
        field: String,
        /// Local file to upload
        file: PathBuf,
    },
    /// Switch between basic and advanced mode
    Mode { mode: Mode },
    /// Validate the whole plan
    Validate,
    /// Show the draft with per-field errors
    Show {
        /// Print the payload that would be submitted instead
        #[arg(long)]
        payload: bool,
    },
}

/// Execute the `autopilot init` command: write config file.
fn cmd_init(backend_url: Option<&str>, plan: &str, max_tasks: usize, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        backend: config::BackendSection {
            url: backend_url.unwrap_or(config::DEFAULT_BACKEND_URL).to_owned(),
            ..config::BackendSection::default()
        },
        subscription: config::SubscriptionSection {
            plan: plan.to_owned(),
            max_tasks,
        },
        run: config::RunSection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  backend.url = {}", cfg.backend.url);
    println!("  subscription = {} ({} tasks)", cfg.subscription.plan, cfg.subscription.max_tasks);
    println!();
    println!("Next: run `autopilot plan new` to start a plan draft.");

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            plan,
            max_tasks,
            force,
        } => {
            cmd_init(cli.backend_url.as_deref(), &plan, max_tasks, force)?;
        }
        Commands::Plan { command } => {
            let resolved = AutopilotConfig::resolve(cli.backend_url.as_deref())?;
            plan_cmds::run_plan_command(command, &cli.plan_file, &resolved).await?;
        }
        Commands::Run => {
            let resolved = AutopilotConfig::resolve(cli.backend_url.as_deref())?;
            run_cmd::run(&cli.plan_file, &resolved).await?;
        }
    }

    Ok(())
}
