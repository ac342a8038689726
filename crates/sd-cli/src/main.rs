//! syno-deploy CLI
//!
//! Deploys compose files and single containers to a Synology NAS (or any
//! host with a container engine) over SSH, and wraps the everyday container
//! commands: ps, logs, exec, start, stop, restart, rm and pull.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sd_core::config::PullPolicy;
use syno_deploy::commands::{self, DeployArgs, Lifecycle, RemoteOverrides, RunArgs};
use syno_deploy::output::print_error;

#[derive(Parser)]
#[command(name = "syno-deploy")]
#[command(author, version, about = "Deploy containers to a Synology NAS over SSH")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Remote host, optionally with :port (overrides config)
    #[arg(long, global = true, env = "SYNO_DEPLOY_HOST")]
    host: Option<String>,

    /// SSH user (overrides config)
    #[arg(long, global = true, env = "SYNO_DEPLOY_USER")]
    user: Option<String>,

    /// SSH port (overrides config)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Private key file (overrides config)
    #[arg(long, global = true)]
    key: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy every service of a docker-compose file
    Deploy {
        /// Compose file
        #[arg(default_value = "docker-compose.yml")]
        file: PathBuf,
        /// Project name (derived from the compose file's directory if not set)
        #[arg(short, long)]
        project: Option<String>,
        /// Variable file used for ${VAR} expansion
        #[arg(long)]
        env_file: Option<PathBuf>,
        /// Image pull policy (always, missing, never)
        #[arg(long)]
        pull: Option<PullPolicy>,
        /// Print the commands without connecting
        #[arg(long)]
        dry_run: bool,
        /// Output the deployment report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Deploy a single container
    Run {
        /// Image to run
        image: String,
        /// Container name (derived from the image if not set)
        #[arg(short, long)]
        name: Option<String>,
        /// Port mapping host:container (repeatable)
        #[arg(short = 'p', long = "publish")]
        ports: Vec<String>,
        /// Volume mapping host:container[:opts] (repeatable)
        #[arg(long = "volume")]
        volumes: Vec<String>,
        /// Environment variable KEY=value (repeatable)
        #[arg(short, long)]
        env: Vec<String>,
        /// Restart policy
        #[arg(long)]
        restart: Option<String>,
        /// Network to join
        #[arg(long)]
        network: Option<String>,
        /// Working directory inside the container
        #[arg(short, long)]
        workdir: Option<String>,
        /// User to run as inside the container
        #[arg(short = 'u', long = "run-as")]
        run_as: Option<String>,
        /// Image pull policy (always, missing, never)
        #[arg(long)]
        pull: Option<PullPolicy>,
        /// Print what would be run without connecting
        #[arg(long)]
        dry_run: bool,
        /// Command and arguments passed to the container
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Pull an image
    Pull {
        /// Image reference
        image: String,
    },

    /// List containers
    Ps {
        /// Include stopped containers
        #[arg(short, long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show container logs
    Logs {
        /// Container name or ID
        container: String,
        /// Follow output until Ctrl+C
        #[arg(short, long)]
        follow: bool,
        /// Number of lines from the end
        #[arg(short = 'n', long)]
        tail: Option<u32>,
    },

    /// Run a command in a running container
    Exec {
        /// Container name or ID
        container: String,
        /// Command and arguments
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },

    /// Start containers
    Start {
        #[arg(required = true)]
        containers: Vec<String>,
    },

    /// Stop containers
    Stop {
        /// Seconds to wait before killing
        #[arg(short, long)]
        time: Option<u32>,
        #[arg(required = true)]
        containers: Vec<String>,
    },

    /// Restart containers
    Restart {
        /// Seconds to wait before killing
        #[arg(short, long)]
        time: Option<u32>,
        #[arg(required = true)]
        containers: Vec<String>,
    },

    /// Remove containers
    Rm {
        /// Remove running containers
        #[arg(short, long)]
        force: bool,
        #[arg(required = true)]
        containers: Vec<String>,
    },

    /// Check the SSH connection and the remote container engine
    Check,

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(e) = run(cli).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let overrides = RemoteOverrides {
        host: cli.host,
        user: cli.user,
        port: cli.port,
        key: cli.key,
    };
    let config_path = cli.config.as_deref();
    if matches!(
        cli.command,
        Commands::Config {
            action: ConfigAction::Path
        }
    ) {
        return commands::config_path(config_path);
    }
    let config = commands::load_client_config(config_path, &overrides)?;

    match cli.command {
        Commands::Deploy {
            file,
            project,
            env_file,
            pull,
            dry_run,
            json,
        } => {
            commands::deploy_command(
                &config,
                DeployArgs {
                    file,
                    project,
                    env_file,
                    pull,
                    dry_run,
                    json,
                },
            )
            .await?;
        }

        Commands::Run {
            image,
            name,
            ports,
            volumes,
            env,
            restart,
            network,
            workdir,
            run_as,
            pull,
            dry_run,
            command,
        } => {
            commands::run_command(
                &config,
                RunArgs {
                    image,
                    name,
                    ports,
                    volumes,
                    env,
                    restart,
                    network,
                    workdir,
                    user: run_as,
                    command,
                    pull,
                    dry_run,
                },
            )
            .await?;
        }

        Commands::Pull { image } => commands::pull_command(&config, &image).await?,

        Commands::Ps { all, json } => commands::ps_command(&config, all, json).await?,

        Commands::Logs {
            container,
            follow,
            tail,
        } => commands::logs_command(&config, &container, follow, tail).await?,

        Commands::Exec { container, command } => {
            commands::exec_command(&config, &container, &command).await?
        }

        Commands::Start { containers } => {
            commands::lifecycle_command(&config, Lifecycle::Start, &containers).await?
        }

        Commands::Stop { time, containers } => {
            commands::lifecycle_command(&config, Lifecycle::Stop { time }, &containers).await?
        }

        Commands::Restart { time, containers } => {
            commands::lifecycle_command(&config, Lifecycle::Restart { time }, &containers)
                .await?
        }

        Commands::Rm { force, containers } => {
            commands::lifecycle_command(&config, Lifecycle::Remove { force }, &containers)
                .await?
        }

        Commands::Check => commands::check_command(&config).await?,

        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(config_path, &config)?,
            ConfigAction::Path => commands::config_path(config_path)?,
        },
    }

    Ok(())
}
