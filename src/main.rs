use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gatehouse::accounts::{Accounts, Bootstrap};
use gatehouse::auth::{MAX_PASSWORD_LENGTH, spawn_sweeper};
use gatehouse::config::{AuthConfig, ServerConfig};
use gatehouse::server::{AppState, create_router};
use gatehouse::store::{CredentialStore, SqliteStore, Store};

#[derive(Parser)]
#[command(name = "gatehouse")]
#[command(about = "Authentication and permission server for experiment tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "5000")]
        port: u16,

        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// TOML file with auth settings
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database and root admin)
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// TOML file with auth settings
        #[arg(long)]
        config: Option<PathBuf>,

        /// Skip interactive prompts and use the configured admin password
        #[arg(long)]
        non_interactive: bool,
    },
}

fn load_auth_config(path: Option<&PathBuf>) -> anyhow::Result<AuthConfig> {
    match path {
        Some(path) => AuthConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(AuthConfig::default()),
    }
}

fn open_store(config: &ServerConfig) -> anyhow::Result<Arc<SqliteStore>> {
    fs::create_dir_all(&config.data_dir)?;
    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;
    Ok(Arc::new(store))
}

fn prompt_password() -> anyhow::Result<String> {
    let password = inquire::Password::new("Root admin password:")
        .with_validator(|input: &str| {
            if input.is_empty() {
                Ok(inquire::validator::Validation::Invalid(
                    "Password cannot be empty".into(),
                ))
            } else if input.len() > MAX_PASSWORD_LENGTH {
                Ok(inquire::validator::Validation::Invalid(
                    format!("Password cannot exceed {MAX_PASSWORD_LENGTH} bytes").into(),
                ))
            } else {
                Ok(inquire::validator::Validation::Valid)
            }
        })
        .prompt()?;
    Ok(password)
}

fn run_init(data_dir: String, config_path: Option<PathBuf>, non_interactive: bool) -> anyhow::Result<()> {
    let config = ServerConfig {
        data_dir: data_dir.into(),
        config_path,
        ..ServerConfig::default()
    };
    let auth = load_auth_config(config.config_path.as_ref())?;
    let store = open_store(&config)?;

    if store.has_root_admin()? {
        bail!(
            "Server already initialized. Database exists at: {}",
            config.db_path().display()
        );
    }

    let password = if non_interactive {
        auth.admin_password.clone()
    } else {
        prompt_password()?
    };

    let accounts = Accounts::new(store);
    match accounts.bootstrap_root(&auth.admin_username, &password)? {
        Bootstrap::Created(user) => {
            println!();
            println!("========================================");
            println!("Created root admin '{}'", user.username);
            println!("Database: {}", config.db_path().display());
            println!("========================================");
            println!();
        }
        Bootstrap::AlreadyPresent => {
            bail!(
                "Server already initialized by another process. Database exists at: {}",
                config.db_path().display()
            );
        }
    }

    Ok(())
}

async fn run_serve(config: ServerConfig) -> anyhow::Result<()> {
    let auth = load_auth_config(config.config_path.as_ref())?;
    let store = open_store(&config)?;

    // First start without `admin init` falls back to the configured
    // credentials.
    let accounts = Accounts::new(store.clone());
    if let Bootstrap::Created(user) =
        accounts.bootstrap_root(&auth.admin_username, &auth.admin_password)?
    {
        tracing::warn!(
            "Created root admin '{}' with the configured password. Change it.",
            user.username
        );
    }
    if !store.has_root_admin()? {
        bail!(
            "No root admin in {}. Run `gatehouse admin init` first.",
            config.db_path().display()
        );
    }

    let sweep_interval = auth.session.sweep_interval();
    let state = Arc::new(AppState::new(store, auth));

    let sweeper = sweep_interval.map(|every| spawn_sweeper(state.sessions.clone(), every));

    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gatehouse=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                config,
                non_interactive,
            } => {
                run_init(data_dir, config, non_interactive)?;
            }
        },
        Commands::Serve {
            host,
            port,
            data_dir,
            config,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
                config_path: config,
            };
            run_serve(config).await?;
        }
    }

    Ok(())
}
