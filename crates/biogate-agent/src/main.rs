//! biogate - fingerprint terminal agent
//!
//! Polls the terminal's attendance log, checks members in and opens the door.

use anyhow::{Context, Result, bail};
use biogate_agent::{AgentConfig, BiometricService};
use biogate_storage::{Database, DatabaseConfig, MembershipRepository, SqliteMembershipRepository};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// biogate - fingerprint terminal agent
#[derive(Parser, Debug)]
#[command(name = "biogate")]
#[command(version, about, long_about = None)]
struct Cli {
    /// SQLite database path (overrides BIOGATE_DATABASE)
    #[arg(long)]
    database: Option<String>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll the terminal until interrupted
    Run {
        /// Poll even if no edge flag is set in the environment
        #[arg(long)]
        edge: bool,
    },

    /// Connect to the configured terminal and report the result
    TestConnection,

    /// Pulse the door relay
    Pulse {
        /// How long to hold the relay open
        #[arg(short, long)]
        seconds: Option<u8>,
    },

    /// Link a member to a terminal user id
    Link {
        /// Member id
        member_id: String,

        /// User id enrolled on the terminal
        device_user_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut config = AgentConfig::from_env().context("Invalid agent configuration")?;
    if let Some(path) = cli.database {
        config = config.database_path(path);
    }

    let db = Database::new(DatabaseConfig::new(&config.database_path))
        .await
        .with_context(|| format!("Failed to open database {}", config.database_path))?;
    let repo = Arc::new(SqliteMembershipRepository::new(db.pool().clone()));

    let result = match cli.command {
        Commands::Run { edge } => {
            let edge = config.edge || edge;
            run(Arc::clone(&repo), config.edge(edge)).await
        }
        Commands::TestConnection => test_connection(BiometricService::new(repo, config)).await,
        Commands::Pulse { seconds } => pulse(BiometricService::new(repo, config), seconds).await,
        Commands::Link {
            member_id,
            device_user_id,
        } => {
            let member = repo
                .link_biometric(&member_id, &device_user_id)
                .await
                .context("Failed to link member")?;
            println!(
                "Linked {} ({}) to device user {}",
                member.name, member.id, device_user_id
            );
            Ok(())
        }
    };

    db.close().await;
    result
}

async fn run(repo: Arc<SqliteMembershipRepository>, config: AgentConfig) -> Result<()> {
    let service = BiometricService::new(repo, config);

    if !service.start_polling() {
        bail!("Polling not started: set BIOGATE_EDGE=1 or pass --edge");
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    service.stop_polling().await;
    info!(stats = ?service.stats(), "Agent stopped");
    Ok(())
}

async fn test_connection(service: BiometricService<SqliteMembershipRepository>) -> Result<()> {
    let settings = service
        .load_settings()
        .await
        .context("Terminal settings unavailable")?;

    let connected = service.test_connection(&settings).await;
    service.link().close().await;

    if !connected {
        bail!("Could not connect to terminal at {settings}");
    }
    println!("Connected to terminal at {settings}");
    Ok(())
}

async fn pulse(
    service: BiometricService<SqliteMembershipRepository>,
    seconds: Option<u8>,
) -> Result<()> {
    let settings = service
        .load_settings()
        .await
        .context("Terminal settings unavailable")?;

    let acknowledged = service.pulse_relay(&settings, seconds).await;
    service.link().close().await;

    if !acknowledged {
        bail!("Terminal at {settings} did not acknowledge the relay pulse");
    }
    println!("Relay pulsed on {settings}");
    Ok(())
}
