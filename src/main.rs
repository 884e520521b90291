mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "lexzap",
    version,
    about = "WhatsApp assistant administration for law firms"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a law-firm client and provision its WhatsApp instance.
    Add {
        /// Client name, e.g. "Silva & Associados".
        name: String,
    },
    /// List clients and their persisted connection status.
    List,
    /// Pair a client's instance: display the QR code and wait for the scan.
    Connect { name: String },
    /// Log a client's instance out of its WhatsApp session.
    Disconnect { name: String },
    /// Delete a client locally and on the gateway.
    Remove { name: String },
    /// Reconcile every client's stored status against the gateway.
    Sync,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cfg = lexzap_core::config::load(&cli.config)?;

    match cli.command {
        Commands::Add { name } => commands::add(&cfg, &name).await,
        Commands::List => commands::list(&cfg).await,
        Commands::Connect { name } => commands::connect(&cfg, &name).await,
        Commands::Disconnect { name } => commands::disconnect(&cfg, &name).await,
        Commands::Remove { name } => commands::remove(&cfg, &name).await,
        Commands::Sync => commands::sync(&cfg).await,
    }
}
