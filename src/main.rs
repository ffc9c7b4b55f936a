use clap::{Parser, Subcommand};
use workmemo::Result;
use workmemo::commands::{serve, show_config, show_status};

#[derive(Parser)]
#[command(name = "workmemo")]
#[command(about = "A work-notes knowledge base with retrieval-augmented question answering")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve,
    /// Show the active configuration
    Config,
    /// Show storage counters
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            serve().await?;
        }
        Commands::Config => {
            show_config()?;
        }
        Commands::Status => {
            show_status().await?;
        }
    }

    Ok(())
}
