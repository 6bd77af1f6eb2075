use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "rigor", about = "Adversarial practice for system-design interviews")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage API credentials
    Auth(commands::auth::AuthArgs),
    /// List design challenges
    Challenges(commands::challenges::ChallengesArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Start an interactive practice session
    Practice(commands::practice::PracticeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Auth(args) => commands::auth::run(args),
        Commands::Challenges(args) => commands::challenges::run(args).await,
        Commands::Config(args) => commands::config::run(args),
        Commands::Practice(args) => commands::practice::run(args).await,
    }
}
