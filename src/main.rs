use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "collectord")]
#[command(about = "Scheduled signal and metrics collection daemon", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Run,
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    /// Check a collector definition without running it
    Validate {
        #[arg(long)]
        collector: PathBuf,
    },
    /// Invoke a collector once and exit
    Invoke {
        #[arg(long)]
        collector: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "collectord=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config_path = collectord::config::resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run) | None => {
            // Default behavior is to run
            collectord::cli::run::run(config_path).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                collectord::cli::config::init(stdout)?;
            }
            ConfigAction::Validate { collector } => {
                collectord::cli::config::validate(&collector)?;
            }
            ConfigAction::Invoke { collector } => {
                collectord::cli::config::invoke(&collector).await?;
            }
        },
    }

    Ok(())
}
