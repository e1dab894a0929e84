use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use currex::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for currex::AppCommand {
    fn from(cmd: Commands) -> currex::AppCommand {
        match cmd {
            Commands::Watch => currex::AppCommand::Watch,
            Commands::Rates => currex::AppCommand::Rates,
            Commands::Exchange { amount, sell, buy } => {
                currex::AppCommand::Exchange { amount, sell, buy }
            }
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Follow balances and live rates until interrupted
    Watch,
    /// Fetch and display the current exchange rates once
    Rates,
    /// Exchange between two currency balances at the current rate
    Exchange {
        /// Amount to sell
        #[arg(short, long)]
        amount: f64,
        /// Currency code to sell
        #[arg(short, long)]
        sell: String,
        /// Currency code to buy
        #[arg(short, long)]
        buy: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => currex::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

fn setup() -> anyhow::Result<()> {
    use anyhow::Context;

    let path = currex::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let default_config = r#"---
balances:
  EUR: 1000.0

sell_currency: "EUR"
buy_currency: "USD"

provider:
  base_url: "https://developers.paysera.com/tasks/api"

poll_interval_ms: 5000
"#;

    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}
