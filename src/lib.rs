pub mod cli;
pub mod config;
pub mod connectivity;
pub mod controller;
pub mod ledger;
pub mod log;
pub mod poller;
pub mod providers;
pub mod rates;
pub mod source;

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

use crate::connectivity::ConnectivityHandle;
use crate::controller::ExchangeController;
use crate::providers::paysera::PayseraRatesSource;
use crate::source::RatesSource;

pub enum AppCommand {
    Watch,
    Rates,
    Exchange {
        amount: f64,
        sell: String,
        buy: String,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Currency exchanger starting...");

    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let source: Arc<dyn RatesSource> =
        Arc::new(PayseraRatesSource::new(&config.provider.base_url));

    match command {
        AppCommand::Rates => cli::rates::run(source.as_ref()).await,
        AppCommand::Watch => {
            let connectivity = Arc::new(ConnectivityHandle::new(true));
            let controller = ExchangeController::new(&config, source, connectivity);
            cli::watch::run(controller).await
        }
        AppCommand::Exchange { amount, sell, buy } => {
            let connectivity = Arc::new(ConnectivityHandle::new(true));
            let controller = ExchangeController::new(&config, source, connectivity);
            cli::exchange::run(controller, amount, &sell, &buy).await
        }
    }
}
