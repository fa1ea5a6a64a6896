pub mod cli;
pub mod core;
pub mod providers;
pub mod resolver;

use crate::core::cache::Cache;
use crate::core::clock::{Clock, SystemClock};
use crate::core::config::AppConfig;
use crate::providers::{CoinGeckoProvider, FrankfurterProvider};
use crate::resolver::RateResolver;
use anyhow::Result;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Currencies,
    Convert(ConvertRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertRequest {
    pub amount: Decimal,
    /// Falls back to the saved source currency when absent.
    pub from: Option<String>,
    /// Falls back to the saved selection when empty.
    pub to: Vec<String>,
}

/// Rate clients sharing one clock, each with its own cache.
pub struct RateServices {
    pub fiat: FrankfurterProvider,
    pub crypto: CoinGeckoProvider,
}

impl RateServices {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let fiat = FrankfurterProvider::new(
            &config.providers.frankfurter.base_url,
            &config.network,
            Arc::new(Cache::with_clock(Arc::clone(&clock))),
            Arc::new(Cache::with_clock(Arc::clone(&clock))),
        )?;
        let crypto = CoinGeckoProvider::new(
            &config.providers.coingecko.base_url,
            &config.network,
            Arc::new(Cache::with_clock(clock)),
        )?;
        Ok(RateServices { fiat, crypto })
    }

    pub fn resolver(&self) -> RateResolver<'_> {
        RateResolver::new(&self.fiat, &self.crypto)
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("xconv starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let services = RateServices::from_config(&config)?;
    let resolver = services.resolver();

    match command {
        AppCommand::Currencies => cli::currencies::run(&resolver).await,
        AppCommand::Convert(request) => {
            let store = cli::preferences::PreferenceStore::from_config(&config)?;
            cli::convert::run(&resolver, &store, request).await
        }
    }
}
