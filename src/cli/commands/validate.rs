//! Validate configuration command.

use anyhow::Result;
use std::path::Path;
use tradekit_config::load_settings;

pub async fn run(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);

    match load_settings(config_path) {
        Ok(settings) => {
            println!("Configuration is valid!");
            println!();
            println!("App: {}", settings.app.name);
            println!("Environment: {}", settings.app.environment);
            println!("Log level: {}", settings.logging.level);
            println!("Broker: {}", settings.broker.provider);
            println!("Watchlist: {} instrument(s)", settings.watchlist.len());
            println!(
                "Scheduler: priority {}s / normal {}s / nightly {:02}:00 UTC",
                settings.scheduler.priority_interval_secs,
                settings.scheduler.normal_interval_secs,
                settings.scheduler.nightly_hour_utc
            );
            for account in &settings.accounts {
                println!(
                    "Account {}: risk {} of balance, floor {}, {} day trade(s), options {}",
                    account.account_id,
                    account.risk_fraction,
                    account.min_balance_floor,
                    account.day_trade_limit,
                    if account.options_enabled { "on" } else { "off" }
                );
            }
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
