//! Command implementations and shared wiring.

pub mod flatten;
pub mod run;
pub mod validate;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use tradekit_broker::{
    AlpacaConfig, AlpacaGateway, CircuitBreaker, PaperGateway, ResilientGateway, RetryPolicy,
    RobinhoodConfig, RobinhoodGateway,
};
use tradekit_config::Settings;
use tradekit_core::traits::{BrokerGateway, MemoryStore, PriceFeed};
use tradekit_core::types::RiskProfile;
use tradekit_indicators::SnapshotBuilder;
use tradekit_ledger::LifoLedger;
use tradekit_monitor::{AccountContext, Pipeline};

/// Fully wired decision pipeline plus the accounts and watchlist it
/// serves.
pub(crate) struct Engine {
    pub pipeline: Arc<Pipeline>,
    pub accounts: Vec<AccountContext>,
    pub watchlist: Vec<String>,
}

/// Build the broker gateway and price feed named in the settings.
fn build_broker(settings: &Settings) -> Result<(Arc<dyn BrokerGateway>, Arc<dyn PriceFeed>)> {
    let broker = &settings.broker;
    match broker.provider.as_str() {
        "alpaca" => {
            let mut config = AlpacaConfig::from_env(&broker.api_key_env, &broker.api_secret_env)?;
            config.paper = broker.base_url.contains("paper");
            let gateway = Arc::new(AlpacaGateway::new(config)?);
            Ok((gateway.clone(), gateway))
        }
        "robinhood" => {
            let config = RobinhoodConfig::from_env(&broker.api_key_env, broker.base_url.clone())?;
            let gateway = Arc::new(RobinhoodGateway::new(config)?);
            Ok((gateway.clone(), gateway))
        }
        "paper" => {
            // Orders go to the simulator; market data still comes from
            // Alpaca's free IEX feed.
            let config = AlpacaConfig::from_env(&broker.api_key_env, &broker.api_secret_env)
                .context("paper trading still needs market data credentials")?;
            let feed = Arc::new(AlpacaGateway::new(config)?);
            Ok((Arc::new(PaperGateway::new()), feed))
        }
        other => bail!("unknown broker provider: {other}"),
    }
}

/// Wire the full pipeline from settings.
pub(crate) fn build_engine(settings: &Settings) -> Result<Engine> {
    let (raw_gateway, feed) = build_broker(settings)?;
    let broker = &settings.broker;
    let gateway = Arc::new(ResilientGateway::new(
        raw_gateway,
        RetryPolicy::new(broker.max_retries, Duration::from_millis(500)),
        CircuitBreaker::new(
            broker.breaker_threshold,
            Duration::from_secs(broker.breaker_cooldown_secs),
        ),
        Duration::from_secs(broker.request_timeout_secs),
    ));

    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(LifoLedger::new(store.clone()));
    let params = Arc::new(settings.params.to_layered());

    let pipeline = Arc::new(Pipeline::new(
        feed,
        gateway,
        store,
        ledger,
        params,
        SnapshotBuilder::default(),
    ));

    let accounts = settings
        .accounts
        .iter()
        .map(|a| AccountContext {
            profile: RiskProfile {
                account_id: a.account_id,
                balance: a.balance,
                risk_fraction: a.risk_fraction,
                min_balance_floor: a.min_balance_floor,
                day_trades_remaining: a.day_trade_limit,
            },
            options_enabled: a.options_enabled,
        })
        .collect();

    Ok(Engine {
        pipeline,
        accounts,
        watchlist: settings.watchlist.clone(),
    })
}
