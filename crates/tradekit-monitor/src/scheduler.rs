//! Tiered monitoring scheduler.
//!
//! Priority-tier instruments are scanned on a fast cycle, normal-tier on
//! a slow one, and a nightly pass re-scores everything. A per-symbol
//! async lock keeps the nightly pass and an intraday pass from working
//! the same instrument at once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use tradekit_config::SchedulerSettings;
use tradekit_core::types::Tier;

use crate::pipeline::{AccountContext, Pipeline};

/// Seconds until the next occurrence of `hour`:00 UTC.
fn seconds_until_hour(now: DateTime<Utc>, hour: u32) -> u64 {
    let today_target = now
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .expect("valid hour")
        .and_utc();
    let target = if today_target > now {
        today_target
    } else {
        today_target + chrono::Duration::days(1)
    };
    (target - now).num_seconds().max(1) as u64
}

/// Handle for a running scheduler.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signal shutdown and wait for all loops to finish their current
    /// pass.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

/// Drives the pipeline on tiered intervals.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    accounts: Vec<AccountContext>,
    watchlist: Vec<String>,
    settings: SchedulerSettings,
    tiers: Arc<Mutex<HashMap<String, Tier>>>,
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl Scheduler {
    pub fn new(
        pipeline: Arc<Pipeline>,
        accounts: Vec<AccountContext>,
        watchlist: Vec<String>,
        settings: SchedulerSettings,
    ) -> Self {
        // Everything starts on the slow cycle until first scored
        let tiers = watchlist
            .iter()
            .map(|s| (s.clone(), Tier::Normal))
            .collect();
        Self {
            pipeline,
            accounts,
            watchlist,
            settings,
            tiers: Arc::new(Mutex::new(tiers)),
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn symbols_for(&self, tier: Tier) -> Vec<String> {
        let tiers = self.tiers.lock().unwrap();
        self.watchlist
            .iter()
            .filter(|s| tiers.get(*s).copied().unwrap_or(Tier::Normal) == tier)
            .cloned()
            .collect()
    }

    fn lock_for(&self, symbol: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .unwrap()
            .entry(symbol.to_string())
            .or_default()
            .clone()
    }

    /// Run one pass over the given symbols. Errors are logged per
    /// instrument; a failing instrument never blocks the rest.
    async fn pass(&self, symbols: &[String]) {
        for symbol in symbols {
            let lock = self.lock_for(symbol);
            let _guard = lock.lock().await;

            for account in &self.accounts {
                match self.pipeline.run_instrument(symbol, account).await {
                    Ok(outcome) => {
                        self.tiers
                            .lock()
                            .unwrap()
                            .insert(symbol.clone(), outcome.tier);
                    }
                    Err(err) => {
                        error!(
                            symbol,
                            account_id = account.profile.account_id,
                            error = %err,
                            "instrument pass failed"
                        );
                    }
                }
            }
        }
    }

    /// Start the scheduler loops.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        // Fast loop for priority-tier instruments
        {
            let scheduler = self.clone();
            let mut shutdown = shutdown_rx.clone();
            let interval = Duration::from_secs(scheduler.settings.priority_interval_secs);
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let symbols = scheduler.symbols_for(Tier::Priority);
                            scheduler.pass(&symbols).await;
                        }
                        _ = shutdown.changed() => break,
                    }
                }
            }));
        }

        // Slow loop for normal-tier instruments
        {
            let scheduler = self.clone();
            let mut shutdown = shutdown_rx.clone();
            let interval = Duration::from_secs(scheduler.settings.normal_interval_secs);
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let symbols = scheduler.symbols_for(Tier::Normal);
                            scheduler.pass(&symbols).await;
                        }
                        _ = shutdown.changed() => break,
                    }
                }
            }));
        }

        // Nightly full re-score
        {
            let scheduler = self;
            let mut shutdown = shutdown_rx;
            tasks.push(tokio::spawn(async move {
                loop {
                    let wait = seconds_until_hour(Utc::now(), scheduler.settings.nightly_hour_utc);
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(wait)) => {
                            info!("nightly re-score starting");
                            let symbols = scheduler.watchlist.clone();
                            scheduler.pass(&symbols).await;
                        }
                        _ = shutdown.changed() => break,
                    }
                }
            }));
        }

        SchedulerHandle { shutdown_tx, tasks }
    }
}
