//! Close open positions.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info};

use tradekit_config::load_settings;

use crate::cli::FlattenArgs;

pub async fn run(args: FlattenArgs, config_path: &Path) -> Result<()> {
    let settings = load_settings(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let engine = super::build_engine(&settings)?;

    let symbols = if args.symbols.is_empty() {
        settings.watchlist.clone()
    } else {
        args.symbols.clone()
    };

    let mut total = 0;
    for account in &engine.accounts {
        if let Some(id) = args.account {
            if account.profile.account_id != id {
                continue;
            }
        }
        for symbol in &symbols {
            match engine.pipeline.flatten(symbol, account).await {
                Ok(0) => {}
                Ok(closed) => {
                    info!(
                        account_id = account.profile.account_id,
                        symbol,
                        orders = closed,
                        "position closed"
                    );
                    total += closed;
                }
                Err(e) => {
                    error!(
                        account_id = account.profile.account_id,
                        symbol,
                        error = %e,
                        "flatten failed"
                    );
                }
            }
        }
    }

    println!("Submitted {total} closing order(s)");
    Ok(())
}
