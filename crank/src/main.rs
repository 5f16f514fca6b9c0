//! OpenBook Crank Service binary.
//!
//! Loads configuration from the environment, resolves the markets and runs
//! the crank loop until interrupted.

use std::sync::Arc;

use anyhow::Context;
use openbook_crank::registry::{self, MarketRegistry};
use openbook_crank::{AccountFetcher, BlockhashCache, CrankConfig, CrankService, SolanaLedger};
use solana_sdk::signature::Signer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,openbook_crank=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CrankConfig::from_env().context("invalid configuration")?;
    config.validate().context("invalid configuration")?;
    let program_id = config.parse_program_id()?;

    tracing::info!("Starting OpenBook Crank Service");
    tracing::info!(cluster = %config.cluster, endpoint = %config.endpoint_url, "Ledger endpoint");
    tracing::info!(%program_id, "DEX program");

    let payer = config.wallet.load().context("failed to load wallet")?;
    tracing::info!(payer = %payer.pubkey(), "Loaded fee payer");

    let rpc = Arc::new(SolanaLedger::new(
        config.endpoint_url.clone(),
        config.rpc_timeout(),
        config.account_encoding,
    ));

    let entries = registry::resolve(&config.market_source, config.cluster)
        .await
        .context("failed to resolve markets")?;
    let markets = MarketRegistry::new(AccountFetcher::new(Arc::clone(&rpc)), program_id)
        .load(&entries)
        .await
        .context("failed to load markets")?;

    let blockhash = BlockhashCache::spawn(Arc::clone(&rpc), config.blockhash_refresh())
        .await
        .context("failed to fetch initial blockhash")?;

    let service = Arc::new(CrankService::new(
        config,
        markets,
        rpc,
        Arc::new(blockhash),
        Arc::new(payer),
    )?);

    let runner = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.run().await })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down crank service");
    service.stop();
    runner.await?;

    Ok(())
}
