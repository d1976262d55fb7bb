//! Pair sniper - buys a target token the moment its Uniswap V2 pair is created
use anyhow::{anyhow, Result};
use dotenv::dotenv;
use ethers::providers::{Provider, Ws};
use ethers::signers::Signer;
use ethers::middleware::SignerMiddleware;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use pair_sniper::common::alert::Alert;
use pair_sniper::common::constants::{Env, SnipeConfig, DEFAULT_BUFFER_SIZE, PROJECT_NAME};
use pair_sniper::common::execution::SubmissionStrategy;
use pair_sniper::common::pools::TargetToken;
use pair_sniper::common::setup::{provide_liquidity, resolve_target_token, LiquidityPlan};
use pair_sniper::common::streams::stream_pair_created;
use pair_sniper::common::utils::{create_new_wallet, format_gwei, setup_logger, wallet_from_key};
use pair_sniper::sniper::builder::TransactionBuilder;
use pair_sniper::sniper::quote::RouterQuoter;
use pair_sniper::sniper::retry::{RetryController, RetryPolicy};
use pair_sniper::sniper::watcher::{PairWatcher, WatcherConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment variables from .env file.
    dotenv().ok();
    let env = Env::new();
    setup_logger(env.debug)?;

    info!("Starting {}", PROJECT_NAME);

    let config = SnipeConfig::from_env()?;
    if env.wss_url.is_empty() || env.private_key.is_empty() {
        return Err(anyhow!("WSS_URL and PRIVATE_KEY must be set"));
    }
    let router = env.router()?;
    let factory = env.factory()?;
    let weth = env.weth()?;

    // Create an Ethereum provider.
    let ws = Ws::connect(&env.wss_url).await?;
    let provider = Arc::new(Provider::new(ws));

    let wallet = wallet_from_key(&env.private_key, env.chain_id)?;
    let identity = if env.identity_key.is_empty() {
        let (identity, address) = create_new_wallet();
        info!("Using random relay identity {:?}", address);
        identity
    } else {
        wallet_from_key(&env.identity_key, env.chain_id)?
    };
    info!("Signer: {:?}", wallet.address());

    // Setup failures are fatal.
    let client = Arc::new(SignerMiddleware::new(provider.clone(), wallet.clone()));
    let (token, deployed) = resolve_target_token(client.clone(), &env).await?;
    if deployed && env.seed_liquidity {
        provide_liquidity(client, router, token, &LiquidityPlan::default()).await?;
    }

    info!(
        "Snipe config: amount in {} wei | start fee {} gwei | slippage {}% | {} attempt(s) | {:?}",
        config.swap_amount_in,
        format_gwei(config.starting_fee),
        config.slippage.percent(),
        config.max_retries,
        config.submission_mode,
    );

    let recipient = config.recipient.unwrap_or_else(|| wallet.address());
    let submitter = SubmissionStrategy::from_config(&config, provider.clone(), wallet, identity);
    let quoter = RouterQuoter::new(provider.clone(), router);
    let builder = TransactionBuilder::new(router, recipient, config.swap_amount_in, config.gas_limit);
    let controller = Arc::new(RetryController::new(
        quoter,
        submitter,
        builder,
        RetryPolicy::from(&config),
    ));

    let watcher = PairWatcher::new(
        WatcherConfig {
            target: TargetToken::new(token),
            base_asset: weth,
        },
        controller,
        Arc::new(Alert::new(&env)),
    );

    let (event_sender, event_receiver) = mpsc::channel(DEFAULT_BUFFER_SIZE);
    let stream_provider = provider.clone();
    tokio::spawn(async move {
        if let Err(e) = stream_pair_created(stream_provider, factory, event_sender).await {
            error!("Error in PairCreated stream: {:?}", e);
        }
    });

    let (shutdown_sender, shutdown_receiver) = watch::channel(false);
    let mut watcher_handle = tokio::spawn(watcher.run(event_receiver, shutdown_receiver));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("Failed to listen for ctrl-c: {e:?}");
            }
            info!("Ctrl-C received, stopping watcher");
            let _ = shutdown_sender.send(true);
            let report = watcher_handle.await?;
            info!("Final report: {:?}", report);
        }
        report = &mut watcher_handle => {
            info!("Watcher exited: {:?}", report?);
        }
    }

    Ok(())
}
