/// Streaming of factory `PairCreated` logs into the watcher's event channel.
///
/// The subscription side owns the websocket; the consuming side only ever sees
/// decoded `PoolCreatedEvent` values arriving on a bounded channel.
use anyhow::Result;
use ethers::{
    providers::{Middleware, Provider, Ws},
    types::{Filter, Log, H160, H256, U256, U64},
};
use futures::StreamExt;
use lazy_static::lazy_static;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tokio::time::{sleep, Duration};

use crate::common::abi::Abi;
use crate::common::constants::PAIR_CREATED_EVENT;

lazy_static! {
    static ref PAIR_CREATED_TOPIC: H256 = ethers::utils::keccak256(PAIR_CREATED_EVENT).into();
    static ref ABI: Abi = Abi::new();
}

/// Delay before resubscribing after the log stream ends or fails.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(3);

/// A new pool announced by the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolCreatedEvent {
    /// `token0` as reported by the factory.
    pub token_a: H160,
    /// `token1` as reported by the factory.
    pub token_b: H160,
    /// The new pair contract.
    pub pool: H160,
    /// Block the pair was created in, when the log carries one.
    pub block_number: Option<U64>,
}

impl PoolCreatedEvent {
    /// Decodes a `PairCreated` log. Returns `None` for any other or malformed log.
    pub fn from_log(log: &Log) -> Option<Self> {
        if log.topics.len() < 3 || log.topics[0] != *PAIR_CREATED_TOPIC {
            return None;
        }
        let (token_a, token_b, pool, _pair_index): (H160, H160, H160, U256) = ABI
            .factory
            .decode_event("PairCreated", log.topics.clone(), log.data.clone())
            .ok()?;
        Some(Self {
            token_a,
            token_b,
            pool,
            block_number: log.block_number,
        })
    }
}

/// Streams `PairCreated` logs emitted by `factory` and sends them to the event channel.
///
/// Resubscribes after `RESUBSCRIBE_DELAY` whenever the subscription ends or
/// cannot be opened. Returns only when the receiving side is gone.
///
/// # Arguments
/// * `provider` - An Ethereum provider.
/// * `factory` - The factory contract to watch.
/// * `tx` - A channel to send events.
pub async fn stream_pair_created(
    provider: Arc<Provider<Ws>>,
    factory: H160,
    tx: Sender<PoolCreatedEvent>,
) -> Result<()> {
    let filter = Filter::new().address(factory).event(PAIR_CREATED_EVENT);

    loop {
        let mut stream = match provider.subscribe_logs(&filter).await {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to subscribe to PairCreated logs: {e:?}");
                sleep(RESUBSCRIBE_DELAY).await;
                continue;
            }
        };
        info!("Subscribed to PairCreated logs of factory {:?}", factory);

        while let Some(log) = stream.next().await {
            let Some(event) = PoolCreatedEvent::from_log(&log) else {
                warn!("Skipping undecodable factory log in tx {:?}", log.transaction_hash);
                continue;
            };
            info!("Received factory PairCreated event: {}", event.pretty_msg());
            if tx.send(event).await.is_err() {
                info!("Event receiver closed, stopping PairCreated stream");
                return Ok(());
            }
        }

        if tx.is_closed() {
            return Ok(());
        }
        warn!("PairCreated stream ended unexpectedly, resubscribing");
        sleep(RESUBSCRIBE_DELAY).await;
    }
}
