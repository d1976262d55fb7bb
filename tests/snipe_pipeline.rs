//! End-to-end watcher tests with an in-memory router and submission path.
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{H160, H256, U256};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

use pair_sniper::common::alert::Alert;
use pair_sniper::common::constants::Slippage;
use pair_sniper::common::execution::{SubmissionOutcome, Submitter};
use pair_sniper::common::pools::{SwapPath, TargetToken};
use pair_sniper::common::streams::PoolCreatedEvent;
use pair_sniper::sniper::builder::TransactionBuilder;
use pair_sniper::sniper::quote::QuoteSource;
use pair_sniper::sniper::retry::{RetryController, RetryPolicy};
use pair_sniper::sniper::watcher::{PairWatcher, WatcherConfig, WatcherReport};

const GWEI: u64 = 1_000_000_000;

fn weth() -> H160 {
    H160::repeat_byte(0xee)
}

fn target() -> H160 {
    H160::repeat_byte(0x77)
}

/// Quotes 1000 units out for any input and records every path it was asked about.
#[derive(Clone, Default)]
struct MockRouter {
    paths: Arc<Mutex<Vec<SwapPath>>>,
}

#[async_trait]
impl QuoteSource for MockRouter {
    async fn amounts_out(&self, amount_in: U256, path: &SwapPath) -> Result<Vec<U256>> {
        self.paths.lock().unwrap().push(*path);
        Ok(vec![amount_in, U256::from(1000u64)])
    }
}

/// Replies from a per-call script, then with `fallback` once the script runs out.
#[derive(Clone)]
struct MockSubmitter {
    script: Arc<Mutex<Vec<SubmissionOutcome>>>,
    fallback: SubmissionOutcome,
    submitted: Arc<Mutex<Vec<TypedTransaction>>>,
}

impl MockSubmitter {
    fn new(mut script: Vec<SubmissionOutcome>, fallback: SubmissionOutcome) -> Self {
        script.reverse();
        Self {
            script: Arc::new(Mutex::new(script)),
            fallback,
            submitted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn gas_prices(&self) -> Vec<U256> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .map(|tx| tx.gas_price().unwrap_or_default())
            .collect()
    }
}

#[async_trait]
impl Submitter for MockSubmitter {
    async fn submit(&self, tx: TypedTransaction) -> SubmissionOutcome {
        self.submitted.lock().unwrap().push(tx);
        self.script
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

struct Harness {
    router: MockRouter,
    submitter: MockSubmitter,
    events: mpsc::Sender<PoolCreatedEvent>,
    shutdown: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<WatcherReport>,
}

fn start(submitter: MockSubmitter) -> Harness {
    let router = MockRouter::default();
    let builder = TransactionBuilder::new(
        H160::repeat_byte(0xaa),
        H160::repeat_byte(0xbb),
        U256::from(10_000_000_000_000_000u64),
        U256::from(300_000u64),
    );
    let policy = RetryPolicy {
        starting_fee: U256::from(20 * GWEI),
        max_retries: 3,
        slippage: Slippage::new(10).unwrap(),
        deadline_window_secs: 600,
    };
    let controller = Arc::new(RetryController::new(
        router.clone(),
        submitter.clone(),
        builder,
        policy,
    ));
    let watcher = PairWatcher::new(
        WatcherConfig {
            target: TargetToken::new(target()),
            base_asset: weth(),
        },
        controller,
        Arc::new(Alert::disabled()),
    );

    let (events, event_receiver) = mpsc::channel(16);
    let (shutdown, shutdown_receiver) = watch::channel(false);
    let handle = tokio::spawn(watcher.run(event_receiver, shutdown_receiver));
    Harness {
        router,
        submitter,
        events,
        shutdown,
        handle,
    }
}

fn pair(token_a: H160, token_b: H160, pool: u8) -> PoolCreatedEvent {
    PoolCreatedEvent {
        token_a,
        token_b,
        pool: H160::repeat_byte(pool),
        block_number: None,
    }
}

fn confirmed() -> SubmissionOutcome {
    SubmissionOutcome::Confirmed(H256::repeat_byte(0x11))
}

#[tokio::test]
async fn unrelated_pool_starts_no_session() {
    let h = start(MockSubmitter::new(vec![], confirmed()));
    h.events
        .send(pair(weth(), H160::repeat_byte(0x55), 1))
        .await
        .unwrap();
    drop(h.events);

    let report = h.handle.await.unwrap();
    assert_eq!(report.events_seen, 1);
    assert_eq!(report.sessions_started, 0);
    assert!(h.submitter.gas_prices().is_empty());
}

#[tokio::test]
async fn target_paired_with_other_asset_starts_no_session() {
    let usdc = H160::repeat_byte(0x55);
    let h = start(MockSubmitter::new(vec![], confirmed()));
    h.events.send(pair(usdc, target(), 1)).await.unwrap();
    h.events.send(pair(target(), usdc, 2)).await.unwrap();
    drop(h.events);

    let report = h.handle.await.unwrap();
    assert_eq!(report.events_seen, 2);
    assert_eq!(report.sessions_started, 0);
    assert!(h.router.paths.lock().unwrap().is_empty());
    assert!(h.submitter.gas_prices().is_empty());
}

#[tokio::test]
async fn token_order_does_not_change_path() {
    let h = start(MockSubmitter::new(vec![], confirmed()));
    h.events.send(pair(target(), weth(), 1)).await.unwrap();
    h.events.send(pair(weth(), target(), 2)).await.unwrap();
    drop(h.events);

    let report = h.handle.await.unwrap();
    assert_eq!(report.sessions_started, 2);
    assert_eq!(report.confirmed, 2);

    let expected = SwapPath::new(weth(), target());
    let paths = h.router.paths.lock().unwrap().clone();
    assert_eq!(paths, vec![expected, expected]);
}

#[tokio::test]
async fn duplicate_pool_event_starts_one_session() {
    let h = start(MockSubmitter::new(vec![], confirmed()));
    h.events.send(pair(weth(), target(), 1)).await.unwrap();
    h.events.send(pair(weth(), target(), 1)).await.unwrap();
    drop(h.events);

    let report = h.handle.await.unwrap();
    assert_eq!(report.events_seen, 2);
    assert_eq!(report.sessions_started, 1);
    assert_eq!(h.submitter.gas_prices().len(), 1);
}

#[tokio::test]
async fn relay_rejections_escalate_until_included() {
    let h = start(MockSubmitter::new(
        vec![
            SubmissionOutcome::RelayError("insufficient fee".into()),
            SubmissionOutcome::RelayError("insufficient fee".into()),
        ],
        confirmed(),
    ));
    h.events.send(pair(weth(), target(), 1)).await.unwrap();
    drop(h.events);

    let report = h.handle.await.unwrap();
    assert_eq!(report.confirmed, 1);
    assert_eq!(
        h.submitter.gas_prices(),
        vec![
            U256::from(20 * GWEI),
            U256::from(24 * GWEI),
            U256::from(28_800_000_000u64),
        ]
    );
}

#[tokio::test]
async fn failed_session_does_not_stop_the_watcher() {
    let h = start(MockSubmitter::new(
        vec![
            SubmissionOutcome::Rejected("execution reverted".into()),
            SubmissionOutcome::Rejected("execution reverted".into()),
            SubmissionOutcome::Rejected("execution reverted".into()),
        ],
        confirmed(),
    ));
    h.events.send(pair(weth(), target(), 1)).await.unwrap();
    // The second pool only shows up once the first session used every scripted rejection.
    let submitter = h.submitter.clone();
    tokio::time::timeout(std::time::Duration::from_secs(5), async move {
        while submitter.gas_prices().len() < 3 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    h.events.send(pair(target(), weth(), 2)).await.unwrap();
    drop(h.events);

    let report = h.handle.await.unwrap();
    assert_eq!(
        report,
        WatcherReport {
            events_seen: 2,
            sessions_started: 2,
            confirmed: 1,
            exhausted: 1,
            crashed: 0,
        }
    );
    assert_eq!(h.submitter.gas_prices().len(), 4);
}

#[tokio::test]
async fn shutdown_stops_the_watcher() {
    let h = start(MockSubmitter::new(vec![], confirmed()));
    h.shutdown.send(true).unwrap();

    // The event sender is still alive; only the signal ends the run.
    let report = h.handle.await.unwrap();
    assert_eq!(report, WatcherReport::default());
    assert!(h.events.is_closed());
}

#[tokio::test]
async fn pricing_failure_never_reaches_submitter() {
    struct Dry;

    #[async_trait]
    impl QuoteSource for Dry {
        async fn amounts_out(&self, _amount_in: U256, _path: &SwapPath) -> Result<Vec<U256>> {
            Err(anyhow!("UniswapV2Library: INSUFFICIENT_LIQUIDITY"))
        }
    }

    let submitter = MockSubmitter::new(vec![], confirmed());
    let builder = TransactionBuilder::new(
        H160::repeat_byte(0xaa),
        H160::repeat_byte(0xbb),
        U256::from(1u64),
        U256::from(300_000u64),
    );
    let controller = RetryController::new(
        Dry,
        submitter.clone(),
        builder,
        RetryPolicy {
            starting_fee: U256::from(20 * GWEI),
            max_retries: 3,
            slippage: Slippage::default(),
            deadline_window_secs: 600,
        },
    );

    let outcome = controller
        .run_session(H160::repeat_byte(1), SwapPath::new(weth(), target()))
        .await;
    assert!(!outcome.is_confirmed());
    assert_eq!(outcome.attempts().len(), 3);
    assert!(submitter.gas_prices().is_empty());
}
