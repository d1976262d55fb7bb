/// Pair watcher: turns qualifying `PairCreated` events into snipe sessions.
///
/// The watcher drains the event channel filled by `stream_pair_created`.
/// Each pool that trades the target token gets exactly one session, spawned
/// on its own task so event intake never waits on a running session.
use ethers::types::H160;
use log::{error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc::Receiver, watch};
use tokio::task::JoinSet;

use crate::common::alert::Alert;
use crate::common::execution::Submitter;
use crate::common::pools::{resolve_swap_path, TargetToken};
use crate::common::streams::PoolCreatedEvent;
use crate::sniper::quote::QuoteSource;
use crate::sniper::retry::{RetryController, SessionOutcome};

/// What the watcher looks for. Built once at startup.
#[derive(Debug, Clone, Copy)]
pub struct WatcherConfig {
    pub target: TargetToken,
    /// Asset spent on the buy (WETH).
    pub base_asset: H160,
}

/// Counters reported when the watcher stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatcherReport {
    pub events_seen: usize,
    pub sessions_started: usize,
    pub confirmed: usize,
    pub exhausted: usize,
    /// Sessions whose task panicked or was cancelled.
    pub crashed: usize,
}

pub struct PairWatcher<Q, S> {
    pub config: WatcherConfig,
    pub controller: Arc<RetryController<Q, S>>,
    pub alert: Arc<Alert>,
    /// Pools a session was already started for.
    launched: HashSet<H160>,
    sessions: JoinSet<(H160, SessionOutcome)>,
    report: WatcherReport,
}

impl<Q, S> PairWatcher<Q, S>
where
    Q: QuoteSource + 'static,
    S: Submitter + 'static,
{
    pub fn new(config: WatcherConfig, controller: Arc<RetryController<Q, S>>, alert: Arc<Alert>) -> Self {
        Self {
            config,
            controller,
            alert,
            launched: HashSet::new(),
            sessions: JoinSet::new(),
            report: WatcherReport::default(),
        }
    }

    /// Consumes events until `shutdown` flips to `true` or the channel closes.
    ///
    /// On channel close, sessions still running are awaited before returning.
    /// On shutdown they are aborted.
    pub async fn run(
        mut self,
        mut events: Receiver<PoolCreatedEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> WatcherReport {
        info!(
            "Token sniping started, watching for pools of {:?}",
            self.config.target.address()
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown requested, {} session(s) still running", self.sessions.len());
                        self.sessions.abort_all();
                        break;
                    }
                }
                Some(joined) = self.sessions.join_next(), if !self.sessions.is_empty() => {
                    self.reap(joined);
                }
                event = events.recv() => match event {
                    Some(event) => self.on_event(event),
                    None => {
                        info!("Event channel closed, waiting for {} session(s)", self.sessions.len());
                        while let Some(joined) = self.sessions.join_next().await {
                            self.reap(joined);
                        }
                        break;
                    }
                },
            }
        }

        info!("Watcher stopped: {:?}", self.report);
        self.report
    }

    /// Starts a session when `event` names the target token for the first time.
    fn on_event(&mut self, event: PoolCreatedEvent) {
        self.report.events_seen += 1;

        let Some(path) = resolve_swap_path(&event, self.config.base_asset, self.config.target) else {
            return;
        };
        if !self.launched.insert(event.pool) {
            warn!("Session for pool {:?} already started, ignoring duplicate event", event.pool);
            return;
        }

        info!(
            "Liquidity added for target, executing snipe on {:?} ({})",
            event.pool,
            path.pretty_msg()
        );
        self.report.sessions_started += 1;
        let controller = self.controller.clone();
        let alert = self.alert.clone();
        let pool = event.pool;
        self.sessions.spawn(async move {
            let outcome = controller.run_session(pool, path).await;
            // the watcher loop must never wait on telegram
            if let Err(e) = alert.send_session_outcome(pool, &outcome).await {
                warn!("Telegram error: {e:?}");
            }
            (pool, outcome)
        });
    }

    /// Counts a finished session.
    fn reap(&mut self, joined: Result<(H160, SessionOutcome), tokio::task::JoinError>) {
        match joined {
            Ok((pool, outcome)) => {
                if outcome.is_confirmed() {
                    self.report.confirmed += 1;
                    info!("Snipe successful for pool {:?}", pool);
                } else {
                    self.report.exhausted += 1;
                    error!("Max retries reached, snipe failed for pool {:?}", pool);
                }
            }
            Err(e) => {
                self.report.crashed += 1;
                error!("Snipe session crashed: {e:?}");
            }
        }
    }
}
