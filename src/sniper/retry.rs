/// Fee-escalating retry sessions.
///
/// A session belongs to exactly one created pool. It runs
/// `Idle -> Attempting -> {Confirmed | Escalate | Exhausted}`: every failed
/// attempt raises the fee bid by 20% and tries again until `max_retries`
/// attempts have been made. `DeadlineUnreachable` ends the session at once.
use ethers::types::{H160, H256, U256};
use log::{error, info, warn};

use crate::common::constants::{SnipeConfig, Slippage};
use crate::common::errors::SnipeError;
use crate::common::execution::Submitter;
use crate::common::pools::SwapPath;
use crate::common::utils::{escalate_fee, format_gwei, unix_now};
use crate::sniper::builder::{SnipeAttempt, TransactionBuilder};
use crate::sniper::quote::{quote, QuoteSource};

/// Session-level knobs, fixed at startup.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub starting_fee: U256,
    /// Total attempts, 1-indexed.
    pub max_retries: u32,
    pub slippage: Slippage,
    pub deadline_window_secs: u64,
}

impl From<&SnipeConfig> for RetryPolicy {
    fn from(config: &SnipeConfig) -> Self {
        Self {
            starting_fee: config.starting_fee,
            max_retries: config.max_retries,
            slippage: config.slippage,
            deadline_window_secs: config.deadline_window_secs,
        }
    }
}

/// What happened on one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub attempt_number: u32,
    pub fee_bid: U256,
    /// `None` when the attempt failed before a quote was obtained.
    pub min_amount_out: Option<U256>,
    /// `None` for the confirmed attempt.
    pub failure: Option<SnipeError>,
}

/// Terminal state of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Confirmed {
        tx_hash: H256,
        attempts: Vec<AttemptRecord>,
    },
    Exhausted {
        attempts: Vec<AttemptRecord>,
        last_failure: SnipeError,
    },
}

impl SessionOutcome {
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            SessionOutcome::Confirmed { attempts, .. } => attempts,
            SessionOutcome::Exhausted { attempts, .. } => attempts,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, SessionOutcome::Confirmed { .. })
    }

    /// Fee bids in attempt order.
    pub fn fee_bids(&self) -> Vec<U256> {
        self.attempts().iter().map(|a| a.fee_bid).collect()
    }
}

/// Drives sessions with a shared quote source and submission path.
///
/// Holds no per-session state; any number of sessions may run on one
/// controller at the same time.
pub struct RetryController<Q, S> {
    pub quoter: Q,
    pub submitter: S,
    pub builder: TransactionBuilder,
    pub policy: RetryPolicy,
    /// Unix seconds source for deadlines.
    pub clock: fn() -> u64,
}

impl<Q: QuoteSource, S: Submitter> RetryController<Q, S> {
    pub fn new(quoter: Q, submitter: S, builder: TransactionBuilder, policy: RetryPolicy) -> Self {
        Self {
            quoter,
            submitter,
            builder,
            policy,
            clock: unix_now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// Runs one session for `pool` to its terminal state.
    pub async fn run_session(&self, pool: H160, path: SwapPath) -> SessionOutcome {
        let max_retries = self.policy.max_retries.max(1);
        let mut fee_bid = self.policy.starting_fee;
        let mut attempts = Vec::new();
        let mut attempt_number = 1;

        loop {
            info!(
                "[{:?}] {} | attempt {}/{} | fee bid {} gwei | via {}",
                pool,
                entry_transition(attempt_number),
                attempt_number,
                max_retries,
                format_gwei(fee_bid),
                self.submitter.name()
            );

            let mut min_amount_out = None;
            let result = self
                .attempt(attempt_number, fee_bid, &path, &mut min_amount_out)
                .await;

            match result {
                Ok(tx_hash) => {
                    attempts.push(AttemptRecord {
                        attempt_number,
                        fee_bid,
                        min_amount_out,
                        failure: None,
                    });
                    info!(
                        "[{:?}] Confirmed | attempt {}/{} | fee bid {} gwei | tx {:?}",
                        pool,
                        attempt_number,
                        max_retries,
                        format_gwei(fee_bid),
                        tx_hash
                    );
                    return SessionOutcome::Confirmed { tx_hash, attempts };
                }
                Err(failure) => {
                    warn!(
                        "[{:?}] Attempt {}/{} failed | fee bid {} gwei | {}: {}",
                        pool,
                        attempt_number,
                        max_retries,
                        format_gwei(fee_bid),
                        failure.kind(),
                        failure
                    );
                    attempts.push(AttemptRecord {
                        attempt_number,
                        fee_bid,
                        min_amount_out,
                        failure: Some(failure.clone()),
                    });

                    if failure.is_fatal() || attempt_number >= max_retries {
                        error!(
                            "[{:?}] Exhausted | {} attempt(s) | last fee bid {} gwei | {}{}",
                            pool,
                            attempt_number,
                            format_gwei(fee_bid),
                            failure,
                            if failure.is_fatal() { " (aborted, not retried)" } else { "" }
                        );
                        return SessionOutcome::Exhausted {
                            attempts,
                            last_failure: failure,
                        };
                    }

                    let next_fee = escalate_fee(fee_bid);
                    info!(
                        "[{:?}] Escalate | attempt {} -> {} | fee bid {} -> {} gwei",
                        pool,
                        attempt_number,
                        attempt_number + 1,
                        format_gwei(fee_bid),
                        format_gwei(next_fee)
                    );
                    fee_bid = next_fee;
                    attempt_number += 1;
                }
            }
        }
    }

    /// Quote, build and submit once.
    async fn attempt(
        &self,
        attempt_number: u32,
        fee_bid: U256,
        path: &SwapPath,
        min_amount_out: &mut Option<U256>,
    ) -> Result<H256, SnipeError> {
        let quoted = quote(
            &self.quoter,
            self.builder.amount_in,
            path,
            self.policy.slippage,
        )
        .await?;
        *min_amount_out = Some(quoted.min_amount_out);

        let now = (self.clock)();
        let attempt = SnipeAttempt {
            attempt_number,
            fee_bid,
            deadline: now.saturating_add(self.policy.deadline_window_secs),
            path: *path,
            min_amount_out: quoted.min_amount_out,
        };
        let tx = self.builder.build(&attempt, now)?;

        self.submitter.submit(tx).await.into_result()
    }
}

/// State a given attempt is entered from.
fn entry_transition(attempt_number: u32) -> &'static str {
    if attempt_number <= 1 {
        "Idle -> Attempting"
    } else {
        "Escalate -> Attempting"
    }
}
