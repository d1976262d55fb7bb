/// Submission of signed swaps: public broadcast and private relay.
///
/// Both paths implement `Submitter`; the strategy is picked once at startup
/// and every attempt of every session goes through it.
use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Middleware, MiddlewareError, Provider, ProviderError, Ws};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers_flashbots::{Relay, RelayError};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use url::Url;

use crate::common::constants::{SnipeConfig, SubmissionMode};
use crate::common::errors::SnipeError;

/// Interval between receipt polls while waiting for a private transaction.
const RELAY_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Result of handing one transaction to a submission path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Mined with a successful status.
    Confirmed(H256),
    /// Refused by the node or reverted on chain.
    Rejected(String),
    /// Error reported by the private relay, message verbatim.
    RelayError(String),
    /// Transport fault or no answer in time.
    Timeout(String),
}

impl SubmissionOutcome {
    pub fn into_result(self) -> Result<H256, SnipeError> {
        match self {
            SubmissionOutcome::Confirmed(hash) => Ok(hash),
            SubmissionOutcome::Rejected(reason) => Err(SnipeError::Rejected(reason)),
            SubmissionOutcome::RelayError(message) => Err(SnipeError::RelayError(message)),
            SubmissionOutcome::Timeout(reason) => Err(SnipeError::Timeout(reason)),
        }
    }
}

/// Sends a populated, unsigned transaction and reports how it ended.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, tx: TypedTransaction) -> SubmissionOutcome;

    /// Name used in log lines.
    fn name(&self) -> &'static str;
}

/// Maps a middleware error to an outcome.
///
/// JSON-RPC error responses mean the node looked at the transaction and said
/// no; anything else is treated as a transport fault.
pub fn classify_middleware_error<E: MiddlewareError>(err: &E) -> SubmissionOutcome {
    match err.as_error_response() {
        Some(response) => SubmissionOutcome::Rejected(response.message.clone()),
        None => SubmissionOutcome::Timeout(err.to_string()),
    }
}

/// Maps a mined receipt to an outcome.
pub fn receipt_outcome(receipt: &TransactionReceipt) -> SubmissionOutcome {
    if receipt.status == Some(U64::from(1)) {
        SubmissionOutcome::Confirmed(receipt.transaction_hash)
    } else {
        SubmissionOutcome::Rejected(format!(
            "execution reverted in block {:?} (tx {:?})",
            receipt.block_number.unwrap_or_default(),
            receipt.transaction_hash
        ))
    }
}

/// Waits at most `limit` for `confirmation` and maps what comes back.
///
/// An expired wait, a provider fault or a dropped transaction is a `Timeout`.
pub async fn await_confirmation<F>(tx_hash: H256, confirmation: F, limit: Duration) -> SubmissionOutcome
where
    F: std::future::Future<Output = Result<Option<TransactionReceipt>, ProviderError>>,
{
    match timeout(limit, confirmation).await {
        Err(_) => SubmissionOutcome::Timeout(format!("no receipt for {:?} within {:?}", tx_hash, limit)),
        Ok(Err(e)) => SubmissionOutcome::Timeout(e.to_string()),
        Ok(Ok(None)) => SubmissionOutcome::Timeout(format!("{:?} dropped from pool", tx_hash)),
        Ok(Ok(Some(receipt))) => receipt_outcome(&receipt),
    }
}

/// Maps a relay client error to an outcome.
///
/// JSON-RPC errors keep the relay's message verbatim; an HTTP failure is a
/// transport fault.
pub fn relay_error_outcome(err: RelayError<LocalWallet>) -> SubmissionOutcome {
    match err {
        RelayError::RequestError(e) => SubmissionOutcome::Timeout(e.to_string()),
        RelayError::JsonRpcError(e) => SubmissionOutcome::RelayError(e.message),
        other => SubmissionOutcome::RelayError(other.to_string()),
    }
}

/// Sends through the node's public transaction pool.
pub struct PublicBroadcast {
    pub client: Arc<SignerMiddleware<Arc<Provider<Ws>>, LocalWallet>>,
    pub confirmation_timeout: Duration,
}

impl PublicBroadcast {
    pub fn new(provider: Arc<Provider<Ws>>, wallet: LocalWallet, confirmation_timeout: Duration) -> Self {
        Self {
            client: Arc::new(SignerMiddleware::new(provider, wallet)),
            confirmation_timeout,
        }
    }
}

#[async_trait]
impl Submitter for PublicBroadcast {
    async fn submit(&self, tx: TypedTransaction) -> SubmissionOutcome {
        let pending = match self.client.send_transaction(tx, None).await {
            Ok(pending) => pending,
            Err(e) => {
                warn!("Public broadcast refused: {e:?}");
                return classify_middleware_error(&e);
            }
        };
        let tx_hash = pending.tx_hash();
        info!("Transaction accepted into public pool: {:?}", tx_hash);

        await_confirmation(tx_hash, pending.confirmations(1), self.confirmation_timeout).await
    }

    fn name(&self) -> &'static str {
        "public"
    }
}

/// Params of `eth_sendPrivateTransaction`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateTransactionRequest {
    /// Signed raw transaction.
    pub tx: Bytes,
    /// Last block the relay may include the transaction in.
    pub max_block_number: U64,
}

/// Signs locally and forwards to a private relay.
pub struct PrivateRelay {
    pub provider: Arc<Provider<Ws>>,
    pub wallet: LocalWallet,
    pub relay: Relay<LocalWallet>,
    pub relay_url: Url,
    /// Blocks the transaction stays eligible after submission.
    pub max_blocks: u64,
}

impl PrivateRelay {
    pub fn new(
        provider: Arc<Provider<Ws>>,
        wallet: LocalWallet,
        identity: LocalWallet,
        relay_url: Url,
        max_blocks: u64,
    ) -> Self {
        let relay = Relay::new(relay_url.clone(), Some(identity));
        Self {
            provider,
            wallet,
            relay,
            relay_url,
            max_blocks,
        }
    }

    /// Fills sender, nonce and chain id, then signs.
    async fn sign(&self, mut tx: TypedTransaction) -> Result<Bytes, SubmissionOutcome> {
        let from = self.wallet.address();
        let nonce = self
            .provider
            .get_transaction_count(from, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| classify_middleware_error(&e))?;
        tx.set_from(from);
        tx.set_nonce(nonce);
        tx.set_chain_id(self.wallet.chain_id());

        let signature = self
            .wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| SubmissionOutcome::Rejected(format!("signing failed: {e}")))?;
        Ok(tx.rlp_signed(&signature))
    }

    /// Polls for the receipt until `max_block_number` has passed.
    async fn wait_for_inclusion(&self, tx_hash: H256, max_block_number: U64) -> SubmissionOutcome {
        loop {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return receipt_outcome(&receipt),
                Ok(None) => {}
                Err(e) => return classify_middleware_error(&e),
            }
            match self.provider.get_block_number().await {
                Ok(block) if block > max_block_number => {
                    return SubmissionOutcome::RelayError(format!(
                        "transaction {:?} not included by block {}",
                        tx_hash, max_block_number
                    ))
                }
                Ok(block) => debug!("Private tx {:?} pending at block {}", tx_hash, block),
                Err(e) => return classify_middleware_error(&e),
            }
            sleep(RELAY_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl Submitter for PrivateRelay {
    async fn submit(&self, tx: TypedTransaction) -> SubmissionOutcome {
        let raw = match self.sign(tx).await {
            Ok(raw) => raw,
            Err(outcome) => return outcome,
        };
        let tx_hash = H256::from(ethers::utils::keccak256(&raw));

        let current_block = match self.provider.get_block_number().await {
            Ok(block) => block,
            Err(e) => return classify_middleware_error(&e),
        };
        let request = PrivateTransactionRequest {
            tx: raw,
            max_block_number: current_block + U64::from(self.max_blocks),
        };
        let max_block_number = request.max_block_number;

        let response: Result<Option<H256>, _> = self
            .relay
            .request("eth_sendPrivateTransaction", [request])
            .await;
        match response {
            Ok(_) => info!(
                "Private transaction {:?} accepted by {} (valid until block {})",
                tx_hash, self.relay_url, max_block_number
            ),
            Err(e) => {
                let outcome = relay_error_outcome(e);
                warn!("Relay did not accept private transaction: {:?}", outcome);
                return outcome;
            }
        }

        self.wait_for_inclusion(tx_hash, max_block_number).await
    }

    fn name(&self) -> &'static str {
        "private-relay"
    }
}

/// The submission path chosen at startup.
pub enum SubmissionStrategy {
    Public(PublicBroadcast),
    Private(PrivateRelay),
}

impl SubmissionStrategy {
    pub fn from_config(
        config: &SnipeConfig,
        provider: Arc<Provider<Ws>>,
        wallet: LocalWallet,
        identity: LocalWallet,
    ) -> Self {
        match config.submission_mode {
            SubmissionMode::Public => SubmissionStrategy::Public(PublicBroadcast::new(
                provider,
                wallet,
                Duration::from_secs(config.confirmation_timeout_secs),
            )),
            SubmissionMode::Private => SubmissionStrategy::Private(PrivateRelay::new(
                provider,
                wallet,
                identity,
                config.relay_endpoint.clone(),
                config.relay_max_blocks,
            )),
        }
    }
}

#[async_trait]
impl Submitter for SubmissionStrategy {
    async fn submit(&self, tx: TypedTransaction) -> SubmissionOutcome {
        match self {
            SubmissionStrategy::Public(inner) => inner.submit(tx).await,
            SubmissionStrategy::Private(inner) => inner.submit(tx).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            SubmissionStrategy::Public(inner) => inner.name(),
            SubmissionStrategy::Private(inner) => inner.name(),
        }
    }
}
