/// Router pricing and slippage bounds.
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Middleware, Provider, Ws};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::Arc;

use crate::common::abi::Abi;
use crate::common::constants::Slippage;
use crate::common::errors::SnipeError;
use crate::common::pools::SwapPath;

/// Read-only access to the router's `getAmountsOut`.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn amounts_out(&self, amount_in: U256, path: &SwapPath) -> Result<Vec<U256>>;
}

/// Expected and minimum acceptable output of a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub amount_in: U256,
    pub expected_out: U256,
    pub min_amount_out: U256,
}

/// `expected_out * (100 - slippage) / 100`, truncated toward zero.
pub fn min_amount_out(expected_out: U256, slippage: Slippage) -> U256 {
    expected_out * U256::from(100 - slippage.percent()) / U256::from(100u64)
}

/// Prices `amount_in` along `path` and applies the slippage bound.
///
/// Any pricing failure, including a pool without reserves, is reported as
/// `QuoteUnavailable`.
pub async fn quote<Q: QuoteSource + ?Sized>(
    source: &Q,
    amount_in: U256,
    path: &SwapPath,
    slippage: Slippage,
) -> Result<Quote, SnipeError> {
    let amounts = source
        .amounts_out(amount_in, path)
        .await
        .map_err(|e| SnipeError::QuoteUnavailable(e.to_string()))?;
    let expected_out = *amounts
        .last()
        .ok_or_else(|| SnipeError::QuoteUnavailable("router returned no amounts".into()))?;
    if expected_out.is_zero() {
        return Err(SnipeError::QuoteUnavailable("router quoted zero output".into()));
    }
    Ok(Quote {
        amount_in,
        expected_out,
        min_amount_out: min_amount_out(expected_out, slippage),
    })
}

/// Quotes through an on-chain Uniswap V2 router with `eth_call`.
pub struct RouterQuoter {
    pub provider: Arc<Provider<Ws>>,
    pub router: H160,
    pub abi: Abi,
}

impl RouterQuoter {
    pub fn new(provider: Arc<Provider<Ws>>, router: H160) -> Self {
        Self {
            provider,
            router,
            abi: Abi::new(),
        }
    }
}

#[async_trait]
impl QuoteSource for RouterQuoter {
    async fn amounts_out(&self, amount_in: U256, path: &SwapPath) -> Result<Vec<U256>> {
        let calldata = self
            .abi
            .router
            .encode("getAmountsOut", (amount_in, path.to_vec()))?;
        let tx: TypedTransaction = TransactionRequest::new()
            .to(self.router)
            .data(calldata)
            .into();
        let output = self
            .provider
            .call(&tx, None)
            .await
            .map_err(|e| anyhow!("getAmountsOut failed: {e}"))?;
        let amounts: Vec<U256> = self.abi.router.decode_output("getAmountsOut", output)?;
        Ok(amounts)
    }
}
