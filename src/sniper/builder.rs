/// Construction of `swapExactETHForTokens` transactions.
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;

use crate::common::abi::Abi;
use crate::common::errors::SnipeError;
use crate::common::pools::SwapPath;

/// One try of a session: what is about to be built and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnipeAttempt {
    /// 1-indexed.
    pub attempt_number: u32,
    /// Legacy gas price in wei.
    pub fee_bid: U256,
    /// Unix seconds after which the router rejects the swap.
    pub deadline: u64,
    pub path: SwapPath,
    pub min_amount_out: U256,
}

/// Builds unsigned swap transactions against one router.
///
/// The result carries calldata, value, gas limit and gas price; nonce, sender
/// and chain id are left to the submission path.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    pub abi: Abi,
    pub router: H160,
    pub recipient: H160,
    pub amount_in: U256,
    /// Gas ceiling attached to every swap.
    pub gas_limit: U256,
}

impl TransactionBuilder {
    pub fn new(router: H160, recipient: H160, amount_in: U256, gas_limit: U256) -> Self {
        Self {
            abi: Abi::new(),
            router,
            recipient,
            amount_in,
            gas_limit,
        }
    }

    /// Populates the swap for `attempt`.
    ///
    /// `now` is the wall-clock reading at build time; the attempt's deadline
    /// has to be strictly after it.
    pub fn build(&self, attempt: &SnipeAttempt, now: u64) -> Result<TypedTransaction, SnipeError> {
        if attempt.deadline <= now {
            return Err(SnipeError::DeadlineUnreachable {
                deadline: attempt.deadline,
                now,
            });
        }

        let calldata = self
            .abi
            .router
            .encode(
                "swapExactETHForTokens",
                (
                    attempt.min_amount_out,
                    attempt.path.to_vec(),
                    self.recipient,
                    U256::from(attempt.deadline),
                ),
            )
            .map_err(|e| SnipeError::Rejected(format!("calldata encoding failed: {e}")))?;

        let tx = TransactionRequest::new()
            .to(self.router)
            .value(self.amount_in)
            .data(calldata)
            .gas(self.gas_limit)
            .gas_price(attempt.fee_bid);
        Ok(TypedTransaction::Legacy(tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::Token;
    use pretty_assertions::assert_eq;

    fn builder() -> TransactionBuilder {
        TransactionBuilder::new(
            H160::repeat_byte(0xaa),
            H160::repeat_byte(0xbb),
            U256::from(10_000_000_000_000_000u64),
            U256::from(300_000u64),
        )
    }

    fn attempt(deadline: u64) -> SnipeAttempt {
        SnipeAttempt {
            attempt_number: 1,
            fee_bid: U256::from(20_000_000_000u64),
            deadline,
            path: SwapPath::new(H160::repeat_byte(1), H160::repeat_byte(2)),
            min_amount_out: U256::from(900u64),
        }
    }

    #[test]
    fn populates_swap_fields() {
        let b = builder();
        let tx = b.build(&attempt(1_000 + 600), 1_000).unwrap();

        assert_eq!(tx.to_addr(), Some(&H160::repeat_byte(0xaa)));
        assert_eq!(tx.value(), Some(&U256::from(10_000_000_000_000_000u64)));
        assert_eq!(tx.gas(), Some(&U256::from(300_000u64)));
        assert_eq!(tx.gas_price(), Some(U256::from(20_000_000_000u64)));
        assert_eq!(tx.nonce(), None);

        let data = tx.data().unwrap();
        let decoded = b
            .abi
            .router
            .decode_raw("swapExactETHForTokens", data)
            .unwrap();
        assert_eq!(
            decoded,
            vec![
                Token::Uint(U256::from(900u64)),
                Token::Array(vec![
                    Token::Address(H160::repeat_byte(1)),
                    Token::Address(H160::repeat_byte(2)),
                ]),
                Token::Address(H160::repeat_byte(0xbb)),
                Token::Uint(U256::from(1_600u64)),
            ]
        );
    }

    #[test]
    fn stale_deadline_is_unreachable() {
        let err = builder().build(&attempt(1_000), 1_000).unwrap_err();
        assert_eq!(
            err,
            SnipeError::DeadlineUnreachable {
                deadline: 1_000,
                now: 1_000
            }
        );
        assert!(err.is_fatal());
    }
}
