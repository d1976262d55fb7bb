/// Parsed contract ABIs for the Uniswap V2 contracts the sniper talks to.
///
/// Calls are encoded and decoded through `BaseContract` so the same ABI
/// serves quoting, swap building and setup.
use ethers::abi::parse_abi;
use ethers::prelude::BaseContract;

/// Holds parsed contract ABIs.
///
/// - `factory`: the `PairCreated` event.
/// - `router`: pricing, swapping and liquidity functions.
/// - `token`: `approve`, used during setup.
#[derive(Clone, Debug)]
pub struct Abi {
    /// Factory contract ABI (UniswapV2-like), used to decode `PairCreated` logs
    pub factory: BaseContract,
    /// Router02 ABI with `getAmountsOut`, `swapExactETHForTokens` and `addLiquidityETH`
    pub router: BaseContract,
    /// ERC-20 token contract ABI
    pub token: BaseContract,
}

impl Abi {
    /// Creates a new `Abi` instance.
    ///
    /// # Panics
    /// Panics if any ABI parsing fails (should not happen with hardcoded ABIs).
    pub fn new() -> Self {
        let factory = BaseContract::from(
            parse_abi(&[
                "event PairCreated(address indexed token0, address indexed token1, address pair, uint256 pairIndex)",
            ])
            .unwrap(),
        );

        let router = BaseContract::from(
            parse_abi(&[
                "function getAmountsOut(uint256 amountIn, address[] path) external view returns (uint256[] amounts)",
                "function swapExactETHForTokens(uint256 amountOutMin, address[] path, address to, uint256 deadline) external payable returns (uint256[] amounts)",
                "function addLiquidityETH(address token, uint256 amountTokenDesired, uint256 amountTokenMin, uint256 amountETHMin, address to, uint256 deadline) external payable returns (uint256 amountToken, uint256 amountETH, uint256 liquidity)",
            ])
            .unwrap(),
        );

        let token = BaseContract::from(
            parse_abi(&[
                "function approve(address,uint256) external returns (bool)",
            ])
            .unwrap(),
        );

        Self {
            factory,
            router,
            token,
        }
    }
}

impl Default for Abi {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{H160, U256};

    #[test]
    fn swap_calldata_starts_with_selector() {
        let abi = Abi::new();
        let calldata = abi
            .router
            .encode(
                "swapExactETHForTokens",
                (
                    U256::from(900u64),
                    vec![H160::repeat_byte(1), H160::repeat_byte(2)],
                    H160::repeat_byte(3),
                    U256::from(1_700_000_600u64),
                ),
            )
            .unwrap();
        assert_eq!(&calldata[..4], &[0x7f, 0xf3, 0x6a, 0xb5]);
    }

    #[test]
    fn pair_created_event_is_known() {
        let abi = Abi::new();
        assert!(abi.factory.abi().event("PairCreated").is_ok());
    }
}
