/// Pool and swap-path types for the sniper.
///
/// A pool is described by the pair it trades; the sniper only ever buys the
/// target token with the base asset, so every qualifying pool resolves to the
/// same two-hop `[base, target]` path regardless of token ordering.
use ethers::types::H160;
use log::info;

use crate::common::streams::PoolCreatedEvent;

/// Address of the token being sniped. Fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetToken(H160);

impl TargetToken {
    pub fn new(address: H160) -> Self {
        Self(address)
    }

    pub fn address(&self) -> H160 {
        self.0
    }
}

/// Ordered `[base, target]` path handed to the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapPath {
    /// Asset paid into the pool (WETH).
    pub base: H160,
    /// Asset bought.
    pub target: H160,
}

impl SwapPath {
    pub fn new(base: H160, target: H160) -> Self {
        Self { base, target }
    }

    /// The path as the router expects it.
    pub fn to_vec(&self) -> Vec<H160> {
        vec![self.base, self.target]
    }

    /// Returns a formatted string describing the path.
    pub fn pretty_msg(&self) -> String {
        format!("{:?} --> {:?}", self.base, self.target)
    }
}

impl PoolCreatedEvent {
    /// Checks if the pool trades the given token.
    pub fn involves(&self, token: H160) -> bool {
        self.token_a == token || self.token_b == token
    }

    /// Checks if the pool trades the given token pair, in either order.
    pub fn trades(&self, token_a: H160, token_b: H160) -> bool {
        let is_zero_for_one = self.token_a == token_a && self.token_b == token_b;
        let is_one_for_zero = self.token_b == token_a && self.token_a == token_b;
        is_zero_for_one || is_one_for_zero
    }

    /// Returns a formatted string describing the pool.
    pub fn pretty_msg(&self) -> String {
        format!(
            "[PairCreated] {:?}: {:?} <-> {:?}",
            self.pool, self.token_a, self.token_b
        )
    }
}

/// Resolves the buy path for a freshly created pool.
///
/// Returns `None` unless the pool pairs the target with `base_asset`. The
/// router only swaps ETH in along paths starting at WETH, so a target pool
/// against any other asset cannot be bought into.
pub fn resolve_swap_path(
    event: &PoolCreatedEvent,
    base_asset: H160,
    target: TargetToken,
) -> Option<SwapPath> {
    let target = target.address();
    if !event.involves(target) {
        return None;
    }
    if !event.trades(base_asset, target) {
        info!(
            "Skipping {}: target not paired with base asset {:?}",
            event.pretty_msg(),
            base_asset
        );
        return None;
    }
    Some(SwapPath::new(base_asset, target))
}
