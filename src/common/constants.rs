/// Defines global constants and environment configuration for the sniper.
///
/// Contains the default Uniswap V2 deployment addresses, raw environment parsing
/// (`Env`) and the typed, validated snipe configuration (`SnipeConfig`).
use anyhow::{anyhow, Context, Result};
use ethers::types::{H160, U256};
use ethers::utils::{parse_ether, parse_units};
use lazy_static::lazy_static;
use std::str::FromStr;
use url::Url;

pub static PROJECT_NAME: &str = "pair_sniper";

/// Default buffer size for the pool-created event channel.
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// Fee escalation step applied after every failed attempt, in percent.
pub const FEE_ESCALATION_PERCENT: u64 = 120;

/// Sepolia chain id.
pub const DEFAULT_CHAIN_ID: u64 = 11155111;

pub static DEFAULT_RELAY_ENDPOINT: &str = "https://relay-sepolia.flashbots.net";

/// `PairCreated(address indexed token0, address indexed token1, address pair, uint256)`
pub static PAIR_CREATED_EVENT: &str = "PairCreated(address,address,address,uint256)";

lazy_static! {
    /// Uniswap V2 Router on Sepolia.
    pub static ref SEPOLIA_ROUTER: H160 =
        H160::from_str("0xC532a74256D3Db42D0Bf7a0400fEFDbad7694008").unwrap();
    /// Uniswap V2 Factory on Sepolia.
    pub static ref SEPOLIA_FACTORY: H160 =
        H160::from_str("0x7E0987E5b3a30e3f2828572Bb659A548460a3003").unwrap();
    /// WETH on Sepolia.
    pub static ref SEPOLIA_WETH: H160 =
        H160::from_str("0x7b79995e5f793A07Bc00c21412e50Ecae098E7f9").unwrap();
}

/// Retrieves the value of an environment variable by key, or returns an empty string if not found.
pub fn get_env(key: &str) -> String {
    std::env::var(key).unwrap_or(String::from(""))
}

/// Like `get_env`, falling back to `default` when the variable is unset or empty.
pub fn get_env_or(key: &str, default: &str) -> String {
    let value = get_env(key);
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

/// Holds the raw environment configuration.
///
/// Values are kept as strings here; `SnipeConfig::from_env` turns the
/// snipe-specific ones into typed, validated settings.
#[derive(Debug, Clone)]
pub struct Env {
    /// WebSocket endpoint for RPC connections.
    pub wss_url: String,
    /// Private key used to sign swaps and setup transactions.
    pub private_key: String,
    /// Identity key for relay reputation. A random key is used when empty.
    pub identity_key: String,
    pub chain_id: u64,
    pub router_address: String,
    pub factory_address: String,
    pub weth_address: String,
    /// Token to snipe. When empty the token is deployed from `token_artifact`.
    pub target_token: String,
    /// Path to a Hardhat artifact JSON holding the token's abi and bytecode.
    pub token_artifact: String,
    /// Whether to seed the initial pool after deployment.
    pub seed_liquidity: bool,
    /// Telegram token for alerts.
    pub telegram_token: String,
    /// Telegram chat ID for alerts.
    pub telegram_chat_id: String,
    /// Whether to use alerts.
    pub use_alert: bool,
    /// Whether to enable debug logging.
    pub debug: bool,
}

impl Env {
    /// Loads environment variables and constructs an `Env` instance.
    pub fn new() -> Self {
        Env {
            wss_url: get_env("WSS_URL"),
            private_key: get_env("PRIVATE_KEY"),
            identity_key: get_env("IDENTITY_KEY"),
            chain_id: get_env("CHAIN_ID").parse().unwrap_or(DEFAULT_CHAIN_ID),
            router_address: get_env("ROUTER_ADDRESS"),
            factory_address: get_env("FACTORY_ADDRESS"),
            weth_address: get_env("WETH_ADDRESS"),
            target_token: get_env("TARGET_TOKEN"),
            token_artifact: get_env("TOKEN_ARTIFACT"),
            seed_liquidity: get_env("SEED_LIQUIDITY").parse::<bool>().unwrap_or(false),
            telegram_token: get_env("TELEGRAM_TOKEN"),
            telegram_chat_id: get_env("TELEGRAM_CHAT_ID"),
            use_alert: get_env("USE_ALERT").parse::<bool>().unwrap_or(false),
            debug: get_env("DEBUG").parse::<bool>().unwrap_or(false),
        }
    }

    pub fn router(&self) -> Result<H160> {
        parse_address_or(&self.router_address, *SEPOLIA_ROUTER)
    }

    pub fn factory(&self) -> Result<H160> {
        parse_address_or(&self.factory_address, *SEPOLIA_FACTORY)
    }

    pub fn weth(&self) -> Result<H160> {
        parse_address_or(&self.weth_address, *SEPOLIA_WETH)
    }
}

fn parse_address_or(raw: &str, default: H160) -> Result<H160> {
    if raw.is_empty() {
        return Ok(default);
    }
    H160::from_str(raw).map_err(|e| anyhow!("invalid address {raw}: {e}"))
}

/// Slippage tolerance as a whole percentage in `[0, 100)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slippage(u64);

impl Slippage {
    pub fn new(percent: u64) -> Result<Self> {
        if percent >= 100 {
            return Err(anyhow!("slippage must be in [0, 100), got {percent}"));
        }
        Ok(Self(percent))
    }

    pub fn percent(&self) -> u64 {
        self.0
    }
}

impl Default for Slippage {
    fn default() -> Self {
        Self(10)
    }
}

/// How signed swaps leave the process. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionMode {
    /// Send to the node's public transaction pool.
    Public,
    /// Forward to a private relay with `eth_sendPrivateTransaction`.
    Private,
}

impl FromStr for SubmissionMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "public" => Ok(SubmissionMode::Public),
            "private" | "relay" | "flashbots" => Ok(SubmissionMode::Private),
            other => Err(anyhow!("unknown submission mode: {other}")),
        }
    }
}

/// Typed settings for snipe sessions.
#[derive(Debug, Clone)]
pub struct SnipeConfig {
    /// Fee bid (legacy gas price, wei) of the first attempt.
    pub starting_fee: U256,
    pub slippage: Slippage,
    /// Total attempts per session, 1-indexed.
    pub max_retries: u32,
    /// ETH (wei) attached to every swap.
    pub swap_amount_in: U256,
    /// Recipient of bought tokens. `None` means the signer.
    pub recipient: Option<H160>,
    pub gas_limit: U256,
    pub deadline_window_secs: u64,
    pub submission_mode: SubmissionMode,
    pub relay_endpoint: Url,
    /// Blocks a private transaction stays eligible for inclusion.
    pub relay_max_blocks: u64,
    pub confirmation_timeout_secs: u64,
}

impl Default for SnipeConfig {
    fn default() -> Self {
        Self {
            starting_fee: U256::from(20_000_000_000u64),
            slippage: Slippage::default(),
            max_retries: 3,
            swap_amount_in: U256::from(10_000_000_000_000_000u64),
            recipient: None,
            gas_limit: U256::from(300_000u64),
            deadline_window_secs: 600,
            submission_mode: SubmissionMode::Private,
            relay_endpoint: Url::parse(DEFAULT_RELAY_ENDPOINT).unwrap(),
            relay_max_blocks: 25,
            confirmation_timeout_secs: 120,
        }
    }
}

impl SnipeConfig {
    /// Reads the snipe settings from the environment, using defaults for unset values.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let starting_fee = match get_env("STARTING_FEE_GWEI") {
            v if v.is_empty() => defaults.starting_fee,
            v => U256::from(
                parse_units(&v, "gwei").with_context(|| format!("STARTING_FEE_GWEI={v}"))?,
            ),
        };
        let swap_amount_in = match get_env("SWAP_AMOUNT_IN_ETH") {
            v if v.is_empty() => defaults.swap_amount_in,
            v => parse_ether(&v).with_context(|| format!("SWAP_AMOUNT_IN_ETH={v}"))?,
        };
        let recipient = match get_env("RECIPIENT") {
            v if v.is_empty() => None,
            v => Some(H160::from_str(&v).map_err(|e| anyhow!("RECIPIENT={v}: {e}"))?),
        };

        let config = Self {
            starting_fee,
            slippage: Slippage::new(parse_or("SLIPPAGE_PERCENT", defaults.slippage.percent())?)?,
            max_retries: parse_or("MAX_RETRIES", defaults.max_retries)?,
            swap_amount_in,
            recipient,
            gas_limit: U256::from(parse_or("GAS_LIMIT", defaults.gas_limit.as_u64())?),
            deadline_window_secs: parse_or("DEADLINE_WINDOW_SECS", defaults.deadline_window_secs)?,
            submission_mode: get_env_or("SUBMISSION_MODE", "private").parse()?,
            relay_endpoint: Url::parse(&get_env_or("RELAY_ENDPOINT", DEFAULT_RELAY_ENDPOINT))?,
            relay_max_blocks: parse_or("RELAY_MAX_BLOCKS", defaults.relay_max_blocks)?,
            confirmation_timeout_secs: parse_or(
                "CONFIRMATION_TIMEOUT_SECS",
                defaults.confirmation_timeout_secs,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(anyhow!("MAX_RETRIES must be at least 1"));
        }
        if self.swap_amount_in.is_zero() {
            return Err(anyhow!("SWAP_AMOUNT_IN_ETH must be positive"));
        }
        if self.starting_fee.is_zero() {
            return Err(anyhow!("STARTING_FEE_GWEI must be positive"));
        }
        Ok(())
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_env(key) {
        v if v.is_empty() => Ok(default),
        v => v.trim().parse::<T>().map_err(|e| anyhow!("{key}={v}: {e}")),
    }
}
