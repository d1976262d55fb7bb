/// One-shot setup calls run before the watcher starts: token deployment and
/// initial liquidity provisioning.
///
/// Unlike snipe sessions, failures here are not contained. They propagate to
/// `main` and end the process.
use anyhow::{anyhow, Context, Result};
use ethers::abi::Abi as ContractAbi;
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::utils::parse_ether;
use log::info;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::common::abi::Abi;
use crate::common::constants::Env;
use crate::common::utils::unix_now;

pub type Client = SignerMiddleware<Arc<Provider<Ws>>, LocalWallet>;

/// The parts of a Hardhat artifact needed to deploy a contract.
#[derive(Debug, Clone, Deserialize)]
pub struct HardhatArtifact {
    #[serde(rename = "contractName", default)]
    pub contract_name: String,
    pub abi: ContractAbi,
    pub bytecode: Bytes,
}

impl HardhatArtifact {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading artifact {}", path.display()))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let artifact: HardhatArtifact = serde_json::from_str(raw)?;
        if artifact.bytecode.is_empty() {
            return Err(anyhow!("artifact {} has no bytecode", artifact.contract_name));
        }
        Ok(artifact)
    }
}

/// Liquidity seeded by `provide_liquidity`.
#[derive(Debug, Clone)]
pub struct LiquidityPlan {
    pub token_amount: U256,
    pub eth_amount: U256,
    pub deadline_window_secs: u64,
}

impl Default for LiquidityPlan {
    fn default() -> Self {
        Self {
            token_amount: U256::from(1000u64) * U256::exp10(18),
            eth_amount: U256::from(2u64) * U256::exp10(16),
            deadline_window_secs: 600,
        }
    }
}

/// Deploys the token from `artifact` with `initial_supply` passed to its constructor.
pub async fn deploy_token(
    client: Arc<Client>,
    artifact: HardhatArtifact,
    initial_supply: U256,
) -> Result<H160> {
    info!("Token deploying...");
    let factory = ContractFactory::new(artifact.abi, artifact.bytecode, client);
    let contract = factory
        .deploy(initial_supply)
        .map_err(|e| anyhow!("token constructor: {e}"))?
        .send()
        .await
        .map_err(|e| anyhow!("token deployment: {e}"))?;
    let address = contract.address();
    info!("Token deployed to: {:?}", address);
    Ok(address)
}

/// Approves the router for the token, then adds token/ETH liquidity.
pub async fn provide_liquidity(
    client: Arc<Client>,
    router: H160,
    token: H160,
    plan: &LiquidityPlan,
) -> Result<H256> {
    let abi = Abi::new();
    let owner = client.address();

    info!("Approving tokens for the router...");
    let approve = abi.token.encode("approve", (router, U256::MAX))?;
    let tx: TypedTransaction = TransactionRequest::new().to(token).data(approve).into();
    send_and_confirm(&client, tx).await.context("approve")?;
    info!("Tokens approved.");

    info!("Adding Liquidity.");
    let deadline = U256::from(unix_now() + plan.deadline_window_secs);
    let add = abi.router.encode(
        "addLiquidityETH",
        (token, plan.token_amount, U256::zero(), U256::zero(), owner, deadline),
    )?;
    let tx: TypedTransaction = TransactionRequest::new()
        .to(router)
        .data(add)
        .value(plan.eth_amount)
        .into();
    let tx_hash = send_and_confirm(&client, tx).await.context("addLiquidityETH")?;
    info!("Liquidity Added Successfully. {:?}", tx_hash);
    Ok(tx_hash)
}

async fn send_and_confirm(client: &Client, tx: TypedTransaction) -> Result<H256> {
    let pending = client.send_transaction(tx, None).await?;
    let tx_hash = pending.tx_hash();
    let receipt = pending
        .await?
        .ok_or_else(|| anyhow!("transaction {:?} dropped", tx_hash))?;
    if receipt.status != Some(U64::from(1)) {
        return Err(anyhow!("transaction {:?} reverted", tx_hash));
    }
    Ok(tx_hash)
}

/// Uses `TARGET_TOKEN` when set, otherwise deploys from `TOKEN_ARTIFACT`.
///
/// Returns the address and whether it was deployed by this process.
pub async fn resolve_target_token(client: Arc<Client>, env: &Env) -> Result<(H160, bool)> {
    if !env.target_token.is_empty() {
        let address = H160::from_str(&env.target_token)
            .map_err(|e| anyhow!("TARGET_TOKEN={}: {e}", env.target_token))?;
        return Ok((address, false));
    }
    if env.token_artifact.is_empty() {
        return Err(anyhow!("either TARGET_TOKEN or TOKEN_ARTIFACT must be set"));
    }
    let artifact = HardhatArtifact::load(&env.token_artifact)?;
    let address = deploy_token(client, artifact, parse_ether("1000000")?).await?;
    Ok((address, true))
}
