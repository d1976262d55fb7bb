/// Utility functions for logging, wallets, time and fee arithmetic.
use anyhow::{anyhow, Result};
use colored::Colorize;
use ethers::core::rand::thread_rng;
use ethers::prelude::*;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::common::constants::*;

/// Sets up a colored logger for the project.
///
/// The crate logs at `Debug` when `debug` is set and at `Info` otherwise;
/// dependencies only surface errors.
pub fn setup_logger(debug: bool) -> Result<()> {
    let colors = ColoredLevelConfig {
        trace: Color::Cyan,
        debug: Color::Magenta,
        info: Color::Green,
        warn: Color::Red,
        error: Color::BrightRed,
        ..ColoredLevelConfig::new()
    };

    let crate_level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{}[{}] {}",
                chrono::Local::now().format("[%H:%M:%S]"),
                colors.color(record.level()),
                message.to_string().white()
            ))
        })
        .chain(std::io::stdout())
        .level(log::LevelFilter::Error)
        .level_for(PROJECT_NAME, crate_level)
        .apply()?;

    Ok(())
}

/// Current wall-clock time as unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Increases a fee bid by `FEE_ESCALATION_PERCENT`, truncating.
pub fn escalate_fee(fee_bid: U256) -> U256 {
    fee_bid * U256::from(FEE_ESCALATION_PERCENT) / U256::from(100u64)
}

/// Creates a new random wallet and returns its address.
pub fn create_new_wallet() -> (LocalWallet, H160) {
    let wallet = LocalWallet::new(&mut thread_rng());
    let address = wallet.address();
    (wallet, address)
}

/// Parses a hex private key into a wallet bound to `chain_id`.
pub fn wallet_from_key(key: &str, chain_id: u64) -> Result<LocalWallet> {
    let wallet = key
        .trim()
        .trim_start_matches("0x")
        .parse::<LocalWallet>()
        .map_err(|e| anyhow!("invalid private key: {e}"))?;
    Ok(wallet.with_chain_id(chain_id))
}

/// Formats a wei amount as gwei for log lines.
pub fn format_gwei(wei: U256) -> String {
    ethers::utils::format_units(wei, "gwei").unwrap_or_else(|_| wei.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalation_truncates_each_step() {
        let mut fee = U256::from(20u64);
        let mut seen = vec![fee];
        for _ in 0..4 {
            fee = escalate_fee(fee);
            seen.push(fee);
        }
        // 20, 24, 28.8 -> 28, 33.6 -> 33, 39.6 -> 39
        let expected: Vec<U256> = [20u64, 24, 28, 33, 39].into_iter().map(U256::from).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn escalation_diverges_from_closed_form() {
        let start = 20u64;
        let mut fee = U256::from(start);
        for _ in 0..4 {
            fee = escalate_fee(fee);
        }
        let closed_form = (start as f64 * 1.2f64.powi(4)) as u64;
        assert_eq!(closed_form, 41);
        assert_eq!(fee, U256::from(39u64));
    }

    #[test]
    fn gwei_escalation_from_twenty() {
        let fee = U256::from(20_000_000_000u64);
        assert_eq!(escalate_fee(fee), U256::from(24_000_000_000u64));
        assert_eq!(format_gwei(fee), "20.000000000");
    }

    #[test]
    fn wallet_key_accepts_prefix() {
        let key = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
        let wallet = wallet_from_key(key, 11155111).unwrap();
        assert_eq!(wallet.chain_id(), 11155111);
        assert!(wallet_from_key("not-a-key", 1).is_err());
    }
}
