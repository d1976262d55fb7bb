/// Telegram notifications for finished snipe sessions.
use anyhow::Result;
use ethers::types::H160;
use teloxide::prelude::*;
use teloxide::types::ChatId;

use crate::common::constants::Env;
use crate::sniper::retry::SessionOutcome;

/// Handles Telegram bot setup and sending alert messages.
///
/// Both fields are `None` when alerting is disabled, in which case every send is a no-op.
pub struct Alert {
    pub bot: Option<Bot>,
    pub chat_id: Option<ChatId>,
}

impl Alert {
    /// Creates a new `Alert`, enabled only when `USE_ALERT` is set and the chat id parses.
    pub fn new(env: &Env) -> Self {
        if !env.use_alert {
            return Self::disabled();
        }
        match env.telegram_chat_id.parse::<i64>() {
            Ok(chat_id) => Self {
                bot: Some(Bot::new(env.telegram_token.clone())),
                chat_id: Some(ChatId(chat_id)),
            },
            Err(e) => {
                log::warn!("Alerts disabled, invalid TELEGRAM_CHAT_ID: {e:?}");
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self {
            bot: None,
            chat_id: None,
        }
    }

    /// Sends a message via Telegram if alerting is enabled.
    pub async fn send(&self, message: &str) -> Result<()> {
        if let (Some(bot), Some(chat_id)) = (&self.bot, self.chat_id) {
            bot.send_message(chat_id, message).await?;
        }
        Ok(())
    }

    /// Sends the terminal outcome of a session for `pool`.
    pub async fn send_session_outcome(&self, pool: H160, outcome: &SessionOutcome) -> Result<()> {
        self.send(&session_message(pool, outcome)).await
    }
}

fn session_message(pool: H160, outcome: &SessionOutcome) -> String {
    match outcome {
        SessionOutcome::Confirmed { tx_hash, attempts } => format!(
            "[{:?}] Snipe confirmed after {} attempt(s)\n-Tx: {:?}",
            pool,
            attempts.len(),
            tx_hash
        ),
        SessionOutcome::Exhausted {
            attempts,
            last_failure,
        } => format!(
            "[{:?}] Snipe failed after {} attempt(s)\n-Last failure: {}",
            pool,
            attempts.len(),
            last_failure
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::errors::SnipeError;
    use ethers::types::{H256, U256};
    use crate::sniper::retry::AttemptRecord;

    #[test]
    fn exhausted_message_names_failure() {
        let outcome = SessionOutcome::Exhausted {
            attempts: vec![AttemptRecord {
                attempt_number: 1,
                fee_bid: U256::from(20u64),
                min_amount_out: None,
                failure: Some(SnipeError::RelayError("insufficient fee".into())),
            }],
            last_failure: SnipeError::RelayError("insufficient fee".into()),
        };
        let message = session_message(H160::zero(), &outcome);
        assert!(message.contains("failed after 1 attempt(s)"));
        assert!(message.contains("relay error: insufficient fee"));
    }

    #[tokio::test]
    async fn disabled_alert_is_noop() {
        let alert = Alert::disabled();
        let outcome = SessionOutcome::Confirmed {
            tx_hash: H256::zero(),
            attempts: vec![],
        };
        assert!(alert.send_session_outcome(H160::zero(), &outcome).await.is_ok());
    }
}
