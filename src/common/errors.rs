use thiserror::Error;

/// Reasons a single snipe attempt can fail.
///
/// Everything except `DeadlineUnreachable` is retried with a higher fee bid.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SnipeError {
    /// The router could not price the path, e.g. the pool has no reserves yet.
    #[error("quote unavailable: {0}")]
    QuoteUnavailable(String),
    /// The swap deadline is not in the future at build time.
    #[error("deadline {deadline} is not after current time {now}")]
    DeadlineUnreachable { deadline: u64, now: u64 },
    /// The node refused the transaction or it reverted on chain.
    #[error("rejected: {0}")]
    Rejected(String),
    /// The private relay answered with an error.
    #[error("relay error: {0}")]
    RelayError(String),
    /// Transport fault or confirmation wait ran out.
    #[error("timeout: {0}")]
    Timeout(String),
}

impl SnipeError {
    /// Fatal errors end the session without further attempts.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SnipeError::DeadlineUnreachable { .. })
    }

    /// Short label used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            SnipeError::QuoteUnavailable(_) => "QuoteUnavailable",
            SnipeError::DeadlineUnreachable { .. } => "DeadlineUnreachable",
            SnipeError::Rejected(_) => "Rejected",
            SnipeError::RelayError(_) => "RelayError",
            SnipeError::Timeout(_) => "Timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_deadline_is_fatal() {
        assert!(SnipeError::DeadlineUnreachable { deadline: 1, now: 2 }.is_fatal());
        assert!(!SnipeError::QuoteUnavailable("no reserves".into()).is_fatal());
        assert!(!SnipeError::Rejected("reverted".into()).is_fatal());
        assert!(!SnipeError::RelayError("insufficient fee".into()).is_fatal());
        assert!(!SnipeError::Timeout("connection refused".into()).is_fatal());
    }

    #[test]
    fn relay_message_is_kept_verbatim() {
        let err = SnipeError::RelayError("bundle underpriced: 1 gwei".into());
        assert_eq!(err.to_string(), "relay error: bundle underpriced: 1 gwei");
    }
}
