use thiserror::Error;

/// Errors surfaced by the bot runtime
///
/// The retry executor and the dispatcher route on these variants:
/// `Transient` failures are retried with backoff, `NotFound` is
/// success-equivalent during cancellation, `Fatal` halts the run loop.
#[derive(Debug, Error)]
pub enum BotError {
    /// Retryable network, rate-limit or server-side failure
    #[error("transient exchange error: {0}")]
    Transient(String),

    /// Target resource already gone (e.g. cancel on a filled order)
    #[error("not found: {0}")]
    NotFound(String),

    /// Non-retryable condition that must stop the bot
    #[error("fatal: {0}")]
    Fatal(String),

    /// Ordinary strategy error, logged and swallowed by the dispatcher
    #[error("strategy error: {0}")]
    Strategy(String),

    /// Rejected request that is neither retryable nor fatal
    #[error("http error: {status} - {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body or error message
        message: String,
    },

    /// Missing or malformed configuration
    #[error("config error: {0}")]
    Config(String),

    /// Response body could not be decoded
    #[error("parse error: {0}")]
    Parse(String),
}

impl BotError {
    /// Whether the retry executor may re-issue the wrapped call
    pub fn is_retryable(&self) -> bool {
        matches!(self, BotError::Transient(_))
    }

    /// Whether the dispatcher must terminate the run
    pub fn is_fatal(&self) -> bool {
        matches!(self, BotError::Fatal(_))
    }
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            BotError::Transient(err.to_string())
        } else if err.is_decode() {
            BotError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            match status.as_u16() {
                404 | 410 => BotError::NotFound(err.to_string()),
                429 | 500..=599 => BotError::Transient(err.to_string()),
                s => BotError::Http {
                    status: s,
                    message: err.to_string(),
                },
            }
        } else {
            BotError::Transient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::Parse(err.to_string())
    }
}
