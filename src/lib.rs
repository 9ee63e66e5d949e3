// Core modules
pub mod api;
pub mod candles;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod execution;
pub mod feed;
pub mod models;
pub mod notify;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export commonly used types
pub use error::BotError;
pub use models::*;
pub use strategy::Strategy;

/// Crate-wide result type carrying the bot error taxonomy
pub type Result<T> = std::result::Result<T, BotError>;
