//! Error types for the trading core.

use thiserror::Error;

/// Result type alias using the bot's error.
pub type BotResult<T> = std::result::Result<T, BotError>;

/// Errors surfaced by the trading core.
///
/// The cycle handles each kind differently: `Data`, `Constraint` and
/// `Execution` abort only the current trade attempt (the cycle still writes a
/// PASS ledger row); `Collaborator` aborts the whole cycle without a ledger
/// write and the scheduler moves on to the next one.
#[derive(Error, Debug)]
pub enum BotError {
    /// Malformed or missing market data.
    #[error("data error: {0}")]
    Data(String),

    /// No valid trade quantity under the exchange's constraints.
    #[error("constraint error: {0}")]
    Constraint(String),

    /// Order rejected or not fully filled.
    #[error("execution error: order status {status}")]
    Execution { status: String },

    /// Exchange or network failure surfaced by a collaborator call.
    #[error("{op} failed: {source}")]
    Collaborator {
        op: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl BotError {
    pub fn data(msg: impl Into<String>) -> Self {
        BotError::Data(msg.into())
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        BotError::Constraint(msg.into())
    }

    pub fn collaborator(op: &'static str, source: impl Into<anyhow::Error>) -> Self {
        BotError::Collaborator {
            op,
            source: source.into(),
        }
    }

    /// True for errors that abort the whole cycle rather than just the
    /// current trade attempt.
    pub fn aborts_cycle(&self) -> bool {
        matches!(self, BotError::Collaborator { .. })
    }
}
