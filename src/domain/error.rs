//! TVL pipeline error taxonomy.
//!
//! Every port returns `Result<T, TvlError>` so the command boundary is
//! forced to handle the "unavailable" path explicitly. Startup wiring
//! uses `anyhow` instead and aborts the process.

use std::time::Duration;

use thiserror::Error;

/// Failure of a single TVL computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TvlError {
    /// Node or price index unreachable, non-2xx, or malformed body.
    #[error("{context}: {detail}")]
    Connectivity {
        /// What was being attempted (e.g. "eth_getLogs 100..200").
        context: String,
        /// Underlying cause, for operator diagnosis.
        detail: String,
    },

    /// The price index has no listing and no stable default applies.
    #[error("no USD price listed for {symbol}")]
    MissingPrice {
        /// Registry symbol of the unpriced asset.
        symbol: String,
    },

    /// An outbound call or the whole pipeline exceeded its budget.
    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout {
        /// Operation that timed out.
        operation: String,
        /// Budget that was exceeded.
        after: Duration,
    },

    /// Malformed or missing address/endpoint. Only raised at startup.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl TvlError {
    /// Build a connectivity error from any displayable cause.
    pub fn connectivity(context: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::Connectivity {
            context: context.into(),
            detail: detail.to_string(),
        }
    }

    /// Build a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Short label used for metrics and structured logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connectivity { .. } => "connectivity",
            Self::MissingPrice { .. } => "missing_price",
            Self::Timeout { .. } => "timeout",
            Self::InvalidConfiguration(_) => "invalid_configuration",
        }
    }
}

/// Run `fut` under `after`, mapping elapsed budgets to [`TvlError::Timeout`].
pub async fn with_timeout<T, F>(operation: &str, after: Duration, fut: F) -> Result<T, TvlError>
where
    F: std::future::Future<Output = Result<T, TvlError>>,
{
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| TvlError::timeout(operation, after))?
}
