use alloy_transport::{RpcError, TransportError};

/// Errors surfaced by the [`ChainClient`](crate::data_sync::ChainClient) boundary.
///
/// Every failure of a node interaction is classified here once, so callers can
/// isolate a single log, signal or tick without inspecting error strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    // Network, timeout or transport level failure
    #[error("transport error: {0}")]
    Transport(String),
    // The node answered with a JSON-RPC error (revert, pruned state, rate limit)
    #[error("node error {code}: {message}")]
    Node { code: i64, message: String },
    // Response or log payload did not have the expected shape
    #[error("decode error: {0}")]
    Decode(String),
}

impl ChainError {
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode(reason.into())
    }

    /// Transport and node errors are retried implicitly on the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Node { .. })
    }
}

impl From<TransportError> for ChainError {
    fn from(error: TransportError) -> Self {
        match error {
            RpcError::ErrorResp(payload) => Self::Node { code: payload.code, message: payload.message.to_string() },
            RpcError::DeserError { err, .. } => Self::Decode(err.to_string()),
            err => Self::Transport(err.to_string()),
        }
    }
}

impl From<alloy_sol_types::Error> for ChainError {
    fn from(error: alloy_sol_types::Error) -> Self {
        Self::Decode(error.to_string())
    }
}
