//! Error types for a2a-orchestrator.

use thiserror::Error;

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for a2a-orchestrator.
///
/// A remote agent answering with a non-success envelope is not represented
/// here: that case is an absent result (`Ok(None)`), not an error.
#[derive(Debug, Error)]
pub enum Error {
    /// No connection is registered under this agent name.
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    /// The agent name is registered but its connection is unusable.
    #[error("connection unavailable for agent: {0}")]
    ConnectionUnavailable(String),

    /// The call to a remote agent could not complete.
    #[error("transport failure: {0}")]
    Transport(String),

    /// A remote call exceeded its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The workflow was cancelled by its caller.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Capability discovery could not reach the agent.
    #[error("unreachable agent at {url}: {reason}")]
    UnreachableAgent { url: String, reason: String },

    /// The agent card could not be parsed.
    #[error("malformed descriptor from {url}: {reason}")]
    MalformedDescriptor { url: String, reason: String },

    /// Workflow error.
    #[error("workflow error: {0}")]
    Workflow(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid parameters.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// The remote agent answered with something that is not a JSON-RPC response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error aborts a running workflow.
    pub fn is_hard(&self) -> bool {
        matches!(
            self,
            Error::AgentNotFound(_)
                | Error::ConnectionUnavailable(_)
                | Error::Transport(_)
                | Error::Timeout(_)
                | Error::Cancelled(_)
                | Error::Protocol(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(err.to_string())
        } else {
            Error::Transport(err.to_string())
        }
    }
}
