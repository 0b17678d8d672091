//! Error types for the Memoria domain.
//!
//! Each bounded context has its own `thiserror` enum. The memory pipeline is
//! built so that only [`AuthError`] and [`ProviderError`] can ever reach the
//! caller of a turn; [`RetrievalError`] and [`ParseError`] are always degraded
//! to a smaller context by the stage that observes them.

use thiserror::Error;

/// The top-level error type for all Memoria operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Memory retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failure to obtain a bearer credential for the tool gateway.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Token endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("Token endpoint rejected the request (status: {status_code}): {message}")]
    Rejected { status_code: u16, message: String },

    #[error("Token endpoint returned an invalid body: {0}")]
    InvalidResponse(String),
}

/// A failed call against the memory service.
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Memory service call failed: {0}")]
    Service(String),

    #[error("Memory service call `{operation}` timed out after {timeout_secs}s")]
    Timeout {
        operation: &'static str,
        timeout_secs: u64,
    },
}

/// Malformed JSON coming back from the model or from memory content.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}
