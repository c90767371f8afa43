//! Error taxonomy.
//!
//! `ErrorKind` is the classification used by both the retry manager and the
//! streamed `error` event; `AgentError` is the typed error propagated out of
//! the LLM client, node lifecycle, and orchestrator.

use thiserror::Error;

/// Classification of an error for retry policy and user messaging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    RateLimit,
    Timeout,
    Network,
    ServerError,
    BadRequest,
    Authentication,
    Permission,
    NotFound,
    Validation,
    Unknown,
}

impl ErrorKind {
    /// Whether this class is retryable at all.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimit | ErrorKind::Timeout | ErrorKind::Network | ErrorKind::ServerError
        )
    }

    /// Stable wire name, matches `StreamEvent::Error.kind`.
    pub fn wire_name(self) -> &'static str {
        match self {
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Network => "network",
            ErrorKind::ServerError => "server_error",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Permission => "permission",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Canned human-friendly explanation.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::RateLimit => "The model provider is rate-limiting requests.",
            ErrorKind::Timeout => "The request to the model timed out.",
            ErrorKind::Network => "A network error occurred reaching the model.",
            ErrorKind::ServerError => "The model provider returned a server error.",
            ErrorKind::BadRequest => "The request was malformed.",
            ErrorKind::Authentication => "Authentication with the model provider failed.",
            ErrorKind::Permission => "The operation is not permitted.",
            ErrorKind::NotFound => "The requested resource was not found.",
            ErrorKind::Validation => "A tool argument failed validation.",
            ErrorKind::Unknown => "An unexpected error occurred.",
        }
    }

    /// Recommended next step shown alongside `user_message`.
    pub fn next_step(self) -> &'static str {
        match self {
            ErrorKind::RateLimit => "Wait a moment and try again.",
            ErrorKind::Timeout => "Retry; consider a shorter prompt.",
            ErrorKind::Network => "Check connectivity and retry.",
            ErrorKind::ServerError => "Retry later; this is likely transient.",
            ErrorKind::BadRequest => "Check the request shape; this will not succeed on retry.",
            ErrorKind::Authentication => "Check API keys.",
            ErrorKind::Permission => "Check API key scopes/permissions.",
            ErrorKind::NotFound => "Check the model/resource identifier.",
            ErrorKind::Validation => "Check required parameters.",
            ErrorKind::Unknown => "Retry once; report if persistent.",
        }
    }
}

/// Typed error propagated by the LLM client, node lifecycle, and orchestrator.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("llm call failed ({kind:?}): {message}")]
    Llm {
        kind: ErrorKind,
        message: String,
        retry_after: Option<f64>,
    },
    #[error("tool dispatch failed: {0}")]
    ToolDispatch(String),
    #[error("argument validation failed: {0}")]
    Validation(String),
    #[error("recursion depth limit reached")]
    DepthLimitReached,
    #[error("streaming session closed")]
    SessionClosed,
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Best-effort classification for any variant, used to populate the
    /// streamed `error` event's `kind` field uniformly.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Llm { kind, .. } => *kind,
            AgentError::ToolDispatch(_) => ErrorKind::Unknown,
            AgentError::Validation(_) => ErrorKind::Validation,
            AgentError::DepthLimitReached => ErrorKind::Unknown,
            AgentError::SessionClosed => ErrorKind::Unknown,
            AgentError::Other(_) => ErrorKind::Unknown,
        }
    }
}
