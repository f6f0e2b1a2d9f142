/// Errors surfaced by the agent.
///
/// `InvalidConfig` is fatal at startup; the transmission variants are soft
/// failures retried on the next send cycle.
///
/// # Examples
///
/// ```rust
/// use doppler_agent::AgentError;
///
/// let err = AgentError::Rejected {
///     status: 503,
///     body: "busy".to_string(),
/// };
/// assert!(err.to_string().contains("503"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent: invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP request could not be completed (connect, timeout, TLS, ...).
    #[error("Agent: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A transport other than HTTP failed to deliver the payload.
    #[error("Agent: transport failed: {0}")]
    Transport(String),

    /// The endpoint answered with something other than 200.
    #[error("Agent: endpoint rejected payload: status={status}, body={body}")]
    Rejected { status: u16, body: String },

    #[error("Agent: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience `Result` alias for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
