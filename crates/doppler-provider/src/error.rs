use std::process::ExitStatus;

/// Errors raised by the provider framework itself.
///
/// Provider implementations report parse failures through `anyhow`; these
/// variants cover descriptor validation and data acquisition.
///
/// # Examples
///
/// ```rust
/// use doppler_provider::ProviderError;
///
/// let err = ProviderError::InvalidDescriptor {
///     provider: "meminfo",
///     reason: "declares no metrics, states or events".to_string(),
/// };
/// assert!(err.to_string().contains("meminfo"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider's static descriptor is inconsistent. Fatal at startup.
    #[error("Provider: invalid descriptor for '{provider}': {reason}")]
    InvalidDescriptor {
        provider: &'static str,
        reason: String,
    },

    #[error("Provider: empty command template")]
    EmptyCommand,

    /// The external command could not be started or waited on.
    #[error("Provider: command '{command}' failed: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Provider: command '{command}' timed out after {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },

    /// The command exited unsuccessfully without writing anything to stdout.
    #[error("Provider: command '{command}' exited with {status}")]
    CommandFailed {
        command: String,
        status: ExitStatus,
    },

    #[error("Provider: failed to read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience `Result` alias for provider framework operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
