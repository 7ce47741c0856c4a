use thiserror::Error;

/// Errors returned by [`crate::AdClient`] and its configuration.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No API key was configured and the environment fallback was empty
    #[error("no API key configured and {0} is not set")]
    MissingApiKey(&'static str),

    /// A configuration value is out of range or unparsable
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The outbound call to the matching service failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The batch payload could not be serialized
    #[error("failed to encode batch request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures of the transport collaborator. Every variant counts against the
/// circuit breaker.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("service responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response body is not JSON: {0}")]
    Body(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
