use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Weather provider unavailable for {location}: {reason}")]
    ProviderUnavailable { location: String, reason: String },

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Invalid location: {0:?}")]
    InvalidLocation(String),
}

impl AgentError {
    pub fn is_provider_unavailable(&self) -> bool {
        matches!(self, AgentError::ProviderUnavailable { .. })
    }
}

#[derive(Error, Debug)]
#[error("Persistence sink error: {0}")]
pub struct SinkError(pub String);
