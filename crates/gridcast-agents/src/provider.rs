use async_trait::async_trait;
use gridcast_models::RawWeather;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed provider response: {0}")]
    Malformed(String),

    #[error("No API key configured (set {0})")]
    MissingApiKey(String),
}

/// External source of raw weather readings. Mockable for testing.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Current conditions at `location`.
    async fn current_weather(&self, location: &str) -> Result<RawWeather, ProviderError>;

    /// Readings covering the next five days, in chronological order.
    async fn forecast_5day(&self, location: &str) -> Result<Vec<RawWeather>, ProviderError>;
}
