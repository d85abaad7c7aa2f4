use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gridcast_models::{RawWeather, WeatherConfig};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{ProviderError, WeatherProvider};

/// OpenWeatherMap client using the `/weather` and `/forecast` endpoints in metric units.
///
/// Request timeouts are applied by the weather agent, not here.
pub struct OpenWeatherProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &WeatherConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| ProviderError::MissingApiKey(config.api_key_env.clone()))?;
        Ok(Self::new(config.base_url.clone(), api_key))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        location: &str,
    ) -> Result<T, ProviderError> {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!(%url, location, "Requesting weather data");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", location),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), location, "Weather API request failed");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize, Default)]
struct WindBlock {
    #[serde(default)]
    speed: f64,
}

#[derive(Debug, Deserialize, Default)]
struct CloudsBlock {
    /// Percent, 0-100.
    #[serde(default)]
    all: f64,
}

#[derive(Debug, Deserialize)]
struct ConditionBlock {
    main: String,
}

#[derive(Debug, Deserialize)]
struct Reading {
    dt: i64,
    main: MainBlock,
    #[serde(default)]
    wind: WindBlock,
    #[serde(default)]
    clouds: CloudsBlock,
    #[serde(default)]
    weather: Vec<ConditionBlock>,
    /// Present on `/weather` responses only.
    #[serde(default)]
    timezone: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct ForecastCity {
    #[serde(default)]
    timezone: i32,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    list: Vec<Reading>,
    city: ForecastCity,
}

fn to_raw(reading: &Reading, utc_offset_seconds: i32) -> Result<RawWeather, ProviderError> {
    let observed_at = DateTime::<Utc>::from_timestamp(reading.dt, 0)
        .ok_or_else(|| ProviderError::Malformed(format!("timestamp out of range: {}", reading.dt)))?;

    Ok(RawWeather {
        observed_at,
        temperature_c: reading.main.temp,
        humidity_percent: reading.main.humidity,
        wind_speed_ms: reading.wind.speed,
        cloud_cover: reading.clouds.all / 100.0,
        condition: reading
            .weather
            .first()
            .map(|w| w.main.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        utc_offset_seconds,
    })
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn name(&self) -> &str {
        "openweathermap"
    }

    async fn current_weather(&self, location: &str) -> Result<RawWeather, ProviderError> {
        let reading: Reading = self.get_json("weather", location).await?;
        to_raw(&reading, reading.timezone.unwrap_or(0))
    }

    async fn forecast_5day(&self, location: &str) -> Result<Vec<RawWeather>, ProviderError> {
        let forecast: ForecastResponse = self.get_json("forecast", location).await?;
        if forecast.list.is_empty() {
            return Err(ProviderError::Malformed("empty forecast list".to_string()));
        }
        forecast
            .list
            .iter()
            .map(|r| to_raw(r, forecast.city.timezone))
            .collect()
    }
}
