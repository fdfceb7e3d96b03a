//! Provides a client for interacting with the Weatherstack API.
//!
//! This module defines the `WeatherstackClient` struct, which fetches current
//! weather conditions for one city at a time and normalizes them into an
//! `Observation`.

use crate::api::WeatherProvider;
use crate::error::{AppError, Result};
use crate::models::{CurrentResponse, Observation};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error};

const BASE_URL: &str = "http://api.weatherstack.com";

/// An asynchronous client for the Weatherstack `/current` endpoint.
pub struct WeatherstackClient {
    client: Client,
    access_key: String,
    base_url: String,
}

impl WeatherstackClient {
    /// Creates a new `WeatherstackClient` with the provided access key.
    ///
    /// Uses the default Weatherstack base URL.
    pub fn new(access_key: String) -> Self {
        Self {
            client: Client::new(),
            access_key,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Creates a new `WeatherstackClient` with a custom base URL.
    ///
    /// This is primarily intended for testing purposes (e.g., using a mock server).
    #[cfg(test)]
    pub fn new_with_base_url(access_key: String, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            access_key,
            base_url: base_url.to_string(),
        }
    }
}

#[async_trait]
impl WeatherProvider for WeatherstackClient {
    /// Fetches the current conditions for one city in metric units.
    ///
    /// Corresponds to the `/current` endpoint of the Weatherstack API. The city
    /// is addressed as `"Name,CC"` via the `query` parameter.
    async fn current_weather(&self, city: &str, country: &str) -> Result<Observation> {
        let place = format!("{},{}", city, country);
        debug!("Fetching current weather for {}", place);

        let url = format!("{}/current", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("access_key", self.access_key.as_str()),
                ("query", place.as_str()),
                ("units", "m"),
            ])
            .send()
            .await
            .map_err(|e| {
                error!("Error fetching current weather for {}: {}", place, e);
                AppError::Provider(e.into())
            })?;

        // Check HTTP status code and handle transport-level API errors
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                let status = e.status();
                error!(
                    "Weather request for {} failed with status {}: {}",
                    place,
                    status.unwrap_or(reqwest::StatusCode::default()),
                    e
                );
                if status == Some(reqwest::StatusCode::UNAUTHORIZED)
                    || status == Some(reqwest::StatusCode::FORBIDDEN)
                {
                    error!("Received 401/403. Check WEATHERSTACK_KEY validity.");
                }
                return Err(AppError::Provider(std::sync::Arc::new(e)));
            },
        };

        let body = response.text().await.map_err(|e| {
            error!("Error reading response body for {}: {}", place, e);
            AppError::Provider(e.into())
        })?;

        let payload: CurrentResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Error parsing weather response JSON for {}: {}", place, e);
            AppError::JsonParse(e.into())
        })?;

        // Weatherstack reports failures as HTTP 200 with an `error` object and
        // no `current` block.
        let current = match payload.current {
            Some(current) => current,
            None => {
                let reason = payload
                    .error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "response carries no `current` block".to_string());
                error!("No usable reading for {}: {}", place, reason);
                return Err(AppError::MalformedPayload(reason));
            },
        };

        let observation = Observation::from_current(current)?;
        debug!(
            "Received reading for {}: {}°C, {}",
            place, observation.temperature, observation.description
        );

        Ok(observation)
    }
}
