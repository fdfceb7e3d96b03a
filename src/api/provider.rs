//! Abstraction over the upstream weather source.

use crate::error::Result;
use crate::models::Observation;
use async_trait::async_trait;

/// Anything that can produce a current-weather observation for a city.
///
/// The polling scheduler is generic over this trait so tests can substitute a
/// scripted provider for the real HTTP client.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Fetches the current conditions for a (city name, country code) pair,
    /// normalized to metric units.
    async fn current_weather(&self, city: &str, country: &str) -> Result<Observation>;
}
