//! Defines data structures for the application.
//!
//! Includes structs for:
//! - Deserializing Weatherstack `/current` responses.
//! - The normalized `Observation` produced by the provider client.
//! - Representing data stored in the database (`DbReading`).
//! - Structuring aggregation query results (`CityTemperatureAverages`, `CityWindSummary`, `FeelsLikeDelta`).

use chrono::{DateTime, Utc};
use num_traits::FromPrimitive;
use serde::Deserialize;
use sqlx::types::Decimal;
use std::fmt;
use tracing::warn;

use crate::error::{AppError, Result};

// --- Configured city identity ---

/// A (name, country code) pair as it appears in the polling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CitySpec {
    pub name: String,
    /// ISO 3166-1 alpha-2 code, uppercase.
    pub country: String,
}

impl CitySpec {
    pub fn new(name: &str, country: &str) -> Self {
        Self {
            name: name.to_string(),
            country: country.to_string(),
        }
    }
}

impl fmt::Display for CitySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.name, self.country)
    }
}

// --- Weatherstack API response structs ---

/// Top-level response of the `/current` endpoint.
///
/// Weatherstack reports request failures as HTTP 200 with an `error` object in
/// place of the `current` block, so both halves are optional here.
#[derive(Debug, Deserialize, Clone)]
pub struct CurrentResponse {
    pub current: Option<CurrentWeather>,
    pub error: Option<ApiErrorBody>,
}

/// Error object embedded in an otherwise successful HTTP response.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiErrorBody {
    pub code: i32,
    #[serde(rename = "type")]
    pub kind: String,
    pub info: Option<String>,
}

impl fmt::Display for ApiErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.kind, self.code)?;
        if let Some(info) = &self.info {
            write!(f, ": {}", info)?;
        }
        Ok(())
    }
}

/// The `current` block of a Weatherstack response, in metric units.
#[derive(Debug, Deserialize, Clone)]
pub struct CurrentWeather {
    /// Air temperature in °C.
    pub temperature: f64,
    /// Perceived temperature in °C.
    pub feelslike: f64,
    /// Relative humidity in percent.
    pub humidity: i32,
    /// Wind speed in km/h.
    pub wind_speed: f64,
    /// Compass direction the wind blows from, e.g. "NW".
    pub wind_dir: String,
    pub weather_descriptions: Vec<String>,
}

// --- Normalized reading ---

/// One weather observation for one city, as handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: i32,
    pub wind_speed: f64,
    pub wind_direction: String,
    pub description: String,
}

impl Observation {
    /// Normalizes a `current` block, keeping the first description string.
    pub fn from_current(current: CurrentWeather) -> Result<Self> {
        let description = current
            .weather_descriptions
            .into_iter()
            .next()
            .ok_or_else(|| {
                AppError::MalformedPayload("weather_descriptions is empty".to_string())
            })?;

        Ok(Self {
            temperature: current.temperature,
            feels_like: current.feelslike,
            humidity: current.humidity,
            wind_speed: current.wind_speed,
            wind_direction: current.wind_dir,
            description,
        })
    }
}

// --- Database structs ---

/// A reading structured for insertion into the `weather_data` table.
/// Values are stored as `Decimal` to match the NUMERIC(5,2) columns.
#[derive(Debug, Clone)]
pub struct DbReading {
    pub city_id: i32,
    pub temperature: Decimal,
    pub feels_like: Decimal,
    pub humidity: i32,
    pub wind_speed: Decimal,
    pub wind_direction: String,
    pub weather_description: String,
}

impl DbReading {
    /// Converts a normalized `Observation` for storage under `city_id`.
    ///
    /// The row timestamp is intentionally absent: the database assigns it at
    /// insertion time.
    pub fn from_observation(city_id: i32, observation: &Observation) -> Self {
        Self {
            city_id,
            temperature: to_decimal(observation.temperature, "temperature"),
            feels_like: to_decimal(observation.feels_like, "feels_like"),
            humidity: observation.humidity,
            wind_speed: to_decimal(observation.wind_speed, "wind_speed"),
            wind_direction: observation.wind_direction.clone(),
            weather_description: observation.description.clone(),
        }
    }
}

fn to_decimal(value: f64, field: &str) -> Decimal {
    Decimal::from_f64(value).unwrap_or_else(|| {
        warn!(
            "Could not convert f64 {} to Decimal precisely for {}. Storing as 0.",
            value, field
        );
        Decimal::ZERO
    })
}

// --- Aggregation query results ---

/// All-time average temperature and feels-like per city.
/// Used as the result type for the temperature comparison query. Derives `sqlx::FromRow`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CityTemperatureAverages {
    pub city: String,
    pub avg_temperature: f64,
    pub avg_feels_like: f64,
}

/// All-time average wind speed and most frequent wind direction per city.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CityWindSummary {
    pub city: String,
    pub avg_wind_speed: f64,
    /// Most frequent direction; ties resolve to the lexicographically smallest label.
    pub prevailing_direction: String,
}

/// One recent reading's gap between measured and perceived temperature.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeelsLikeDelta {
    pub city: String,
    /// `temperature - feels_like` in °C; positive means it feels colder than measured.
    pub temperature_delta: f64,
    pub humidity: i32,
    pub timestamp: DateTime<Utc>,
}
