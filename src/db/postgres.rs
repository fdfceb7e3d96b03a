//! Provides PostgreSQL database interaction functionalities using `sqlx`.
//!
//! Includes capabilities for establishing connection pools, initializing the database schema,
//! registering cities, appending weather readings, and executing the aggregation queries
//! behind tables and charts.
//! Also contains integration tests for database operations (requires the `integration-tests` feature).

use crate::error::{AppError, Result};
use crate::models::{
    CitySpec, CityTemperatureAverages, CityWindSummary, DbReading, FeelsLikeDelta, Observation,
};
use chrono::{Duration, Utc};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use tracing::{debug, error, info};

/// Represents the database connection pool and provides methods for database operations.
///
/// Holds a `sqlx::Pool`, which is cheap to clone and safe to share.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Postgres>,
}

impl Database {
    /// Creates a new `Database` instance by establishing a connection pool.
    ///
    /// # Arguments
    ///
    /// * `database_url` - The connection string for the PostgreSQL database.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` if the connection pool cannot be established.
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| {
                error!("Failed to connect to database: {}", e);
                AppError::Store(e.into())
            })?;

        info!("Connected to database successfully");
        Ok(Self { pool })
    }

    /// Wraps an existing pool, as handed out by `#[sqlx::test]`.
    #[cfg(test)]
    #[allow(dead_code)]
    pub(crate) fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Initializes the database schema by creating the `cities` and `weather_data`
    /// tables and necessary indexes.
    ///
    /// Uses `CREATE TABLE IF NOT EXISTS` and `CREATE INDEX IF NOT EXISTS` to be idempotent,
    /// meaning it can be safely run multiple times without causing errors if the objects already exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` if any SQL query fails during schema creation.
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema (if necessary)...");

        // Reference table of polled cities. The (name, country) pair is the
        // natural key; id is the surrogate readings point at.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cities (
                id SERIAL PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                country VARCHAR(2) NOT NULL,
                UNIQUE (name, country)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create cities table: {}", e);
            AppError::Store(e.into())
        })?;

        // Append-only readings table. The timestamp is assigned by the
        // database at insertion time, not by callers.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS weather_data (
                id SERIAL PRIMARY KEY,
                city_id INTEGER NOT NULL REFERENCES cities(id),
                temperature NUMERIC(5,2) NOT NULL,
                feels_like NUMERIC(5,2) NOT NULL,
                humidity INTEGER NOT NULL,
                wind_speed NUMERIC(5,2) NOT NULL,
                wind_direction VARCHAR(10) NOT NULL,
                weather_description VARCHAR(100) NOT NULL,
                timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create weather_data table: {}", e);
            AppError::Store(e.into())
        })?;

        // Index on city_id for the per-city joins and group-bys.
        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_weather_data_city_id ON weather_data(city_id)"#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create city_id index: {}", e);
            AppError::Store(e.into())
        })?;

        // Index on timestamp for trailing-window filtering and ordering.
        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_weather_data_timestamp ON weather_data(timestamp)"#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create timestamp index: {}", e);
            AppError::Store(e.into())
        })?;

        info!("Database schema initialized successfully");
        Ok(())
    }

    /// Registers every configured city, leaving already-known pairs untouched.
    ///
    /// Executes insertions within a single database transaction for atomicity.
    /// Uses `ON CONFLICT (name, country) DO NOTHING`, so calling this on every
    /// startup with the same list is safe and does not disturb existing ids.
    ///
    /// # Arguments
    ///
    /// * `cities` - The (name, country code) pairs from the polling configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` if the transaction fails to begin, commit, or if any
    /// individual insertion query fails.
    pub async fn ensure_cities(&self, cities: &[CitySpec]) -> Result<()> {
        if cities.is_empty() {
            debug!("No cities provided for registration.");
            return Ok(());
        }

        info!("Registering {} configured cities...", cities.len());

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin database transaction: {}", e);
            AppError::Store(e.into())
        })?;

        for city in cities {
            sqlx::query(
                r#"
                INSERT INTO cities (name, country)
                VALUES ($1, $2)
                ON CONFLICT (name, country) DO NOTHING
                "#,
            )
            .bind(&city.name)
            .bind(&city.country)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to register city {}: {}", city, e);
                AppError::Store(e.into())
            })?;
        }

        tx.commit().await.map_err(|e| {
            error!("Failed to commit database transaction: {}", e);
            AppError::Store(e.into())
        })?;

        info!("City registration complete");
        Ok(())
    }

    /// Looks up the surrogate key for a registered (name, country) pair.
    ///
    /// # Errors
    ///
    /// Returns `AppError::CityNotFound` if the pair was never registered, or
    /// `AppError::Store` if the lookup query fails.
    pub async fn city_id(&self, name: &str, country: &str) -> Result<i32> {
        let id = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM cities WHERE name = $1 AND country = $2",
        )
        .bind(name)
        .bind(country)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to look up city {}, {}: {}", name, country, e);
            AppError::Store(e.into())
        })?;

        id.ok_or_else(|| AppError::CityNotFound {
            name: name.to_string(),
            country: country.to_string(),
        })
    }

    /// Appends one reading row for `city_id` and returns the new row id.
    ///
    /// Rows are never updated afterwards; the database assigns the timestamp
    /// at insertion time.
    pub async fn insert_reading(&self, city_id: i32, observation: &Observation) -> Result<i32> {
        let reading = DbReading::from_observation(city_id, observation);

        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO weather_data
            (city_id, temperature, feels_like, humidity, wind_speed, wind_direction, weather_description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(reading.city_id)
        .bind(reading.temperature)
        .bind(reading.feels_like)
        .bind(reading.humidity)
        .bind(reading.wind_speed)
        .bind(&reading.wind_direction)
        .bind(&reading.weather_description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to insert reading for city {}: {}", city_id, e);
            AppError::Store(e.into())
        })?;

        debug!("Inserted reading {} for city {}", id, city_id);
        Ok(id)
    }

    /// Calculates the all-time average temperature and feels-like per city.
    ///
    /// Cities without readings are absent from the result; an empty table
    /// yields an empty Vec, not an error.
    pub async fn average_temperatures(&self) -> Result<Vec<CityTemperatureAverages>> {
        info!("Calculating average temperatures per city");

        // NUMERIC averages are cast to float for the f64 result mapping.
        // Hottest city first; name breaks ties so runs are reproducible.
        let query = r#"
        SELECT
            c.name AS city,
            AVG(w.temperature)::DOUBLE PRECISION AS avg_temperature,
            AVG(w.feels_like)::DOUBLE PRECISION AS avg_feels_like
        FROM weather_data w
        JOIN cities c ON w.city_id = c.id
        GROUP BY c.name
        ORDER BY avg_temperature DESC, c.name ASC
        "#;

        let results = sqlx::query_as::<_, CityTemperatureAverages>(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to query average temperatures: {}", e);
                AppError::Store(e.into())
            })?;

        info!("Retrieved temperature averages for {} cities", results.len());
        Ok(results)
    }

    /// Calculates the all-time average wind speed and the most frequent wind
    /// direction per city.
    ///
    /// `MODE() WITHIN GROUP` resolves direction ties to the lexicographically
    /// smallest label, which keeps repeated runs deterministic.
    pub async fn wind_summary(&self) -> Result<Vec<CityWindSummary>> {
        info!("Calculating wind summary per city");

        let query = r#"
        SELECT
            c.name AS city,
            AVG(w.wind_speed)::DOUBLE PRECISION AS avg_wind_speed,
            MODE() WITHIN GROUP (ORDER BY w.wind_direction) AS prevailing_direction
        FROM weather_data w
        JOIN cities c ON w.city_id = c.id
        GROUP BY c.name
        ORDER BY avg_wind_speed DESC, c.name ASC
        "#;

        let results = sqlx::query_as::<_, CityWindSummary>(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to query wind summary: {}", e);
                AppError::Store(e.into())
            })?;

        info!("Retrieved wind summaries for {} cities", results.len());
        Ok(results)
    }

    /// Lists the temperature-vs-feels-like gap for every reading newer than
    /// `window_days` days.
    ///
    /// The cutoff is computed here and bound as a parameter; rows exactly on
    /// the cutoff instant fall outside the window. Results are ordered by city
    /// name, newest readings first within each city.
    pub async fn recent_feels_like_deltas(&self, window_days: i64) -> Result<Vec<FeelsLikeDelta>> {
        info!(
            "Fetching feels-like deltas for the trailing {} days",
            window_days
        );

        let cutoff = Utc::now() - Duration::days(window_days);

        let query = r#"
        SELECT
            c.name AS city,
            (w.temperature - w.feels_like)::DOUBLE PRECISION AS temperature_delta,
            w.humidity,
            w.timestamp
        FROM weather_data w
        JOIN cities c ON w.city_id = c.id
        WHERE w.timestamp > $1
        ORDER BY c.name ASC, w.timestamp DESC
        "#;

        let results = sqlx::query_as::<_, FeelsLikeDelta>(query)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to query feels-like deltas: {}", e);
                AppError::Store(e.into())
            })?;

        info!("Retrieved {} recent readings", results.len());
        Ok(results)
    }

    /// Checks if the `weather_data` table exists in the database schema.
    ///
    /// Useful for determining application state before running commands that
    /// expect stored readings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` if the query to `information_schema.tables` fails.
    pub async fn is_schema_initialized(&self) -> Result<bool> {
        debug!("Checking if database schema is initialized...");
        let initialized = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_schema = 'public' AND table_name = 'weather_data')",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to check schema existence: {}", e);
            AppError::Store(e.into())
        })?;
        debug!("Schema initialized status: {}", initialized);
        Ok(initialized)
    }

    /// Counts the registered cities.
    pub async fn city_count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM cities")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to count cities: {}", e);
                AppError::Store(e.into())
            })?;
        Ok(count)
    }

    /// Counts the stored readings.
    pub async fn reading_count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM weather_data")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to count readings: {}", e);
                AppError::Store(e.into())
            })?;
        Ok(count)
    }
}
