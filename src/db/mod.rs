//! Provides database interaction functionalities.
//!
//! PostgreSQL is the only backend; the `postgres` submodule covers schema
//! bootstrap, city registration, reading ingestion, and aggregation queries.

mod postgres;

pub use postgres::*;
