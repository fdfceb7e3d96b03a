//! Defines the data structures and models used throughout the application.
//!
//! This typically includes structures representing data fetched from the
//! weather provider, data stored in the database, and aggregation results
//! used for display and charts.

mod weather;

pub use weather::*;
