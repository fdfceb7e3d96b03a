//! Provides clients and utilities for talking to the upstream weather source.
//!
//! Includes:
//! - `provider`: The `WeatherProvider` trait the scheduler polls through.
//! - `weatherstack`: Client for the real Weatherstack API.

mod provider;
mod weatherstack;

#[cfg(test)]
mod weatherstack_test;

pub use provider::*;
pub use weatherstack::*;
