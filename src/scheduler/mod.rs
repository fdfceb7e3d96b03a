//! Drives the periodic collection of weather readings.
//!
//! The `poller` submodule owns the seed-then-cycle loop and the per-cycle
//! outcome reporting.

mod poller;

pub use poller::*;
