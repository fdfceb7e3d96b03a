//! Renders the aggregation query results as PNG charts via `plotters`.

mod render;

pub use render::*;
