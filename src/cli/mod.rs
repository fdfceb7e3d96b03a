//! Handles Command Line Interface (CLI) related functionalities.
//!
//! Includes defining the subcommands, parsing arguments, loading the runtime
//! configuration, and dispatching to the polling, reporting, and status paths.

mod commands;

pub use commands::*;
