// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Command-line interface.
//!
//! Argument parsing, console logging macros and the `analyze` command.

/// CLI arguments.
pub mod args;

/// The `analyze` command.
pub mod analyze;

/// Console output macros and the verbosity flag.
pub mod logging;
