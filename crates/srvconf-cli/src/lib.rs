//! srvconf CLI library
//!
//! Exposes the CLI entry point so the binary stays a one-liner and the
//! command implementations can be tested in-process.

mod cli;
mod logging;

pub use cli::run;
