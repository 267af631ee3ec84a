//! Command line interface module
//!
//! Argument parsing and the runner that starts the refresh loop or performs a
//! single refresh.

pub mod args;
pub mod runner;

pub use args::Args;
pub use runner::Runner;
