//! CLI subcommand implementations.

pub mod migrate;
pub mod notify;
pub mod poll;
pub mod resolve;
