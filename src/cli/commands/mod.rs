//! Subcommand implementations.

pub mod init;
pub mod metrics;
pub mod run;
pub mod serve;
