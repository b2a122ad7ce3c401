//! CLI subcommands

pub mod config;
pub mod lending;
pub mod loans;
pub mod title;
