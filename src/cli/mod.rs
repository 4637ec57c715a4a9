//! CLI module for planforge - command-line interface and subcommands.
//!
//! One subcommand per pipeline stage: evolve, domain, interface, problems.

pub mod commands;

pub use commands::Cli;
