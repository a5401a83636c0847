//! Implementations of the `ccw-pipeline` subcommands

pub mod compare;
pub mod parse;
pub mod run;
