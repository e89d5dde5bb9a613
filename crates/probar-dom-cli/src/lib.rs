//! probar-dom CLI library
//!
//! Command definitions and execution for the `probar-dom` binary.

#![warn(missing_docs)]

mod commands;
mod error;
pub mod logging;
mod runner;

pub use commands::{
    Cli, Commands, DebugArgs, OutputFormat, QueryArgs, QueryKind, RolesArgs,
};
pub use error::{CliError, CliResult};
pub use runner::{execute, load_config, ElementSummary};
