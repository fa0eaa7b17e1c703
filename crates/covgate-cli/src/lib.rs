//! Covgate CLI Library
//!
//! Offline commands over persisted coverage data files, plus the [`CovArgs`]
//! option group a host test runner flattens into its own command line.

#![warn(missing_docs)]

mod commands;
mod error;
mod output;
mod runner;

pub use commands::{Cli, ColorArg, CombineArgs, Commands, CovArgs, EraseArgs, ReportArgs};
pub use error::{CliError, CliResult};
pub use output::Reporter;
pub use runner::{run_combine, run_erase, run_report};
