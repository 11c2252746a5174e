//! Planprobe CLI Library
//!
//! Command-line interface for the planprobe pricing scenario.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;
pub mod runner;

pub use commands::{
    Cli, ColorArg, Commands, ConfigArgs, InspectFormat, InspectPdfArgs, RunArgs, VerifySetupArgs,
};
pub use config::{apply_run_args, CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{render_pdf, render_steps, ProgressReporter};
