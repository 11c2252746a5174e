//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Planprobe: end-to-end checks for an energy plan pricing site
#[derive(Parser, Debug)]
#[command(name = "planprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// YAML configuration file
    #[arg(long, env = "PLANPROBE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pricing scenario against a live browser
    Run(RunArgs),

    /// Check the browser launches and the results directory is writable
    VerifySetup(VerifySetupArgs),

    /// Show page count, metadata and gas keywords of a PDF
    InspectPdf(InspectPdfArgs),

    /// Show the effective configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Address typed into the lookup
    #[arg(env = "PLANPROBE_ADDRESS")]
    pub address: String,

    /// Plan whose document is checked
    #[arg(long, default_value = "Origin Basic")]
    pub plan: String,

    /// Plan type filter to uncheck
    #[arg(long, default_value = "Electricity")]
    pub filter: String,

    /// Text the document must contain (repeatable)
    #[arg(long = "expect", default_values = ["Gas", "Fuel type", "MJ/day"])]
    pub expected: Vec<String>,

    /// Site origin
    #[arg(long)]
    pub base_url: Option<String>,

    /// Show the browser window
    #[arg(long, conflicts_with = "headless")]
    pub headed: bool,

    /// Hide the browser window
    #[arg(long)]
    pub headless: bool,

    /// Scenario-level retries
    #[arg(long)]
    pub retries: Option<u32>,

    /// Directory for downloads and the JSON report
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Fail when no suggestion matches the address exactly
    #[arg(long)]
    pub exact_address: bool,
}

/// Arguments for the verify-setup command
#[derive(Parser, Debug)]
pub struct VerifySetupArgs {
    /// Only check directories, do not launch the browser
    #[arg(long)]
    pub skip_browser: bool,
}

/// Arguments for the inspect-pdf command
#[derive(Parser, Debug)]
pub struct InspectPdfArgs {
    /// PDF file to inspect
    pub path: PathBuf,

    /// Text the document must contain (repeatable)
    #[arg(long = "expect")]
    pub expected: Vec<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: InspectFormat,
}

/// Output format of inspect-pdf
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InspectFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON
    Json,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Only validate, print nothing on success
    #[arg(long)]
    pub check: bool,
}

/// Color argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
