//! Planprobe CLI: run the pricing scenario from the command line
//!
//! ## Usage
//!
//! ```bash
//! planprobe run "12 Sample St, Suburb STATE 0000"   # Gas plan scenario
//! planprobe run "<address>" --plan "Origin Go" --headed
//! planprobe verify-setup                            # Browser + results dir
//! planprobe inspect-pdf test-results/plan.pdf --expect "Fuel type"
//! planprobe config                                  # Effective YAML
//! ```

use clap::Parser;
use planprobe::ProbeConfig;
use planprobe_cli::{
    handlers, Cli, CliConfig, CliError, CliResult, ColorChoice, Commands, ProgressReporter,
    Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    // RUST_LOG wins over the verbosity flags
    let _ = planprobe::init_tracing_with(config.verbosity.log_filter());

    let mut reporter = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    let probe_config = ProbeConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => block_on(handlers::run(probe_config, &args, &mut reporter)),
        Commands::VerifySetup(args) => {
            block_on(handlers::verify_setup(&probe_config, &args, &mut reporter))
        }
        Commands::InspectPdf(args) => handlers::inspect_pdf(&args, &reporter),
        Commands::Config(args) => {
            if let Some(yaml) = handlers::show_config(&probe_config, &args)? {
                print!("{yaml}");
            }
            Ok(())
        }
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let color: ColorChoice = cli.color.clone().into();
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(color)
}

fn block_on<F>(future: F) -> CliResult<()>
where
    F: std::future::Future<Output = CliResult<()>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Io)?;
    runtime.block_on(future)
}
