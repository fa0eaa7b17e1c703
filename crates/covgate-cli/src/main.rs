//! Covgate CLI: offline coverage data management
//!
//! ## Usage
//!
//! ```bash
//! covgate combine                          # Merge .coverage.* into .coverage
//! covgate report --cov-report term-missing # Print the table with missing lines
//! covgate report --cov-report xml --cov-min 80
//! covgate erase                            # Remove every data file
//! ```

use clap::Parser;
use covgate_cli::{run_combine, run_erase, run_report, Cli, CliResult, Commands, Reporter};
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    let reporter = Reporter::new(cli.color.should_color(), cli.quiet);

    match run(cli, &reporter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            reporter.failure(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, reporter: &Reporter) -> CliResult<()> {
    match cli.command {
        Commands::Combine(args) => run_combine(&args, reporter).map(|_| ()),
        Commands::Report(args) => {
            let mut stdout = std::io::stdout().lock();
            run_report(&args, &mut stdout, reporter).map(|_| ())
        }
        Commands::Erase(args) => run_erase(&args, reporter).map(|_| ()),
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
