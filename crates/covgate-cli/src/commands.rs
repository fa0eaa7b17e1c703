//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use covgate::{CovOptions, ReportKind, DEFAULT_CONFIG_PATH};
use std::path::PathBuf;

/// Covgate: coverage data files for central, distributed and forked test runs
#[derive(Parser, Debug)]
#[command(name = "covgate")]
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

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge suffixed data files into the base data file
    Combine(CombineArgs),

    /// Render coverage reports from the base data file
    Report(ReportArgs),

    /// Delete the base data file and every suffixed data file
    Erase(EraseArgs),
}

/// Arguments for the combine command
#[derive(Parser, Debug)]
pub struct CombineArgs {
    /// Data files to merge (default: every `<data_file>.*` next to the base)
    pub files: Vec<PathBuf>,

    /// Engine config file
    #[arg(long = "cov-config", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Keep the merged suffixed files instead of deleting them
    #[arg(long)]
    pub keep: bool,
}

/// Arguments for the report command
#[derive(Parser, Debug)]
pub struct ReportArgs {
    /// Report kind (term, term-missing, annotate, html, xml or empty); repeatable
    #[arg(long = "cov-report", value_parser = parse_report_kind)]
    pub reports: Vec<ReportKind>,

    /// Engine config file
    #[arg(long = "cov-config", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Fail when total coverage is below this percentage
    #[arg(long = "cov-min")]
    pub cov_min: Option<u32>,
}

/// Arguments for the erase command
#[derive(Parser, Debug)]
pub struct EraseArgs {
    /// Engine config file
    #[arg(long = "cov-config", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

/// Coverage options for a host test runner to flatten into its own CLI
#[derive(Args, Debug, Clone, Default)]
pub struct CovArgs {
    /// Measure coverage for a path; repeatable, coverage is off without one
    #[arg(long = "cov", value_name = "PATH")]
    pub source: Vec<PathBuf>,

    /// Report kind (term, term-missing, annotate, html, xml or empty); repeatable
    #[arg(long = "cov-report", value_name = "KIND", value_parser = parse_report_kind)]
    pub reports: Vec<ReportKind>,

    /// Engine config file (YAML); an unreadable default file falls back to defaults
    #[arg(long = "cov-config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Do not report coverage when the test run failed
    #[arg(long = "no-cov-on-fail")]
    pub no_cov_on_fail: bool,

    /// Fail when total coverage is below this percentage
    #[arg(long = "cov-min", value_name = "MIN")]
    pub cov_min: Option<u32>,
}

impl CovArgs {
    /// Options for the coverage plugin
    #[must_use]
    pub fn into_options(self) -> CovOptions {
        let mut options = CovOptions {
            source: self.source,
            reports: self.reports,
            config_path: self.config,
            no_cov_on_fail: self.no_cov_on_fail,
            ..CovOptions::default()
        };
        if let Some(min) = self.cov_min {
            options = options.with_cov_min(min);
        }
        options
    }
}

fn parse_report_kind(value: &str) -> Result<ReportKind, String> {
    value.parse().map_err(|e: covgate::CovError| e.to_string())
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Auto-detect
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl ColorArg {
    /// Whether to color output on stderr
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => console::Term::stderr().features().colors_supported(),
        }
    }
}
