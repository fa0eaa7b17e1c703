//! Offline data file operations
//!
//! These run outside a test session: merge what subprocesses and workers
//! left behind, render reports from the merged data, or clean up.

use crate::commands::{CombineArgs, EraseArgs, ReportArgs};
use crate::error::{CliError, CliResult};
use crate::output::Reporter;
use covgate::datafile::discover;
use covgate::{
    CovError, CoverageEngine, EngineConfig, EngineSettings, LineEngine, ReportKind,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn engine_for(config_path: &Path) -> CliResult<LineEngine> {
    let config = EngineConfig::load(config_path)?;
    let settings = EngineSettings::new(Vec::new(), config_path.to_path_buf(), config);
    Ok(LineEngine::create(settings)?)
}

/// Merge suffixed (or explicitly named) data files into the base data file
///
/// Returns the number of files merged, not counting an existing base file.
pub fn run_combine(args: &CombineArgs, reporter: &Reporter) -> CliResult<usize> {
    let mut engine = engine_for(&args.config)?;
    let base = engine.settings().config.data_file.clone();

    let sources = if args.files.is_empty() {
        discover(&base)?
    } else {
        args.files.clone()
    };
    if sources.is_empty() {
        reporter.warning(&format!("No data files to combine next to {}", base.display()));
        return Ok(0);
    }

    if base.exists() {
        let _ = engine.combine(std::slice::from_ref(&base))?;
    }
    let merged = engine.combine(&sources)?;
    engine.save()?;

    if !args.keep {
        for path in sources.iter().filter(|path| path.exists() && **path != base) {
            std::fs::remove_file(path)?;
            debug!(data_file = %path.display(), "removed combined data file");
        }
    }
    info!(merged, base = %base.display(), "combined data files");
    reporter.success(&format!(
        "Combined {merged} data file(s) into {}",
        base.display()
    ));
    Ok(merged)
}

/// Render the requested reports from the base data file, returning the total
///
/// Fails with the threshold error when the total is below `--cov-min`.
pub fn run_report(args: &ReportArgs, out: &mut dyn Write, reporter: &Reporter) -> CliResult<f64> {
    let mut engine = engine_for(&args.config)?;
    let base = engine.settings().config.data_file.clone();
    if !base.exists() {
        return Err(CliError::no_data(&base));
    }
    if engine.combine(std::slice::from_ref(&base))? == 0 {
        return Err(CliError::no_data(&base));
    }

    let reports = if args.reports.is_empty() {
        vec![ReportKind::Term]
    } else {
        args.reports.clone()
    };
    let mut total = engine.data().coverage_percent();

    if reports.contains(&ReportKind::Term) || reports.contains(&ReportKind::TermMissing) {
        total = engine.report(out, reports.contains(&ReportKind::TermMissing))?;
    }
    if reports.contains(&ReportKind::Annotate) {
        total = engine.annotate()?;
        reporter.info("Coverage annotated source written next to source");
    }
    if reports.contains(&ReportKind::Html) {
        total = engine.html_report()?;
        reporter.info(&format!(
            "Coverage HTML written to dir {}",
            engine.settings().config.html_dir.display()
        ));
    }
    if reports.contains(&ReportKind::Xml) {
        total = engine.xml_report()?;
        reporter.info(&format!(
            "Coverage XML written to file {}",
            engine.settings().config.xml_output.display()
        ));
    }

    if let Some(required) = args.cov_min {
        if total < f64::from(required) {
            return Err(CovError::ThresholdNotReached { required, total }.into());
        }
        reporter.success(&format!(
            "Required test coverage of {required}% reached. Total coverage: {total:.2}%"
        ));
    }
    Ok(total)
}

/// Delete the base data file and every suffixed data file, returning what was removed
pub fn run_erase(args: &EraseArgs, reporter: &Reporter) -> CliResult<Vec<PathBuf>> {
    let config = EngineConfig::load(&args.config)?;
    let base = config.data_file;

    let mut removed = Vec::new();
    if base.is_file() {
        std::fs::remove_file(&base)?;
        removed.push(base.clone());
    }
    for path in discover(&base)? {
        std::fs::remove_file(&path)?;
        removed.push(path);
    }
    info!(count = removed.len(), "erased data files");
    reporter.success(&format!("Erased {} data file(s)", removed.len()));
    Ok(removed)
}
