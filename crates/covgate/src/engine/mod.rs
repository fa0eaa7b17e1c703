//! Coverage engine seam
//!
//! The engine performs the actual measurement and owns the dataset; the
//! controllers only decide when it starts, stops, saves, combines and reports.
//! Persistence, merging and rendering have default implementations over
//! [`CoverageData`] that an engine may override.

mod line;

pub use line::LineEngine;

use crate::config::EngineConfig;
use crate::data::CoverageData;
use crate::report::{AnnotateFormatter, CoberturaFormatter, HtmlFormatter, TermFormatter};
use crate::result::CovResult;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Everything an engine is bound to at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Source paths to measure
    pub source: Vec<PathBuf>,
    /// Data file this engine saves to
    pub data_file: PathBuf,
    /// Config file the settings were read from
    pub config_path: PathBuf,
    /// Parsed engine configuration
    pub config: EngineConfig,
}

impl EngineSettings {
    /// Settings saving to the configured base data file
    #[must_use]
    pub fn new(source: Vec<PathBuf>, config_path: PathBuf, config: EngineConfig) -> Self {
        Self {
            source,
            data_file: config.data_file.clone(),
            config_path,
            config,
        }
    }

    /// Same settings saving to another data file
    #[must_use]
    pub fn with_data_file(mut self, data_file: impl Into<PathBuf>) -> Self {
        self.data_file = data_file.into();
        self
    }
}

/// A coverage measurement engine
pub trait CoverageEngine: fmt::Debug {
    /// Construct an engine bound to `settings`
    fn create(settings: EngineSettings) -> CovResult<Self>
    where
        Self: Sized;

    /// Settings the engine was created with
    fn settings(&self) -> &EngineSettings;

    /// Begin measurement
    fn start(&mut self) -> CovResult<()>;

    /// Halt measurement, keeping collected data
    fn stop(&mut self) -> CovResult<()>;

    /// Whether measurement is running
    fn is_measuring(&self) -> bool;

    /// Collected data
    fn data(&self) -> &CoverageData;

    /// Collected data, mutably
    fn data_mut(&mut self) -> &mut CoverageData;

    /// Flush collected data to the engine's data file
    fn save(&mut self) -> CovResult<()> {
        let path = &self.settings().data_file;
        debug!(data_file = %path.display(), "saving coverage data");
        self.data().save(path)
    }

    /// Merge external data files into the in-memory dataset
    ///
    /// Files that are absent or unreadable are skipped. Returns the number of
    /// files merged.
    fn combine(&mut self, data_files: &[PathBuf]) -> CovResult<usize> {
        let mut merged = 0;
        for path in data_files {
            if !path.exists() {
                warn!(data_file = %path.display(), "data file missing, skipping");
                continue;
            }
            match CoverageData::load(path) {
                Ok(data) => {
                    self.data_mut().merge(&data);
                    merged += 1;
                }
                Err(e) => warn!(error = %e, "unreadable data file, skipping"),
            }
        }
        debug!(requested = data_files.len(), merged, "combined data files");
        Ok(merged)
    }

    /// Render the terminal table, returning the total percentage
    fn report(&self, out: &mut dyn Write, show_missing: bool) -> CovResult<f64> {
        TermFormatter::new(self.data())
            .with_missing(show_missing)
            .write_to(out)?;
        Ok(self.data().coverage_percent())
    }

    /// Write annotated sources, returning the total percentage
    fn annotate(&self) -> CovResult<f64> {
        let _ = AnnotateFormatter::new(self.data()).write_all()?;
        Ok(self.data().coverage_percent())
    }

    /// Write the HTML report, returning the total percentage
    fn html_report(&self) -> CovResult<f64> {
        let config = &self.settings().config;
        let mut formatter = HtmlFormatter::new(self.data());
        if let Some(title) = &config.title {
            formatter = formatter.with_title(title.clone());
        }
        let _ = formatter.save(&config.html_dir)?;
        Ok(self.data().coverage_percent())
    }

    /// Write the Cobertura XML report, returning the total percentage
    fn xml_report(&self) -> CovResult<f64> {
        CoberturaFormatter::new(self.data()).save(&self.settings().config.xml_output)?;
        Ok(self.data().coverage_percent())
    }
}
