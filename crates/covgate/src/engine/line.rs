//! Line-level coverage engine
//!
//! Performs no instrumentation of its own: the host feeds it the measurable
//! statements of each file and the lines it saw execute. Hits are recorded
//! only while measuring and only for files under the source paths.

use super::{CoverageEngine, EngineSettings};
use crate::data::CoverageData;
use crate::result::{CovError, CovResult};
use std::path::Path;
use tracing::debug;

/// Default coverage engine
#[derive(Debug)]
pub struct LineEngine {
    settings: EngineSettings,
    data: CoverageData,
    measuring: bool,
}

impl LineEngine {
    /// Whether `file` lies under one of the source paths
    ///
    /// An empty source list measures every file.
    #[must_use]
    pub fn is_measured_file(&self, file: &str) -> bool {
        self.settings.source.is_empty()
            || self
                .settings
                .source
                .iter()
                .any(|source| Path::new(file).starts_with(source))
    }

    /// Declare measurable lines of a source file
    pub fn add_statements(&mut self, file: &str, lines: impl IntoIterator<Item = u32>) {
        if self.is_measured_file(file) {
            self.data.add_statements(file, lines);
        }
    }

    /// Record an executed line, returning whether it was recorded
    pub fn record_hit(&mut self, file: &str, line: u32) -> bool {
        if !self.measuring || !self.is_measured_file(file) {
            return false;
        }
        self.data.record_hit(file, line);
        true
    }
}

impl CoverageEngine for LineEngine {
    fn create(settings: EngineSettings) -> CovResult<Self> {
        debug!(data_file = %settings.data_file.display(), "creating line engine");
        Ok(Self {
            settings,
            data: CoverageData::new(),
            measuring: false,
        })
    }

    fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn start(&mut self) -> CovResult<()> {
        if self.measuring {
            return Err(CovError::invalid_state("engine is already measuring"));
        }
        self.measuring = true;
        Ok(())
    }

    fn stop(&mut self) -> CovResult<()> {
        self.measuring = false;
        Ok(())
    }

    fn is_measuring(&self) -> bool {
        self.measuring
    }

    fn data(&self) -> &CoverageData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut CoverageData {
        &mut self.data
    }
}
