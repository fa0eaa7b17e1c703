//! Engine configuration file
//!
//! The config file is YAML and every key is optional:
//!
//! ```yaml
//! data_file: .coverage
//! html_dir: htmlcov
//! xml_output: coverage.xml
//! title: My project
//! ```

use crate::options::DEFAULT_CONFIG_PATH;
use crate::result::{CovError, CovResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Settings read from the engine config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base name of the data file
    pub data_file: PathBuf,
    /// Output directory of the HTML report
    pub html_dir: PathBuf,
    /// Output file of the XML report
    pub xml_output: PathBuf,
    /// Title used by the HTML report
    pub title: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(".coverage"),
            html_dir: PathBuf::from("htmlcov"),
            xml_output: PathBuf::from("coverage.xml"),
            title: None,
        }
    }
}

impl EngineConfig {
    /// Load the config file at `path`
    ///
    /// A file at the default location that is missing, or is not YAML (an
    /// INI `.coveragerc` of another tool), yields the defaults. At any other
    /// location both are errors.
    pub fn load(path: &Path) -> CovResult<Self> {
        Self::load_from(path, path == Path::new(DEFAULT_CONFIG_PATH))
    }

    fn load_from(path: &Path, is_default: bool) -> CovResult<Self> {
        if !path.exists() {
            if is_default {
                debug!(path = %path.display(), "no config file found, using engine defaults");
                return Ok(Self::default());
            }
            return Err(CovError::config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path)?;
        match Self::parse(&text) {
            Err(e) if is_default => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "default config file is not YAML, using engine defaults"
                );
                Ok(Self::default())
            }
            parsed => parsed,
        }
    }

    /// Parse config text
    pub fn parse(text: &str) -> CovResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml_ng::from_str(text)?)
    }

    /// Resolve relative output paths against `root`
    #[must_use]
    pub fn rooted_at(mut self, root: &Path) -> Self {
        for path in [&mut self.data_file, &mut self.html_dir, &mut self.xml_output] {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        }
        self
    }
}
