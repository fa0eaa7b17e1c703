//! Coverage options supplied by the host test runner

use crate::result::{CovError, CovResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default engine config file
pub const DEFAULT_CONFIG_PATH: &str = ".coveragerc";

/// Kind of report produced at the end of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    /// Terminal summary table
    Term,
    /// Terminal summary table with missing line numbers
    TermMissing,
    /// Line-annotated copies of each source file
    Annotate,
    /// HTML report directory
    Html,
    /// Cobertura XML report
    Xml,
    /// No output, total only
    #[serde(rename = "")]
    Empty,
}

impl ReportKind {
    /// Every accepted report kind
    pub const ALL: [Self; 6] = [
        Self::Term,
        Self::TermMissing,
        Self::Annotate,
        Self::Html,
        Self::Xml,
        Self::Empty,
    ];

    /// Option value naming this kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Term => "term",
            Self::TermMissing => "term-missing",
            Self::Annotate => "annotate",
            Self::Html => "html",
            Self::Xml => "xml",
            Self::Empty => "",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = CovError;

    fn from_str(s: &str) -> CovResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                CovError::config(format!(
                    "invalid report type '{s}', expected one of: term, term-missing, annotate, html, xml, ''"
                ))
            })
    }
}

/// Coverage options for one test session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovOptions {
    /// Source paths to measure
    pub source: Vec<PathBuf>,
    /// Requested report kinds
    pub reports: Vec<ReportKind>,
    /// Engine config file
    pub config_path: PathBuf,
    /// Skip reporting when the test run failed
    pub no_cov_on_fail: bool,
    /// Minimum total coverage percentage
    pub cov_min: Option<u32>,
    /// Export subprocess settings into this process's environment at start
    #[serde(default = "export_env_default")]
    pub export_env: bool,
}

const fn export_env_default() -> bool {
    true
}

impl Default for CovOptions {
    fn default() -> Self {
        Self {
            source: Vec::new(),
            reports: Vec::new(),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            no_cov_on_fail: false,
            cov_min: None,
            export_env: export_env_default(),
        }
    }
}

impl CovOptions {
    /// Create default options (inactive until a source is added)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source path
    #[must_use]
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source.push(path.into());
        self
    }

    /// Add a report kind
    #[must_use]
    pub fn with_report(mut self, kind: ReportKind) -> Self {
        self.reports.push(kind);
        self
    }

    /// Set the engine config file
    #[must_use]
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    /// Skip reporting on failed runs
    #[must_use]
    pub const fn with_no_cov_on_fail(mut self, enabled: bool) -> Self {
        self.no_cov_on_fail = enabled;
        self
    }

    /// Set the minimum coverage percentage
    #[must_use]
    pub const fn with_cov_min(mut self, min: u32) -> Self {
        self.cov_min = Some(min);
        self
    }

    /// Export subprocess settings into the environment when measuring starts
    ///
    /// Hosts that spawn children themselves can turn this off and pass
    /// [`SubprocessEnv::vars`](crate::subprocess::SubprocessEnv::vars) to the
    /// child command instead.
    #[must_use]
    pub const fn with_export_env(mut self, enabled: bool) -> Self {
        self.export_env = enabled;
        self
    }

    /// Whether coverage is requested at all
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.source.is_empty()
    }

    /// Report kinds to render, `term` when none were requested
    #[must_use]
    pub fn effective_reports(&self) -> Vec<ReportKind> {
        if self.reports.is_empty() {
            vec![ReportKind::Term]
        } else {
            self.reports.clone()
        }
    }
}

/// Distribution settings of the host scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistOptions {
    /// Number of parallel worker processes
    pub numprocesses: usize,
    /// Load-distribution shortcut flag
    pub distload: bool,
    /// Distribution mode, `"no"` when disabled
    pub dist: String,
}

impl Default for DistOptions {
    fn default() -> Self {
        Self {
            numprocesses: 0,
            distload: false,
            dist: "no".to_string(),
        }
    }
}

impl DistOptions {
    /// Set the worker count
    #[must_use]
    pub const fn with_numprocesses(mut self, n: usize) -> Self {
        self.numprocesses = n;
        self
    }

    /// Enable load distribution
    #[must_use]
    pub const fn with_distload(mut self, enabled: bool) -> Self {
        self.distload = enabled;
        self
    }

    /// Set the distribution mode
    #[must_use]
    pub fn with_dist(mut self, mode: impl Into<String>) -> Self {
        self.dist = mode.into();
        self
    }

    /// Whether several cooperating worker processes take part in the run
    #[must_use]
    pub fn is_distributed(&self) -> bool {
        self.numprocesses > 0 || self.distload || self.dist != "no"
    }
}
