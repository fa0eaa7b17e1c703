//! Coverage dataset
//!
//! Line-level measurement data as persisted in data files and merged by the
//! combine step. Statements are the measurable lines of a file; hits count how
//! often each line executed.

use crate::result::{CovError, CovResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Coverage of one source file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCoverage {
    #[serde(default)]
    statements: BTreeSet<u32>,
    #[serde(default)]
    hits: BTreeMap<u32, u64>,
}

impl FileCoverage {
    /// Create empty file coverage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare measurable lines
    pub fn add_statements(&mut self, lines: impl IntoIterator<Item = u32>) {
        self.statements.extend(lines);
    }

    /// Record `count` executions of a line
    pub fn record_hits(&mut self, line: u32, count: u64) {
        *self.hits.entry(line).or_insert(0) += count;
    }

    /// Execution count of a line
    #[must_use]
    pub fn hit_count(&self, line: u32) -> u64 {
        self.hits.get(&line).copied().unwrap_or(0)
    }

    /// Whether a statement executed at least once
    #[must_use]
    pub fn is_covered(&self, line: u32) -> bool {
        self.statements.contains(&line) && self.hit_count(line) > 0
    }

    /// Measurable lines
    #[must_use]
    pub fn statements(&self) -> &BTreeSet<u32> {
        &self.statements
    }

    /// Number of measurable lines
    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    /// Number of measurable lines that executed
    #[must_use]
    pub fn covered_count(&self) -> usize {
        self.statements
            .iter()
            .filter(|line| self.hit_count(**line) > 0)
            .count()
    }

    /// Measurable lines that never executed
    #[must_use]
    pub fn missing_lines(&self) -> Vec<u32> {
        self.statements
            .iter()
            .copied()
            .filter(|line| self.hit_count(*line) == 0)
            .collect()
    }

    /// Coverage percentage of this file
    #[must_use]
    pub fn coverage_percent(&self) -> f64 {
        percent(self.covered_count(), self.statement_count())
    }

    /// Merge another file's coverage into this one
    pub fn merge(&mut self, other: &Self) {
        self.statements.extend(other.statements.iter().copied());
        for (line, count) in &other.hits {
            self.record_hits(*line, *count);
        }
    }
}

/// Summary statistics over a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageSummary {
    /// Number of measured files
    pub files: usize,
    /// Number of measurable lines
    pub statements: usize,
    /// Number of measurable lines that executed
    pub covered: usize,
    /// Coverage percentage
    pub coverage_percent: f64,
}

/// Measurement data of one or more processes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageData {
    #[serde(default)]
    files: BTreeMap<String, FileCoverage>,
}

impl CoverageData {
    /// Create an empty dataset
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare measurable lines of a file
    pub fn add_statements(&mut self, file: &str, lines: impl IntoIterator<Item = u32>) {
        self.files
            .entry(file.to_string())
            .or_default()
            .add_statements(lines);
    }

    /// Record one execution of a line
    pub fn record_hit(&mut self, file: &str, line: u32) {
        self.record_hits(file, line, 1);
    }

    /// Record `count` executions of a line
    pub fn record_hits(&mut self, file: &str, line: u32, count: u64) {
        self.files
            .entry(file.to_string())
            .or_default()
            .record_hits(line, count);
    }

    /// Coverage of one file
    #[must_use]
    pub fn file(&self, name: &str) -> Option<&FileCoverage> {
        self.files.get(name)
    }

    /// All files in path order
    pub fn files(&self) -> impl Iterator<Item = (&str, &FileCoverage)> {
        self.files.iter().map(|(name, cov)| (name.as_str(), cov))
    }

    /// Whether nothing was measured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Merge another dataset into this one
    pub fn merge(&mut self, other: &Self) {
        for (name, cov) in &other.files {
            self.files.entry(name.clone()).or_default().merge(cov);
        }
    }

    /// Rewrite file paths under `from` onto `to`
    ///
    /// Used when a worker ran from a different checkout than the master.
    pub fn remap_paths(&mut self, from: &Path, to: &Path) {
        let files = std::mem::take(&mut self.files);
        for (name, cov) in files {
            let renamed = match Path::new(&name).strip_prefix(from) {
                Ok(rest) => to.join(rest).to_string_lossy().into_owned(),
                Err(_) => name,
            };
            self.files.entry(renamed).or_default().merge(&cov);
        }
    }

    /// Summary statistics
    #[must_use]
    pub fn summary(&self) -> CoverageSummary {
        let statements = self.files.values().map(FileCoverage::statement_count).sum();
        let covered = self.files.values().map(FileCoverage::covered_count).sum();
        CoverageSummary {
            files: self.files.len(),
            statements,
            covered,
            coverage_percent: percent(covered, statements),
        }
    }

    /// Total coverage percentage
    #[must_use]
    pub fn coverage_percent(&self) -> f64 {
        self.summary().coverage_percent
    }

    /// Read a data file
    pub fn load(path: &Path) -> CovResult<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| CovError::data_file(path, e.to_string()))
    }

    /// Write this dataset to a data file
    pub fn save(&self, path: &Path) -> CovResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }
}

fn percent(covered: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (covered as f64 / total as f64) * 100.0
}
