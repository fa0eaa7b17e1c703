//! Annotated source output
//!
//! Writes `<source>,cover` next to every measured file. Each source line is
//! prefixed with `> ` when it executed, `! ` when it is a statement that never
//! executed, and two spaces otherwise.

use crate::data::{CoverageData, FileCoverage};
use crate::result::CovResult;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Annotated-source generator
#[derive(Debug)]
pub struct AnnotateFormatter<'a> {
    data: &'a CoverageData,
    root: Option<PathBuf>,
}

impl<'a> AnnotateFormatter<'a> {
    /// Create a new annotate formatter
    #[must_use]
    pub fn new(data: &'a CoverageData) -> Self {
        Self { data, root: None }
    }

    /// Resolve relative file names against `root`
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Annotate one source text
    #[must_use]
    pub fn annotate_source(source: &str, coverage: &FileCoverage) -> String {
        let mut output = String::new();
        for (idx, text) in source.lines().enumerate() {
            let line = idx as u32 + 1;
            let marker = if coverage.is_covered(line) {
                '>'
            } else if coverage.statements().contains(&line) {
                '!'
            } else {
                ' '
            };
            let _ = writeln!(output, "{marker} {text}");
        }
        output
    }

    /// Write annotated copies of every readable source, returning their paths
    ///
    /// Sources that cannot be read are skipped.
    pub fn write_all(&self) -> CovResult<Vec<PathBuf>> {
        let mut written = Vec::new();
        for (name, coverage) in self.data.files() {
            let source_path = self.resolve(name);
            let Ok(source) = std::fs::read_to_string(&source_path) else {
                debug!(file = %source_path.display(), "source not readable, not annotating");
                continue;
            };
            let mut target = source_path.into_os_string();
            target.push(",cover");
            let target = PathBuf::from(target);
            std::fs::write(&target, Self::annotate_source(&source, coverage))?;
            written.push(target);
        }
        Ok(written)
    }

    fn resolve(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_annotate_source_markers() {
        let mut coverage = FileCoverage::new();
        coverage.add_statements([1, 3]);
        coverage.record_hits(1, 2);

        let output = AnnotateFormatter::annotate_source("fn a() {}\n// note\nfn b() {}\n", &coverage);
        assert_eq!(output, "> fn a() {}\n  // note\n! fn b() {}\n");
    }

    #[test]
    fn test_write_all_skips_unreadable_sources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "let x = 1;\n").unwrap();

        let mut data = CoverageData::new();
        data.add_statements("a.rs", [1]);
        data.record_hit("a.rs", 1);
        data.add_statements("gone.rs", [1]);

        let written = AnnotateFormatter::new(&data)
            .with_root(dir.path())
            .write_all()
            .unwrap();
        assert_eq!(written, vec![dir.path().join("a.rs,cover")]);
        assert_eq!(
            std::fs::read_to_string(&written[0]).unwrap(),
            "> let x = 1;\n"
        );
    }
}
