//! Terminal summary table
//!
//! ```text
//! Name          Stmts   Miss  Cover   Missing
//! -------------------------------------------
//! pkg/a.rs          4      2    50%   3-4
//! -------------------------------------------
//! TOTAL             4      2    50%
//! ```

use super::format_ranges;
use crate::data::CoverageData;
use std::fmt::Write as _;
use std::io::{self, Write};

/// Terminal table report generator
#[derive(Debug)]
pub struct TermFormatter<'a> {
    data: &'a CoverageData,
    show_missing: bool,
}

impl<'a> TermFormatter<'a> {
    /// Create a new terminal formatter
    #[must_use]
    pub fn new(data: &'a CoverageData) -> Self {
        Self {
            data,
            show_missing: false,
        }
    }

    /// Include missing line numbers
    #[must_use]
    pub fn with_missing(mut self, show_missing: bool) -> Self {
        self.show_missing = show_missing;
        self
    }

    /// Generate the table as a string
    #[must_use]
    pub fn generate(&self) -> String {
        let name_width = self
            .data
            .files()
            .map(|(name, _)| name.len())
            .chain(std::iter::once("TOTAL".len()))
            .max()
            .unwrap_or(5)
            .max("Name".len());

        let mut header = format!("{:<name_width$}   Stmts   Miss  Cover", "Name");
        if self.show_missing {
            header.push_str("   Missing");
        }
        let rule = "-".repeat(header.len());

        let mut output = String::new();
        let _ = writeln!(output, "{header}");
        let _ = writeln!(output, "{rule}");

        for (name, file) in self.data.files() {
            let missing = file.missing_lines();
            let _ = write!(
                output,
                "{:<name_width$}   {:>5}  {:>5}  {:>4.0}%",
                name,
                file.statement_count(),
                missing.len(),
                file.coverage_percent()
            );
            if self.show_missing {
                let statements: Vec<u32> = file.statements().iter().copied().collect();
                let _ = write!(output, "   {}", format_ranges(&missing, &statements));
            }
            output.push('\n');
        }

        let summary = self.data.summary();
        let _ = writeln!(output, "{rule}");
        let _ = writeln!(
            output,
            "{:<name_width$}   {:>5}  {:>5}  {:>4.0}%",
            "TOTAL",
            summary.statements,
            summary.statements - summary.covered,
            summary.coverage_percent
        );
        output
    }

    /// Write the table to a stream
    pub fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(self.generate().as_bytes())
    }
}
