//! HTML coverage report

use super::{escape_html, format_ranges};
use crate::data::CoverageData;
use crate::result::CovResult;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// HTML report generator
#[derive(Debug)]
pub struct HtmlFormatter<'a> {
    data: &'a CoverageData,
    title: String,
}

impl<'a> HtmlFormatter<'a> {
    /// Create a new HTML formatter
    #[must_use]
    pub fn new(data: &'a CoverageData) -> Self {
        Self {
            data,
            title: "Coverage report".to_string(),
        }
    }

    /// Set the page title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Render the index page
    #[must_use]
    pub fn render(&self) -> String {
        let summary = self.data.summary();
        let mut html = String::new();

        html.push_str(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
"#,
        );
        let _ = writeln!(html, "    <title>{}</title>", escape_html(&self.title));
        html.push_str(
            r#"    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 20px; }
        .summary { background: #f5f5f5; padding: 20px; border-radius: 8px; margin-bottom: 20px; }
        .progress-bar { background: #ddd; height: 20px; border-radius: 10px; overflow: hidden; }
        .covered { background: #4caf50; height: 100%; }
        table { border-collapse: collapse; width: 100%; }
        th, td { text-align: left; padding: 6px 10px; border-bottom: 1px solid #eee; }
        td.num { text-align: right; font-family: monospace; }
        td.missing { color: #d32f2f; font-family: monospace; }
    </style>
</head>
<body>
"#,
        );

        let _ = write!(
            html,
            r#"<div class="summary">
    <h1>{}</h1>
    <h2>Total: {:.0}% ({}/{} statements)</h2>
    <div class="progress-bar">
        <div class="covered" style="width: {:.1}%"></div>
    </div>
</div>
"#,
            escape_html(&self.title),
            summary.coverage_percent,
            summary.covered,
            summary.statements,
            summary.coverage_percent
        );

        html.push_str(
            "<table>\n<tr><th>Module</th><th>Statements</th><th>Missing</th><th>Coverage</th><th>Missing lines</th></tr>\n",
        );
        for (name, file) in self.data.files() {
            let missing = file.missing_lines();
            let statements: Vec<u32> = file.statements().iter().copied().collect();
            let _ = writeln!(
                html,
                r#"<tr><td>{}</td><td class="num">{}</td><td class="num">{}</td><td class="num">{:.0}%</td><td class="missing">{}</td></tr>"#,
                escape_html(name),
                file.statement_count(),
                missing.len(),
                file.coverage_percent(),
                format_ranges(&missing, &statements)
            );
        }
        html.push_str("</table>\n");

        html.push_str(
            r#"
<footer>
    <p>Generated by covgate</p>
</footer>
</body>
</html>
"#,
        );

        html
    }

    /// Write `index.html` into `dir`, returning its path
    pub fn save(&self, dir: &Path) -> CovResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let index = dir.join("index.html");
        std::fs::write(&index, self.render())?;
        Ok(index)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn create_test_data() -> CoverageData {
        let mut data = CoverageData::new();
        data.add_statements("pkg/<gen>.rs", [1, 2, 3, 4]);
        data.record_hit("pkg/<gen>.rs", 1);
        data
    }

    #[test]
    fn test_render_summary_and_rows() {
        let data = create_test_data();
        let html = HtmlFormatter::new(&data).with_title("demo").render();
        assert!(html.contains("<title>demo</title>"));
        assert!(html.contains("Total: 25% (1/4 statements)"));
        assert!(html.contains("pkg/&lt;gen&gt;.rs"));
        assert!(html.contains(r#"<td class="missing">2-4</td>"#));
    }

    #[test]
    fn test_save_writes_index() {
        let data = create_test_data();
        let dir = tempfile::tempdir().unwrap();
        let index = HtmlFormatter::new(&data)
            .save(&dir.path().join("htmlcov"))
            .unwrap();
        assert!(index.ends_with("htmlcov/index.html"));
        assert!(std::fs::read_to_string(index).unwrap().contains("<!DOCTYPE html>"));
    }
}
