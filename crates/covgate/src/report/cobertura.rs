//! Cobertura XML Coverage Report Formatter
//!
//! Generates Cobertura XML format coverage reports for CI integration.
//!
//! ## Cobertura XML Format
//!
//! ```xml
//! <?xml version="1.0" ?>
//! <!DOCTYPE coverage SYSTEM "http://cobertura.sourceforge.net/xml/coverage-04.dtd">
//! <coverage line-rate="0.5" branch-rate="0" lines-covered="1" lines-valid="2" version="0.4.0">
//!   <packages>
//!     <package name="pkg.net" line-rate="0.5" branch-rate="0" complexity="0">
//!       <classes>
//!         <class name="codec" filename="pkg/net/codec.rs" line-rate="0.5">
//!           <lines>
//!             <line number="3" hits="2"/>
//!             <line number="9" hits="0"/>
//!           </lines>
//!         </class>
//!       </classes>
//!     </package>
//!   </packages>
//! </coverage>
//! ```

use super::escape_html;
use crate::data::{CoverageData, FileCoverage};
use crate::result::CovResult;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;

/// Files grouped by package (directory)
type PackageMap<'a> = BTreeMap<String, Vec<(&'a str, &'a FileCoverage)>>;

/// Cobertura XML format report generator
#[derive(Debug)]
pub struct CoberturaFormatter<'a> {
    data: &'a CoverageData,
    version: String,
}

impl<'a> CoberturaFormatter<'a> {
    /// Create a new Cobertura formatter
    #[must_use]
    pub fn new(data: &'a CoverageData) -> Self {
        Self {
            data,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Set the version string
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Generate Cobertura XML report as a string
    #[must_use]
    pub fn generate(&self) -> String {
        let summary = self.data.summary();
        let packages = self.group_by_package();

        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(
            r#"<!DOCTYPE coverage SYSTEM "http://cobertura.sourceforge.net/xml/coverage-04.dtd">"#,
        );
        xml.push('\n');
        let _ = write!(
            xml,
            r#"<coverage line-rate="{:.4}" branch-rate="0" lines-covered="{}" lines-valid="{}" version="{}">"#,
            summary.coverage_percent / 100.0,
            summary.covered,
            summary.statements,
            self.version,
        );
        xml.push('\n');

        xml.push_str("  <packages>\n");

        for (package_name, files) in &packages {
            let (pkg_covered, pkg_total) = files.iter().fold((0, 0), |(c, t), (_, file)| {
                (c + file.covered_count(), t + file.statement_count())
            });

            let _ = writeln!(
                xml,
                r#"    <package name="{}" line-rate="{:.4}" branch-rate="0" complexity="0">"#,
                escape_html(package_name),
                rate(pkg_covered, pkg_total)
            );
            xml.push_str("      <classes>\n");

            for (file_path, file) in files {
                let _ = writeln!(
                    xml,
                    r#"        <class name="{}" filename="{}" line-rate="{:.4}" branch-rate="0" complexity="0">"#,
                    escape_html(&Self::extract_class_name(file_path)),
                    escape_html(file_path),
                    rate(file.covered_count(), file.statement_count())
                );
                xml.push_str("          <lines>\n");

                for line in file.statements() {
                    let _ = writeln!(
                        xml,
                        r#"            <line number="{}" hits="{}"/>"#,
                        line,
                        file.hit_count(*line)
                    );
                }

                xml.push_str("          </lines>\n");
                xml.push_str("        </class>\n");
            }

            xml.push_str("      </classes>\n");
            xml.push_str("    </package>\n");
        }

        xml.push_str("  </packages>\n");
        xml.push_str("</coverage>\n");

        xml
    }

    /// Save the Cobertura report to a file
    ///
    /// # Errors
    ///
    /// Returns error if file write fails
    pub fn save(&self, path: &Path) -> CovResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.generate())?;
        Ok(())
    }

    /// Group files by package (directory)
    fn group_by_package(&self) -> PackageMap<'a> {
        let mut packages: PackageMap<'a> = BTreeMap::new();

        for (file, coverage) in self.data.files() {
            let package = file
                .rsplit_once('/')
                .map_or_else(|| ".".to_string(), |(dir, _)| dir.replace('/', "."));
            packages.entry(package).or_default().push((file, coverage));
        }

        packages
    }

    /// Extract class name from file path
    fn extract_class_name(file_path: &str) -> String {
        let name = file_path
            .rsplit_once('/')
            .map_or(file_path, |(_, name)| name);
        name.rsplit_once('.')
            .map_or(name, |(stem, _)| stem)
            .to_string()
    }
}

fn rate(covered: usize, total: usize) -> f64 {
    if total > 0 {
        covered as f64 / total as f64
    } else {
        1.0
    }
}
