//! Coverage report renderers
//!
//! Terminal table, Cobertura XML, HTML and annotated-source formats, all
//! rendered from a [`CoverageData`](crate::data::CoverageData).

mod annotate;
mod cobertura;
mod html;
mod term;

pub use annotate::AnnotateFormatter;
pub use cobertura::CoberturaFormatter;
pub use html::HtmlFormatter;
pub use term::TermFormatter;

use std::io::{self, Write};

/// Width of separator lines
pub const LINE_WIDTH: usize = 80;

/// Write a separator line with a centred title, e.g. `---- coverage ----`
pub fn sep(out: &mut dyn Write, fill: char, title: &str) -> io::Result<()> {
    if title.is_empty() {
        return writeln!(out, "{}", fill.to_string().repeat(LINE_WIDTH));
    }
    let side = LINE_WIDTH.saturating_sub(title.len() + 2) / 2;
    let side = fill.to_string().repeat(side.max(1));
    let mut line = format!("{side} {title} {side}");
    if line.chars().count() < LINE_WIDTH {
        line.push(fill);
    }
    writeln!(out, "{line}")
}

/// Collapse sorted line numbers into `1-3, 7` form
///
/// Lines are adjacent when no other statement lies between them.
pub(crate) fn format_ranges(missing: &[u32], statements: &[u32]) -> String {
    let mut ranges: Vec<(u32, u32)> = Vec::new();
    let mut missing_iter = missing.iter().peekable();
    let mut current: Option<(u32, u32)> = None;

    for line in statements {
        if missing_iter.peek() == Some(&line) {
            let _ = missing_iter.next();
            current = Some(current.map_or((*line, *line), |(start, _)| (start, *line)));
        } else if let Some(range) = current.take() {
            ranges.push(range);
        }
    }
    if let Some(range) = current {
        ranges.push(range);
    }

    ranges
        .iter()
        .map(|(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
