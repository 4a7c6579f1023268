//! Rendering an [`ExtractionResult`] for people.
//!
//! Two renderings are provided:
//!
//! * [`to_text`]: the plain text, then each table as tab-separated rows, then
//!   form fields as `key: value` lines.
//! * [`to_markdown`]: the plain text, then each table as a GFM table, then
//!   form fields as a two-column `Key | Value` table.
//!
//! JSON output needs no renderer; `ExtractionResult` is `Serialize`.
//!
//! Sections with no content are omitted. Both renderings end with exactly
//! one newline, or are empty when the result is empty.

use crate::output::{ExtractionResult, Table};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

const INVISIBLE: [char; 6] = [
    '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
];

/// Plain-text rendering.
pub fn to_text(result: &ExtractionResult) -> String {
    let mut sections = Vec::new();

    if !result.plain_text.is_empty() {
        sections.push(result.plain_text.clone());
    }

    for table in result.tables.iter().filter(|t| !t.is_empty()) {
        let rows: Vec<String> = table
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.replace(['\t', '\n'], " "))
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .collect();
        sections.push(format!("Table {}\n{}", table.index + 1, rows.join("\n")));
    }

    if !result.forms.is_empty() {
        let fields: Vec<String> = result
            .forms
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v.replace('\n', "\n  ")))
            .collect();
        sections.push(format!("Form fields\n{}", fields.join("\n")));
    }

    finish(sections)
}

/// GitHub-flavoured Markdown rendering.
///
/// The first row of each table becomes its header row. Cell content has
/// pipes escaped and line breaks turned into `<br>`.
pub fn to_markdown(result: &ExtractionResult) -> String {
    let mut sections = Vec::new();

    if !result.plain_text.is_empty() {
        sections.push(strip_invisible(&result.plain_text));
    }

    for table in &result.tables {
        sections.push(format!("## Table {}\n\n{}", table.index + 1, markdown_table(table)));
    }

    if !result.forms.is_empty() {
        let mut lines = vec!["| Key | Value |".to_string(), "| --- | --- |".to_string()];
        lines.extend(
            result
                .forms
                .iter()
                .map(|(k, v)| format!("| {} | {} |", escape_cell(k), escape_cell(v))),
        );
        sections.push(format!("## Form fields\n\n{}", lines.join("\n")));
    }

    finish(sections)
}

fn markdown_table(table: &Table) -> String {
    let Some((header, body)) = table.rows.split_first() else {
        return "_(empty table)_".to_string();
    };

    let row = |cells: &[String]| {
        let inner: Vec<String> = cells.iter().map(|c| escape_cell(c)).collect();
        format!("| {} |", inner.join(" | "))
    };

    let mut lines = Vec::with_capacity(table.row_count() + 1);
    lines.push(row(header));
    lines.push(format!("|{}", " --- |".repeat(header.len().max(1))));
    lines.extend(body.iter().map(|r| row(r)));
    lines.join("\n")
}

fn escape_cell(cell: &str) -> String {
    strip_invisible(cell)
        .replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
}

fn strip_invisible(input: &str) -> String {
    input.replace(INVISIBLE, "")
}

fn finish(sections: Vec<String>) -> String {
    if sections.is_empty() {
        return String::new();
    }
    let joined = sections.join("\n\n");
    let collapsed = RE_BLANK_LINES.replace_all(joined.trim_end(), "\n\n");
    format!("{}\n", collapsed)
}
