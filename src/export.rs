use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use clap::ValueEnum;
use tracing::info;

use crate::column::ColumnDescriptor;
use crate::domain::DeskError;
use crate::engine::TableView;
use crate::record::{Record, field, value_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Spreadsheet,
    Print,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Spreadsheet => "xls",
            ExportFormat::Print => "html",
        }
    }
}

/// `{base}_{YYYY-MM-DD}.{ext}`
pub fn export_file_name(base: &str, format: ExportFormat, date: NaiveDate) -> String {
    format!("{base}_{}.{}", date.format("%Y-%m-%d"), format.extension())
}

fn wrap_csv_field(c: &str) -> String {
    let needs_wrapping = c.chars().any(|c| c == '"' || c == ',' || c == '\n' || c == '\r');
    if needs_wrapping {
        format!("\"{}\"", c.replace('"', "\"\""))
    } else {
        c.to_string()
    }
}

/// Raw field values, one line per record. Objects become JSON text.
pub fn to_csv<'a>(
    records: impl IntoIterator<Item = &'a Record>,
    columns: &[ColumnDescriptor],
) -> String {
    let header = columns
        .iter()
        .map(|c| wrap_csv_field(&c.label))
        .collect::<Vec<String>>()
        .join(",");
    let mut out = header;
    out.push('\n');
    for record in records {
        out.push_str(&csv_line(record, columns));
        out.push('\n');
    }
    out
}

/// One CSV line (without terminator) of the raw values of `record`.
pub fn csv_line(record: &Record, columns: &[ColumnDescriptor]) -> String {
    columns
        .iter()
        .map(|c| wrap_csv_field(&value_text(field(record, &c.key))))
        .collect::<Vec<String>>()
        .join(",")
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn html_table<'a>(records: impl IntoIterator<Item = &'a Record>, columns: &[ColumnDescriptor]) -> String {
    let mut out = String::from("<table>\n<thead><tr>");
    for column in columns {
        out.push_str(&format!("<th>{}</th>", escape_html(&column.label)));
    }
    out.push_str("</tr></thead>\n<tbody>\n");
    for record in records {
        out.push_str("<tr>");
        for column in columns {
            let class = column
                .style
                .as_deref()
                .map(|s| format!(" class=\"{}\"", escape_html(s)))
                .unwrap_or_default();
            out.push_str(&format!("<td{class}>{}</td>", escape_html(&column.display(record))));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody>\n</table>\n");
    out
}

/// HTML table that spreadsheet applications open as a workbook.
pub fn to_spreadsheet_html<'a>(
    title: &str,
    records: impl IntoIterator<Item = &'a Record>,
    columns: &[ColumnDescriptor],
) -> String {
    format!(
        "<html xmlns:o=\"urn:schemas-microsoft-com:office:office\" \
         xmlns:x=\"urn:schemas-microsoft-com:office:excel\">\n\
         <head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{}</body>\n</html>\n",
        escape_html(title),
        html_table(records, columns)
    )
}

/// Standalone printable page that opens the print dialog on load.
pub fn to_print_html<'a>(
    title: &str,
    summary: &str,
    date: NaiveDate,
    records: impl IntoIterator<Item = &'a Record>,
    columns: &[ColumnDescriptor],
) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title>\n\
         <style>body{{font-family:sans-serif}} table{{border-collapse:collapse;width:100%}} \
         th,td{{border:1px solid #999;padding:4px}} td.currency,td.numeric{{text-align:right}}</style>\n\
         </head>\n<body onload=\"window.print()\">\n<h1>{title}</h1>\n<p>{date} &middot; {summary}</p>\n{table}</body>\n</html>\n",
        title = escape_html(title),
        date = date.format("%Y-%m-%d"),
        summary = escape_html(summary),
        table = html_table(records, columns)
    )
}

/// Encode the filtered and sorted rows of `view`.
pub fn render_export(view: &TableView, title: &str, format: ExportFormat, date: NaiveDate) -> String {
    match format {
        ExportFormat::Csv => to_csv(view.visible_records(), view.columns()),
        ExportFormat::Spreadsheet => {
            to_spreadsheet_html(title, view.visible_records(), view.columns())
        }
        ExportFormat::Print => to_print_html(
            title,
            &view.summary(),
            date,
            view.visible_records(),
            view.columns(),
        ),
    }
}

/// Write the export of `view` to `dir`, named after `base` and today's date.
pub fn write_export(
    dir: &Path,
    base: &str,
    title: &str,
    format: ExportFormat,
    view: &TableView,
) -> Result<PathBuf, DeskError> {
    let today = Local::now().date_naive();
    let path = dir.join(export_file_name(base, format, today));
    let content = render_export(view, title, format, today);
    fs::create_dir_all(dir)?;
    fs::write(&path, content)?;
    info!("Exported {} rows to {}", view.len(), path.display());
    Ok(path)
}
