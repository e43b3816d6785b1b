//! Table rendering: CSV, aligned console echo, and flat listings
//!
//! CSV output is written without quoting. Field values are assumed not to
//! contain the delimiter.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::calibration::{CALIBRATION_COLUMNS, CalibrationRecord, CalibrationReport};
use super::fetch::ConditionReport;

/// Header label of the run column
pub const RUN_COLUMN: &str = "Run";

/// A rectangular table of text cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn csv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Never)
        .terminator(csv::Terminator::Any(b'\n'))
        .has_headers(true)
        .from_writer(writer)
}

impl Table {
    /// Write header and rows as comma-separated lines
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv_writer(writer);
        csv.write_record(&self.header)
            .context("Failed to write CSV header")?;
        for row in &self.rows {
            csv.write_record(row).context("Failed to write CSV row")?;
        }
        csv.flush().context("Failed to flush CSV output")?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        String::from_utf8(buffer).context("CSV output is not valid UTF-8")
    }

    /// Write the CSV to `path`, replacing any existing file
    pub fn write_csv_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        self.write_csv(file)
    }

    /// Right-aligned text table with a leading row-index column
    pub fn render_aligned(&self) -> String {
        let index_width = self.rows.len().saturating_sub(1).to_string().len();
        let widths: Vec<usize> = self
            .header
            .iter()
            .enumerate()
            .map(|(col, name)| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(col))
                    .map(|cell| cell.len())
                    .chain(std::iter::once(name.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        out.push_str(&" ".repeat(index_width));
        for (name, width) in self.header.iter().zip(&widths) {
            out.push_str(&format!("  {name:>width$}"));
        }
        out.push('\n');

        for (i, row) in self.rows.iter().enumerate() {
            out.push_str(&format!("{i:<index_width$}"));
            for (col, width) in widths.iter().enumerate() {
                let cell = row.get(col).map(String::as_str).unwrap_or("");
                out.push_str(&format!("  {cell:>width$}"));
            }
            out.push('\n');
        }

        out
    }
}

impl From<&ConditionReport> for Table {
    fn from(report: &ConditionReport) -> Self {
        let header = std::iter::once(RUN_COLUMN.to_string())
            .chain(report.conditions.iter().cloned())
            .collect();
        let rows = report
            .rows
            .iter()
            .map(|row| {
                std::iter::once(row.run.to_string())
                    .chain(report.conditions.iter().map(|key| row.text(key)))
                    .collect()
            })
            .collect();
        Table { header, rows }
    }
}

impl From<&CalibrationReport> for Table {
    fn from(report: &CalibrationReport) -> Self {
        Table {
            header: CALIBRATION_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: report
                .records
                .iter()
                .map(|r| {
                    vec![
                        r.run_min.to_string(),
                        r.run_max.to_string(),
                        r.slope.clone(),
                        r.offset.clone(),
                        r.atten.clone(),
                    ]
                })
                .collect(),
        }
    }
}

/// Serialize calibration records as CSV with a `runMin,runMax,slope,offset,atten` header
pub fn write_calibration_csv<W: Write>(records: &[CalibrationRecord], writer: W) -> Result<()> {
    let mut csv = csv_writer(writer);
    if records.is_empty() {
        csv.write_record(CALIBRATION_COLUMNS)
            .context("Failed to write CSV header")?;
    }
    for record in records {
        csv.serialize(record)
            .context("Failed to write calibration record")?;
    }
    csv.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// Flat listing of values, e.g. `['C', 'C', 'LD2']`
pub fn render_list<S: AsRef<str>>(values: &[S]) -> String {
    let items: Vec<String> = values
        .iter()
        .map(|v| format!("'{}'", v.as_ref()))
        .collect();
    format!("[{}]", items.join(", "))
}
