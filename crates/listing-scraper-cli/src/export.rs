//! Record export: CSV and XLSX files named `scraped_data_<timestamp>`.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::ValueEnum;
use listing_scraper::{Record, Schema};
use rust_xlsxwriter::{Format, Workbook};
use std::path::{Path, PathBuf};

/// Which files to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Xlsx,
    Both,
    None,
}

impl ExportFormat {
    fn wants_csv(self) -> bool {
        matches!(self, ExportFormat::Csv | ExportFormat::Both)
    }

    fn wants_xlsx(self) -> bool {
        matches!(self, ExportFormat::Xlsx | ExportFormat::Both)
    }
}

/// File stem for an export made at `at`, e.g. `scraped_data_20260101_093000`.
pub fn export_stem(at: DateTime<Local>) -> String {
    format!("scraped_data_{}", at.format("%Y%m%d_%H%M%S"))
}

type WriteFn = fn(&Path, &Schema, &[Record]) -> Result<()>;

/// Files produced by [`export_records`].
#[derive(Debug, Default)]
pub struct Exported {
    pub written: Vec<PathBuf>,
    /// One message per file that could not be written.
    pub errors: Vec<String>,
}

/// Write `records` in `format` under `out_dir`.
///
/// Nothing is written when there are no records. A file that fails is
/// reported in [`Exported::errors`] and does not stop the other format.
pub fn export_records(
    out_dir: &Path,
    stem: &str,
    format: ExportFormat,
    schema: &Schema,
    records: &[Record],
) -> Exported {
    let mut exported = Exported::default();
    if records.is_empty() || format == ExportFormat::None {
        return exported;
    }

    if let Err(e) = std::fs::create_dir_all(out_dir) {
        exported.errors.push(format!(
            "failed to create output directory {}: {e}",
            out_dir.display()
        ));
        return exported;
    }

    let mut jobs: Vec<(PathBuf, WriteFn)> = Vec::new();
    if format.wants_csv() {
        jobs.push((out_dir.join(format!("{stem}.csv")), write_csv as WriteFn));
    }
    if format.wants_xlsx() {
        jobs.push((out_dir.join(format!("{stem}.xlsx")), write_xlsx as WriteFn));
    }

    for (path, write) in jobs {
        match write(&path, schema, records) {
            Ok(()) => {
                tracing::info!(path = %path.display(), rows = records.len(), "export written");
                exported.written.push(path);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "export failed: {e:#}");
                exported.errors.push(format!("{}: {e:#}", path.display()));
            }
        }
    }
    exported
}

/// Header row in schema order, one row per record.
pub fn write_csv(path: &Path, schema: &Schema, records: &[Record]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    let columns = schema.column_names();
    writer.write_record(&columns)?;
    for record in records {
        writer.write_record(columns.iter().map(|c| record.get(c).unwrap_or("")))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Single-sheet workbook with a bold header row.
pub fn write_xlsx(path: &Path, schema: &Schema, records: &[Record]) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let header = Format::new().set_bold();

    let columns = schema.column_names();
    for (col, name) in columns.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, &header)?;
    }
    for (row, record) in records.iter().enumerate() {
        for (col, name) in columns.iter().enumerate() {
            sheet
                .write_string(row as u32 + 1, col as u16, record.get(name).unwrap_or(""))
                .with_context(|| format!("row {} column {name:?}", row + 1))?;
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
