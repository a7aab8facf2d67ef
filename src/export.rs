use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use tracing::{info, warn};

use crate::domain::{BrowserError, Result};
use crate::filter::{FilterState, apply};
use crate::record::{Record, ViewColumn};
use crate::status::classify;

const MISSING: &str = "N/A";

/// Which rows an export writes, decided by what the view currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportScope {
    /// Search results (with any filters applied on top).
    Search(String),
    /// Filter results without a search term.
    Filtered,
    /// The whole record set.
    Complete,
}

impl ExportScope {
    pub fn determine(search_term: &str, filters: &FilterState) -> Self {
        if !search_term.trim().is_empty() {
            ExportScope::Search(search_term.to_string())
        } else if filters.is_active() {
            ExportScope::Filtered
        } else {
            ExportScope::Complete
        }
    }

    /// Whether the export writes the filtered rows rather than the full set.
    pub fn uses_filtered_rows(&self) -> bool {
        !matches!(self, ExportScope::Complete)
    }

    pub fn filename(&self, date: NaiveDate) -> String {
        let date = date.format("%Y-%m-%d");
        match self {
            ExportScope::Search(term) => {
                format!("permits_search_{}_{}.csv", sanitize(term), date)
            }
            ExportScope::Filtered => format!("permits_filtered_{date}.csv"),
            ExportScope::Complete => format!("permits_complete_{date}.csv"),
        }
    }

    pub fn describe(&self, count: usize) -> String {
        match self {
            ExportScope::Search(_) => format!("Export search results ({count} records)"),
            ExportScope::Filtered => format!("Export filtered results ({count} records)"),
            ExportScope::Complete => format!("Export all data ({count} records)"),
        }
    }
}

fn sanitize(term: &str) -> String {
    term.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Text of one exported cell. Absent and empty values become `N/A`.
pub fn cell(record: &Record, column: ViewColumn, today: NaiveDate) -> String {
    match column {
        ViewColumn::Status => classify(record, today).label().to_string(),
        ViewColumn::Field(c) => record
            .get(c)
            .filter(|v| !v.is_empty())
            .map(|v| v.into_owned())
            .unwrap_or_else(|| MISSING.to_string()),
    }
}

/// Writes the header and one line per record. Every field is quoted.
pub fn write_csv<'a, W: Write>(
    writer: &mut W,
    records: impl IntoIterator<Item = &'a Record>,
    columns: &[ViewColumn],
    today: NaiveDate,
) -> Result<usize> {
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(writer);
    wtr.write_record(columns.iter().map(|c| c.label()))?;

    let mut written = 0;
    for record in records {
        wtr.write_record(columns.iter().map(|&c| cell(record, c, today)))?;
        written += 1;
    }
    wtr.flush()?;
    Ok(written)
}

/// Writes `records` to `dir/filename`, columns in display order.
///
/// Fails with [`BrowserError::NothingToExport`] without touching the
/// filesystem when there are no records.
pub fn export_csv(
    records: &[&Record],
    columns: &[ViewColumn],
    dir: &Path,
    filename: &str,
    today: NaiveDate,
) -> Result<PathBuf> {
    if records.is_empty() {
        warn!("Export of {filename} skipped, no records");
        return Err(BrowserError::NothingToExport);
    }

    let path = dir.join(filename);
    let mut writer = BufWriter::new(File::create(&path)?);
    let written = write_csv(&mut writer, records.iter().copied(), columns, today)?;
    info!("Exported {written} records, {} columns to {:?}", columns.len(), path);
    Ok(path)
}

/// Searches and filters `records` like the browser view does, then exports
/// the result under the matching scope's filename.
pub fn export_view(
    records: &[Record],
    search_term: &str,
    filters: &FilterState,
    columns: &[ViewColumn],
    dir: &Path,
    today: NaiveDate,
) -> Result<PathBuf> {
    let scope = ExportScope::determine(search_term, filters);
    let rows: Vec<&Record> = if scope.uses_filtered_rows() {
        apply(records, search_term, filters, today)
            .into_iter()
            .map(|idx| &records[idx])
            .collect()
    } else {
        records.iter().collect()
    };
    info!("{}", scope.describe(rows.len()));
    export_csv(&rows, columns, dir, &scope.filename(today), today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterKind, FilterValue};
    use crate::record::ColumnId;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    #[test]
    fn quotes_and_doubles_embedded_quotes() {
        let record = Record::default()
            .with(ColumnId::Project, r#"Projeto "Sítio", fase 2"#)
            .with(ColumnId::Type, "Portaria de Revogação");
        let columns = [
            ViewColumn::Status,
            ViewColumn::Field(ColumnId::Project),
            ViewColumn::Field(ColumnId::Unit),
        ];
        let mut out = Vec::new();
        let n = write_csv(&mut out, [&record], &columns, today()).unwrap();
        assert_eq!(n, 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\"Status\",\"Project\",\"Issuing unit\"\n\
             \"Revoked\",\"Projeto \"\"Sítio\"\", fase 2\",\"N/A\"\n"
        );
    }

    #[test]
    fn empty_strings_are_not_available() {
        let record = Record::default().with(ColumnId::Unit, "");
        assert_eq!(cell(&record, ViewColumn::Field(ColumnId::Unit), today()), "N/A");
        assert_eq!(cell(&record, ViewColumn::Field(ColumnId::Year), today()), "N/A");
    }

    #[test]
    fn scope_and_filenames() {
        let mut filters = FilterState::default();
        assert_eq!(ExportScope::determine("  ", &filters), ExportScope::Complete);
        filters.set(FilterKind::Year, Some(FilterValue::Value("2021".into())));
        assert_eq!(ExportScope::determine("", &filters), ExportScope::Filtered);
        let scope = ExportScope::determine("São Paulo/SP", &filters);
        assert!(scope.uses_filtered_rows());

        assert_eq!(scope.filename(today()), "permits_search_S_o_Paulo_SP_2025-06-15.csv");
        assert_eq!(ExportScope::Filtered.filename(today()), "permits_filtered_2025-06-15.csv");
        assert_eq!(ExportScope::Complete.filename(today()), "permits_complete_2025-06-15.csv");
        assert_eq!(ExportScope::Complete.describe(3), "Export all data (3 records)");
    }

    #[test]
    fn empty_export_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let result = export_csv(&[], &[ViewColumn::Status], dir.path(), "x.csv", today());
        assert!(matches!(result, Err(BrowserError::NothingToExport)));
        assert!(!dir.path().join("x.csv").exists());
    }
}
