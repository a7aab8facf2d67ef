use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::{Chunk, MemorySource, RangeRequest, TableSource};
use crate::domain::{BrowserError, Result};
use crate::record::{ColumnId, Record, ViewColumn};

const MISSING: &str = "N/A";

#[derive(Debug, Clone, Copy)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

/// A snapshot of the table stored in a local file, e.g. an earlier export.
#[derive(Debug)]
pub struct FileSource {
    table: MemorySource,
}

impl FileSource {
    pub fn open(path: PathBuf) -> Result<Self> {
        let file_type = Self::get_file_type(&path)?;
        let frame = match file_type {
            FileType::CSV => Self::load_csv(&path)?,
            FileType::PARQUET => Self::load_parquet(&path)?,
            FileType::ARROW => Self::load_arrow(&path)?,
        };

        let start_time = Instant::now();
        let df = frame.collect()?;
        let table = MemorySource::new(Self::load_records(&df)?);
        info!(
            "Loaded {} records from {:?} ({:?}) in {}ms",
            table.len(),
            path,
            file_type,
            start_time.elapsed().as_millis()
        );
        if table.is_empty() {
            warn!("{:?} holds no records", path);
        }

        Ok(Self { table })
    }

    fn get_file_type(path: &Path) -> Result<FileType> {
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BrowserError::FileNotFound,
            ErrorKind::PermissionDenied => BrowserError::PermissionDenied,
            _ => BrowserError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(BrowserError::LoadingFailed("Not a file!".into()));
        }

        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(FileType::CSV),
            Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
            Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
            _ => Err(BrowserError::UnknownFileType),
        }
    }

    // All columns are read as text so identifiers keep their leading zeros.
    fn load_csv(path: &Path) -> std::result::Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()
    }

    fn load_parquet(path: &Path) -> std::result::Result<LazyFrame, PolarsError> {
        LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
    }

    fn load_arrow(path: &Path) -> std::result::Result<LazyFrame, PolarsError> {
        LazyFrame::scan_ipc(
            PlPath::Local(path.into()),
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )
    }

    /// Converts every known column to text, one column per rayon task, then
    /// assembles the records row by row.
    fn load_records(df: &DataFrame) -> Result<Vec<Record>> {
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();

        let mut targets = Vec::new();
        for name in names.iter() {
            match (name.as_str(), ViewColumn::parse(name)) {
                ("id", _) => targets.push((name.as_str(), None)),
                ("updated_at", _) => targets.push((name.as_str(), None)),
                (_, Some(ViewColumn::Field(c))) => targets.push((name.as_str(), Some(c))),
                (_, Some(ViewColumn::Status)) => debug!("Skipping derived column {name:?}"),
                (_, None) => warn!("Ignoring unknown column {name:?}"),
            }
        }

        let columns: std::result::Result<Vec<(&str, Option<ColumnId>, Vec<Option<String>>)>, PolarsError> =
            targets
                .par_iter()
                .map(|&(name, column)| Ok((name, column, Self::load_column(df, name)?)))
                .collect();
        let columns = columns?;

        let mut rows = vec![Record::default(); df.height()];
        for (name, column, values) in columns {
            for (record, value) in rows.iter_mut().zip(values) {
                match (name, column) {
                    ("id", _) => record.id = value.and_then(|v| v.trim().parse().ok()),
                    ("updated_at", _) => record.updated_at = value,
                    (_, Some(c)) => record.set(c, value),
                    _ => {}
                }
            }
        }
        Ok(rows)
    }

    fn load_column(df: &DataFrame, col_name: &str) -> std::result::Result<Vec<Option<String>>, PolarsError> {
        let col = df.column(col_name)?.cast(&DataType::String)?;
        let series = col.str()?;
        Ok(series
            .into_iter()
            .map(|v| v.filter(|s| !s.trim().is_empty() && *s != MISSING).map(str::to_string))
            .collect())
    }
}

impl TableSource for FileSource {
    fn fetch_range(&self, request: &RangeRequest) -> Result<Chunk> {
        self.table.fetch_range(request)
    }

    fn latest_update(&self) -> Result<Option<String>> {
        self.table.latest_update()
    }
}
