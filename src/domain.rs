use std::path::PathBuf;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

use crate::record::Record;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Service returned status {status} for {url}")]
    ServiceError { status: u16, url: String },
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Loading failed: {0}")]
    LoadingFailed(String),
    #[error("File not found")]
    FileNotFound,
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Unknown file type")]
    UnknownFileType,
    #[error("There is no data to export.")]
    NothingToExport,
}

/// Where rows come from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    /// Hosted table behind a PostgREST style query API.
    Remote {
        url: String,
        key: String,
        table: String,
    },
    /// Local CSV, Parquet or Arrow snapshot.
    File(PathBuf),
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct BrowserConfig {
    pub source: SourceConfig,
    /// Unique, immutable column the paged fetch is ordered by.
    pub order_key: String,
    pub order_ascending: bool,
    pub chunk_size: usize,
    pub page_size: usize,
    pub debounce_ms: u64,
    /// Search is sent to the service on Enter instead of filtering in memory.
    pub remote_search: bool,
    pub export_dir: PathBuf,
    /// Offset from UTC, in hours, used to render the "last updated" date.
    pub utc_offset_hours: i32,
    pub event_poll_time: u64,
    pub max_column_width: usize,
}

impl BrowserConfig {
    pub fn new(source: SourceConfig) -> Self {
        Self {
            source,
            order_key: "id".to_string(),
            order_ascending: true,
            chunk_size: 1000,
            page_size: 50,
            debounce_ms: 300,
            remote_search: false,
            export_dir: PathBuf::from("."),
            utc_offset_hours: -3,
            event_poll_time: 100,
            max_column_width: 40,
        }
    }
}

/// Search entry mode of the command line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Search,
}

#[derive(Debug)]
pub enum Message {
    Quit,
    Exit,
    Enter,
    Help,
    MoveUp,
    MoveDown,
    NextPage,
    PreviousPage,
    FirstPage,
    LastPage,
    Search,
    Filters,
    Columns,
    Export,
    Toggle,
    NextItem,
    PreviousItem,
    NextOption,
    PreviousOption,
    ClearItem,
    RawKey(KeyEvent),
    /// Result of a full fetch, tagged with the request generation.
    DataLoaded(u64, Vec<Record>),
    /// Result of a server side search, tagged with the request generation.
    SearchLoaded(u64, String, Vec<Record>),
    LastUpdated(Option<String>),
}

pub const HELP_TEXT: &str = "\
Navigation
  ←/→        previous/next page
  Home/End   first/last page
  ↑/↓        move row cursor

Search
  /          edit search term
  Enter      apply (remote search), Esc cancel

Filters (f)
  Tab/↑/↓    choose filter
  ←/→        cycle options
  Backspace  clear filter

Columns (c)
  ↑/↓        choose column
  Space      show/hide column

Other
  e          export current view to CSV
  ?          this help
  q          quit
";
