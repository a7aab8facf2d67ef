//! Access to the table holding the permit records.
//!
//! The paged fetcher only needs count aware range queries with an ordering
//! and an optional "any column contains" predicate. [`TableSource`] is that
//! contract, implemented by the hosted query service, by a local snapshot
//! file and by an in-memory table.

mod file;
mod memory;
mod rest;

pub use file::FileSource;
pub use memory::MemorySource;
pub use rest::RestSource;

use crate::domain::{BrowserConfig, Result, SourceConfig};
use crate::record::{ColumnId, Record};

/// Ordering of a range query.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

/// Case-insensitive substring match against any of the listed columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPredicate {
    pub term: String,
    pub columns: Vec<ColumnId>,
}

impl SearchPredicate {
    pub fn matches(&self, record: &Record) -> bool {
        let term = self.term.to_lowercase();
        self.columns.iter().any(|&c| {
            record
                .get(c)
                .is_some_and(|v| v.to_lowercase().contains(&term))
        })
    }
}

/// One bounded page request: rows `offset..offset + limit` of the ordered
/// (and optionally searched) table.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeRequest {
    pub order: OrderBy,
    pub offset: usize,
    pub limit: usize,
    pub search: Option<SearchPredicate>,
    /// Ask the service to report the total number of matching rows.
    pub count: bool,
}

/// Rows of one range request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    pub rows: Vec<Record>,
    pub total: Option<usize>,
}

pub trait TableSource: Send + Sync {
    fn fetch_range(&self, request: &RangeRequest) -> Result<Chunk>;

    /// Raw timestamp of the most recently updated row, if any.
    fn latest_update(&self) -> Result<Option<String>>;
}

/// Builds the source described by the configuration.
pub fn from_config(config: &BrowserConfig) -> Result<Box<dyn TableSource>> {
    let source: Box<dyn TableSource> = match &config.source {
        SourceConfig::Remote { url, key, table } => Box::new(RestSource::new(url, key, table)?),
        SourceConfig::File(path) => Box::new(FileSource::open(path.clone())?),
    };
    Ok(source)
}
