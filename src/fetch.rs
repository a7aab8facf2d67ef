use std::time::Instant;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime};
use tracing::{debug, error, info, warn};

use crate::domain::BrowserConfig;
use crate::record::{Record, remote_search_columns};
use crate::source::{OrderBy, RangeRequest, SearchPredicate, TableSource};

/// Retrieves whole tables, or searched subsets, through bounded range requests.
///
/// Pages are ordered by a unique, immutable key so that concatenating the
/// chunks yields every row exactly once as long as the table does not change
/// during the fetch.
pub struct PagedFetcher {
    source: Box<dyn TableSource>,
    order: OrderBy,
    chunk_size: usize,
}

impl PagedFetcher {
    pub fn new(source: Box<dyn TableSource>, order: OrderBy, chunk_size: usize) -> Self {
        Self {
            source,
            order,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn from_config(source: Box<dyn TableSource>, config: &BrowserConfig) -> Self {
        Self::new(
            source,
            OrderBy {
                column: config.order_key.clone(),
                ascending: config.order_ascending,
            },
            config.chunk_size,
        )
    }

    /// The whole table. Errors end the fetch early; whatever was received so
    /// far is returned.
    pub fn fetch_all(&self) -> Vec<Record> {
        self.fetch(None)
    }

    /// Rows where any searchable column contains `term`, case-insensitively.
    pub fn search_remote(&self, term: &str) -> Vec<Record> {
        let term = term.trim();
        if term.is_empty() {
            return self.fetch_all();
        }
        let search = SearchPredicate {
            term: term.to_string(),
            columns: remote_search_columns(),
        };
        let mut rows = self.fetch(Some(search.clone()));
        // The service pattern can be wider than a literal substring.
        let before = rows.len();
        rows.retain(|r| search.matches(r));
        if rows.len() < before {
            debug!("Dropped {} rows not containing {:?}", before - rows.len(), term);
        }
        rows
    }

    fn fetch(&self, search: Option<SearchPredicate>) -> Vec<Record> {
        let start_time = Instant::now();
        let mut rows: Vec<Record> = Vec::new();
        let mut total: Option<usize> = None;
        let mut chunks = 0;

        loop {
            let request = RangeRequest {
                order: self.order.clone(),
                offset: rows.len(),
                limit: self.chunk_size,
                search: search.clone(),
                count: total.is_none(),
            };

            let chunk = match self.source.fetch_range(&request) {
                Ok(chunk) => chunk,
                Err(e) => {
                    error!(
                        "Fetching rows {}..{} failed, keeping {} rows: {}",
                        request.offset,
                        request.offset + request.limit,
                        rows.len(),
                        e
                    );
                    break;
                }
            };

            chunks += 1;
            total = total.or(chunk.total);
            let received = chunk.rows.len();
            rows.extend(chunk.rows);
            debug!("Chunk {chunks}: {received} rows, {} so far", rows.len());

            if received < self.chunk_size {
                break;
            }
            if total.is_some_and(|t| rows.len() >= t) {
                break;
            }
        }

        info!(
            "Fetched {} rows in {} chunks in {}ms{}",
            rows.len(),
            chunks,
            start_time.elapsed().as_millis(),
            search
                .as_ref()
                .map(|s| format!(" (search {:?})", s.term))
                .unwrap_or_default()
        );
        rows
    }

    /// Raw timestamp of the latest update. Failures are logged and yield `None`.
    pub fn last_updated(&self) -> Option<String> {
        match self.source.latest_update() {
            Ok(ts) => ts,
            Err(e) => {
                warn!("Could not fetch last update: {e}");
                None
            }
        }
    }
}

/// Renders a service timestamp as `DD/MM/YYYY` in the given UTC offset.
///
/// Accepts RFC 3339 timestamps and naive ISO timestamps, the latter taken as UTC.
pub fn format_last_updated(raw: &str, utc_offset_hours: i32) -> Option<String> {
    let raw = raw.trim();
    let utc = match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.naive_utc(),
        Err(_) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()?,
    };
    let offset = FixedOffset::east_opt(utc_offset_hours * 3600)?;
    let local = utc + Duration::seconds(i64::from(offset.local_minus_utc()));
    Some(local.format("%d/%m/%Y").to_string())
}

/// Orders a freshly fetched table for display: newest year first, then the
/// highest ordinance number.
pub fn sort_for_display(records: &mut [Record]) {
    records.sort_by(|a, b| {
        let by_year = match (a.year, b.year) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        by_year.then_with(|| {
            b.order_number
                .as_deref()
                .unwrap_or("")
                .cmp(a.order_number.as_deref().unwrap_or(""))
        })
    });
}
