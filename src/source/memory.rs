use std::cmp::Ordering;

use tracing::trace;

use super::{Chunk, OrderBy, RangeRequest, TableSource};
use crate::domain::Result;
use crate::record::{ColumnId, Record};

/// A table held in memory. Serves loaded snapshot files and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    rows: Vec<Record>,
}

impl MemorySource {
    pub fn new(rows: Vec<Record>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    // Absent values sort after present ones, like NULLS LAST on an ascending order.
    fn compare(a: &Record, b: &Record, order: &OrderBy) -> Ordering {
        let ordering = if order.column == "id" {
            cmp_missing_last(a.id, b.id)
        } else if order.column == ColumnId::Year.id() {
            cmp_missing_last(a.year, b.year)
        } else {
            match ColumnId::parse(&order.column) {
                Some(c) => cmp_missing_last(a.get(c), b.get(c)),
                None => Ordering::Equal,
            }
        };
        if order.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }
}

fn cmp_missing_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl TableSource for MemorySource {
    fn fetch_range(&self, request: &RangeRequest) -> Result<Chunk> {
        let mut rows: Vec<&Record> = match &request.search {
            Some(search) => self
                .rows
                .iter()
                .filter(|r| search.matches(r))
                .collect(),
            None => self.rows.iter().collect(),
        };
        rows.sort_by(|a, b| Self::compare(a, b, &request.order));

        let total = rows.len();
        let page: Vec<Record> = rows
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .cloned()
            .collect();
        trace!(
            "Memory range {}+{} -> {} of {} rows",
            request.offset,
            request.limit,
            page.len(),
            total
        );

        Ok(Chunk {
            rows: page,
            total: request.count.then_some(total),
        })
    }

    fn latest_update(&self) -> Result<Option<String>> {
        Ok(self
            .rows
            .iter()
            .filter_map(|r| r.updated_at.clone())
            .max())
    }
}
