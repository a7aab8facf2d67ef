//! Free text search and the five cascading categorical filters.
//!
//! Everything here works on row indices into an immutable record slice, so
//! recomputing a view never copies records.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use rayon::prelude::*;

use crate::normalize::{normalize, normalize_opt};
use crate::record::{ColumnId, PRIORITY_SEARCH_COLUMNS, Record, SEARCH_COLUMNS};
use crate::status::classify;

pub const NOT_INFORMED: &str = "Not informed";

/// The categorical filters, in cascade order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterKind {
    Year,
    Unit,
    EnterpriseType,
    Type,
    Status,
}

impl FilterKind {
    pub const ALL: [FilterKind; 5] = [
        FilterKind::Year,
        FilterKind::Unit,
        FilterKind::EnterpriseType,
        FilterKind::Type,
        FilterKind::Status,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FilterKind::Year => "Year",
            FilterKind::Unit => "Unit",
            FilterKind::EnterpriseType => "Enterprise type",
            FilterKind::Type => "Type",
            FilterKind::Status => "Status",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }

    /// Record column a filter reads, the status filter reads a derived value.
    fn column(&self) -> Option<ColumnId> {
        match self {
            FilterKind::Year => Some(ColumnId::Year),
            FilterKind::Unit => Some(ColumnId::Unit),
            FilterKind::EnterpriseType => Some(ColumnId::EnterpriseType),
            FilterKind::Type => Some(ColumnId::Type),
            FilterKind::Status => None,
        }
    }
}

/// A selected filter value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterValue {
    /// Matches records where the field is absent or blank.
    NotInformed,
    Value(String),
}

impl FilterValue {
    /// Parses user input, `none` is the sentinel for missing values.
    pub fn parse(s: &str) -> Option<FilterValue> {
        let s = s.trim();
        if s.is_empty() {
            None
        } else if s.eq_ignore_ascii_case("none") || s == NOT_INFORMED {
            Some(FilterValue::NotInformed)
        } else {
            Some(FilterValue::Value(s.to_string()))
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::NotInformed => f.write_str(NOT_INFORMED),
            FilterValue::Value(v) => f.write_str(v),
        }
    }
}

/// Selected value per filter; `None` means unconstrained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    values: [Option<FilterValue>; 5],
}

impl FilterState {
    pub fn get(&self, kind: FilterKind) -> Option<&FilterValue> {
        self.values[kind.index()].as_ref()
    }

    /// Sets one filter and clears every filter after it in the cascade, so a
    /// downstream selection can never refer to a value that no longer exists.
    pub fn set(&mut self, kind: FilterKind, value: Option<FilterValue>) {
        self.values[kind.index()] = value;
        for slot in self.values.iter_mut().skip(kind.index() + 1) {
            *slot = None;
        }
    }

    pub fn clear(&mut self) {
        self.values = Default::default();
    }

    pub fn is_active(&self) -> bool {
        self.values.iter().any(Option::is_some)
    }

    pub fn active(&self) -> impl Iterator<Item = (FilterKind, &FilterValue)> {
        FilterKind::ALL
            .into_iter()
            .filter_map(|k| self.get(k).map(|v| (k, v)))
    }

    /// Whether `record` passes every active filter except `skip`.
    pub fn matches(&self, record: &Record, today: NaiveDate, skip: Option<FilterKind>) -> bool {
        self.active()
            .filter(|(kind, _)| Some(*kind) != skip)
            .all(|(kind, value)| matches_filter(record, kind, value, today))
    }
}

fn matches_filter(record: &Record, kind: FilterKind, value: &FilterValue, today: NaiveDate) -> bool {
    match (kind, value) {
        (FilterKind::Status, FilterValue::Value(v)) => classify(record, today).label() == v,
        // Every record has a status.
        (FilterKind::Status, FilterValue::NotInformed) => false,
        (FilterKind::Year, FilterValue::Value(v)) => {
            record.year.is_some_and(|y| y.to_string() == v.trim())
        }
        (FilterKind::Year, FilterValue::NotInformed) => record.year.is_none(),
        (kind, FilterValue::NotInformed) => kind
            .column()
            .is_some_and(|c| record.informed(c).is_none()),
        (kind, FilterValue::Value(v)) => kind.column().is_some_and(|c| {
            normalize_opt(record.get(c).as_deref()).contains(&normalize(v))
        }),
    }
}

/// Free text search over the searchable columns. A blank term keeps every row.
///
/// The prioritized columns are tried first; the full column list is only
/// joined for rows the short list does not match.
pub fn search_rows(records: &[Record], term: &str) -> Vec<usize> {
    if term.trim().is_empty() {
        return (0..records.len()).collect();
    }
    let term = normalize(term);

    (0..records.len())
        .into_par_iter()
        .filter(|&idx| {
            let record = &records[idx];
            normalize(&record.joined(&PRIORITY_SEARCH_COLUMNS)).contains(&term)
                || normalize(&record.joined(&SEARCH_COLUMNS)).contains(&term)
        })
        .collect()
}

/// Keeps the rows that pass every active filter except `skip`, preserving order.
pub fn filter_rows(
    records: &[Record],
    rows: &[usize],
    state: &FilterState,
    today: NaiveDate,
    skip: Option<FilterKind>,
) -> Vec<usize> {
    if !state.is_active() {
        return rows.to_vec();
    }
    rows.par_iter()
        .copied()
        .filter(|&idx| state.matches(&records[idx], today, skip))
        .collect()
}

/// Search then filter.
pub fn apply(records: &[Record], term: &str, state: &FilterState, today: NaiveDate) -> Vec<usize> {
    let searched = search_rows(records, term);
    filter_rows(records, &searched, state, today, None)
}

/// Choices offered per filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    options: [Vec<FilterValue>; 5],
}

impl FilterOptions {
    /// Options for each filter, computed from the searched rows narrowed by
    /// all the *other* active filters, so the list shows what relaxing that
    /// filter would reveal.
    pub fn compute(
        records: &[Record],
        searched: &[usize],
        state: &FilterState,
        today: NaiveDate,
    ) -> Self {
        let mut options: [Vec<FilterValue>; 5] = Default::default();
        for kind in FilterKind::ALL {
            let rows = filter_rows(records, searched, state, today, Some(kind));
            options[kind.index()] = Self::options_for(records, &rows, kind, today);
        }
        Self { options }
    }

    pub fn get(&self, kind: FilterKind) -> &[FilterValue] {
        &self.options[kind.index()]
    }

    fn options_for(records: &[Record], rows: &[usize], kind: FilterKind, today: NaiveDate) -> Vec<FilterValue> {
        match kind {
            FilterKind::Year => {
                let mut missing = false;
                let mut years = BTreeSet::new();
                for &idx in rows {
                    match records[idx].year {
                        Some(y) => {
                            years.insert(y);
                        }
                        None => missing = true,
                    }
                }
                missing
                    .then_some(FilterValue::NotInformed)
                    .into_iter()
                    .chain(years.into_iter().rev().map(|y| FilterValue::Value(y.to_string())))
                    .collect()
            }
            FilterKind::Status => rows
                .iter()
                .map(|&idx| classify(&records[idx], today).label())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .map(|s| FilterValue::Value(s.to_string()))
                .collect(),
            kind => {
                let Some(column) = kind.column() else {
                    return Vec::new();
                };
                let mut missing = false;
                let mut values = BTreeSet::new();
                for &idx in rows {
                    match records[idx].informed(column) {
                        Some(v) => {
                            values.insert(v);
                        }
                        None => missing = true,
                    }
                }
                missing
                    .then_some(FilterValue::NotInformed)
                    .into_iter()
                    .chain(values.into_iter().map(FilterValue::Value))
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn records() -> Vec<Record> {
        vec![
            Record::default()
                .with(ColumnId::Year, "2020")
                .with(ColumnId::Unit, "IPHAN-SP")
                .with(ColumnId::Type, "Permissão")
                .with(ColumnId::LeadArchaeologists, "João Araújo")
                .with(ColumnId::ExpirationDate, "01/01/2030"),
            Record::default()
                .with(ColumnId::Year, "2021")
                .with(ColumnId::Unit, "IPHAN-MG")
                .with(ColumnId::Type, "Portaria de Revogação")
                .with(ColumnId::EnterpriseType, "Mineração")
                .with(ColumnId::ExpirationDate, "01/01/2030"),
            Record::default()
                .with(ColumnId::Year, "2021")
                .with(ColumnId::Unit, "  ")
                .with(ColumnId::Type, "Renovação")
                .with(ColumnId::States, "Minas Gerais")
                .with(ColumnId::ExpirationDate, "01/01/2020"),
        ]
    }

    fn value(s: &str) -> Option<FilterValue> {
        Some(FilterValue::Value(s.to_string()))
    }

    #[test]
    fn blank_search_is_identity() {
        let rs = records();
        assert_eq!(search_rows(&rs, ""), vec![0, 1, 2]);
        assert_eq!(search_rows(&rs, "   "), vec![0, 1, 2]);
    }

    #[test]
    fn search_is_accent_and_case_insensitive() {
        let rs = records();
        assert_eq!(search_rows(&rs, "joao araujo"), vec![0]);
        // found only through the full column list
        assert_eq!(search_rows(&rs, "MINAS"), vec![2]);
        assert_eq!(search_rows(&rs, "2021"), vec![1, 2]);
        assert!(search_rows(&rs, "nothing like this").is_empty());
    }

    #[test]
    fn year_filter_scenario() {
        let rs = records();
        let mut state = FilterState::default();
        state.set(FilterKind::Year, value("2021"));
        assert_eq!(apply(&rs, "", &state, today()), vec![1, 2]);
    }

    #[test]
    fn not_informed_matches_blank_only() {
        let rs = records();
        let mut state = FilterState::default();
        state.set(FilterKind::Unit, Some(FilterValue::NotInformed));
        assert_eq!(apply(&rs, "", &state, today()), vec![2]);
        state.set(FilterKind::EnterpriseType, Some(FilterValue::NotInformed));
        assert_eq!(apply(&rs, "", &state, today()), vec![2]);
    }

    #[test]
    fn text_filters_use_normalized_contains() {
        let rs = records();
        let mut state = FilterState::default();
        state.set(FilterKind::Type, value("revogacao"));
        assert_eq!(apply(&rs, "", &state, today()), vec![1]);
        state.set(FilterKind::Type, value("IPHAN"));
        assert!(apply(&rs, "", &state, today()).is_empty());
        state.set(FilterKind::Unit, value("iphan"));
        assert_eq!(apply(&rs, "", &state, today()), vec![0, 1]);
    }

    #[test]
    fn status_filter_uses_classifier() {
        let rs = records();
        let mut state = FilterState::default();
        state.set(FilterKind::Status, value("Revoked"));
        assert_eq!(apply(&rs, "", &state, today()), vec![1]);
        state.set(FilterKind::Status, value("Expired"));
        assert_eq!(apply(&rs, "", &state, today()), vec![2]);
    }

    #[test]
    fn setting_a_filter_resets_downstream_filters() {
        let mut state = FilterState::default();
        state.set(FilterKind::Unit, value("SP"));
        state.set(FilterKind::Type, value("Permissão"));
        state.set(FilterKind::Status, value("Valid"));
        state.set(FilterKind::Year, value("2020"));
        assert_eq!(state.get(FilterKind::Year), value("2020").as_ref());
        assert!(FilterKind::ALL[1..].iter().all(|&k| state.get(k).is_none()));

        state.set(FilterKind::EnterpriseType, value("x"));
        state.set(FilterKind::Status, value("Valid"));
        state.set(FilterKind::Type, None);
        assert!(state.get(FilterKind::EnterpriseType).is_some());
        assert!(state.get(FilterKind::Status).is_none());
    }

    #[test]
    fn filters_are_idempotent_and_order_independent() {
        let rs = records();
        let all: Vec<usize> = (0..rs.len()).collect();

        let mut year = FilterState::default();
        year.set(FilterKind::Year, value("2021"));
        let mut status = FilterState::default();
        status.set(FilterKind::Status, value("Revoked"));

        let once = filter_rows(&rs, &all, &year, today(), None);
        let twice = filter_rows(&rs, &once, &year, today(), None);
        assert_eq!(once, twice);

        let a = filter_rows(&rs, &filter_rows(&rs, &all, &year, today(), None), &status, today(), None);
        let b = filter_rows(&rs, &filter_rows(&rs, &all, &status, today(), None), &year, today(), None);
        assert_eq!(a, b);
        assert_eq!(a, vec![1]);
    }

    #[test]
    fn options_sort_and_exclude_own_filter() {
        let rs = records();
        let all: Vec<usize> = (0..rs.len()).collect();
        let mut state = FilterState::default();
        state.set(FilterKind::Year, value("2021"));

        let options = FilterOptions::compute(&rs, &all, &state, today());
        // own filter ignored: every year is still offered, newest first
        assert_eq!(options.get(FilterKind::Year), &[
            FilterValue::Value("2021".into()),
            FilterValue::Value("2020".into()),
        ]);
        // narrowed by the year filter, "Not informed" first
        assert_eq!(options.get(FilterKind::Unit), &[
            FilterValue::NotInformed,
            FilterValue::Value("IPHAN-MG".into()),
        ]);
        assert_eq!(options.get(FilterKind::Status), &[
            FilterValue::Value("Expired".into()),
            FilterValue::Value("Revoked".into()),
        ]);
        assert_eq!(options.get(FilterKind::EnterpriseType), &[
            FilterValue::NotInformed,
            FilterValue::Value("Mineração".into()),
        ]);
    }

    #[test]
    fn parse_sentinel() {
        assert_eq!(FilterValue::parse("none"), Some(FilterValue::NotInformed));
        assert_eq!(FilterValue::parse(" 2021 "), value("2021"));
        assert_eq!(FilterValue::parse(""), None);
    }
}
