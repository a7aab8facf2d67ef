use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, error, info, trace, warn};

use crate::domain::{BrowserConfig, BrowserError, CMDMode, HELP_TEXT, Message};
use crate::export::{ExportScope, cell, export_csv};
use crate::fetch::{PagedFetcher, format_last_updated, sort_for_display};
use crate::filter::{FilterKind, FilterOptions, FilterState, FilterValue, filter_rows, search_rows};
use crate::inputter::{InputResult, Inputter};
use crate::pagination::Pagination;
use crate::record::{ColumnSelection, Record, ViewColumn};
use crate::status::{self, PermitStatus, classify};

#[derive(Debug, PartialEq)]
pub enum Status {
    EMPTY,
    LOADING,
    SEARCHING,
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    TABLE,
    CMDINPUT,
    FILTERS,
    COLUMNS,
    POPUP,
}

/// Runs fetches off the UI thread and reports back through the message channel.
#[derive(Clone)]
pub struct Worker {
    fetcher: Arc<PagedFetcher>,
    tx: Sender<Message>,
}

impl Worker {
    pub fn new(fetcher: PagedFetcher, tx: Sender<Message>) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            tx,
        }
    }

    pub fn fetch_all(&self, generation: u64) {
        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let rows = fetcher.fetch_all();
            if tx.send(Message::DataLoaded(generation, rows)).is_err() {
                return;
            }
            let _ = tx.send(Message::LastUpdated(fetcher.last_updated()));
        });
    }

    pub fn search(&self, generation: u64, term: String) {
        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let rows = fetcher.search_remote(&term);
            let _ = tx.send(Message::SearchLoaded(generation, term, rows));
        });
    }
}

/// Everything the UI needs to draw one frame.
#[derive(Debug, Clone)]
pub struct UIData {
    pub name: String,
    pub total_records: usize,
    pub last_updated: Option<String>,
    pub loading: Option<String>,
    pub headers: Vec<String>,
    pub widths: Vec<usize>,
    pub rows: Vec<Vec<String>>,
    /// Status per visible row when the status column is shown, for coloring.
    pub row_status: Vec<PermitStatus>,
    pub status_column: Option<usize>,
    pub selected_row: usize,
    pub filtered_count: usize,
    pub page: usize,
    pub total_pages: usize,
    pub page_window: RangeInclusive<usize>,
    pub search_term: String,
    pub cmdinput: InputResult,
    pub active_cmdinput: bool,
    pub cmd_mode: Option<CMDMode>,
    /// Label, current value and number of offered options per filter.
    pub filters: Vec<(String, String, usize)>,
    pub filter_curser: Option<usize>,
    pub column_choices: Vec<(String, bool)>,
    pub column_curser: Option<usize>,
    pub show_popup: bool,
    pub popup_title: String,
    pub popup_message: String,
    pub export_hint: String,
    pub status_message: String,
    pub last_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            total_records: 0,
            last_updated: None,
            loading: None,
            headers: Vec::new(),
            widths: Vec::new(),
            rows: Vec::new(),
            row_status: Vec::new(),
            status_column: None,
            selected_row: 0,
            filtered_count: 0,
            page: 1,
            total_pages: 1,
            page_window: 1..=1,
            search_term: String::new(),
            cmdinput: InputResult::default(),
            active_cmdinput: false,
            cmd_mode: None,
            filters: Vec::new(),
            filter_curser: None,
            column_choices: Vec::new(),
            column_curser: None,
            show_popup: false,
            popup_title: String::new(),
            popup_message: String::new(),
            export_hint: String::new(),
            status_message: String::new(),
            last_update: Instant::now(),
        }
    }
}

pub struct Model {
    config: BrowserConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    worker: Worker,
    /// Full record set, replaced only by a fresh fetch.
    records: Arc<Vec<Record>>,
    /// Server side search results, when a remote search is applied.
    remote_results: Option<Arc<Vec<Record>>>,
    searched: Vec<usize>,
    filtered: Vec<usize>,
    filters: FilterState,
    options: FilterOptions,
    columns: ColumnSelection,
    pagination: Pagination,
    input: Inputter,
    last_input: InputResult,
    search_term: String,
    applied_term: String,
    last_keystroke: Option<Instant>,
    curser_row: usize,
    filter_curser: usize,
    column_curser: usize,
    load_generation: u64,
    search_generation: u64,
    last_updated: Option<String>,
    pinned_today: Option<NaiveDate>,
    popup_title: String,
    popup_message: String,
    status_message: String,
    uidata: UIData,
}

impl Model {
    pub fn init(config: &BrowserConfig, worker: Worker) -> Self {
        let mut model = Self {
            config: config.clone(),
            status: Status::EMPTY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            worker,
            records: Arc::new(Vec::new()),
            remote_results: None,
            searched: Vec::new(),
            filtered: Vec::new(),
            filters: FilterState::default(),
            options: FilterOptions::default(),
            columns: ColumnSelection::default(),
            pagination: Pagination::new(config.page_size),
            input: Inputter::default(),
            last_input: InputResult::default(),
            search_term: String::new(),
            applied_term: String::new(),
            last_keystroke: None,
            curser_row: 0,
            filter_curser: 0,
            column_curser: 0,
            load_generation: 0,
            search_generation: 0,
            last_updated: None,
            pinned_today: None,
            popup_title: String::new(),
            popup_message: String::new(),
            status_message: "Started permits!".to_string(),
            uidata: UIData::empty(),
        };
        model.update_uidata();
        model
    }

    /// Starts the full fetch in the background.
    pub fn load(&mut self) {
        self.load_generation += 1;
        self.status = Status::LOADING;
        self.worker.fetch_all(self.load_generation);
        self.set_status_message("Loading ...");
        self.update_uidata();
    }

    /// Evaluates statuses against a fixed date instead of the clock.
    pub fn pin_today(&mut self, today: NaiveDate) {
        self.pinned_today = Some(today);
        self.recompute();
    }

    fn today(&self) -> NaiveDate {
        self.pinned_today.unwrap_or_else(status::today)
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Records the view is built from: remote search results or the full set.
    fn base(&self) -> &[Record] {
        match &self.remote_results {
            Some(rows) => rows,
            None => &self.records,
        }
    }

    /// The filtered set, in display order.
    pub fn filtered(&self) -> Vec<&Record> {
        let base = self.base();
        self.filtered.iter().map(|&idx| &base[idx]).collect()
    }

    /// Records of the current page.
    pub fn visible(&self) -> Vec<&Record> {
        let base = self.base();
        self.pagination
            .slice(&self.filtered)
            .iter()
            .map(|&idx| &base[idx])
            .collect()
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn columns(&self) -> &ColumnSelection {
        &self.columns
    }

    pub fn applied_term(&self) -> &str {
        &self.applied_term
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_update = Instant::now();
    }

    fn show_popup(&mut self, title: &str, message: impl Into<String>) {
        if self.modus != Modus::POPUP {
            self.previous_modus = self.modus;
        }
        self.modus = Modus::POPUP;
        self.popup_title = title.to_string();
        self.popup_message = message.into();
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), BrowserError> {
        self.apply_debounced_search();

        let Some(msg) = message else {
            return Ok(());
        };

        match msg {
            Message::DataLoaded(generation, rows) => self.data_loaded(generation, rows),
            Message::SearchLoaded(generation, term, rows) => {
                self.search_loaded(generation, term, rows)
            }
            Message::LastUpdated(raw) => {
                self.last_updated = raw
                    .as_deref()
                    .and_then(|r| format_last_updated(r, self.config.utc_offset_hours));
            }
            msg => match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::Help => self.show_popup("Help", HELP_TEXT),
                    Message::MoveUp => self.move_selection_up(),
                    Message::MoveDown => self.move_selection_down(),
                    Message::NextPage => self.change_page(Pagination::next),
                    Message::PreviousPage => self.change_page(Pagination::previous),
                    Message::FirstPage => self.change_page(Pagination::first),
                    Message::LastPage => self.change_page(Pagination::last),
                    Message::Search => self.enter_cmd_mode(CMDMode::Search),
                    Message::Filters => self.modus = Modus::FILTERS,
                    Message::Columns => self.modus = Modus::COLUMNS,
                    Message::Export => self.export(),
                    Message::Exit => self.clear_search(),
                    _ => {}
                },
                Modus::CMDINPUT => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key);
                    }
                }
                Modus::FILTERS => match msg {
                    Message::Quit => self.quit(),
                    Message::Help => self.show_popup("Help", HELP_TEXT),
                    Message::NextItem | Message::MoveDown => {
                        self.filter_curser = (self.filter_curser + 1) % FilterKind::ALL.len();
                    }
                    Message::PreviousItem | Message::MoveUp => {
                        self.filter_curser =
                            (self.filter_curser + FilterKind::ALL.len() - 1) % FilterKind::ALL.len();
                    }
                    Message::NextOption => self.cycle_filter(1),
                    Message::PreviousOption => self.cycle_filter(-1),
                    Message::ClearItem => {
                        self.set_filter(FilterKind::ALL[self.filter_curser], None)
                    }
                    Message::Export => self.export(),
                    Message::Exit | Message::Enter | Message::Filters => self.modus = Modus::TABLE,
                    _ => {}
                },
                Modus::COLUMNS => match msg {
                    Message::Quit => self.quit(),
                    Message::Help => self.show_popup("Help", HELP_TEXT),
                    Message::MoveDown | Message::NextItem => {
                        self.column_curser = (self.column_curser + 1) % ViewColumn::all().len();
                    }
                    Message::MoveUp | Message::PreviousItem => {
                        let n = ViewColumn::all().len();
                        self.column_curser = (self.column_curser + n - 1) % n;
                    }
                    Message::Toggle | Message::Enter => self.toggle_column(),
                    Message::Exit | Message::Columns => self.modus = Modus::TABLE,
                    _ => {}
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Enter | Message::Help => {
                        self.modus = self.previous_modus;
                    }
                    _ => {}
                },
            },
        }

        self.update_uidata();
        Ok(())
    }

    fn data_loaded(&mut self, generation: u64, mut rows: Vec<Record>) {
        if generation != self.load_generation {
            warn!("Dropping stale fetch result {generation} (current {})", self.load_generation);
            return;
        }
        sort_for_display(&mut rows);
        info!("Loaded {} records", rows.len());
        self.records = Arc::new(rows);
        self.status = if self.records.is_empty() {
            Status::EMPTY
        } else {
            Status::READY
        };
        self.set_status_message(format!("Loaded {} records", self.records.len()));
        self.recompute();
    }

    fn search_loaded(&mut self, generation: u64, term: String, mut rows: Vec<Record>) {
        if generation != self.search_generation {
            warn!("Dropping stale search result for {term:?}");
            return;
        }
        sort_for_display(&mut rows);
        self.status = Status::READY;
        self.set_status_message(format!("Found {} results for {term:?}", rows.len()));
        self.remote_results = Some(Arc::new(rows));
        self.applied_term = term;
        self.recompute();
    }

    /// Rebuilds searched rows, filtered rows and the filter options from the
    /// current record set, term and filters. Always returns to the first page.
    fn recompute(&mut self) {
        let start_time = Instant::now();
        let today = self.today();

        // A remote search already narrowed the base set.
        let local_term = if self.config.remote_search {
            ""
        } else {
            self.applied_term.as_str()
        };
        let searched = search_rows(self.base(), local_term);
        let filtered = filter_rows(self.base(), &searched, &self.filters, today, None);
        let options = FilterOptions::compute(self.base(), &searched, &self.filters, today);

        self.searched = searched;
        self.filtered = filtered;
        self.options = options;
        self.pagination.reset(self.filtered.len());
        self.curser_row = 0;

        debug!(
            "Recomputed view: {} searched, {} filtered in {}ms",
            self.searched.len(),
            self.filtered.len(),
            start_time.elapsed().as_millis()
        );
        self.update_uidata();
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering cmd mode {mode:?}");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.input.clear();
        self.input.set(&self.search_term);
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if self.last_input.changed {
            self.search_term = self.last_input.input.clone();
            self.last_keystroke = Some(Instant::now());
        }

        if self.last_input.finished {
            self.modus = self.previous_modus;
            if self.last_input.canceled {
                self.clear_search();
            } else {
                self.submit_search();
            }
        }
    }

    /// Applies the term right away: in memory, or as a server side search.
    fn submit_search(&mut self) {
        self.last_keystroke = None;
        if self.config.remote_search {
            let term = self.search_term.trim().to_string();
            self.search_generation += 1;
            if term.is_empty() {
                self.remote_results = None;
                self.applied_term.clear();
                self.recompute();
            } else {
                self.status = Status::SEARCHING;
                self.set_status_message(format!("Searching {term:?} ..."));
                self.worker.search(self.search_generation, term);
            }
        } else if self.search_term != self.applied_term {
            self.applied_term = self.search_term.clone();
            self.recompute();
        }
    }

    fn clear_search(&mut self) {
        self.search_term.clear();
        self.last_keystroke = None;
        if self.applied_term.is_empty() && self.remote_results.is_none() {
            return;
        }
        self.search_generation += 1;
        self.applied_term.clear();
        self.remote_results = None;
        if self.status == Status::SEARCHING {
            self.status = Status::READY;
        }
        self.recompute();
    }

    /// Local search follows typing once input has been idle for the debounce delay.
    fn apply_debounced_search(&mut self) {
        if self.config.remote_search {
            return;
        }
        let Some(last) = self.last_keystroke else {
            return;
        };
        if last.elapsed() < Duration::from_millis(self.config.debounce_ms) {
            return;
        }
        self.last_keystroke = None;
        if self.search_term != self.applied_term {
            trace!("Debounced search {:?}", self.search_term);
            self.applied_term = self.search_term.clone();
            self.recompute();
        }
    }

    pub fn set_filter(&mut self, kind: FilterKind, value: Option<FilterValue>) {
        debug!("Filter {:?} = {:?}", kind, value);
        self.filters.set(kind, value);
        self.recompute();
    }

    // Cycles through "all" followed by the offered options.
    fn cycle_filter(&mut self, step: isize) {
        let kind = FilterKind::ALL[self.filter_curser];
        let mut choices: Vec<Option<FilterValue>> = vec![None];
        choices.extend(self.options.get(kind).iter().cloned().map(Some));

        let current = self.filters.get(kind).cloned();
        let pos = choices.iter().position(|c| *c == current).unwrap_or(0) as isize;
        let n = choices.len() as isize;
        let next = (pos + step).rem_euclid(n) as usize;
        self.set_filter(kind, choices[next].clone());
    }

    fn toggle_column(&mut self) {
        if let Some(&column) = ViewColumn::all().get(self.column_curser) {
            self.columns.toggle(column);
        }
    }

    fn change_page(&mut self, step: fn(&mut Pagination) -> bool) {
        if step(&mut self.pagination) {
            self.curser_row = 0;
        }
    }

    fn move_selection_down(&mut self) {
        let visible = self.pagination.range().len();
        if self.curser_row + 1 < visible {
            self.curser_row += 1;
        }
    }

    fn move_selection_up(&mut self) {
        self.curser_row = self.curser_row.saturating_sub(1);
    }

    fn export_scope(&self) -> (ExportScope, usize) {
        let scope = ExportScope::determine(&self.applied_term, &self.filters);
        let count = if scope.uses_filtered_rows() {
            self.filtered.len()
        } else {
            self.records.len()
        };
        (scope, count)
    }

    /// Exports the filtered set when a search or filter is active, the full set otherwise.
    pub fn export(&mut self) {
        let (scope, _) = self.export_scope();
        let records: Vec<&Record> = if scope.uses_filtered_rows() {
            self.filtered()
        } else {
            self.records.iter().collect()
        };
        let today = self.today();
        let filename = scope.filename(today);
        let columns = self.columns.ordered();

        match export_csv(&records, &columns, &self.config.export_dir, &filename, today) {
            Ok(path) => {
                let message = format!("Exported {} records to {}", records.len(), path.display());
                self.set_status_message(message);
            }
            Err(BrowserError::NothingToExport) => {
                self.show_popup("Export", BrowserError::NothingToExport.to_string());
            }
            Err(e) => {
                error!("Export to {filename} failed: {e}");
                self.set_status_message(format!("Export failed: {e}"));
            }
        }
    }

    fn update_uidata(&mut self) {
        let today = self.today();
        let columns = self.columns.ordered();
        let visible = self.visible();

        let headers: Vec<String> = columns.iter().map(|c| c.label().to_string()).collect();
        let rows: Vec<Vec<String>> = visible
            .iter()
            .map(|r| columns.iter().map(|&c| cell(r, c, today)).collect())
            .collect();
        let status_column = columns.iter().position(|&c| c == ViewColumn::Status);
        let row_status: Vec<PermitStatus> = match status_column {
            Some(_) => visible.iter().map(|r| classify(r, today)).collect(),
            None => Vec::new(),
        };
        let widths = headers
            .iter()
            .enumerate()
            .map(|(cidx, h)| {
                rows.iter()
                    .map(|r| r[cidx].chars().count())
                    .chain(std::iter::once(h.chars().count()))
                    .max()
                    .unwrap_or(0)
                    .min(self.config.max_column_width)
            })
            .collect();

        let filters = FilterKind::ALL
            .iter()
            .map(|&k| {
                let value = self
                    .filters
                    .get(k)
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "All".to_string());
                (k.label().to_string(), value, self.options.get(k).len())
            })
            .collect();
        let column_choices = ViewColumn::all()
            .into_iter()
            .map(|c| (c.label().to_string(), self.columns.contains(c)))
            .collect();

        let (scope, count) = self.export_scope();
        let loading = match self.status {
            Status::LOADING => Some("Loading records ...".to_string()),
            Status::SEARCHING => Some("Searching ...".to_string()),
            _ => None,
        };

        self.uidata = UIData {
            name: "Archaeological research permits".to_string(),
            total_records: self.records.len(),
            last_updated: self.last_updated.clone(),
            loading,
            headers,
            widths,
            rows,
            row_status,
            status_column,
            selected_row: self.curser_row,
            filtered_count: self.filtered.len(),
            page: self.pagination.page(),
            total_pages: self.pagination.total_pages(),
            page_window: self.pagination.window(),
            search_term: self.search_term.clone(),
            cmdinput: self.last_input.clone(),
            active_cmdinput: self.modus == Modus::CMDINPUT,
            cmd_mode: (self.modus == Modus::CMDINPUT).then_some(CMDMode::Search),
            filters,
            filter_curser: (self.modus == Modus::FILTERS).then_some(self.filter_curser),
            column_choices,
            column_curser: (self.modus == Modus::COLUMNS).then_some(self.column_curser),
            show_popup: self.modus == Modus::POPUP,
            popup_title: self.popup_title.clone(),
            popup_message: self.popup_message.clone(),
            export_hint: scope.describe(count),
            status_message: self.status_message.clone(),
            last_update: Instant::now(),
        };
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{Receiver, channel};

    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    use super::*;
    use crate::domain::SourceConfig;
    use crate::record::ColumnId;
    use crate::source::{MemorySource, OrderBy};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn records() -> Vec<Record> {
        vec![
            Record {
                id: Some(1),
                ..Record::default()
                    .with(ColumnId::Year, "2020")
                    .with(ColumnId::Unit, "IPHAN-SP")
                    .with(ColumnId::Project, "Levantamento São Paulo")
                    .with(ColumnId::ExpirationDate, "01/01/2030")
            },
            Record {
                id: Some(2),
                ..Record::default()
                    .with(ColumnId::Year, "2021")
                    .with(ColumnId::Unit, "IPHAN-MG")
                    .with(ColumnId::Project, "Resgate Ouro Preto")
                    .with(ColumnId::ExpirationDate, "01/01/2020")
            },
            Record {
                id: Some(3),
                ..Record::default()
                    .with(ColumnId::Year, "2021")
                    .with(ColumnId::Type, "Portaria de Revogação")
                    .with(ColumnId::Project, "Monitoramento")
            },
        ]
    }

    fn model(config: BrowserConfig) -> (Model, Receiver<Message>) {
        let (tx, rx) = channel();
        let fetcher = PagedFetcher::new(
            Box::new(MemorySource::new(records())),
            OrderBy {
                column: "id".into(),
                ascending: true,
            },
            2,
        );
        let mut model = Model::init(&config, Worker::new(fetcher, tx));
        model.pin_today(today());
        (model, rx)
    }

    fn config() -> BrowserConfig {
        BrowserConfig::new(SourceConfig::File("unused.csv".into()))
            .with_page_size(1)
            .with_debounce_ms(0)
    }

    /// Runs the background fetch and feeds its messages back to the model.
    fn loaded(config: BrowserConfig) -> (Model, Receiver<Message>) {
        let (mut model, rx) = model(config);
        model.load();
        assert_eq!(model.status, Status::LOADING);
        for _ in 0..2 {
            let msg = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            model.update(Some(msg)).unwrap();
        }
        (model, rx)
    }

    fn type_text(model: &mut Model, text: &str) {
        for c in text.chars() {
            let key = KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);
            model.update(Some(Message::RawKey(key))).unwrap();
        }
    }

    fn press(model: &mut Model, code: KeyCode) {
        let key = KeyEvent::new(code, KeyModifiers::NONE);
        model.update(Some(Message::RawKey(key))).unwrap();
    }

    #[test]
    fn load_sorts_and_paginates() {
        let (model, _rx) = loaded(config());
        assert_eq!(model.status, Status::READY);
        assert_eq!(model.records().len(), 3);
        // newest year first
        assert_eq!(model.records()[0].year, Some(2021));
        assert_eq!(model.pagination().total_pages(), 3);
        assert_eq!(model.visible().len(), 1);
        assert_eq!(model.get_uidata().export_hint, "Export all data (3 records)");
    }

    #[test]
    fn debounced_local_search_resets_page() {
        let (mut model, _rx) = loaded(config());
        model.update(Some(Message::NextPage)).unwrap();
        assert_eq!(model.pagination().page(), 2);

        model.update(Some(Message::Search)).unwrap();
        assert!(model.raw_keyevents());
        type_text(&mut model, "sao paulo");
        // idle tick applies the term
        model.update(None).unwrap();
        assert_eq!(model.applied_term(), "sao paulo");
        assert_eq!(model.filtered().len(), 1);
        assert_eq!(model.pagination().page(), 1);

        press(&mut model, KeyCode::Esc);
        assert!(!model.raw_keyevents());
        assert_eq!(model.filtered().len(), 3);
    }

    #[test]
    fn typed_search_waits_for_debounce_delay() {
        let (mut model, _rx) = loaded(config().with_debounce_ms(300));
        model.update(Some(Message::Search)).unwrap();
        type_text(&mut model, "ouro");

        model.update(None).unwrap();
        assert_eq!(model.applied_term(), "");
        assert_eq!(model.filtered().len(), 3);

        std::thread::sleep(Duration::from_millis(350));
        model.update(None).unwrap();
        assert_eq!(model.applied_term(), "ouro");
        assert_eq!(model.filtered().len(), 1);
    }

    #[test]
    fn filter_year_scenario() {
        let (mut model, _rx) = loaded(config());
        model.set_filter(FilterKind::Year, Some(FilterValue::Value("2021".into())));
        assert_eq!(model.filtered().len(), 2);
        assert_eq!(model.pagination().total_pages(), 2);
        assert_eq!(model.get_uidata().export_hint, "Export filtered results (2 records)");
    }

    #[test]
    fn filter_panel_cycles_options_with_cascade() {
        let (mut model, _rx) = loaded(config());
        model.update(Some(Message::Filters)).unwrap();
        let counts: Vec<usize> = model.get_uidata().filters.iter().map(|f| f.2).collect();
        // years 2021, 2020 and units Not informed, IPHAN-MG, IPHAN-SP
        assert_eq!(&counts[..2], &[2, 3]);
        model.update(Some(Message::NextItem)).unwrap();
        model.update(Some(Message::NextOption)).unwrap();
        // unit options: Not informed, IPHAN-MG, IPHAN-SP
        assert_eq!(model.filters().get(FilterKind::Unit), Some(&FilterValue::NotInformed));
        assert_eq!(model.filtered().len(), 1);

        model.update(Some(Message::PreviousItem)).unwrap();
        model.update(Some(Message::NextOption)).unwrap();
        assert_eq!(
            model.filters().get(FilterKind::Year),
            Some(&FilterValue::Value("2021".into()))
        );
        assert_eq!(model.filters().get(FilterKind::Unit), None);

        model.update(Some(Message::ClearItem)).unwrap();
        assert!(!model.filters().is_active());
        model.update(Some(Message::Exit)).unwrap();
        assert_eq!(model.modus(), Modus::TABLE);
    }

    #[test]
    fn columns_toggle_and_status_first() {
        let (mut model, _rx) = loaded(config());
        assert_eq!(model.get_uidata().headers[0], "Status");
        model.update(Some(Message::Columns)).unwrap();
        // first entry of the chooser is the year column
        model.update(Some(Message::Toggle)).unwrap();
        assert!(!model.columns().contains(ViewColumn::Field(ColumnId::Year)));
        assert!(!model.get_uidata().headers.contains(&"Year".to_string()));
    }

    #[test]
    fn export_writes_filtered_rows() {
        let dir = tempfile::tempdir().unwrap();
        let (mut model, _rx) = loaded(config().with_export_dir(dir.path().to_path_buf()));
        model.set_filter(FilterKind::Status, Some(FilterValue::Value("Revoked".into())));
        model.update(Some(Message::Export)).unwrap();

        let path = dir.path().join("permits_filtered_2025-06-15.csv");
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().nth(1).unwrap().starts_with("\"Revoked\""));
    }

    #[test]
    fn empty_export_shows_notice() {
        let dir = tempfile::tempdir().unwrap();
        let (mut model, _rx) = loaded(config().with_export_dir(dir.path().to_path_buf()));
        model.set_filter(FilterKind::Unit, Some(FilterValue::Value("nowhere".into())));
        model.update(Some(Message::Export)).unwrap();
        assert_eq!(model.modus(), Modus::POPUP);
        assert!(model.get_uidata().show_popup);
        model.update(Some(Message::Enter)).unwrap();
        assert_eq!(model.modus(), Modus::TABLE);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn remote_search_on_enter_and_stale_results_dropped() {
        let (mut model, rx) = loaded(config().with_remote_search(true));
        model.update(Some(Message::Search)).unwrap();
        type_text(&mut model, "ouro");
        model.update(None).unwrap();
        // no debounce in remote mode
        assert_eq!(model.applied_term(), "");
        press(&mut model, KeyCode::Enter);
        assert_eq!(model.status, Status::SEARCHING);

        let msg = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        model.update(Some(msg)).unwrap();
        assert_eq!(model.status, Status::READY);
        assert_eq!(model.applied_term(), "ouro");
        assert_eq!(model.filtered().len(), 1);

        model
            .update(Some(Message::SearchLoaded(0, "old".into(), records())))
            .unwrap();
        assert_eq!(model.applied_term(), "ouro");
        assert_eq!(model.filtered().len(), 1);

        model.update(Some(Message::Exit)).unwrap();
        assert_eq!(model.filtered().len(), 3);
    }
}
