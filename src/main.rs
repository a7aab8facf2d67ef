use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::sync::mpsc;

use clap::{Parser, Subcommand};
use ratatui::DefaultTerminal;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use permit_browser::controller::Controller;
use permit_browser::domain::{BrowserConfig, BrowserError, Result, SourceConfig};
use permit_browser::export::export_view;
use permit_browser::fetch::{PagedFetcher, sort_for_display};
use permit_browser::filter::{FilterKind, FilterState, FilterValue};
use permit_browser::model::{Model, Status, Worker};
use permit_browser::record::{ColumnSelection, ViewColumn};
use permit_browser::source;
use permit_browser::status::{PermitStatus, today};
use permit_browser::ui::UI;

/// Browse, search, filter and export archaeological research permits
#[derive(Parser, Debug)]
#[command(name = "permits", author, version, about, long_about = None)]
struct Args {
    /// Base URL of the hosted query service
    #[arg(long, env = "PERMITS_SERVICE_URL")]
    url: Option<String>,
    /// Access key of the hosted query service
    #[arg(long, env = "PERMITS_SERVICE_KEY", hide_env_values = true)]
    key: Option<String>,
    /// Table holding the permits
    #[arg(long, default_value = "banco_portarias_cna")]
    table: String,
    /// Unique column the paged fetch is ordered by
    #[arg(long, default_value = "id")]
    order_key: String,
    /// Fetch in descending key order
    #[arg(long)]
    descending: bool,
    /// Rows per range request
    #[arg(long, default_value_t = 1000)]
    chunk_size: usize,
    /// Rows per table page
    #[arg(long, default_value_t = 50)]
    page_size: usize,
    /// Idle time before a typed search is applied
    #[arg(long, default_value_t = 300)]
    debounce_ms: u64,
    /// Send searches to the service on Enter instead of filtering in memory
    #[arg(long)]
    remote_search: bool,
    /// Read a local CSV, Parquet or Arrow snapshot instead of the service
    #[arg(long)]
    file: Option<PathBuf>,
    /// Directory exports are written to
    #[arg(long, default_value = ".")]
    export_dir: String,
    /// UTC offset in hours used for the "last updated" date
    #[arg(long, default_value_t = -3, allow_negative_numbers = true)]
    utc_offset: i32,
    /// Log file, defaults to permits.log in the temp directory
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Terminal event poll interval
    #[arg(long, default_value_t = 100)]
    event_poll_ms: u64,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, search, filter and write a CSV without opening the browser
    Export {
        /// Free text search term
        #[arg(long)]
        search: Option<String>,
        /// Year filter (`none` for not informed)
        #[arg(long)]
        year: Option<String>,
        /// Issuing unit filter
        #[arg(long)]
        unit: Option<String>,
        /// Enterprise type filter
        #[arg(long)]
        enterprise_type: Option<String>,
        /// Permit type filter
        #[arg(long = "type")]
        kind: Option<String>,
        /// Status filter (Valid, Expired, Revoked, ...)
        #[arg(long)]
        status: Option<String>,
        /// Column ids or labels to export, comma separated
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(args: Args) -> Result<()> {
    let log_file = args
        .log_file
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("permits.log"));
    init_logging(&log_file)?;

    let config = browser_config(&args)?;
    info!("Starting permits with {:?}", config.source);

    match args.command {
        Some(Command::Export {
            search,
            year,
            unit,
            enterprise_type,
            kind,
            status,
            columns,
        }) => {
            let filters = filter_state([year, unit, enterprise_type, kind, status])?;
            let columns = column_selection(&columns)?;
            let path = headless_export(&config, search.as_deref().unwrap_or(""), &filters, &columns)?;
            println!("{}", path.display());
            Ok(())
        }
        None => browse(&config),
    }
}

fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn browser_config(args: &Args) -> Result<BrowserConfig> {
    let source = match (&args.file, &args.url, &args.key) {
        (Some(path), _, _) => SourceConfig::File(path.clone()),
        (None, Some(url), Some(key)) => SourceConfig::Remote {
            url: url.clone(),
            key: key.clone(),
            table: args.table.clone(),
        },
        _ => {
            return Err(BrowserError::InvalidConfig(
                "--url (PERMITS_SERVICE_URL) and --key (PERMITS_SERVICE_KEY) are required unless --file is given"
                    .to_string(),
            ));
        }
    };
    if args.chunk_size == 0 || args.page_size == 0 {
        return Err(BrowserError::InvalidConfig(
            "--chunk-size and --page-size must be at least 1".to_string(),
        ));
    }
    let export_dir = shellexpand::full(&args.export_dir)
        .map_err(|e| BrowserError::InvalidConfig(format!("--export-dir: {e}")))?;

    Ok(BrowserConfig::new(source)
        .with_order_key(args.order_key.clone())
        .with_order_ascending(!args.descending)
        .with_chunk_size(args.chunk_size)
        .with_page_size(args.page_size)
        .with_debounce_ms(args.debounce_ms)
        .with_remote_search(args.remote_search)
        .with_export_dir(PathBuf::from(export_dir.into_owned()))
        .with_utc_offset_hours(args.utc_offset)
        .with_event_poll_time(args.event_poll_ms))
}

/// Filter flags in cascade order.
fn filter_state(values: [Option<String>; 5]) -> Result<FilterState> {
    let mut state = FilterState::default();
    for (kind, raw) in FilterKind::ALL.into_iter().zip(values) {
        let value = match raw.as_deref().and_then(FilterValue::parse) {
            Some(FilterValue::Value(v)) if kind == FilterKind::Status => {
                let status = PermitStatus::from_label(&v).ok_or_else(|| {
                    BrowserError::InvalidConfig(format!("unknown status {v:?}"))
                })?;
                Some(FilterValue::Value(status.label().to_string()))
            }
            value => value,
        };
        state.set(kind, value);
    }
    Ok(state)
}

fn column_selection(names: &[String]) -> Result<Vec<ViewColumn>> {
    if names.is_empty() {
        return Ok(ColumnSelection::default().ordered());
    }
    let columns = names
        .iter()
        .map(|n| {
            ViewColumn::parse(n)
                .ok_or_else(|| BrowserError::InvalidConfig(format!("unknown column {n:?}")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ColumnSelection::new(columns).ordered())
}

fn headless_export(
    config: &BrowserConfig,
    search: &str,
    filters: &FilterState,
    columns: &[ViewColumn],
) -> Result<PathBuf> {
    let fetcher = PagedFetcher::from_config(source::from_config(config)?, config);
    let mut records = fetcher.fetch_all();
    sort_for_display(&mut records);
    export_view(&records, search, filters, columns, &config.export_dir, today())
}

fn browse(config: &BrowserConfig) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let fetcher = PagedFetcher::from_config(source::from_config(config)?, config);
    let mut model = Model::init(config, Worker::new(fetcher, tx));
    let ui = UI::new(config);
    let controller = Controller::new(config, rx);

    let mut terminal = ratatui::init();
    model.load();
    let result = event_loop(&mut terminal, &mut model, &ui, &controller);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    model: &mut Model,
    ui: &UI,
    controller: &Controller,
) -> Result<()> {
    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(model)?;
        model.update(message)?;
    }
    info!("Quitting");
    Ok(())
}
