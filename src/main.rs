//! parkmon - Live table monitor for a parking-garage backend

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use serde_json::Value;

use parkmon::api::ApiClient;
use parkmon::display::{self, DisplayOptions};
use parkmon::models::{Config, Row, ScreenConfig, MIN_REFRESH_INTERVAL_MS};
use parkmon::poller::FetchError;
use parkmon::table::LiveFilteredTable;
use parkmon::watch::{self, WatchApp};

#[derive(Parser)]
#[command(name = "parkmon")]
#[command(about = "Live table monitor for a parking-garage management backend", long_about = None)]
#[command(version)]
struct Cli {
    /// Backend root URL (overrides config and PARKMON_BASE_URL)
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    /// Bearer token (overrides config and PARKMON_TOKEN)
    #[arg(long, global = true, value_name = "TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show one page of a screen, or watch it live
    Show(ShowArgs),

    /// List available screens and their filters
    #[command(alias = "ls")]
    Screens,

    /// Create a row in a collection
    Create {
        /// Collection name (e.g. movimientos)
        collection: String,

        /// Row as a JSON object
        #[arg(short, long, value_name = "JSON")]
        data: String,
    },

    /// Update a row in a collection
    Update {
        /// Collection name (e.g. abonos)
        collection: String,

        /// Row identifier
        id: String,

        /// Changed fields as a JSON object
        #[arg(short, long, value_name = "JSON")]
        data: String,
    },
}

#[derive(Args)]
struct ShowArgs {
    /// Screen name (see `parkmon screens`)
    screen: String,

    /// Free-text search over the screen's search fields
    #[arg(short, long)]
    search: Option<String>,

    /// Filter as key=value; ranges as key=from..to (repeatable)
    #[arg(short, long, value_name = "KEY=VALUE")]
    filter: Vec<String>,

    /// Page number (1-based)
    #[arg(short, long)]
    page: Option<usize>,

    /// Rows per page (overrides display.page_size)
    #[arg(short = 'n', long)]
    page_size: Option<usize>,

    /// Pad short pages with blank rows
    #[arg(long)]
    pad: bool,

    /// Watch mode: refresh every N seconds (config interval if no value)
    #[arg(short, long, value_name = "SECONDS", num_args = 0..=1)]
    watch: Option<Option<f64>>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let watching = matches!(&cli.command, Some(Commands::Show(args)) if args.watch.is_some());
    if let Err(e) = parkmon::logging::init(watching) {
        eprintln!("{} {}", "Warning:".yellow(), e);
    }

    let (mut config, warnings) = Config::load().map_err(|e| anyhow!(e))?;
    for warning in &warnings {
        eprintln!("{} {}", "Warning:".yellow(), warning);
    }

    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }
    if let Some(token) = cli.token {
        config.api.token = Some(token);
    }

    let Some(command) = cli.command else {
        // Default: list screens
        println!("{}", display::format_screens(&config.all_screens()));
        return Ok(());
    };

    if let Commands::Screens = command {
        println!("{}", display::format_screens(&config.all_screens()));
        return Ok(());
    }

    let api = ApiClient::new(
        &config.api.base_url,
        config.api.resolve_token(),
        Duration::from_secs(config.api.timeout_secs),
    )?;
    tracing::debug!("Using backend {} (token: {})", api.base_url(), api.has_token());

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        match command {
            Commands::Show(args) => handle_show_command(api, &config, args).await,
            Commands::Create { collection, data } => {
                let body = parse_json_arg(&data)?;
                let response = api
                    .create(&collection, &body)
                    .await
                    .map_err(|e| fetch_error(e, &format!("create in '{}'", collection)))?;
                print_write_result(&api, &config, &collection, &response).await
            }
            Commands::Update { collection, id, data } => {
                let body = parse_json_arg(&data)?;
                let response = api
                    .update(&collection, &id, &body)
                    .await
                    .map_err(|e| fetch_error(e, &format!("update '{}' in '{}'", id, collection)))?;
                print_write_result(&api, &config, &collection, &response).await
            }
            Commands::Screens => Ok(()),
        }
    })
}

/// Attach context and, for 401, the token hint.
fn fetch_error(error: FetchError, action: &str) -> anyhow::Error {
    let unauthorized = error.is_unauthorized();
    let err = anyhow::Error::new(error).context(format!("failed to {}", action));
    if unauthorized {
        err.context(display::unauthorized_hint())
    } else {
        err
    }
}

fn find_screen(config: &Config, name: &str) -> Result<ScreenConfig> {
    config.screen(name).ok_or_else(|| {
        let known: Vec<String> = config.all_screens().into_iter().map(|s| s.name).collect();
        anyhow!("unknown screen '{}' (available: {})", name, known.join(", "))
    })
}

fn parse_filter_arg(arg: &str) -> Result<(&str, &str)> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => bail!("invalid filter '{}': expected key=value", arg),
    }
}

fn parse_json_arg(data: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(data).context("--data is not valid JSON")?;
    if !value.is_object() {
        bail!("--data must be a JSON object");
    }
    Ok(value)
}

fn watch_interval(config: &Config, seconds: Option<f64>) -> Result<Duration> {
    let interval = match seconds {
        Some(secs) => Duration::try_from_secs_f64(secs)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| anyhow!("--watch needs a positive number of seconds, got {}", secs))?,
        None => Duration::from_millis(config.refresh.interval_ms),
    };
    Ok(interval.max(Duration::from_millis(MIN_REFRESH_INTERVAL_MS)))
}

async fn handle_show_command(api: ApiClient, config: &Config, args: ShowArgs) -> Result<()> {
    let screen = find_screen(config, &args.screen)?;

    let page_size = args
        .page_size
        .unwrap_or_else(|| usize::try_from(config.display.page_size).unwrap_or(usize::MAX));
    let page_size = NonZeroUsize::new(page_size).context("--page-size must be at least 1")?;

    let mut table = LiveFilteredTable::new(screen.schema.clone(), page_size);
    if let Some(search) = &args.search {
        table.set_search(search);
    }
    for arg in &args.filter {
        let (key, value) = parse_filter_arg(arg)?;
        table.set_filter(key, value)?;
    }

    let mut options = DisplayOptions::from(&config.display);
    options.pad_pages |= args.pad;

    table.begin_loading();

    if let Some(seconds) = args.watch {
        let interval = watch_interval(config, seconds)?;
        let app = WatchApp::new(screen, table, options, interval).with_initial_page(args.page);
        return watch::run(Arc::new(api), app).await;
    }

    let rows: Vec<Row> = api
        .list(&screen.collection)
        .await
        .map_err(|e| fetch_error(e, &format!("fetch '{}'", screen.collection)))?;
    table.apply_snapshot(rows);
    if let Some(page) = args.page {
        table.set_page(page);
    }

    println!("{}", display::format_view(&screen, &table, &options, None));
    Ok(())
}

/// Print a write response, then the refreshed first page of the matching screen.
async fn print_write_result(
    api: &ApiClient,
    config: &Config,
    collection: &str,
    response: &Value,
) -> Result<()> {
    if response.is_null() {
        println!("{}", "Saved (no content returned).".green());
    } else {
        println!("{}", serde_json::to_string_pretty(response)?);
    }

    let Some(screen) = config
        .all_screens()
        .into_iter()
        .find(|s| s.collection.eq_ignore_ascii_case(collection))
    else {
        return Ok(());
    };

    let page_size = NonZeroUsize::new(usize::try_from(config.display.page_size).unwrap_or(1))
        .unwrap_or(NonZeroUsize::MIN);
    let mut table = LiveFilteredTable::new(screen.schema.clone(), page_size);
    match api.list::<Row>(&screen.collection).await {
        Ok(rows) => table.apply_snapshot(rows),
        Err(e) => {
            // The write went through; a failed refresh is only reported
            tracing::warn!("Refresh after write failed: {}", e);
            table.record_error(e);
        }
    }

    let options = DisplayOptions::from(&config.display);
    println!();
    println!("{}", display::format_view(&screen, &table, &options, None));
    Ok(())
}
