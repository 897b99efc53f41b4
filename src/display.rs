//! Display and formatting functions for screens and their tables

use std::time::Duration;

use owo_colors::OwoColorize;
use serde_json::Value;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style, Width},
    Table, Tabled,
};

use crate::formatting::{
    format_interval, format_money, format_timestamp, layout, truncate_string,
};
use crate::models::{ColumnKind, ColumnSpec, DisplayConfig, Record, Row, ScreenConfig};
use crate::table::{LiveFilteredTable, LoadStatus, Page};

/// Rendering settings shared by every table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayOptions {
    pub date_format: String,
    pub max_cell_width: usize,
    pub pad_pages: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self::from(&DisplayConfig::default())
    }
}

impl From<&DisplayConfig> for DisplayOptions {
    fn from(config: &DisplayConfig) -> Self {
        Self {
            date_format: config.date_format.clone(),
            max_cell_width: usize::try_from(config.max_cell_width).unwrap_or(usize::MAX),
            pad_pages: config.pad_pages,
        }
    }
}

/// Plain text of one cell; missing values render as `-`.
pub fn format_cell<R: Record>(row: &R, column: &ColumnSpec, options: &DisplayOptions) -> String {
    let text = match column.kind {
        ColumnKind::Text => row.text(&column.field),
        ColumnKind::Timestamp => row
            .timestamp(&column.field)
            .map(|ts| format_timestamp(&ts, &options.date_format))
            .or_else(|| row.text(&column.field)),
        ColumnKind::Money => row
            .number(&column.field)
            .map(format_money)
            .or_else(|| row.text(&column.field)),
        ColumnKind::Bool => match row.value(&column.field) {
            Some(Value::Bool(true)) => Some("sí".to_string()),
            Some(Value::Bool(false)) => Some("no".to_string()),
            _ => row.text(&column.field),
        },
    };

    match text {
        Some(text) if !text.trim().is_empty() => truncate_string(text.trim(), options.max_cell_width),
        _ => layout::EMPTY_CELL.to_string(),
    }
}

/// Cell text with color applied by column kind
fn render_cell<R: Record>(row: &R, column: &ColumnSpec, options: &DisplayOptions) -> String {
    let text = format_cell(row, column, options);
    if text == layout::EMPTY_CELL {
        return text.bright_black().to_string();
    }

    match column.kind {
        ColumnKind::Bool => match row.value(&column.field) {
            Some(Value::Bool(true)) => text.green().to_string(),
            Some(Value::Bool(false)) => text.bright_black().to_string(),
            _ => text,
        },
        ColumnKind::Money if row.number(&column.field).is_some_and(|n| n < 0.0) => {
            text.red().to_string()
        }
        _ => text,
    }
}

fn style_table(table: &mut Table) {
    table
        .with(Style::rounded())
        .with(Width::wrap(layout::TABLE_WIDTH).keep_words(true))
        .with(Modify::new(Rows::first()).with(Alignment::center()));
}

/// Format one page of a screen as a table.
///
/// With `pad_pages`, short pages get blank rows so the table height stays
/// constant while paging or while the snapshot shrinks.
pub fn format_page<R: Record>(screen: &ScreenConfig, page: &Page<&R>, options: &DisplayOptions) -> String {
    if page.items.is_empty() && !options.pad_pages {
        return "No rows found".yellow().to_string();
    }

    let mut builder = Builder::default();
    builder.push_record(screen.columns.iter().map(|c| c.header.clone()));

    if options.pad_pages {
        for slot in page.padded() {
            match slot {
                Some(row) => builder.push_record(
                    screen.columns.iter().map(|c| render_cell(*row, c, options)),
                ),
                None => builder.push_record(screen.columns.iter().map(|_| String::new())),
            }
        }
    } else {
        for row in &page.items {
            builder.push_record(screen.columns.iter().map(|c| render_cell(*row, c, options)));
        }
    }

    let mut table = builder.build();
    style_table(&mut table);
    table.to_string()
}

/// Screen title plus the active search and filters.
pub fn format_title(screen: &ScreenConfig, table: &LiveFilteredTable<Row>) -> String {
    let mut title = screen.display_title().bold().to_string();

    if !table.search().trim().is_empty() {
        title.push_str(&format!("  {} \"{}\"", "search".cyan(), table.search().trim()));
    }

    let filters: Vec<String> = table
        .filters()
        .active()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    if !filters.is_empty() {
        title.push_str(&format!("  {} {}", "filters".cyan(), filters.join(", ")));
    }

    title
}

/// Status line: page position, row counts, freshness and the last error.
///
/// `interval` is the refresh period in watch mode, `None` for one-shot output.
pub fn format_status_line(table: &LiveFilteredTable<Row>, interval: Option<Duration>) -> String {
    let mut parts = Vec::new();

    match table.status() {
        LoadStatus::Idle | LoadStatus::Loading => parts.push("Loading...".yellow().to_string()),
        LoadStatus::Ready => {
            let page = table.page();
            parts.push(format!("Page {}/{}", page.page_number, page.total_pages));

            let total = table.snapshot().len();
            if page.total_rows == total {
                parts.push(format!("{} rows", total));
            } else {
                parts.push(format!("{} of {} rows", page.total_rows, total));
            }

            if let Some(updated) = table.last_updated() {
                parts.push(format!("updated {}", updated.format("%H:%M:%S")));
            }
        }
    }

    if let Some(interval) = interval {
        parts.push(format!("refresh every {}", format_interval(interval)));
    }

    let mut line = parts.join(" | ");

    if let Some(recorded) = table.last_error() {
        let error = format!(
            "last refresh failed at {} ({}): {}",
            recorded.at.format("%H:%M:%S"),
            recorded.error.kind(),
            recorded.error
        );
        line.push('\n');
        line.push_str(&error.red().to_string());
        if recorded.error.is_unauthorized() {
            line.push('\n');
            line.push_str(&unauthorized_hint().yellow().to_string());
        }
    }

    line
}

/// Hint shown when the backend rejects the token
#[must_use]
pub fn unauthorized_hint() -> &'static str {
    "Hint: set PARKMON_TOKEN, --token or api.token / api.token_file in the config"
}

/// Title, table and status line for one view.
pub fn format_view(
    screen: &ScreenConfig,
    table: &LiveFilteredTable<Row>,
    options: &DisplayOptions,
    interval: Option<Duration>,
) -> String {
    let mut output = String::new();
    output.push_str(&format_title(screen, table));
    output.push('\n');

    if table.status() == LoadStatus::Ready {
        output.push_str(&format_page(screen, &table.page(), options));
        output.push('\n');
    }

    output.push_str(&format_status_line(table, interval));
    output
}

/// Table row for the screen listing
#[derive(Tabled)]
struct ScreenRow {
    #[tabled(rename = "Screen")]
    name: String,

    #[tabled(rename = "Collection")]
    collection: String,

    #[tabled(rename = "Title")]
    title: String,

    #[tabled(rename = "Sorted by")]
    sorted_by: String,

    #[tabled(rename = "Filters")]
    filters: String,
}

/// Format the list of available screens
pub fn format_screens(screens: &[ScreenConfig]) -> String {
    if screens.is_empty() {
        return "No screens configured".yellow().to_string();
    }

    let rows: Vec<ScreenRow> = screens
        .iter()
        .map(|screen| ScreenRow {
            name: screen.name.clone(),
            collection: screen.collection.clone(),
            title: screen.display_title().to_string(),
            sorted_by: screen.schema.timestamp_field.clone(),
            filters: screen
                .schema
                .filters
                .iter()
                .map(|f| format!("{} ({})", f.key, f.kind.as_str()))
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();

    let mut table = Table::new(rows);
    style_table(&mut table);
    table.to_string()
}

/// Strip ANSI escape codes from a string
#[must_use]
pub fn strip_ansi(s: &str) -> String {
    let mut result = String::new();
    let mut in_escape = false;

    for ch in s.chars() {
        if ch == '\x1b' {
            in_escape = true;
        } else if in_escape && ch == 'm' {
            in_escape = false;
        } else if !in_escape {
            result.push(ch);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::builtin_screens;
    use crate::poller::FetchError;
    use serde_json::json;
    use std::num::NonZeroUsize;

    fn row(value: Value) -> Row {
        serde_json::from_value(value).unwrap()
    }

    fn column(field: &str, kind: ColumnKind) -> ColumnSpec {
        ColumnSpec {
            header: field.to_string(),
            field: field.to_string(),
            kind,
        }
    }

    fn movimientos() -> ScreenConfig {
        builtin_screens()
            .into_iter()
            .find(|s| s.name == "movimientos")
            .unwrap()
    }

    fn movimiento(i: usize) -> Row {
        row(json!({
            "_id": format!("m{}", i),
            "patente": format!("AB{:03}CD", i),
            "tipoVehiculo": "auto",
            "metodoPago": "Efectivo",
            "monto": 1500 + i,
            "createdAt": format!("2024-03-01T10:{:02}:00", i),
        }))
    }

    fn ready_table(count: usize) -> LiveFilteredTable<Row> {
        let screen = movimientos();
        let mut table = LiveFilteredTable::new(screen.schema, NonZeroUsize::new(10).unwrap());
        table.apply_snapshot((0..count).map(movimiento).collect::<Vec<_>>());
        table
    }

    #[test]
    fn test_format_cell_kinds() {
        let options = DisplayOptions::default();
        let r = row(json!({
            "createdAt": "2024-03-01T09:05:00Z",
            "monto": 2500.5,
            "abonado": true,
            "patente": "AA123BB",
        }));

        assert_eq!(
            format_cell(&r, &column("createdAt", ColumnKind::Timestamp), &options),
            "01/03/2024 09:05"
        );
        assert_eq!(format_cell(&r, &column("monto", ColumnKind::Money), &options), "$2.500,50");
        assert_eq!(format_cell(&r, &column("abonado", ColumnKind::Bool), &options), "sí");
        assert_eq!(format_cell(&r, &column("patente", ColumnKind::Text), &options), "AA123BB");
    }

    #[test]
    fn test_format_cell_missing_and_unparseable() {
        let options = DisplayOptions::default();
        let r = row(json!({ "fin": "pronto", "nota": "  ", "extra": null }));

        assert_eq!(format_cell(&r, &column("fin", ColumnKind::Timestamp), &options), "pronto");
        assert_eq!(format_cell(&r, &column("nota", ColumnKind::Text), &options), "-");
        assert_eq!(format_cell(&r, &column("extra", ColumnKind::Text), &options), "-");
        assert_eq!(format_cell(&r, &column("nope", ColumnKind::Money), &options), "-");
    }

    #[test]
    fn test_format_cell_truncates() {
        let options = DisplayOptions {
            max_cell_width: 10,
            ..DisplayOptions::default()
        };
        let r = row(json!({ "descripcion": "Estadía por hora con lavado" }));
        assert_eq!(
            format_cell(&r, &column("descripcion", ColumnKind::Text), &options),
            "Estadía..."
        );
    }

    #[test]
    fn test_format_page_has_headers_and_rows() {
        let table = ready_table(3);
        let screen = movimientos();
        let output = strip_ansi(&format_page(&screen, &table.page(), &DisplayOptions::default()));

        assert!(output.contains("Patente"));
        assert!(output.contains("Monto"));
        assert!(output.contains("AB002CD"));
        assert!(output.contains("$1.502"));
        // Newest row comes first
        let newest = output.find("AB002CD").unwrap();
        let oldest = output.find("AB000CD").unwrap();
        assert!(newest < oldest);
    }

    #[test]
    fn test_format_page_empty() {
        let table = LiveFilteredTable::<Row>::new(movimientos().schema, NonZeroUsize::new(5).unwrap());
        let output = strip_ansi(&format_page(&movimientos(), &table.page(), &DisplayOptions::default()));
        assert_eq!(output, "No rows found");
    }

    #[test]
    fn test_format_page_padded_keeps_height() {
        let options = DisplayOptions {
            pad_pages: true,
            ..DisplayOptions::default()
        };
        let screen = movimientos();
        let short = ready_table(2);
        let full = ready_table(10);

        let short_lines = format_page(&screen, &short.page(), &options).lines().count();
        let full_lines = format_page(&screen, &full.page(), &options).lines().count();
        assert_eq!(short_lines, full_lines);
    }

    #[test]
    fn test_status_line_counts() {
        let mut table = ready_table(23);
        table.set_page(2);
        let line = strip_ansi(&format_status_line(&table, Some(Duration::from_secs(5))));
        assert!(line.starts_with("Page 2/3 | 23 rows | updated "));
        assert!(line.ends_with("refresh every 5s"));

        table.set_search("AB00");
        let line = strip_ansi(&format_status_line(&table, None));
        assert!(line.starts_with("Page 1/1 | 10 of 23 rows"));
        assert!(!line.contains("refresh"));
    }

    #[test]
    fn test_status_line_loading() {
        let mut table = LiveFilteredTable::<Row>::new(movimientos().schema, NonZeroUsize::new(5).unwrap());
        table.begin_loading();
        assert!(strip_ansi(&format_status_line(&table, None)).starts_with("Loading..."));
    }

    #[test]
    fn test_status_line_shows_error_and_hint() {
        let mut table = ready_table(3);
        table.record_error(FetchError::HttpStatus(401));
        let line = strip_ansi(&format_status_line(&table, None));

        assert!(line.contains("Page 1/1 | 3 rows"));
        assert!(line.contains("(http-status:401): server returned HTTP 401"));
        assert!(line.contains(unauthorized_hint()));

        table.record_error(FetchError::Network("connection refused".to_string()));
        let line = strip_ansi(&format_status_line(&table, None));
        assert!(line.contains("(network)"));
        assert!(!line.contains("Hint"));
    }

    #[test]
    fn test_format_title_lists_filters() {
        let mut table = ready_table(3);
        table.set_filter("tipo", "auto").unwrap();
        table.set_search("AB0");
        let title = strip_ansi(&format_title(&movimientos(), &table));
        assert_eq!(title, "Movimientos de caja  search \"AB0\"  filters tipo=auto");
    }

    #[test]
    fn test_format_screens() {
        let output = strip_ansi(&format_screens(&builtin_screens()));
        assert!(output.contains("cierresdecaja"));
        assert!(output.contains("hora (hour)"));
        assert_eq!(strip_ansi(&format_screens(&[])), "No screens configured");
    }

    #[test]
    fn test_strip_ansi() {
        let plain = "Hello World";
        assert_eq!(strip_ansi(plain), "Hello World");

        let colored = "\x1b[31mRed\x1b[0m Text";
        assert_eq!(strip_ansi(colored), "Red Text");
    }
}
