//! Watch mode: a continuously refreshed table in the alternate screen.
//!
//! The poller pushes snapshots and errors into a data channel; a separate
//! input task feeds key presses into a priority channel. The event loop
//! drains both with `tokio::select!` biased toward input, applies each event
//! to the [`WatchApp`] state and redraws the whole frame when it changed.

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use crossterm::{
    cursor::{Hide, Show},
    event::{Event, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::display::{format_view, DisplayOptions};
use crate::event::{DataEvent, EventResult, InputEvent, KeyAction};
use crate::models::{Row, ScreenConfig};
use crate::poller::{poll, CollectionSource};
use crate::table::LiveFilteredTable;

/// Channel capacities
const INPUT_CHANNEL_CAPACITY: usize = 16;
const DATA_CHANNEL_CAPACITY: usize = 8;

/// How long shutdown waits for the input task
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Terminal capability requirements for watch mode
#[derive(Debug)]
pub struct TerminalCapabilities {
    pub is_tty: bool,
    pub term_type: String,
}

impl TerminalCapabilities {
    pub fn detect() -> Self {
        Self {
            is_tty: io::stdout().is_terminal(),
            term_type: std::env::var("TERM").unwrap_or_default(),
        }
    }

    fn supports_alternate_screen(&self) -> bool {
        !matches!(self.term_type.as_str(), "dumb" | "" | "unknown")
    }

    pub fn is_suitable(&self) -> bool {
        self.is_tty && self.supports_alternate_screen()
    }

    pub fn error_message(&self) -> String {
        if !self.is_tty {
            "Watch mode requires an interactive terminal (stdout is not a TTY).\n\
             Hint: drop --watch to print a single table instead."
                .to_string()
        } else {
            format!(
                "Terminal type '{}' may not support watch mode.\n\
                 Hint: Set TERM to a supported value (e.g., xterm-256color).",
                if self.term_type.is_empty() { "(unset)" } else { &self.term_type }
            )
        }
    }
}

/// State of one watched screen.
pub struct WatchApp {
    pub screen: ScreenConfig,
    pub table: LiveFilteredTable<Row>,
    pub options: DisplayOptions,
    pub interval: Duration,
    /// Page requested on the command line, applied once the first rows arrive
    initial_page: Option<usize>,
}

impl WatchApp {
    pub fn new(
        screen: ScreenConfig,
        table: LiveFilteredTable<Row>,
        options: DisplayOptions,
        interval: Duration,
    ) -> Self {
        Self {
            screen,
            table,
            options,
            interval,
            initial_page: None,
        }
    }

    #[must_use]
    pub fn with_initial_page(mut self, page: Option<usize>) -> Self {
        self.initial_page = page;
        self
    }

    pub fn handle_input(&mut self, event: InputEvent) -> EventResult {
        match event {
            InputEvent::Resize(_, _) => EventResult::Continue,
            InputEvent::Key(key) => {
                let Some(action) = KeyAction::from_key(&key) else {
                    return EventResult::Unchanged;
                };
                let before = self.table.page_state();
                match action {
                    KeyAction::NextPage => self.table.next_page(),
                    KeyAction::PrevPage => self.table.prev_page(),
                    KeyAction::FirstPage => self.table.set_page(1),
                    KeyAction::LastPage => self.table.set_page(usize::MAX),
                    KeyAction::Refresh => return EventResult::Refresh,
                    KeyAction::Quit => return EventResult::Quit,
                }
                if self.table.page_state() == before {
                    EventResult::Unchanged
                } else {
                    EventResult::Continue
                }
            }
        }
    }

    pub fn handle_data(&mut self, event: DataEvent) -> EventResult {
        match event {
            DataEvent::SnapshotUpdated(snapshot) => {
                self.table.apply_snapshot(snapshot);
                if let Some(page) = self.initial_page.take() {
                    self.table.set_page(page);
                }
            }
            DataEvent::FetchFailed(error) => self.table.record_error(error),
        }
        EventResult::Continue
    }

    /// Full frame: the view plus the key help footer.
    pub fn frame(&self) -> String {
        let view = format_view(&self.screen, &self.table, &self.options, Some(self.interval));
        format!(
            "{}\n\n{}",
            view, "n/p: page | g/G: first/last | r: refresh | q: quit"
        )
    }
}

/// Spawn the terminal input reader task
fn spawn_input_task(tx: mpsc::Sender<InputEvent>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = EventStream::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe_event = reader.next() => {
                    match maybe_event {
                        Some(Ok(event)) => {
                            let input_event = match event {
                                Event::Key(key) => Some(InputEvent::Key(key)),
                                Event::Resize(w, h) => Some(InputEvent::Resize(w, h)),
                                _ => None,
                            };
                            if let Some(evt) = input_event
                                && tx.send(evt).await.is_err()
                            {
                                break; // Receiver dropped
                            }
                        }
                        Some(Err(e)) => {
                            let is_fatal = matches!(
                                e.kind(),
                                io::ErrorKind::BrokenPipe
                                    | io::ErrorKind::ConnectionReset
                                    | io::ErrorKind::UnexpectedEof
                            );
                            if is_fatal {
                                tracing::info!("Terminal disconnected: {:?}", e);
                                break;
                            }
                            tracing::warn!("Terminal event read error: {:?}", e);
                        }
                        None => break, // Stream ended
                    }
                }
            }
        }
    })
}

/// Main event loop.
///
/// `refresh_fn` is called for [`EventResult::Refresh`]; `render_fn` whenever
/// the state changed. Returns the final state when the user quits or both
/// channels close.
pub async fn run_event_loop(
    mut app: WatchApp,
    mut input_rx: mpsc::Receiver<InputEvent>,
    mut data_rx: mpsc::Receiver<DataEvent>,
    mut refresh_fn: impl FnMut(),
    mut render_fn: impl FnMut(&WatchApp) -> Result<()>,
) -> Result<WatchApp> {
    let mut needs_render = true;

    loop {
        if needs_render {
            render_fn(&app)?;
            needs_render = false;
        }

        let result = tokio::select! {
            // Bias toward input so key presses are not starved by data
            biased;

            Some(input) = input_rx.recv() => app.handle_input(input),
            Some(data) = data_rx.recv() => app.handle_data(data),
            else => break,
        };

        match result {
            EventResult::Continue => needs_render = true,
            EventResult::Unchanged => {}
            EventResult::Refresh => refresh_fn(),
            EventResult::Quit => break,
        }
    }

    Ok(app)
}

/// Write one frame with a synchronized update (DEC private mode 2026).
///
/// Raw mode disables newline translation, so lines end with `\r\n`.
fn draw_frame(stdout: &mut io::Stdout, frame: &str) -> Result<()> {
    let body = frame.replace('\n', "\x1B[K\r\n");
    write!(stdout, "\x1B[?2026h")?; // Begin synchronized update
    write!(stdout, "\x1B[H{}\x1B[J", body)?;
    write!(stdout, "\x1B[?2026l")?; // End synchronized update
    stdout.flush()?;
    Ok(())
}

fn setup_terminal() -> Result<()> {
    enter_screen(
        enable_raw_mode,
        || execute!(io::stdout(), EnterAlternateScreen, Hide),
        disable_raw_mode,
    )
}

/// Enter raw mode, then the alternate screen; leave raw mode again if the
/// second step fails so the shell is not left unusable.
fn enter_screen(
    raw: impl FnOnce() -> io::Result<()>,
    screen: impl FnOnce() -> io::Result<()>,
    undo_raw: impl FnOnce() -> io::Result<()>,
) -> Result<()> {
    raw()?;
    if let Err(e) = screen() {
        if let Err(undo) = undo_raw() {
            tracing::warn!("Failed to leave raw mode: {}", undo);
        }
        return Err(e.into());
    }
    Ok(())
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), Show, LeaveAlternateScreen)?;
    Ok(())
}

/// Watch `app.screen` until the user quits.
pub async fn run<S>(source: Arc<S>, app: WatchApp) -> Result<()>
where
    S: CollectionSource<Row = Row>,
{
    let capabilities = TerminalCapabilities::detect();
    if !capabilities.is_suitable() {
        bail!("{}", capabilities.error_message());
    }

    let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
    let (data_tx, data_rx) = mpsc::channel(DATA_CHANNEL_CAPACITY);

    let snapshot_tx = data_tx.clone();
    let poller = poll(
        source,
        &app.screen.collection,
        app.interval,
        move |snapshot| {
            if snapshot_tx.try_send(DataEvent::SnapshotUpdated(snapshot)).is_err() {
                tracing::debug!("Dropping snapshot (channel full)");
            }
        },
        move |error| {
            if data_tx.try_send(DataEvent::FetchFailed(error)).is_err() {
                tracing::warn!("Could not send fetch error notification (channel full)");
            }
        },
    );

    setup_terminal()?;

    let cancel = CancellationToken::new();
    let input_task = spawn_input_task(input_tx, cancel.clone());

    let mut stdout = io::stdout();
    let result = run_event_loop(
        app,
        input_rx,
        data_rx,
        || poller.refresh(),
        |app| draw_frame(&mut stdout, &app.frame()),
    )
    .await;

    // Stop polling before the terminal goes back to normal
    poller.shutdown().await;
    cancel.cancel();
    if tokio::time::timeout(SHUTDOWN_GRACE, input_task).await.is_err() {
        tracing::debug!("Input task did not stop in time");
    }

    restore_terminal()?;

    println!("Watch mode stopped.");

    result.map(|_| ())
}
