//! Event types for watch mode
//!
//! Watch mode runs a dual-channel event loop:
//! - InputEvent: priority channel for key presses (never dropped)
//! - DataEvent: poller results (may be dropped under backpressure; the next
//!   tick carries a full snapshot anyway)

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::models::Row;
use crate::poller::FetchError;
use crate::table::Snapshot;

/// Input events from the terminal
#[derive(Debug, Clone)]
pub enum InputEvent {
    Key(KeyEvent),
    /// Terminal resize (columns, rows)
    Resize(u16, u16),
}

/// Results delivered by the poller
#[derive(Debug, Clone)]
pub enum DataEvent {
    SnapshotUpdated(Snapshot<Row>),
    FetchFailed(FetchError),
}

/// Result of processing an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    /// Continue running, screen needs redraw
    Continue,
    /// Continue running, nothing changed
    Unchanged,
    /// Ask the poller for an immediate fetch
    Refresh,
    /// Leave watch mode
    Quit,
}

/// Key action mappings for watch mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    Refresh,
    Quit,
}

impl KeyAction {
    /// Map a key press to an action. Key releases and repeats are ignored.
    #[must_use]
    pub fn from_key(key: &KeyEvent) -> Option<Self> {
        if key.kind != KeyEventKind::Press {
            return None;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') => Some(Self::Quit),
                _ => None,
            };
        }

        match key.code {
            KeyCode::Char('n') | KeyCode::Right | KeyCode::PageDown => Some(Self::NextPage),
            KeyCode::Char('p') | KeyCode::Left | KeyCode::PageUp => Some(Self::PrevPage),
            KeyCode::Char('g') | KeyCode::Home => Some(Self::FirstPage),
            KeyCode::Char('G') | KeyCode::End => Some(Self::LastPage),
            KeyCode::Char('r') => Some(Self::Refresh),
            KeyCode::Char('q') | KeyCode::Esc => Some(Self::Quit),
            _ => None,
        }
    }
}
