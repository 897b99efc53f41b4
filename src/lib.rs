//! parkmon - live tables over a parking-garage management backend
//!
//! Screens poll one backend collection each, then filter, sort (newest
//! first) and paginate the snapshot locally.

pub mod api;
pub mod display;
pub mod event;
pub mod formatting;
pub mod logging;
pub mod models;
pub mod poller;
pub mod table;
pub mod watch;
