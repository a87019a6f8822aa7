//! Karaoke signup line run by two Telegram bots.
//!
//! Singers open a deep link from the songbook (`/start <song id>`), type their
//! name, and wait in line. Hosts use a separate admin bot to view the line,
//! open or close signup, and clear it.

#![deny(missing_docs)]

/// Telegram handlers and reply rendering
pub mod bot;
/// Songbook CSV loading
pub mod catalog;
/// Settings and constants
pub mod config;
/// In-memory karaoke line
pub mod queue;
/// Dispatcher wiring
pub mod runner;
/// Text and retry helpers
pub mod utils;
