/// Admin bot commands and the clear-line console
pub mod admin;
/// Singer-facing bot commands and handlers
pub mod client;
/// Helpers shared by both bots
pub mod common;
/// Notices sent to the admin chat
pub mod notifier;
/// Retrying Telegram sends
pub mod resilient;
/// Throttle for "not an admin" replies
pub mod unauthorized_cache;
/// Reply texts
pub mod views;

pub use unauthorized_cache::UnauthorizedCache;
