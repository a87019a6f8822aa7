//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! the bot-wide constants.

use chrono::{FixedOffset, Offset, Utc};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Usernames allowed to use the admin bot when `ADMIN_USERNAMES` is not set.
pub const DEFAULT_ADMIN_USERNAMES: &[&str] = &["sukalov"];

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token of the client (singer-facing) bot
    pub bot_token: String,

    /// Telegram Bot API token of the admin bot
    pub admin_bot_token: String,

    /// Comma-separated list of Telegram usernames allowed to use the admin bot
    #[serde(rename = "admin_usernames")]
    pub admin_usernames_str: Option<String>,

    /// Chat that receives "user left the line" notifications
    pub notify_chat_id: Option<i64>,

    /// Path to the songbook CSV file
    #[serde(default = "default_songbook_path")]
    pub songbook_path: String,

    /// Public songbook page shown to users who arrive without a song id
    pub songbook_url: Option<String>,

    /// UTC offset (hours) used when displaying join times
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

fn default_songbook_path() -> String {
    "songbook.csv".to_string()
}

const fn default_utc_offset_hours() -> i32 {
    3
}

/// Build the layered configuration source shared by all settings loaders.
///
/// # Errors
///
/// Returns a `ConfigError` if a present config file cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg.. `APP__SONGBOOK_PATH=songs.csv ./target/app`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Plain UPPER_SNAKE_CASE variables map to snake_case keys;
        // empty values are treated as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use karaoke_queue_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or a required token is missing.
    pub fn new() -> Result<Self, ConfigError> {
        let settings: Self = build_config()?.try_deserialize()?;

        if settings.bot_token.trim().is_empty() {
            return Err(ConfigError::Message("BOT_TOKEN is empty".into()));
        }
        if settings.admin_bot_token.trim().is_empty() {
            return Err(ConfigError::Message("ADMIN_BOT_TOKEN is empty".into()));
        }

        Ok(settings)
    }

    /// Returns the set of usernames allowed to use the admin bot.
    ///
    /// Leading `@` is stripped and comparison is case-insensitive, so the
    /// usernames are returned lowercased.
    #[must_use]
    pub fn admin_usernames(&self) -> HashSet<String> {
        match self.admin_usernames_str.as_deref() {
            Some(raw) => raw
                .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                .map(normalize_username)
                .filter(|name| !name.is_empty())
                .collect(),
            None => DEFAULT_ADMIN_USERNAMES
                .iter()
                .map(|name| normalize_username(name))
                .collect(),
        }
    }

    /// Time zone used to render join times.
    ///
    /// Out-of-range offsets fall back to UTC.
    #[must_use]
    pub fn display_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours.saturating_mul(3600))
            .unwrap_or_else(|| Utc.fix())
    }
}

/// Normalize a Telegram username for allow-list comparison.
#[must_use]
pub fn normalize_username(name: &str) -> String {
    name.trim().trim_start_matches('@').to_lowercase()
}

/// Number of queue rows per Telegram message when rendering the line.
pub const LINE_PAGE_SIZE: usize = 20;
/// Typed names and contacts longer than this are clipped in `/line`.
pub const LINE_NAME_MAX_CHARS: usize = 64;

/// How long a `/clear_line` request waits for `/yes` before it expires.
pub const CLEAR_CONFIRMATION_TTL_SECS: u64 = 300;
/// Upper bound on simultaneously pending clear confirmations.
pub const CLEAR_CONFIRMATION_MAX_PENDING: u64 = 100;

/// Upper bound on waiting for the admin exit notice before replying to the user.
pub const ADMIN_NOTIFY_TIMEOUT_SECS: u64 = 5;

/// Cooldown period (seconds) between "not an admin" replies for same user.
/// Default: 20 minutes.
pub const UNAUTHORIZED_COOLDOWN_SECS: u64 = 1200;
/// Maximum cache capacity (number of entries).
pub const UNAUTHORIZED_CACHE_MAX_SIZE: u64 = 10_000;

/// Get unauthorized cooldown from env or default.
///
/// Environment variable: `UNAUTHORIZED_COOLDOWN_SECS`.
#[must_use]
pub fn get_unauthorized_cooldown() -> u64 {
    std::env::var("UNAUTHORIZED_COOLDOWN_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(UNAUTHORIZED_COOLDOWN_SECS)
}

/// Get unauthorized cache max size from env or default.
///
/// Environment variable: `UNAUTHORIZED_CACHE_MAX_SIZE`.
#[must_use]
pub fn get_unauthorized_cache_max_size() -> u64 {
    std::env::var("UNAUTHORIZED_CACHE_MAX_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(UNAUTHORIZED_CACHE_MAX_SIZE)
}

// Telegram API retry configuration
/// Retries after the first failed Telegram send
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Initial backoff between attempts
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Backoff ceiling
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn settings_with_admins(admins: Option<&str>) -> Settings {
        Settings {
            bot_token: "dummy".to_string(),
            admin_bot_token: "dummy_admin".to_string(),
            admin_usernames_str: admins.map(str::to_string),
            notify_chat_id: None,
            songbook_path: default_songbook_path(),
            songbook_url: None,
            utc_offset_hours: default_utc_offset_hours(),
        }
    }

    #[test]
    fn test_config_env_loading() -> Result<(), Box<dyn std::error::Error>> {
        env::set_var("BOT_TOKEN", "client_token");
        env::set_var("ADMIN_BOT_TOKEN", "admin_token");
        env::set_var("NOTIFY_CHAT_ID", "4242");
        env::set_var("SONGBOOK_URL", "");

        let settings = Settings::new()?;
        assert_eq!(settings.bot_token, "client_token");
        assert_eq!(settings.admin_bot_token, "admin_token");
        assert_eq!(settings.notify_chat_id, Some(4242));
        assert_eq!(settings.songbook_url, None);
        assert_eq!(settings.songbook_path, "songbook.csv");

        env::remove_var("BOT_TOKEN");
        env::remove_var("ADMIN_BOT_TOKEN");
        env::remove_var("NOTIFY_CHAT_ID");
        env::remove_var("SONGBOOK_URL");
        Ok(())
    }

    #[test]
    fn test_admin_list_parsing() {
        let settings = settings_with_admins(Some("alice, @Bob;carol  dave"));
        let admins = settings.admin_usernames();
        assert_eq!(admins.len(), 4);
        assert!(admins.contains("alice"));
        assert!(admins.contains("bob"));
        assert!(admins.contains("carol"));
        assert!(admins.contains("dave"));

        let settings = settings_with_admins(Some(" , ;"));
        assert!(settings.admin_usernames().is_empty());
    }

    #[test]
    fn test_admin_list_default() {
        let settings = settings_with_admins(None);
        let admins = settings.admin_usernames();
        assert_eq!(admins.len(), DEFAULT_ADMIN_USERNAMES.len());
        assert!(admins.contains("sukalov"));
    }

    #[test]
    fn test_display_offset() {
        let mut settings = settings_with_admins(None);
        assert_eq!(settings.display_offset().local_minus_utc(), 3 * 3600);

        settings.utc_offset_hours = -5;
        assert_eq!(settings.display_offset().local_minus_utc(), -5 * 3600);

        settings.utc_offset_hours = 99;
        assert_eq!(settings.display_offset().local_minus_utc(), 0);
    }
}
