//! Admin bot: line inspection and signup control.
//!
//! Clearing is two-step. `/clear_line` parks a request for the admin who sent
//! it; only the same admin's `/yes` within [`CLEAR_CONFIRMATION_TTL_SECS`]
//! empties the store. `/no` drops the request.

use super::common::{get_user_id_safe, get_username};
use super::resilient::{send_html_resilient, send_pages, send_preformatted};
use super::views;
use super::UnauthorizedCache;
use crate::config::{
    normalize_username, Settings, CLEAR_CONFIRMATION_MAX_PENDING, CLEAR_CONFIRMATION_TTL_SECS,
    LINE_PAGE_SIZE,
};
use crate::queue::QueueStore;
use anyhow::Result;
use moka::future::Cache;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

/// Commands of the admin bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case", description = "Команды админа:")]
pub enum AdminCommand {
    /// Status and command list
    #[command(description = "помощь.")]
    Help,
    /// Same as `/help`
    #[command(description = "помощь.")]
    Start,
    /// Show the line
    #[command(description = "показать очередь.")]
    Line,
    /// Every session as JSON
    #[command(description = "все записи.")]
    Users,
    /// Ask to empty the line
    #[command(description = "очистить очередь.")]
    ClearLine,
    /// Confirm a pending clear
    #[command(description = "подтвердить очистку.")]
    Yes,
    /// Cancel a pending clear
    #[command(description = "отменить очистку.")]
    No,
    /// Accept new signups
    #[command(description = "открыть запись.")]
    Open,
    /// Stop accepting new signups
    #[command(description = "закрыть запись.")]
    Close,
}

/// Outcome of the clear confirmation steps
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearOutcome {
    /// Sender is not on the allow-list
    NotAdmin,
    /// Request parked, waiting for `/yes` or `/no`
    AwaitingConfirmation,
    /// Line emptied; number of sessions removed
    Cleared(usize),
    /// Pending request dropped
    Cancelled,
    /// `/yes` or `/no` without a pending request
    NothingPending,
}

impl ClearOutcome {
    /// Reply text for the admin
    #[must_use]
    pub fn reply(self) -> String {
        match self {
            Self::NotAdmin => views::NOT_ADMIN.to_string(),
            Self::AwaitingConfirmation => {
                "точно очистить очередь? /yes или /no".to_string()
            }
            Self::Cleared(removed) => format!("очередь очищена, удалено записей: {removed}"),
            Self::Cancelled => "ок, ничего не трогаю".to_string(),
            Self::NothingPending => "нечего подтверждать. сначала /clear_line".to_string(),
        }
    }
}

/// Allow-list plus per-admin pending clear requests
pub struct AdminConsole {
    admins: HashSet<String>,
    pending_clear: Cache<String, Instant>,
    confirmation_ttl: Duration,
}

impl AdminConsole {
    /// Build a console for the given (already normalized) usernames
    #[must_use]
    pub fn new(admins: HashSet<String>, confirmation_ttl: Duration) -> Self {
        let pending_clear = Cache::builder()
            .max_capacity(CLEAR_CONFIRMATION_MAX_PENDING)
            .time_to_live(confirmation_ttl)
            .build();
        Self {
            admins,
            pending_clear,
            confirmation_ttl,
        }
    }

    /// Console configured from settings
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.admin_usernames(),
            Duration::from_secs(CLEAR_CONFIRMATION_TTL_SECS),
        )
    }

    /// Whether the username is on the allow-list
    #[must_use]
    pub fn is_admin(&self, username: Option<&str>) -> bool {
        username.is_some_and(|name| self.admins.contains(&normalize_username(name)))
    }

    /// `/clear_line`
    pub async fn request_clear(&self, username: Option<&str>) -> ClearOutcome {
        let Some(key) = self.admin_key(username) else {
            return ClearOutcome::NotAdmin;
        };
        self.pending_clear.insert(key, Instant::now()).await;
        ClearOutcome::AwaitingConfirmation
    }

    /// `/yes`
    pub async fn confirm_clear(&self, username: Option<&str>, store: &QueueStore) -> ClearOutcome {
        let Some(key) = self.admin_key(username) else {
            return ClearOutcome::NotAdmin;
        };
        if !self.take_pending(&key).await {
            return ClearOutcome::NothingPending;
        }
        let removed = store.clear().await;
        info!("Line cleared by @{key} ({removed} sessions)");
        ClearOutcome::Cleared(removed)
    }

    /// `/no`
    pub async fn cancel_clear(&self, username: Option<&str>) -> ClearOutcome {
        let Some(key) = self.admin_key(username) else {
            return ClearOutcome::NotAdmin;
        };
        if self.take_pending(&key).await {
            ClearOutcome::Cancelled
        } else {
            ClearOutcome::NothingPending
        }
    }

    async fn take_pending(&self, key: &str) -> bool {
        // remove is the single consume point; the age check rejects entries
        // the cache has not evicted yet
        self.pending_clear
            .remove(key)
            .await
            .is_some_and(|requested_at| requested_at.elapsed() < self.confirmation_ttl)
    }

    fn admin_key(&self, username: Option<&str>) -> Option<String> {
        let key = normalize_username(username?);
        self.admins.contains(&key).then_some(key)
    }
}

/// Dispatch one admin command
///
/// # Errors
///
/// Returns an error if serialization or sending fails.
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: AdminCommand,
    store: Arc<QueueStore>,
    console: Arc<AdminConsole>,
    settings: Arc<Settings>,
) -> Result<()> {
    let chat_id = msg.chat.id;
    let username = get_username(&msg);
    let username = username.as_deref();

    let reply = match cmd {
        AdminCommand::Help | AdminCommand::Start => {
            views::admin_help(store.is_open().await, store.in_line().await.len())
        }
        AdminCommand::Line => {
            let pages = views::line_pages(
                &store.in_line().await,
                LINE_PAGE_SIZE,
                settings.display_offset(),
            );
            return send_pages(&bot, chat_id, &pages).await;
        }
        AdminCommand::Users => {
            let raw = views::sessions_json(&store.all().await)?;
            return send_preformatted(&bot, chat_id, &raw).await;
        }
        AdminCommand::ClearLine => console.request_clear(username).await.reply(),
        AdminCommand::Yes => console.confirm_clear(username, &store).await.reply(),
        AdminCommand::No => console.cancel_clear(username).await.reply(),
        AdminCommand::Open => {
            store.set_open(true).await;
            info!("Signup opened by {username:?}");
            "запись открыта".to_string()
        }
        AdminCommand::Close => {
            store.set_open(false).await;
            info!("Signup closed by {username:?}");
            "запись закрыта".to_string()
        }
    };

    send_html_resilient(&bot, chat_id, reply).await?;
    Ok(())
}

/// Reply "not an admin", at most once per cooldown per user
pub async fn handle_unauthorized(bot: &Bot, msg: &Message, cache: &UnauthorizedCache) {
    let user_id = get_user_id_safe(msg);
    let username = get_username(msg).unwrap_or_default();

    if cache.admit(user_id, &username).await {
        info!("Admin bot used by non-admin {user_id} (@{username})");
        if let Err(e) = send_html_resilient(bot, msg.chat.id, views::NOT_ADMIN).await {
            warn!("Failed to send denial to {user_id}: {e}");
        }
    }
}
