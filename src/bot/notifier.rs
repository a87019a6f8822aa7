//! Admin-chat notifications.

use super::resilient::no_preview;
use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::debug;

/// Delivers short HTML notices to the admins
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdminNotifier: Send + Sync {
    /// Send one notice
    async fn notify(&self, text: &str) -> Result<()>;
}

/// Posts notices through the admin bot into the configured chat, without retries
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: Option<ChatId>,
}

impl TelegramNotifier {
    /// `chat_id = None` turns notifications into no-ops
    #[must_use]
    pub const fn new(bot: Bot, chat_id: Option<ChatId>) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl AdminNotifier for TelegramNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        let Some(chat_id) = self.chat_id else {
            debug!("NOTIFY_CHAT_ID not set, dropping admin notice");
            return Ok(());
        };
        // single attempt, best-effort
        self.bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .link_preview_options(no_preview())
            .await?;
        Ok(())
    }
}
