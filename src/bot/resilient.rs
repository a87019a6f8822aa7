//! Telegram sends that survive transient network failures.
//!
//! Every reply goes out as HTML with link previews turned off, so song links
//! in `/line` listings do not expand into cards.

use crate::utils::{escape_html, retry_telegram_operation, split_long_message};
use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, LinkPreviewOptions, Message, ParseMode};

/// Telegram caps messages at 4096 characters; keep a margin for markup.
pub const MESSAGE_CHUNK_LIMIT: usize = 3500;

/// Link preview settings used for every reply
#[must_use]
pub const fn no_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

/// Send an HTML message with automatic retry on network failures.
///
/// Uses [`crate::utils::retry_telegram_operation`] with exponential backoff.
///
/// # Errors
///
/// Returns the last Telegram error after all retries are exhausted.
pub async fn send_html_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
) -> Result<Message> {
    let text = text.into();
    retry_telegram_operation(|| async {
        bot.send_message(chat_id, text.clone())
            .parse_mode(ParseMode::Html)
            .link_preview_options(no_preview())
            .await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Send pre-rendered HTML pages one message each, in order.
///
/// # Errors
///
/// Stops at the first page that could not be delivered.
pub async fn send_pages(bot: &Bot, chat_id: ChatId, pages: &[String]) -> Result<()> {
    for page in pages {
        send_html_resilient(bot, chat_id, page.as_str()).await?;
    }
    Ok(())
}

/// Send raw text (usually JSON) as `<pre>` blocks, split to fit the limit.
///
/// # Errors
///
/// Stops at the first chunk that could not be delivered.
pub async fn send_preformatted(bot: &Bot, chat_id: ChatId, raw: &str) -> Result<()> {
    send_pages(bot, chat_id, &preformatted_pages(raw)).await
}

fn preformatted_pages(raw: &str) -> Vec<String> {
    split_long_message(raw, MESSAGE_CHUNK_LIMIT)
        .iter()
        .map(|chunk| format!("<pre>{}</pre>", escape_html(chunk)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preformatted_pages_escape_and_split() {
        let raw = format!("{}\n{}", "{\"a\": \"<x>\"}", "b".repeat(MESSAGE_CHUNK_LIMIT));
        let pages = preformatted_pages(&raw);

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0], "<pre>{\"a\": \"&lt;x&gt;\"}</pre>");
        assert!(pages[1].starts_with("<pre>bbb"));
        assert!(pages.iter().all(|p| p.ends_with("</pre>")));
    }

    #[test]
    fn test_preformatted_pages_empty() {
        assert!(preformatted_pages("").is_empty());
    }

    #[test]
    fn test_link_previews_disabled() {
        assert!(no_preview().is_disabled);
    }
}
