//! Helpers shared by the client and admin handlers.

use super::resilient::send_html_resilient;
use crate::queue::UserProfile;
use crate::utils::escape_html;
use teloxide::prelude::*;
use teloxide::types::User;
use tracing::error;

/// Sender's Telegram id, or 0 for channel posts
#[must_use]
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Sender's `@username`, if any
#[must_use]
pub fn get_username(msg: &Message) -> Option<String> {
    msg.from.as_ref().and_then(|u| u.username.clone())
}

/// Snapshot of the sender's Telegram profile
#[must_use]
pub fn user_profile(msg: &Message) -> Option<UserProfile> {
    msg.from.as_ref().map(profile_from_user)
}

fn profile_from_user(user: &User) -> UserProfile {
    UserProfile {
        id: user.id.0.cast_signed(),
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        language_code: user.language_code.clone(),
    }
}

/// Log a handler failure and tell the user what went wrong
pub async fn report_error(bot: &Bot, chat_id: ChatId, context: &str, err: &anyhow::Error) {
    error!("{context} error: {err:#}");
    let text = format!("произошла ошибка: {}", escape_html(&format!("{err:#}")));
    if let Err(e) = send_html_resilient(bot, chat_id, text).await {
        error!("Failed to report error to chat {chat_id}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::UserId;

    #[test]
    fn test_profile_from_user() {
        let user = User {
            id: UserId(42),
            is_bot: false,
            first_name: "Виктор".to_string(),
            last_name: Some("Цой".to_string()),
            username: Some("tsoi".to_string()),
            language_code: Some("ru".to_string()),
            is_premium: false,
            added_to_attachment_menu: false,
        };

        let profile = profile_from_user(&user);
        assert_eq!(profile.id, 42);
        assert_eq!(profile.username.as_deref(), Some("tsoi"));
        assert_eq!(profile.full_name(), "Виктор Цой");
        assert_eq!(profile.language_code.as_deref(), Some("ru"));
    }
}
