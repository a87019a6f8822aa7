//! Singer-facing bot: pick a song through a deep link, type a name, wait in line.

use super::common::{get_user_id_safe, user_profile};
use super::notifier::AdminNotifier;
use super::resilient::{send_html_resilient, send_pages, send_preformatted};
use super::views;
use crate::catalog::Catalog;
use crate::config::{Settings, ADMIN_NOTIFY_TIMEOUT_SECS, LINE_PAGE_SIZE};
use crate::queue::{QueueStore, SelectOutcome, Session};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

/// Commands of the client bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Команды:")]
pub enum Command {
    /// Deep link from the songbook: `/start <song id>`
    #[command(description = "выбрать песню из сонгбука.")]
    Start(String),
    /// Profile and session as JSON
    #[command(description = "что бот о вас знает.")]
    Me,
    /// Every session as JSON
    #[command(description = "все записи.")]
    Users,
    /// Leave the line
    #[command(description = "выйти из очереди.")]
    Exit,
    /// Show the line
    #[command(description = "показать очередь.")]
    Line,
}

/// `/start <id>`: pick a song and ask for the singer's name
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn start(
    bot: Bot,
    msg: Message,
    payload: String,
    store: Arc<QueueStore>,
    catalog: Arc<Catalog>,
    settings: Arc<Settings>,
) -> Result<()> {
    let song_id = payload.trim();
    if song_id.is_empty() {
        let text = views::start_without_song(settings.songbook_url.as_deref());
        send_html_resilient(&bot, msg.chat.id, text).await?;
        return Ok(());
    }

    let Some(profile) = user_profile(&msg) else {
        return Ok(());
    };

    let reply = match store
        .select_song(&catalog, &profile, msg.chat.id.0, song_id, Utc::now())
        .await
    {
        SelectOutcome::Selected(session) => {
            info!(user_id = profile.id, "Selected song {}", session.song_id);
            views::ask_name(&session)
        }
        SelectOutcome::NotFound => views::SONG_NOT_FOUND.to_string(),
        SelectOutcome::Closed => views::SIGNUP_CLOSED.to_string(),
    };

    send_html_resilient(&bot, msg.chat.id, reply).await?;
    Ok(())
}

/// Free text: the singer's name while asked for one, otherwise a hint
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn handle_text(
    bot: Bot,
    msg: Message,
    store: Arc<QueueStore>,
    settings: Arc<Settings>,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let text = msg.text().unwrap_or_default();
    let reply = text_reply(
        &store,
        user_id,
        text,
        settings.songbook_url.as_deref(),
        Utc::now(),
    )
    .await;

    send_html_resilient(&bot, msg.chat.id, reply).await?;
    Ok(())
}

/// Decide what a free-text message means and build the reply.
///
/// Text from a user in `asking_name` becomes their name, unless it is empty
/// or looks like a command; then they are asked for the name again.
/// Anyone else gets the songbook hint.
pub async fn text_reply(
    store: &QueueStore,
    user_id: i64,
    text: &str,
    songbook_url: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    let typed_name = text.trim();

    if typed_name.is_empty() || typed_name.starts_with('/') {
        return if store.is_asking_name(user_id).await {
            views::NAME_EXPECTED.to_string()
        } else {
            views::not_understood(songbook_url)
        };
    }

    match store.submit_name(user_id, typed_name, now).await {
        Some(session) => {
            info!(
                user_id,
                stage = session.stage.as_str(),
                "Joined the line as '{}'",
                typed_name
            );
            views::joined_line(&session)
        }
        None => views::not_understood(songbook_url),
    }
}

/// `/me`: what the bot knows about the sender
///
/// # Errors
///
/// Returns an error if serialization or sending fails.
pub async fn me(bot: Bot, msg: Message, store: Arc<QueueStore>) -> Result<()> {
    let Some(profile) = user_profile(&msg) else {
        return Ok(());
    };
    let session = store.get(profile.id).await;
    let raw = views::user_info_json(&profile, session.as_ref())?;
    send_preformatted(&bot, msg.chat.id, &raw).await
}

/// `/users`: dump every session
///
/// # Errors
///
/// Returns an error if serialization or sending fails.
pub async fn users(bot: Bot, msg: Message, store: Arc<QueueStore>) -> Result<()> {
    let raw = views::sessions_json(&store.all().await)?;
    send_preformatted(&bot, msg.chat.id, &raw).await
}

/// `/exit`: leave the line
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn exit(
    bot: Bot,
    msg: Message,
    store: Arc<QueueStore>,
    notifier: Arc<dyn AdminNotifier>,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let reply = match leave_line(&store, notifier.as_ref(), user_id).await {
        Some(session) => views::left_line(&session),
        None => views::NOT_IN_LINE.to_string(),
    };
    send_html_resilient(&bot, msg.chat.id, reply).await?;
    Ok(())
}

/// `/line`: everyone waiting, in order
///
/// # Errors
///
/// Returns an error if a page cannot be sent.
pub async fn line(
    bot: Bot,
    msg: Message,
    store: Arc<QueueStore>,
    settings: Arc<Settings>,
) -> Result<()> {
    let pages = views::line_pages(
        &store.in_line().await,
        LINE_PAGE_SIZE,
        settings.display_offset(),
    );
    send_pages(&bot, msg.chat.id, &pages).await
}

/// Remove the user's session and tell the admins.
///
/// A failed or slow notification is logged and does not undo the removal.
pub async fn leave_line(
    store: &QueueStore,
    notifier: &dyn AdminNotifier,
    user_id: i64,
) -> Option<Session> {
    leave_line_within(
        store,
        notifier,
        user_id,
        Duration::from_secs(ADMIN_NOTIFY_TIMEOUT_SECS),
    )
    .await
}

async fn leave_line_within(
    store: &QueueStore,
    notifier: &dyn AdminNotifier,
    user_id: i64,
    notify_timeout: Duration,
) -> Option<Session> {
    let removed = store.remove(user_id).await?;
    info!(user_id, "Left the line (song {})", removed.song_id);

    let notice = views::exit_notification(&removed);
    match tokio::time::timeout(notify_timeout, notifier.notify(&notice)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(user_id, "Failed to notify admins about exit: {e:#}"),
        Err(_) => warn!(user_id, "Admin exit notice timed out after {notify_timeout:?}"),
    }
    Some(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::notifier::MockAdminNotifier;
    use crate::catalog::Song;
    use crate::queue::{Stage, UserProfile};

    const BOT_NAME: &str = "karaoke_bot";

    fn catalog() -> Catalog {
        Catalog::from_songs([Song {
            id: "7".to_string(),
            title: "Кукла колдуна".to_string(),
            artist: Some("Король и Шут".to_string()),
            artist_name: None,
            category: None,
            link: "https://example.com/7".to_string(),
        }])
    }

    async fn store_asking_name() -> QueueStore {
        let profile = UserProfile {
            id: 1,
            first_name: "Витя".to_string(),
            ..UserProfile::default()
        };
        let store = QueueStore::new();
        store
            .select_song(&catalog(), &profile, 1, "7", Utc::now())
            .await;
        store
    }

    async fn store_with_singer() -> QueueStore {
        let store = store_asking_name().await;
        store.submit_name(1, "Витя", Utc::now()).await;
        store
    }

    const SONGBOOK_URL: Option<&str> = Some("https://songbook.example.com");

    #[tokio::test]
    async fn test_text_reply_takes_name() {
        let store = store_asking_name().await;

        let reply = text_reply(&store, 1, "  Витя и Маша ", SONGBOOK_URL, Utc::now()).await;
        assert!(reply.starts_with("отлично, Витя и Маша!"));

        let session = store.get(1).await.expect("session kept");
        assert_eq!(session.stage, Stage::InLine);
        assert_eq!(session.typed_name.as_deref(), Some("Витя и Маша"));
    }

    #[tokio::test]
    async fn test_text_reply_command_while_asking_name() {
        let store = store_asking_name().await;

        let reply = text_reply(&store, 1, "/help", SONGBOOK_URL, Utc::now()).await;
        assert_eq!(reply, views::NAME_EXPECTED);
        let reply = text_reply(&store, 1, "   ", SONGBOOK_URL, Utc::now()).await;
        assert_eq!(reply, views::NAME_EXPECTED);

        assert!(store.is_asking_name(1).await);
        assert!(store.in_line().await.is_empty());
    }

    #[tokio::test]
    async fn test_text_reply_without_session() {
        let store = QueueStore::new();

        let reply = text_reply(&store, 5, "Витя", SONGBOOK_URL, Utc::now()).await;
        assert_eq!(reply, views::not_understood(SONGBOOK_URL));
        let reply = text_reply(&store, 5, "", SONGBOOK_URL, Utc::now()).await;
        assert_eq!(reply, views::not_understood(SONGBOOK_URL));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_text_reply_after_joining() {
        let store = store_with_singer().await;

        let reply = text_reply(&store, 1, "Другое имя", None, Utc::now()).await;
        assert_eq!(reply, views::not_understood(None));
        assert_eq!(
            store.get(1).await.and_then(|s| s.typed_name).as_deref(),
            Some("Витя")
        );
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(
            Command::parse("/start 42", BOT_NAME).ok(),
            Some(Command::Start("42".to_string()))
        );
        assert_eq!(Command::parse("/line", BOT_NAME).ok(), Some(Command::Line));
        assert_eq!(Command::parse("/exit", BOT_NAME).ok(), Some(Command::Exit));
        assert!(Command::parse("/clear_line", BOT_NAME).is_err());
    }

    #[tokio::test]
    async fn test_leave_line_notifies_admins() {
        let store = store_with_singer().await;
        let mut notifier = MockAdminNotifier::new();
        notifier
            .expect_notify()
            .withf(|text| text.contains("Витя") && text.contains("Кукла колдуна"))
            .times(1)
            .returning(|_| Ok(()));

        let removed = leave_line(&store, &notifier, 1).await;
        assert_eq!(removed.map(|s| s.user_id), Some(1));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_leave_line_survives_notify_failure() {
        let store = store_with_singer().await;
        let mut notifier = MockAdminNotifier::new();
        notifier
            .expect_notify()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("admin chat unreachable")));

        assert!(leave_line(&store, &notifier, 1).await.is_some());
        assert!(store.get(1).await.is_none());
    }

    struct StalledNotifier;

    #[async_trait::async_trait]
    impl AdminNotifier for StalledNotifier {
        async fn notify(&self, _text: &str) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_leave_line_does_not_wait_for_stalled_notice() {
        let store = store_with_singer().await;
        let started = std::time::Instant::now();

        let removed = leave_line_within(&store, &StalledNotifier, 1, Duration::from_millis(50)).await;

        assert!(removed.is_some());
        assert!(store.is_empty().await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_leave_line_without_session() {
        let store = QueueStore::new();
        let mut notifier = MockAdminNotifier::new();
        notifier.expect_notify().times(0);

        assert!(leave_line(&store, &notifier, 99).await.is_none());
    }
}
