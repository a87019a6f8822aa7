//! Reply texts for both bots.
//!
//! Everything here returns Telegram HTML. User-provided values (typed names,
//! usernames, song names) are escaped before interpolation.

use super::resilient::MESSAGE_CHUNK_LIMIT;
use crate::config::LINE_NAME_MAX_CHARS;
use crate::queue::{Session, UserProfile};
use crate::utils::{escape_attr, escape_html};
use chrono::FixedOffset;
use serde_json::json;

/// Reply for an unknown song id
pub const SONG_NOT_FOUND: &str = "извините, песни с таким id нет";
/// Reply when admins closed signup
pub const SIGNUP_CLOSED: &str = "запись сейчас закрыта. попробуйте чуть позже";
/// Reply for an unknown command while a name is expected
pub const NAME_EXPECTED: &str = "сначала напишите, как вас зовут";
/// Reply for `/line` with nobody waiting
pub const LINE_EMPTY: &str = "в очереди никого нет";
/// Reply for `/exit` from a user without a session
pub const NOT_IN_LINE: &str = "вас нет в очереди";
/// Reply for admin commands from non-admins
pub const NOT_ADMIN: &str = "вы не админ";
/// `current_state` value in `/me` when there is no session
pub const NO_ACTIVE_INTERACTION: &str = "no active interaction";

/// Reply for `/start` without a song id
#[must_use]
pub fn start_without_song(songbook_url: Option<&str>) -> String {
    match songbook_url {
        Some(url) => format!(
            "не, просто так не работает. выбор песен в сонгбуке: {}",
            escape_html(url)
        ),
        None => "не, просто так не работает. выберите песню в сонгбуке".to_string(),
    }
}

/// Reply for free text that is not a name answer
#[must_use]
pub fn not_understood(songbook_url: Option<&str>) -> String {
    match songbook_url {
        Some(url) => format!(
            "этого я не понимаю...\n\nвыбор песен в сонгбуке: {}",
            escape_html(url)
        ),
        None => "этого я не понимаю...".to_string(),
    }
}

/// Ask for the singer's name after a song was picked
#[must_use]
pub fn ask_name(session: &Session) -> String {
    format!(
        "привет! <b>как тебя зовут?</b>\n\n(чтобы записаться и спеть песню \"{}\" осталось только написать имя певца/певцов)",
        escape_html(&session.song_name)
    )
}

/// Confirmation after the user joined the line
#[must_use]
pub fn joined_line(session: &Session) -> String {
    let name = session.typed_name.as_deref().unwrap_or_default();
    format!(
        "отлично, {}! вы выбрали песню \"{}\". скоро вас позовут на сцену\n\nа слова можно найти <a href=\"{}\">здесь</a>",
        escape_html(name),
        escape_html(&session.song_name),
        escape_attr(&session.song_link)
    )
}

/// Reply for a successful `/exit`
#[must_use]
pub fn left_line(session: &Session) -> String {
    format!(
        "вы вышли из очереди. песня \"{}\" больше не ждёт вас",
        escape_html(&session.song_name)
    )
}

/// Message sent to the admin chat when someone leaves the line
#[must_use]
pub fn exit_notification(session: &Session) -> String {
    let name = session
        .typed_name
        .as_deref()
        .unwrap_or(session.tg_name.as_str());
    format!(
        "🚪 {} ({}) вышел(а) из очереди\nпесня: {}",
        escape_html(name),
        escape_html(&session.contact()),
        escape_html(&session.song_name)
    )
}

/// One `/line` row per session, numbered from `first_position`
#[must_use]
pub fn line_rows(sessions: &[Session], first_position: usize, offset: FixedOffset) -> Vec<String> {
    sessions
        .iter()
        .enumerate()
        .map(|(index, session)| {
            let joined = session
                .time_added
                .map(|t| t.with_timezone(&offset).format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "—".to_string());
            let name = session.typed_name.as_deref().unwrap_or_default();
            format!(
                "{}. {}\n   песня: <a href=\"{}\">{}</a>\n   добавлен: {}\n   юзернейм: {}",
                first_position + index,
                escape_html(&clip(name, LINE_NAME_MAX_CHARS)),
                escape_attr(&session.song_link),
                escape_html(&session.song_name),
                joined,
                escape_html(&clip(&session.contact(), LINE_NAME_MAX_CHARS))
            )
        })
        .collect()
}

/// Render the line as one or more messages.
///
/// A page holds at most `page_size` rows and at most [`MESSAGE_CHUNK_LIMIT`]
/// bytes, so every page fits into a single Telegram message.
#[must_use]
pub fn line_pages(sessions: &[Session], page_size: usize, offset: FixedOffset) -> Vec<String> {
    if sessions.is_empty() {
        return vec![LINE_EMPTY.to_string()];
    }

    let page_size = page_size.max(1);
    let mut pages = Vec::new();
    let mut current = String::new();
    let mut rows_on_page = 0;

    for row in line_rows(sessions, 1, offset) {
        let full = rows_on_page == page_size
            || current.len() + "\n\n".len() + row.len() > MESSAGE_CHUNK_LIMIT;
        if rows_on_page > 0 && full {
            pages.push(std::mem::take(&mut current));
            rows_on_page = 0;
        }
        if rows_on_page > 0 {
            current.push_str("\n\n");
        }
        current.push_str(&row);
        rows_on_page += 1;
    }
    pages.push(current);
    pages
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max_chars).collect();
    clipped.push('…');
    clipped
}

/// `/me` payload: Telegram profile plus the current session
///
/// # Errors
///
/// Returns an error if the session cannot be serialized.
pub fn user_info_json(
    profile: &UserProfile,
    session: Option<&Session>,
) -> Result<String, serde_json::Error> {
    let mut info = json!({
        "personal_info": {
            "telegram_id": profile.id,
            "username": profile.username,
            "first_name": profile.first_name,
            "last_name": profile.last_name,
            "language_code": profile.language_code,
        },
        "current_state": match session {
            Some(session) => serde_json::to_value(session)?,
            None => json!(NO_ACTIVE_INTERACTION),
        },
    });

    if let Some(session) = session {
        info["song_selection"] = json!({
            "song_id": session.song_id,
            "song_name": session.song_name,
            "stage": session.stage,
        });
    }

    serde_json::to_string_pretty(&info)
}

/// `/users` payload: every session as pretty JSON
///
/// # Errors
///
/// Returns an error if a session cannot be serialized.
pub fn sessions_json(sessions: &[Session]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(sessions)
}

/// Admin `/help` text
#[must_use]
pub fn admin_help(is_open: bool, waiting: usize) -> String {
    let status = if is_open { "открыта" } else { "закрыта" };
    format!(
        "<b>админка караоке</b>\n\
         запись: {status}, в очереди: {waiting}\n\n\
         /line — очередь\n\
         /users — все записи в JSON\n\
         /clear_line — очистить очередь\n\
         /open — открыть запись\n\
         /close — закрыть запись"
    )
}
