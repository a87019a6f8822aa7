use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a user is in the signup flow
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Song picked, waiting for the singer's name
    AskingName,
    /// Name given, waiting to be called on stage
    InLine,
}

impl Stage {
    /// Wire name of the stage (`asking_name` / `in_line`)
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AskingName => "asking_name",
            Self::InLine => "in_line",
        }
    }
}

/// Telegram identity of the user who owns a session
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    /// Telegram user id
    pub id: i64,
    /// Telegram `@username`, if the user has one
    pub username: Option<String>,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: Option<String>,
    /// IETF language tag reported by the client
    pub language_code: Option<String>,
}

impl UserProfile {
    /// Full Telegram name (`first last`)
    #[must_use]
    pub fn full_name(&self) -> String {
        match self.last_name.as_deref() {
            Some(last) if !last.is_empty() => format!("{} {last}", self.first_name),
            _ => self.first_name.clone(),
        }
    }
}

/// A user's place in the karaoke line
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    /// Telegram user id (store key)
    pub user_id: i64,
    /// Chat to reply to
    pub chat_id: i64,
    /// Telegram `@username`
    pub username: Option<String>,
    /// Telegram display name
    pub tg_name: String,
    /// Catalog id of the chosen song
    pub song_id: String,
    /// Rendered song name
    pub song_name: String,
    /// Lyrics link of the chosen song
    pub song_link: String,
    /// Name the user typed in
    pub typed_name: Option<String>,
    /// Current stage
    pub stage: Stage,
    /// When the song was picked
    pub selected_at: DateTime<Utc>,
    /// When the user joined the line
    pub time_added: Option<DateTime<Utc>>,
}

impl Session {
    /// Whether the session is waiting in the line
    #[must_use]
    pub fn is_in_line(&self) -> bool {
        self.stage == Stage::InLine
    }

    /// How the singer is addressed in listings: `@username`, or the Telegram name
    #[must_use]
    pub fn contact(&self) -> String {
        match self.username.as_deref() {
            Some(username) if !username.is_empty() => format!("@{username}"),
            _ => self.tg_name.clone(),
        }
    }
}
