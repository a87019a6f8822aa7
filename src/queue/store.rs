//! Shared session store
//!
//! One store is shared by the client bot and the admin bot. Sessions are kept
//! in insertion order; re-selecting a song replaces a session in place.

use super::session::{Session, Stage, UserProfile};
use crate::catalog::Catalog;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Result of a `/start <id>` request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectOutcome {
    /// Song found, session created in `asking_name`
    Selected(Session),
    /// No song with that id
    NotFound,
    /// Admins have closed signup
    Closed,
}

struct QueueState {
    sessions: Vec<Session>,
    open: bool,
}

/// In-memory karaoke line shared between both bots
pub struct QueueStore {
    state: RwLock<QueueState>,
}

impl Default for QueueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueStore {
    /// Create an empty store with signup open
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(QueueState {
                sessions: Vec::new(),
                open: true,
            }),
        }
    }

    /// Pick a song for a user.
    ///
    /// On a catalog hit the user's session is replaced by a fresh one in
    /// `asking_name`, whatever stage the previous session was in.
    pub async fn select_song(
        &self,
        catalog: &Catalog,
        profile: &UserProfile,
        chat_id: i64,
        song_id: &str,
        now: DateTime<Utc>,
    ) -> SelectOutcome {
        let Some(song) = catalog.find(song_id) else {
            debug!(user_id = profile.id, "Song id '{song_id}' not found");
            return SelectOutcome::NotFound;
        };

        let mut state = self.state.write().await;
        if !state.open {
            return SelectOutcome::Closed;
        }

        let session = Session {
            user_id: profile.id,
            chat_id,
            username: profile.username.clone(),
            tg_name: profile.full_name(),
            song_id: song.id.clone(),
            song_name: song.display_name(),
            song_link: song.link.clone(),
            typed_name: None,
            stage: Stage::AskingName,
            selected_at: now,
            time_added: None,
        };

        match state.sessions.iter_mut().find(|s| s.user_id == profile.id) {
            Some(existing) => {
                info!(
                    user_id = profile.id,
                    "Replacing session ({} -> {})", existing.song_id, session.song_id
                );
                *existing = session.clone();
            }
            None => state.sessions.push(session.clone()),
        }

        SelectOutcome::Selected(session)
    }

    /// Record the singer's name and move the session into the line.
    ///
    /// Returns `None` unless the user has a session in `asking_name`.
    /// The join time is never earlier than the song selection time.
    pub async fn submit_name(
        &self,
        user_id: i64,
        typed_name: &str,
        now: DateTime<Utc>,
    ) -> Option<Session> {
        let mut state = self.state.write().await;
        let session = state
            .sessions
            .iter_mut()
            .find(|s| s.user_id == user_id && s.stage == Stage::AskingName)?;

        session.typed_name = Some(typed_name.to_string());
        session.time_added = Some(now.max(session.selected_at));
        session.stage = Stage::InLine;
        Some(session.clone())
    }

    /// Current session of a user
    pub async fn get(&self, user_id: i64) -> Option<Session> {
        let state = self.state.read().await;
        state.sessions.iter().find(|s| s.user_id == user_id).cloned()
    }

    /// Whether the user is currently waiting for a name prompt
    pub async fn is_asking_name(&self, user_id: i64) -> bool {
        let state = self.state.read().await;
        state
            .sessions
            .iter()
            .any(|s| s.user_id == user_id && s.stage == Stage::AskingName)
    }

    /// Sessions waiting in line, in store order
    pub async fn in_line(&self) -> Vec<Session> {
        let state = self.state.read().await;
        state
            .sessions
            .iter()
            .filter(|s| s.is_in_line())
            .cloned()
            .collect()
    }

    /// Every session regardless of stage
    pub async fn all(&self) -> Vec<Session> {
        let state = self.state.read().await;
        state.sessions.clone()
    }

    /// Remove a user's session
    pub async fn remove(&self, user_id: i64) -> Option<Session> {
        let mut state = self.state.write().await;
        let index = state.sessions.iter().position(|s| s.user_id == user_id)?;
        Some(state.sessions.remove(index))
    }

    /// Drop every session, returning how many were removed
    pub async fn clear(&self) -> usize {
        let mut state = self.state.write().await;
        let removed = state.sessions.len();
        state.sessions.clear();
        removed
    }

    /// Open or close signup, returning the previous value
    pub async fn set_open(&self, open: bool) -> bool {
        let mut state = self.state.write().await;
        std::mem::replace(&mut state.open, open)
    }

    /// Whether `/start <id>` currently accepts signups
    pub async fn is_open(&self) -> bool {
        self.state.read().await.open
    }

    /// Number of sessions in any stage
    pub async fn len(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    /// Whether the store has no sessions
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Song;
    use chrono::Duration;

    fn catalog() -> Catalog {
        Catalog::from_songs([
            Song {
                id: "1".to_string(),
                title: "Группа крови".to_string(),
                artist: Some("Кино".to_string()),
                artist_name: None,
                category: None,
                link: "https://example.com/1".to_string(),
            },
            Song {
                id: "2".to_string(),
                title: "Take On Me".to_string(),
                artist: Some("a-ha".to_string()),
                artist_name: None,
                category: None,
                link: "https://example.com/2".to_string(),
            },
        ])
    }

    fn profile(id: i64) -> UserProfile {
        UserProfile {
            id,
            username: Some(format!("user{id}")),
            first_name: format!("User {id}"),
            ..UserProfile::default()
        }
    }

    #[tokio::test]
    async fn test_select_creates_asking_name_session() {
        let store = QueueStore::new();
        let now = Utc::now();

        let outcome = store.select_song(&catalog(), &profile(1), 10, "1", now).await;
        let SelectOutcome::Selected(session) = outcome else {
            panic!("expected a selected song, got {outcome:?}");
        };
        assert_eq!(session.stage, Stage::AskingName);
        assert_eq!(session.song_name, "Кино - Группа крови");
        assert_eq!(session.song_link, "https://example.com/1");
        assert_eq!(session.selected_at, now);
        assert_eq!(store.len().await, 1);
        assert!(store.is_asking_name(1).await);
    }

    #[tokio::test]
    async fn test_unknown_song_creates_nothing() {
        let store = QueueStore::new();
        let outcome = store
            .select_song(&catalog(), &profile(1), 10, "404", Utc::now())
            .await;
        assert_eq!(outcome, SelectOutcome::NotFound);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_reselect_overwrites_in_place() {
        let store = QueueStore::new();
        let now = Utc::now();
        let catalog = catalog();

        store.select_song(&catalog, &profile(1), 10, "1", now).await;
        store.submit_name(1, "Витя", now).await;
        store.select_song(&catalog, &profile(2), 20, "1", now).await;
        store.select_song(&catalog, &profile(1), 10, "2", now).await;

        let all = store.all().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].user_id, 1);
        assert_eq!(all[0].song_id, "2");
        assert_eq!(all[0].stage, Stage::AskingName);
        assert_eq!(all[0].typed_name, None);
        assert_eq!(all[1].user_id, 2);
    }

    #[tokio::test]
    async fn test_submit_name_moves_into_line() {
        let store = QueueStore::new();
        let selected = Utc::now();
        store
            .select_song(&catalog(), &profile(1), 10, "1", selected)
            .await;

        let joined = selected + Duration::seconds(30);
        let session = store
            .submit_name(1, "Витя", joined)
            .await
            .expect("session should be updated");
        assert_eq!(session.stage, Stage::InLine);
        assert_eq!(session.typed_name.as_deref(), Some("Витя"));
        assert_eq!(session.time_added, Some(joined));

        // Already in line: further text is not a name
        assert!(store.submit_name(1, "Другое", joined).await.is_none());
        assert_eq!(store.in_line().await.len(), 1);
    }

    #[tokio::test]
    async fn test_join_time_not_before_selection() {
        let store = QueueStore::new();
        let selected = Utc::now();
        store
            .select_song(&catalog(), &profile(1), 10, "1", selected)
            .await;

        let session = store
            .submit_name(1, "Витя", selected - Duration::seconds(5))
            .await
            .expect("session should be updated");
        assert_eq!(session.time_added, Some(selected));
    }

    #[tokio::test]
    async fn test_submit_name_without_session() {
        let store = QueueStore::new();
        assert!(store.submit_name(1, "Никто", Utc::now()).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = QueueStore::new();
        store
            .select_song(&catalog(), &profile(1), 10, "1", Utc::now())
            .await;

        assert!(store.remove(1).await.is_some());
        assert!(store.remove(1).await.is_none());
        assert!(store.get(1).await.is_none());
    }

    #[tokio::test]
    async fn test_in_line_filters_and_keeps_order() {
        let store = QueueStore::new();
        let catalog = catalog();
        let now = Utc::now();

        for id in 1..=4 {
            store.select_song(&catalog, &profile(id), id, "2", now).await;
        }
        store.submit_name(3, "Третий", now).await;
        store.submit_name(1, "Первый", now).await;

        let line: Vec<i64> = store.in_line().await.iter().map(|s| s.user_id).collect();
        assert_eq!(line, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_closed_signup() {
        let store = QueueStore::new();
        assert!(store.set_open(false).await);
        assert!(!store.is_open().await);

        let outcome = store
            .select_song(&catalog(), &profile(1), 10, "1", Utc::now())
            .await;
        assert_eq!(outcome, SelectOutcome::Closed);
        assert!(store.is_empty().await);

        assert!(!store.set_open(true).await);
        let outcome = store
            .select_song(&catalog(), &profile(1), 10, "1", Utc::now())
            .await;
        assert!(matches!(outcome, SelectOutcome::Selected(_)));
    }

    #[tokio::test]
    async fn test_clear() {
        let store = QueueStore::new();
        let catalog = catalog();
        for id in 1..=3 {
            store
                .select_song(&catalog, &profile(id), id, "1", Utc::now())
                .await;
        }
        assert_eq!(store.clear().await, 3);
        assert!(store.is_empty().await);
        assert_eq!(store.clear().await, 0);
    }
}
