/*
    moodtune | Mood-driven song recommendations for voice assistants.
    Copyright (C) 2025  Israel Alberto Roldan Vega

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use crate::models::{AudioFeatures, SongRecord};
use crate::selector::Selection;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// The song currently being discussed in a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentSong {
    pub song: SongRecord,
    pub track_id: Option<String>,
    pub features: Option<AudioFeatures>,
}

/// Per-conversation state: what was picked last and which token plays it.
#[derive(Debug, Default, Clone)]
pub struct ConversationSession {
    pub last_index: Option<u32>,
    pub access_token: Option<String>,
    pub current: Option<CurrentSong>,
}

impl ConversationSession {
    /// Replaces the current song with a fresh selection.
    pub fn apply_selection(&mut self, selection: Selection) {
        self.last_index = Some(selection.index);
        self.current = Some(CurrentSong {
            song: selection.song,
            track_id: selection.track_id,
            features: None,
        });
    }
}

pub type SharedSession = Arc<Mutex<ConversationSession>>;

/// Sessions not touched for this long are dropped.
pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

struct Entry {
    session: SharedSession,
    last_used: Instant,
}

/// Sessions keyed by conversation ID. A turn holds its session's lock from
/// start to finish, so turns within one conversation run one after another.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Entry>>,
    idle_timeout: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_IDLE_TIMEOUT)
    }
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// The live session of a conversation, if it has one.
    pub async fn existing(&self, conversation_id: &str) -> Option<SharedSession> {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();
        let last_used = sessions.get(conversation_id)?.last_used;
        if now.duration_since(last_used) >= self.idle_timeout {
            debug!("Session for conversation {} expired", conversation_id);
            sessions.remove(conversation_id);
            return None;
        }

        let entry = sessions.get_mut(conversation_id)?;
        entry.last_used = now;
        Some(entry.session.clone())
    }

    /// Stores the session of a conversation whose first turn succeeded.
    pub async fn insert(
        &self,
        conversation_id: &str,
        session: ConversationSession,
    ) -> SharedSession {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_used) < self.idle_timeout);
        if sessions.len() < before {
            debug!("Dropped {} idle sessions", before - sessions.len());
        }

        let session = Arc::new(Mutex::new(session));
        sessions.insert(
            conversation_id.to_string(),
            Entry {
                session: session.clone(),
                last_used: now,
            },
        );
        session
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
