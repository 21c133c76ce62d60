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

//! Conversation state machine.
//!
//! Each inbound turn carries a label naming the path the user took through the
//! dialogue, e.g. `Sad - yes - yes - no - yes`. Every mood shares the same six
//! steps, so the label table is generated once from [`DialogueStep::ALL`] and
//! [`Mood::ALL`], and the resolved state is handled by a single `match`.

use crate::auth::{MusicProvider, ProviderError};
use crate::identity::{IdentityError, IdentityStore};
use crate::models::Mood;
use crate::narration::{analysis_prompt, compose_audio_analysis, compose_recommendation};
use crate::selector::MoodSelector;
use crate::sentiment::LyricSentiment;
use crate::session::{ConversationSession, CurrentSong, SessionRegistry, SharedSession};
use crate::store::StoreError;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;

pub const PLAYBACK_ACKNOWLEDGEMENT: &str = "Enjoy!";

/// Position in the per-mood dialogue tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogueStep {
    /// "Would you like a sad song?" - yes
    InitialAsk,
    /// Declined both the song and its analysis, asked for another one.
    RetryOnNo,
    /// Declined the analysis but wants to hear the song.
    ConfirmPlay,
    Analysis,
    PostAnalysisPlay,
    /// Heard the analysis, declined the song, wants another one.
    RetryAfterAnalysis,
}

impl DialogueStep {
    pub const ALL: [DialogueStep; 6] = [
        DialogueStep::InitialAsk,
        DialogueStep::RetryOnNo,
        DialogueStep::ConfirmPlay,
        DialogueStep::Analysis,
        DialogueStep::PostAnalysisPlay,
        DialogueStep::RetryAfterAnalysis,
    ];

    /// Answers following the mood in the label.
    pub fn path(self) -> &'static [&'static str] {
        match self {
            DialogueStep::InitialAsk => &["yes"],
            DialogueStep::RetryOnNo => &["yes", "no", "no", "chooseAgain"],
            DialogueStep::ConfirmPlay => &["yes", "no", "yes"],
            DialogueStep::Analysis => &["yes", "yes"],
            DialogueStep::PostAnalysisPlay => &["yes", "yes", "yes"],
            DialogueStep::RetryAfterAnalysis => &["yes", "yes", "no", "yes"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SelectMood(Mood),
    TriggerAudioAnalysis,
    TriggerPlayback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationState {
    pub mood: Mood,
    pub step: DialogueStep,
}

impl ConversationState {
    pub fn new(mood: Mood, step: DialogueStep) -> Self {
        Self { mood, step }
    }

    /// Compact label, e.g. `Sad-yes-yes-no-yes`.
    pub fn label(&self) -> String {
        std::iter::once(self.mood.label())
            .chain(self.step.path().iter().copied())
            .collect::<Vec<_>>()
            .join("-")
    }

    pub fn action(&self) -> Action {
        match self.step {
            DialogueStep::InitialAsk
            | DialogueStep::RetryOnNo
            | DialogueStep::RetryAfterAnalysis => Action::SelectMood(self.mood),
            DialogueStep::Analysis => Action::TriggerAudioAnalysis,
            DialogueStep::ConfirmPlay | DialogueStep::PostAnalysisPlay => Action::TriggerPlayback,
        }
    }

    /// Resolves a label in either the front-end form (`-Sad - yes - yes`) or the compact one.
    pub fn parse(label: &str) -> Option<Self> {
        dispatch_table().get(&normalize_label(label)).copied()
    }
}

fn normalize_label(label: &str) -> String {
    label
        .split('-')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Every known state, keyed by normalized label.
pub fn dispatch_table() -> &'static HashMap<String, ConversationState> {
    static TABLE: OnceLock<HashMap<String, ConversationState>> = OnceLock::new();
    TABLE.get_or_init(|| {
        Mood::ALL
            .into_iter()
            .flat_map(|mood| {
                DialogueStep::ALL
                    .into_iter()
                    .map(move |step| ConversationState::new(mood, step))
            })
            .map(|state| (normalize_label(&state.label()), state))
            .collect()
    })
}

#[derive(Error, Debug)]
pub enum TurnError {
    #[error("Unhandled intent: {0}")]
    UnhandledIntent(String),
    #[error("No signed-in Spotify account for this request")]
    NotSignedIn,
    #[error("Access token refresh failed: {0}")]
    TokenRefresh(#[source] ProviderError),
    #[error("Song store fetch failed: {0}")]
    StoreFetch(#[from] StoreError),
    #[error("No song has been recommended in this conversation yet")]
    NoActiveSong,
    #[error("{0} has no playable track")]
    TrackUnavailable(String),
    #[error("Spotify request failed: {0}")]
    Provider(#[source] ProviderError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),
}

impl TurnError {
    pub fn kind(&self) -> &'static str {
        match self {
            TurnError::UnhandledIntent(_) => "unhandled_intent",
            TurnError::NotSignedIn => "not_signed_in",
            TurnError::TokenRefresh(_) => "token_refresh",
            TurnError::StoreFetch(_) => "store_fetch",
            TurnError::NoActiveSong => "no_active_song",
            TurnError::TrackUnavailable(_) => "track_unavailable",
            TurnError::Provider(_) => "provider",
            TurnError::Identity(_) => "identity",
            TurnError::Timeout(_) => "timeout",
        }
    }

    /// What the assistant says instead of the narration.
    pub fn spoken(&self) -> String {
        match self {
            TurnError::UnhandledIntent(_) => {
                "Sorry, I didn't catch that. Could you say it again?".to_string()
            }
            TurnError::NotSignedIn => {
                "Please sign in to Spotify first so I can pick songs for you.".to_string()
            }
            TurnError::TokenRefresh(_) => {
                "I couldn't reconnect to your Spotify account. Please try again in a moment."
                    .to_string()
            }
            TurnError::StoreFetch(_) | TurnError::Identity(_) => {
                "Sorry, I couldn't find a song for you right now. Please try again.".to_string()
            }
            TurnError::NoActiveSong => {
                "I haven't recommended a song yet. Tell me how you're feeling first.".to_string()
            }
            TurnError::TrackUnavailable(song) => format!(
                "Sorry, {} isn't available on Spotify, so I can't analyse or play it.",
                song
            ),
            TurnError::Provider(_) => {
                "Sorry, Spotify didn't respond as expected. Please try again.".to_string()
            }
            TurnError::Timeout(_) => "Sorry, that took too long. Please try again.".to_string(),
        }
    }
}

/// One inbound conversational turn.
#[derive(Debug, Clone)]
pub struct Turn {
    pub conversation_id: String,
    pub intent: String,
    /// Token handed out by the sign-in callback. It decides whose account the turn uses.
    pub sign_in_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnReply {
    pub messages: Vec<String>,
}

/// The account a turn acts for.
struct SignedIn {
    uid: String,
    refresh_token: String,
}

pub struct Dispatcher {
    selector: MoodSelector,
    provider: Arc<dyn MusicProvider>,
    identities: Arc<dyn IdentityStore>,
    sentiment: Arc<dyn LyricSentiment>,
    sessions: SessionRegistry,
    outbound_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        selector: MoodSelector,
        provider: Arc<dyn MusicProvider>,
        identities: Arc<dyn IdentityStore>,
        sentiment: Arc<dyn LyricSentiment>,
        outbound_timeout: Duration,
    ) -> Self {
        Self {
            selector,
            provider,
            identities,
            sentiment,
            sessions: SessionRegistry::default(),
            outbound_timeout,
        }
    }

    pub fn with_session_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.sessions = SessionRegistry::new(idle_timeout);
        self
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    async fn bounded<T, F>(&self, call: &'static str, fut: F) -> Result<T, TurnError>
    where
        F: Future<Output = Result<T, TurnError>>,
    {
        tokio::time::timeout(self.outbound_timeout, fut)
            .await
            .map_err(|_| TurnError::Timeout(call))?
    }

    /// Runs one turn.
    ///
    /// A conversation only gets a session once a song was recommended in it,
    /// and a session is only written once every fallible step succeeded.
    pub async fn handle_turn(&self, turn: &Turn) -> Result<TurnReply, TurnError> {
        let state = ConversationState::parse(&turn.intent).ok_or_else(|| {
            warn!("No handler for intent {:?}", turn.intent);
            TurnError::UnhandledIntent(turn.intent.clone())
        })?;
        info!(
            "Conversation {}: {} -> {:?}",
            turn.conversation_id,
            state.label(),
            state.action()
        );

        let account = self.signed_in(&turn.sign_in_token).await?;

        match state.action() {
            Action::SelectMood(mood) => match self.sessions.existing(&turn.conversation_id).await {
                Some(session) => {
                    let mut session = session.lock().await;
                    self.recommend(mood, &mut session, &account).await
                }
                None => {
                    let mut session = ConversationSession::default();
                    let reply = self.recommend(mood, &mut session, &account).await?;
                    self.sessions.insert(&turn.conversation_id, session).await;
                    Ok(reply)
                }
            },
            Action::TriggerAudioAnalysis => {
                let session = self.active_session(&turn.conversation_id).await?;
                let mut session = session.lock().await;
                self.analyse(&mut session, &account).await
            }
            Action::TriggerPlayback => {
                let session = self.active_session(&turn.conversation_id).await?;
                let mut session = session.lock().await;
                self.play(&mut session, &account).await
            }
        }
    }

    async fn active_session(&self, conversation_id: &str) -> Result<SharedSession, TurnError> {
        self.sessions
            .existing(conversation_id)
            .await
            .ok_or(TurnError::NoActiveSong)
    }

    /// Resolves the sign-in token to its account and the refresh token stored for it.
    async fn signed_in(&self, sign_in_token: &str) -> Result<SignedIn, TurnError> {
        self.bounded("identity lookup", async {
            let uid = self
                .identities
                .uid_for_sign_in_token(sign_in_token)
                .await?
                .ok_or(TurnError::NotSignedIn)?;
            let refresh_token = self
                .identities
                .identity(&uid)
                .await?
                .and_then(|identity| identity.refresh_token)
                .ok_or(TurnError::NotSignedIn)?;
            Ok::<_, TurnError>(SignedIn { uid, refresh_token })
        })
        .await
    }

    async fn refresh_access_token(&self, account: &SignedIn) -> Result<String, TurnError> {
        let token = self
            .bounded("token refresh", async {
                self.provider
                    .refresh_access_token(&account.refresh_token)
                    .await
                    .map_err(TurnError::TokenRefresh)
            })
            .await?;
        debug!("Refreshed access token for {}", account.uid);
        Ok(token)
    }

    async fn recommend(
        &self,
        mood: Mood,
        session: &mut ConversationSession,
        account: &SignedIn,
    ) -> Result<TurnReply, TurnError> {
        let access_token = self.refresh_access_token(account).await?;

        let last_index = session.last_index;
        let selection = self
            .bounded("song store", async {
                Ok::<_, TurnError>(self.selector.select(mood, last_index).await?)
            })
            .await?;

        let messages = vec![
            compose_recommendation(&selection.song, self.sentiment.as_ref()),
            analysis_prompt(&selection.song),
        ];

        session.access_token = Some(access_token);
        session.apply_selection(selection);
        Ok(TurnReply { messages })
    }

    fn playable(session: &ConversationSession) -> Result<(&CurrentSong, String), TurnError> {
        let current = session.current.as_ref().ok_or(TurnError::NoActiveSong)?;
        let track_id = current
            .track_id
            .clone()
            .ok_or_else(|| TurnError::TrackUnavailable(current.song.song.clone()))?;
        Ok((current, track_id))
    }

    async fn analyse(
        &self,
        session: &mut ConversationSession,
        account: &SignedIn,
    ) -> Result<TurnReply, TurnError> {
        let (current, track_id) = Self::playable(session)?;
        let access_token = self.refresh_access_token(account).await?;

        let features = self
            .bounded("audio analysis", async {
                self.provider
                    .audio_features(&access_token, &track_id)
                    .await
                    .map_err(TurnError::Provider)
            })
            .await?;
        let message = compose_audio_analysis(&current.song, &features);

        session.access_token = Some(access_token);
        if let Some(current) = session.current.as_mut() {
            current.features = Some(features);
        }
        Ok(TurnReply {
            messages: vec![message],
        })
    }

    async fn play(
        &self,
        session: &mut ConversationSession,
        account: &SignedIn,
    ) -> Result<TurnReply, TurnError> {
        let (current, track_id) = Self::playable(session)?;
        let access_token = self.refresh_access_token(account).await?;
        info!("Starting playback of {}", current.song);

        self.bounded("playback", async {
            self.provider
                .play_track(&access_token, &track_id)
                .await
                .map_err(TurnError::Provider)
        })
        .await?;

        session.access_token = Some(access_token);
        Ok(TurnReply {
            messages: vec![PLAYBACK_ACKNOWLEDGEMENT.to_string()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::InMemoryIdentityStore;
    use crate::sentiment::LexiconSentiment;
    use crate::store::InMemorySongStore;
    use crate::testing::{full_store, signed_in_identities, song, FakeProvider};

    const CONVERSATION: &str = "conversation-1";

    struct Fixture {
        dispatcher: Dispatcher,
        provider: Arc<FakeProvider>,
        sign_in_token: String,
    }

    impl Fixture {
        fn turn(&self, intent: &str) -> Turn {
            Turn {
                conversation_id: CONVERSATION.to_string(),
                intent: intent.to_string(),
                sign_in_token: self.sign_in_token.clone(),
            }
        }

        async fn run(&self, intent: &str) -> Result<TurnReply, TurnError> {
            self.dispatcher.handle_turn(&self.turn(intent)).await
        }

        async fn session(&self) -> SharedSession {
            self.dispatcher.sessions().existing(CONVERSATION).await.unwrap()
        }
    }

    async fn timed_fixture(
        provider: FakeProvider,
        store: InMemorySongStore,
        outbound_timeout: Duration,
    ) -> Fixture {
        let provider = Arc::new(provider);
        let (identities, sign_in_token) = signed_in_identities().await;
        let dispatcher = Dispatcher::new(
            MoodSelector::with_seed(Arc::new(store), 99),
            provider.clone(),
            Arc::new(identities),
            Arc::new(LexiconSentiment),
            outbound_timeout,
        );
        Fixture {
            dispatcher,
            provider,
            sign_in_token,
        }
    }

    async fn fixture_with(provider: FakeProvider, store: InMemorySongStore) -> Fixture {
        timed_fixture(provider, store, Duration::from_secs(10)).await
    }

    async fn fixture() -> Fixture {
        fixture_with(FakeProvider::default(), full_store()).await
    }

    #[test]
    fn test_table_has_six_steps_per_mood() {
        let table = dispatch_table();
        assert_eq!(table.len(), 24);
        for mood in Mood::ALL {
            let steps: Vec<_> = table.values().filter(|s| s.mood == mood).collect();
            assert_eq!(steps.len(), 6);
        }
    }

    #[test]
    fn test_parse_front_end_and_compact_labels() {
        let cases = [
            ("-Sad - yes", Mood::Sad, DialogueStep::InitialAsk),
            ("-Sad - yes - no - no-chooseAgain", Mood::Sad, DialogueStep::RetryOnNo),
            ("-Happy - yes - no - yes", Mood::Happy, DialogueStep::ConfirmPlay),
            ("Happy-yes-yes", Mood::Happy, DialogueStep::Analysis),
            ("angry-YES-yes-yes", Mood::Angry, DialogueStep::PostAnalysisPlay),
            ("-Confident - yes - yes - no - yes", Mood::Confident, DialogueStep::RetryAfterAnalysis),
        ];
        for (label, mood, step) in cases {
            assert_eq!(
                ConversationState::parse(label),
                Some(ConversationState::new(mood, step)),
                "{label}"
            );
        }
        assert_eq!(ConversationState::parse("Sad-no"), None);
        assert_eq!(ConversationState::parse("Bored-yes"), None);
        assert_eq!(ConversationState::parse(""), None);
    }

    #[test]
    fn test_actions() {
        let action = |label: &str| ConversationState::parse(label).unwrap().action();
        assert_eq!(action("Sad-yes"), Action::SelectMood(Mood::Sad));
        assert_eq!(action("Angry-yes-no-no-chooseAgain"), Action::SelectMood(Mood::Angry));
        assert_eq!(action("Happy-yes-yes-no-yes"), Action::SelectMood(Mood::Happy));
        assert_eq!(action("Happy-yes-yes"), Action::TriggerAudioAnalysis);
        assert_eq!(action("Confident-yes-no-yes"), Action::TriggerPlayback);
        assert_eq!(action("Confident-yes-yes-yes"), Action::TriggerPlayback);
    }

    #[test]
    fn test_label_round_trips_through_table() {
        let state = ConversationState::new(Mood::Sad, DialogueStep::RetryAfterAnalysis);
        assert_eq!(state.label(), "Sad-yes-yes-no-yes");
        assert_eq!(ConversationState::parse(&state.label()), Some(state));
    }

    #[tokio::test]
    async fn test_sad_yes_recommends_song_from_sad_range() {
        let f = fixture().await;
        let reply = f.run("Sad-yes").await.unwrap();

        let session = f.session().await;
        let session = session.lock().await;
        let index = session.last_index.unwrap();
        assert!(Mood::Sad.range().contains(index));
        assert_eq!(session.access_token.as_deref(), Some("fresh-refresh"));

        let current = session.current.as_ref().unwrap();
        assert_eq!(current.song, song(index));
        assert_eq!(reply.messages.len(), 2);
        assert!(reply.messages[0].contains(&format!("Song {index}")));
        assert!(reply.messages[0].contains(&format!("Artist {index}")));
        assert!(reply.messages[1].starts_with("Would you like to hear audio analysis"));
    }

    #[tokio::test]
    async fn test_retry_never_repeats_previous_song() {
        let f = fixture().await;
        f.run("-Angry - yes").await.unwrap();
        let session = f.session().await;

        let mut previous = session.lock().await.last_index.unwrap();
        for _ in 0..20 {
            f.run("-Angry - yes - no - no-chooseAgain").await.unwrap();
            let index = session.lock().await.last_index.unwrap();
            assert_ne!(index, previous);
            previous = index;
        }
    }

    #[tokio::test]
    async fn test_happy_analysis_describes_features() {
        let f = fixture().await;
        f.run("Happy-yes").await.unwrap();
        let reply = f.run("Happy-yes-yes").await.unwrap();

        let text = &reply.messages[0];
        assert!(text.contains("medium"));
        assert!(text.contains("C major"));
        assert!(text.contains("happy and uplifting"));

        let session = f.session().await;
        let features = session.lock().await.current.as_ref().unwrap().features;
        assert_eq!(features.map(|f| f.key), Some(0));
    }

    #[tokio::test]
    async fn test_playback_uses_current_track() {
        let f = fixture().await;
        f.run("Confident-yes").await.unwrap();
        let reply = f.run("Confident-yes-no-yes").await.unwrap();
        assert_eq!(reply.messages, vec![PLAYBACK_ACKNOWLEDGEMENT.to_string()]);

        let index = f.session().await.lock().await.last_index.unwrap();
        let played = f.provider.played.lock().unwrap().clone();
        assert_eq!(
            played,
            vec![("fresh-refresh".to_string(), format!("track{index}"))]
        );
    }

    #[tokio::test]
    async fn test_unknown_intent_is_reported() {
        let f = fixture().await;
        let err = f.run("Sad-maybe").await.unwrap_err();
        assert!(matches!(err, TurnError::UnhandledIntent(ref label) if label == "Sad-maybe"));
        assert_eq!(err.kind(), "unhandled_intent");
    }

    #[tokio::test]
    async fn test_analysis_and_playback_need_a_song() {
        let f = fixture().await;
        for intent in ["Sad-yes-yes", "Sad-yes-yes-yes"] {
            let err = f.run(intent).await.unwrap_err();
            assert!(matches!(err, TurnError::NoActiveSong), "{intent}");
        }
        assert!(f.provider.refreshed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_song_is_reported_before_refresh() {
        let f = fixture_with(
            FakeProvider {
                refresh_fails: true,
                ..Default::default()
            },
            full_store(),
        )
        .await;

        let err = f.run("Happy-yes-yes").await.unwrap_err();
        assert!(matches!(err, TurnError::NoActiveSong));
        assert!(f.provider.refreshed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_uri_disables_playback_only() {
        let mut store = InMemorySongStore::new();
        for i in 0..=3 {
            let mut record = song(i);
            record.track_uri = "28cnXtME493VX9NOw9cIUh".to_string();
            store.insert(i, record);
        }
        let f = fixture_with(FakeProvider::default(), store).await;

        let reply = f.run("Angry-yes").await.unwrap();
        assert!(reply.messages[0].starts_with("I recommend"));
        assert_eq!(f.provider.refreshed.lock().unwrap().len(), 1);

        let err = f.run("Angry-yes-yes-yes").await.unwrap_err();
        assert!(matches!(err, TurnError::TrackUnavailable(_)));
        assert!(err.spoken().contains("isn't available on Spotify"));
        assert_eq!(f.provider.refreshed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_aborts_turn_without_session() {
        let f = fixture_with(
            FakeProvider {
                refresh_fails: true,
                ..Default::default()
            },
            full_store(),
        )
        .await;

        let err = f.run("Sad-yes").await.unwrap_err();
        assert!(matches!(err, TurnError::TokenRefresh(_)));
        assert!(f.dispatcher.sessions().is_empty().await);
    }

    #[tokio::test]
    async fn test_store_failure_keeps_previous_song() {
        let mut store = InMemorySongStore::new();
        store.insert(0, song(0));
        let f = fixture_with(FakeProvider::default(), store).await;

        // Only index 0 exists, so the first pick may or may not land on it.
        let mut succeeded = false;
        for _ in 0..50 {
            if f.run("Angry-yes").await.is_ok() {
                succeeded = true;
                break;
            }
            assert!(f.dispatcher.sessions().is_empty().await);
        }
        assert!(succeeded);
        let session = f.session().await;
        assert_eq!(session.lock().await.last_index, Some(0));

        // Index 0 is now excluded, every other angry index is missing.
        let err = f.run("Angry-yes").await.unwrap_err();
        assert!(matches!(err, TurnError::StoreFetch(StoreError::NotFound(_))));
        let session = session.lock().await;
        assert_eq!(session.last_index, Some(0));
        assert_eq!(session.current.as_ref().unwrap().song, song(0));
    }

    #[tokio::test]
    async fn test_unknown_sign_in_token_leaves_no_trace() {
        let f = fixture().await;
        for token in ["", "not-a-token"] {
            let turn = Turn {
                sign_in_token: token.to_string(),
                ..f.turn("Sad-yes")
            };
            let err = f.dispatcher.handle_turn(&turn).await.unwrap_err();
            assert!(matches!(err, TurnError::NotSignedIn), "{token:?}");
        }
        assert!(f.provider.refreshed.lock().unwrap().is_empty());
        assert!(f.dispatcher.sessions().is_empty().await);
    }

    #[tokio::test]
    async fn test_account_without_refresh_token_is_not_signed_in() {
        let identities = InMemoryIdentityStore::new();
        let sign_in_token = identities
            .provision(
                &crate::testing::profile(),
                &crate::auth::ProviderTokens {
                    access_token: "access".to_string(),
                    refresh_token: None,
                },
            )
            .await
            .unwrap();
        let dispatcher = Dispatcher::new(
            MoodSelector::with_seed(Arc::new(full_store()), 1),
            Arc::new(FakeProvider::default()),
            Arc::new(identities),
            Arc::new(LexiconSentiment),
            Duration::from_secs(10),
        );
        let turn = Turn {
            conversation_id: CONVERSATION.to_string(),
            intent: "Sad-yes".to_string(),
            sign_in_token,
        };
        let err = dispatcher.handle_turn(&turn).await.unwrap_err();
        assert!(matches!(err, TurnError::NotSignedIn));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let f = timed_fixture(
            FakeProvider {
                delay: Some(Duration::from_secs(5)),
                ..Default::default()
            },
            full_store(),
            Duration::from_millis(20),
        )
        .await;
        let err = f.run("Sad-yes").await.unwrap_err();
        assert!(matches!(err, TurnError::Timeout("token refresh")));
        assert!(f.dispatcher.sessions().is_empty().await);
    }

    #[tokio::test]
    async fn test_conversations_do_not_share_state() {
        let f = fixture().await;
        f.run("Sad-yes").await.unwrap();

        let other = Turn {
            conversation_id: "conversation-2".to_string(),
            ..f.turn("Sad-yes-yes")
        };
        let err = f.dispatcher.handle_turn(&other).await.unwrap_err();
        assert!(matches!(err, TurnError::NoActiveSong));
        assert_eq!(f.dispatcher.sessions().len().await, 1);
    }
}
