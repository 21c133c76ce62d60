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

//! In-memory collaborators shared by the unit tests.

use crate::auth::{MusicProvider, ProviderError, ProviderProfile, ProviderTokens};
use crate::identity::{IdentityStore, InMemoryIdentityStore};
use crate::models::{AudioFeatures, Emotion, SongRecord};
use crate::store::InMemorySongStore;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

pub fn song(index: u32) -> SongRecord {
    SongRecord {
        song: format!("Song {index}"),
        artist: format!("Artist {index}"),
        track_uri: format!("spotify:track:track{index}"),
        max_emotion: Emotion::Sadness,
        emotion_score: 0.8,
        max_sentence: "I cry alone in the dark".to_string(),
        max_sentence_score: -0.7,
    }
}

/// Store with a song at every index used by the mood ranges.
pub fn full_store() -> InMemorySongStore {
    let mut store = InMemorySongStore::new();
    for i in 0..=123 {
        store.insert(i, song(i));
    }
    store
}

pub fn profile() -> ProviderProfile {
    ProviderProfile {
        id: "listener".to_string(),
        display_name: Some("Listener".to_string()),
        email: None,
        image_url: None,
    }
}

/// Identity store where `spotify:listener` has already signed in, with the
/// sign-in token it was handed.
pub async fn signed_in_identities() -> (InMemoryIdentityStore, String) {
    let identities = InMemoryIdentityStore::new();
    let sign_in_token = identities
        .provision(
            &profile(),
            &ProviderTokens {
                access_token: "initial-access".to_string(),
                refresh_token: Some("refresh".to_string()),
            },
        )
        .await
        .expect("in-memory provisioning never fails");
    (identities, sign_in_token)
}

pub struct FakeProvider {
    pub refresh_fails: bool,
    pub exchange_fails: bool,
    pub features: AudioFeatures,
    pub delay: Option<Duration>,
    pub played: Mutex<Vec<(String, String)>>,
    pub refreshed: Mutex<Vec<String>>,
    pub exchanged_codes: Mutex<Vec<String>>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self {
            refresh_fails: false,
            exchange_fails: false,
            features: AudioFeatures {
                tempo: 95.0,
                key: 0,
                mode: 1,
                danceability: 0.5,
                valence: 0.5,
            },
            delay: None,
            played: Mutex::new(Vec::new()),
            refreshed: Mutex::new(Vec::new()),
            exchanged_codes: Mutex::new(Vec::new()),
        }
    }
}

impl FakeProvider {
    async fn maybe_wait(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl MusicProvider for FakeProvider {
    fn authorize_url(&self, state: &str) -> Result<String, ProviderError> {
        Ok(format!(
            "https://accounts.spotify.com/authorize?response_type=code&state={state}"
        ))
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, ProviderError> {
        self.exchanged_codes.lock().unwrap().push(code.to_string());
        if self.exchange_fails {
            return Err(ProviderError::MissingToken);
        }
        Ok(ProviderTokens {
            access_token: format!("access-for-{code}"),
            refresh_token: Some(format!("refresh-for-{code}")),
        })
    }

    async fn current_user(&self, _access_token: &str) -> Result<ProviderProfile, ProviderError> {
        Ok(profile())
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, ProviderError> {
        self.refreshed.lock().unwrap().push(refresh_token.to_string());
        self.maybe_wait().await;
        if self.refresh_fails {
            return Err(ProviderError::MissingToken);
        }
        Ok(format!("fresh-{refresh_token}"))
    }

    async fn audio_features(
        &self,
        _access_token: &str,
        _track_id: &str,
    ) -> Result<AudioFeatures, ProviderError> {
        Ok(self.features)
    }

    async fn play_track(&self, access_token: &str, track_id: &str) -> Result<(), ProviderError> {
        self.played
            .lock()
            .unwrap()
            .push((access_token.to_string(), track_id.to_string()));
        Ok(())
    }
}
