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

use crate::models::AudioFeatures;
use async_trait::async_trait;
use log::debug;
use rspotify::{
    model::{Modality, PlayableId, TrackId},
    prelude::*,
    scopes, AuthCodeSpotify, Config, Credentials, OAuth, Token,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to initialize Spotify client: {0}")]
    ClientConfig(String),
    #[error("Spotify request failed: {0}")]
    Spotify(#[from] rspotify::ClientError),
    #[error("Spotify did not hand out a token")]
    MissingToken,
    #[error("Spotify token is unavailable")]
    TokenLock,
    #[error("Invalid Track ID: {0}")]
    InvalidTrackId(String),
}

/// Tokens obtained when the user grants access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// The signed-in provider account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub image_url: Option<String>,
}

/// Everything the assistant needs from the music service.
#[async_trait]
pub trait MusicProvider: Send + Sync {
    /// Consent screen URL carrying `state` for CSRF validation on the way back.
    fn authorize_url(&self, state: &str) -> Result<String, ProviderError>;

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, ProviderError>;

    async fn current_user(&self, access_token: &str) -> Result<ProviderProfile, ProviderError>;

    /// Trades a refresh token for a fresh access token (grant_type=refresh_token).
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, ProviderError>;

    async fn audio_features(
        &self,
        access_token: &str,
        track_id: &str,
    ) -> Result<AudioFeatures, ProviderError>;

    /// Starts playing a single track on the user's active device.
    async fn play_track(&self, access_token: &str, track_id: &str) -> Result<(), ProviderError>;
}

/// Spotify Web API backed provider using the Authorization Code Flow.
pub struct SpotifyProvider {
    creds: Credentials,
    oauth: OAuth,
}

impl SpotifyProvider {
    pub fn new(creds: Credentials, oauth: OAuth) -> Self {
        Self { creds, oauth }
    }

    /// Builds the provider from the environment.
    ///
    /// Reads `RSPOTIFY_CLIENT_ID`, `RSPOTIFY_CLIENT_SECRET` and `RSPOTIFY_REDIRECT_URI`,
    /// and asks for every scope the assistant uses: profile, playback control and library access.
    pub fn from_env() -> Result<Self, ProviderError> {
        let creds = Credentials::from_env().ok_or_else(|| {
            ProviderError::ClientConfig(
                "Missing RSPOTIFY_CLIENT_ID or RSPOTIFY_CLIENT_SECRET".to_string(),
            )
        })?;

        let scopes = scopes!(
            "user-read-email",
            "app-remote-control",
            "streaming",
            "user-modify-playback-state",
            "playlist-read-private",
            "user-library-modify",
            "playlist-read-collaborative",
            "playlist-modify-private",
            "user-follow-modify",
            "user-read-currently-playing",
            "user-library-read",
            "user-top-read",
            "playlist-modify-public",
            "user-follow-read",
            "user-read-playback-state",
            "user-read-recently-played"
        );

        let oauth = OAuth::from_env(scopes).ok_or_else(|| {
            ProviderError::ClientConfig("Missing RSPOTIFY_REDIRECT_URI".to_string())
        })?;

        Ok(Self::new(creds, oauth))
    }

    fn client(&self) -> AuthCodeSpotify {
        // Tokens live in the identity store and in each conversation, never in a cache file.
        let config = Config {
            token_cached: false,
            token_refreshing: false,
            ..Default::default()
        };
        AuthCodeSpotify::with_config(self.creds.clone(), self.oauth.clone(), config)
    }

    async fn client_with_token(&self, token: Token) -> Result<AuthCodeSpotify, ProviderError> {
        let client = self.client();
        *client
            .token
            .lock()
            .await
            .map_err(|_| ProviderError::TokenLock)? = Some(token);
        Ok(client)
    }

    async fn client_with_access_token(
        &self,
        access_token: &str,
    ) -> Result<AuthCodeSpotify, ProviderError> {
        let lifetime = chrono::Duration::seconds(3600);
        let token = Token {
            access_token: access_token.to_string(),
            expires_in: lifetime,
            expires_at: Some(chrono::Utc::now() + lifetime),
            ..Default::default()
        };
        self.client_with_token(token).await
    }

    async fn stored_token(client: &AuthCodeSpotify) -> Result<Token, ProviderError> {
        client
            .token
            .lock()
            .await
            .map_err(|_| ProviderError::TokenLock)?
            .clone()
            .ok_or(ProviderError::MissingToken)
    }
}

fn mode_number(mode: Modality) -> i32 {
    match mode {
        Modality::Minor => 0,
        Modality::Major => 1,
        Modality::NoResult => -1,
    }
}

#[async_trait]
impl MusicProvider for SpotifyProvider {
    fn authorize_url(&self, state: &str) -> Result<String, ProviderError> {
        let mut oauth = self.oauth.clone();
        oauth.state = state.to_string();
        let client = AuthCodeSpotify::new(self.creds.clone(), oauth);
        Ok(client.get_authorize_url(false)?)
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, ProviderError> {
        let client = self.client();
        client.request_token(code).await?;
        let token = Self::stored_token(&client).await?;
        debug!("Authorization code exchanged, refresh token present: {}", token.refresh_token.is_some());

        Ok(ProviderTokens {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
        })
    }

    async fn current_user(&self, access_token: &str) -> Result<ProviderProfile, ProviderError> {
        let client = self.client_with_access_token(access_token).await?;
        let user = client.current_user().await?;

        Ok(ProviderProfile {
            id: user.id.id().to_string(),
            display_name: user.display_name,
            email: user.email,
            image_url: user
                .images
                .and_then(|images| images.into_iter().next())
                .map(|image| image.url),
        })
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, ProviderError> {
        let client = self
            .client_with_token(Token {
                refresh_token: Some(refresh_token.to_string()),
                ..Default::default()
            })
            .await?;
        client.refresh_token().await?;
        Ok(Self::stored_token(&client).await?.access_token)
    }

    async fn audio_features(
        &self,
        access_token: &str,
        track_id: &str,
    ) -> Result<AudioFeatures, ProviderError> {
        let id = TrackId::from_id(track_id)
            .map_err(|_| ProviderError::InvalidTrackId(track_id.to_string()))?;
        let client = self.client_with_access_token(access_token).await?;
        let features = client.track_features(id).await?;

        Ok(AudioFeatures {
            tempo: features.tempo,
            key: features.key,
            mode: mode_number(features.mode),
            danceability: features.danceability,
            valence: features.valence,
        })
    }

    async fn play_track(&self, access_token: &str, track_id: &str) -> Result<(), ProviderError> {
        let id = TrackId::from_id(track_id)
            .map_err(|_| ProviderError::InvalidTrackId(track_id.to_string()))?;
        let client = self.client_with_access_token(access_token).await?;
        client
            .start_uris_playback([PlayableId::Track(id)], None, None, None)
            .await?;
        Ok(())
    }
}
