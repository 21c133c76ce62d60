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

use crate::models::SongRecord;
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No song stored at index {0}")]
    NotFound(u32),
    #[error("Song store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Could not read song store: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed song store data: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Key-value store of analysed songs, keyed by integer index.
#[async_trait]
pub trait SongStore: Send + Sync {
    async fn fetch(&self, index: u32) -> Result<SongRecord, StoreError>;
}

/// Realtime Database exports come out as an array when keys are dense integers,
/// and as an object otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoreExport {
    Dense(Vec<Option<SongRecord>>),
    Sparse(HashMap<String, SongRecord>),
}

/// Song store held in memory, usually loaded from a JSON export.
#[derive(Debug, Default, Clone)]
pub struct InMemorySongStore {
    songs: HashMap<u32, SongRecord>,
}

impl InMemorySongStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: u32, song: SongRecord) {
        self.songs.insert(index, song);
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn from_json_str(json: &str) -> Result<Self, StoreError> {
        let songs = match serde_json::from_str(json)? {
            StoreExport::Dense(entries) => entries
                .into_iter()
                .enumerate()
                .filter_map(|(i, song)| Some((i as u32, song?)))
                .collect(),
            StoreExport::Sparse(entries) => entries
                .into_iter()
                // Keys that are not indexes can't be selected anyway.
                .filter_map(|(key, song)| key.trim().parse::<u32>().ok().map(|i| (i, song)))
                .collect(),
        };
        Ok(Self { songs })
    }

    pub fn from_path(path: &Path) -> Result<Self, StoreError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[async_trait]
impl SongStore for InMemorySongStore {
    async fn fetch(&self, index: u32) -> Result<SongRecord, StoreError> {
        self.songs
            .get(&index)
            .cloned()
            .ok_or(StoreError::NotFound(index))
    }
}

/// Reads songs from a Firebase Realtime Database over its REST interface.
pub struct FirebaseSongStore {
    client: reqwest::Client,
    base_url: String,
}

impl FirebaseSongStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn record_url(&self, index: u32) -> String {
        format!("{}/{}.json", self.base_url, index)
    }
}

#[async_trait]
impl SongStore for FirebaseSongStore {
    async fn fetch(&self, index: u32) -> Result<SongRecord, StoreError> {
        let url = self.record_url(index);
        debug!("Fetching song {} from {}", index, self.base_url);

        let record: Option<SongRecord> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        record.ok_or(StoreError::NotFound(index))
    }
}

/// Opens the store named by `source`: an `http(s)://` database URL or a path to a JSON export.
pub fn open_song_store(source: &str) -> Result<Arc<dyn SongStore>, StoreError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        Ok(Arc::new(FirebaseSongStore::new(source)))
    } else {
        Ok(Arc::new(InMemorySongStore::from_path(Path::new(source))?))
    }
}
