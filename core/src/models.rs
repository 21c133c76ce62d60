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

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;

const TRACK_URI_PREFIX: &str = "spotify:track:";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UriError {
    #[error("Malformed track URI: {0:?}")]
    Malformed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown mood: {0}")]
pub struct UnknownMood(pub String);

/// Mood categories offered by the assistant. Each one owns a disjoint slice of the song store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Sad,
    Happy,
    Angry,
    Confident,
}

impl Mood {
    pub const ALL: [Mood; 4] = [Mood::Sad, Mood::Happy, Mood::Angry, Mood::Confident];

    /// Inclusive index range of the song store holding songs for this mood.
    pub fn range(self) -> MoodRange {
        match self {
            Mood::Sad => MoodRange::new(92, 123),
            Mood::Happy => MoodRange::new(37, 91),
            Mood::Angry => MoodRange::new(0, 3),
            Mood::Confident => MoodRange::new(4, 36),
        }
    }

    /// Name as it appears at the head of a conversation label.
    pub fn label(self) -> &'static str {
        match self {
            Mood::Sad => "Sad",
            Mood::Happy => "Happy",
            Mood::Angry => "Angry",
            Mood::Confident => "Confident",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Mood {
    type Err = UnknownMood;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mood::ALL
            .into_iter()
            .find(|mood| mood.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownMood(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoodRange {
    pub low: u32,
    pub high: u32,
}

impl MoodRange {
    pub const fn new(low: u32, high: u32) -> Self {
        Self { low, high }
    }

    pub fn size(&self) -> u32 {
        self.high - self.low + 1
    }

    pub fn contains(&self, index: u32) -> bool {
        self.as_range().contains(&index)
    }

    pub fn as_range(&self) -> RangeInclusive<u32> {
        self.low..=self.high
    }
}

/// Dominant emotion detected in a song's lyrics when it was ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Joy,
    Sadness,
    Anger,
    Confident,
    #[serde(other)]
    Unknown,
}

impl Emotion {
    /// Adjective used when the assistant talks about the lyrics.
    pub fn spoken(self) -> Option<&'static str> {
        match self {
            Emotion::Joy => Some("happy"),
            Emotion::Sadness => Some("sad"),
            Emotion::Anger => Some("angry"),
            Emotion::Confident => Some("confident"),
            Emotion::Unknown => None,
        }
    }
}

/// A previously analysed song, as kept in the song store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongRecord {
    pub song: String,
    pub artist: String,
    #[serde(rename = "spotifyCode")]
    pub track_uri: String,
    pub max_emotion: Emotion,
    #[serde(rename = "score")]
    pub emotion_score: f32,
    pub max_sentence: String,
    pub max_sentence_score: f32,
}

impl SongRecord {
    pub fn track_id(&self) -> Result<String, UriError> {
        parse_track_uri(&self.track_uri)
    }
}

impl fmt::Display for SongRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {} [{}]", self.song, self.artist, self.track_uri)
    }
}

/// Extracts the bare track ID out of a `spotify:track:<ID>` URI. A trailing
/// query such as `?si=...` from a share link is dropped.
pub fn parse_track_uri(uri: &str) -> Result<String, UriError> {
    let id = uri
        .trim()
        .strip_prefix(TRACK_URI_PREFIX)
        .and_then(|rest| rest.split('?').next())
        .ok_or_else(|| UriError::Malformed(uri.to_string()))?;

    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(UriError::Malformed(uri.to_string()));
    }
    Ok(id.to_string())
}

/// Raw audio analysis values for a track, as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub tempo: f32,
    /// Pitch class 0..=11, or -1 when no key was detected.
    pub key: i32,
    /// 0 minor, 1 major, -1 when no mode was detected.
    pub mode: i32,
    pub danceability: f32,
    pub valence: f32,
}
