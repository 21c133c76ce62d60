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

//! Conversions from raw audio analysis numbers to the phrases the assistant speaks.
//!
//! Everything in here is pure. Lookups that can miss return `Option` so the
//! narration can drop a clause instead of saying something wrong.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("Pitch class out of range: {0}")]
    UnknownKey(i32),
}

const KEY_NAMES: [&str; 12] = [
    "C",
    "C-sharp or D-flat",
    "D",
    "D-sharp or E-flat",
    "E",
    "F",
    "F-sharp or G-flat",
    "G",
    "G-sharp or A-flat",
    "A",
    "A-sharp or B-flat",
    "B",
];

const KEY_EMOTIONS: [(&str, &str); 24] = [
    ("C major", "happy and uplifting"),
    ("C minor", "sad and love sick"),
    ("C-sharp or D-flat minor", "despairing and sorrowful"),
    ("C-sharp or D-flat major", "grieving and depressive"),
    ("D major", "triumphant and victorious"),
    ("D minor", "negative and melancholic"),
    ("D-sharp or E-flat minor", "distressing and angsty"),
    ("D-sharp or E-flat major", "cruel and hardened yet intimate"),
    ("F major", "angry and regretful"),
    ("F minor", "depressive and harrowing"),
    ("E major", "boisterous, quarrelsome but also joyous"),
    ("E minor", "relamorous, restless and grief-carrying"),
    ("F-sharp or G-flat minor", "gloomy and resentful"),
    ("F-sharp or G-flat major", "relief and clarity-giving"),
    ("G major", "calm, idyllic and fanciful"),
    ("G minor", "discontentful and uneasy"),
    ("G-sharp or A-flat major", "haunting and lingering"),
    ("G-sharp or A-flat minor", "resentful, life-loathing and negative"),
    ("A major", "loving and joyful"),
    ("A minor", "tender, plaintive and pious"),
    ("A-sharp or B-flat major", "optimistic and hope-filled"),
    ("A-sharp or B-flat minor", "pessimistic and dark"),
    ("B major", "angry, jealous, desparing and burdened"),
    ("B minor", "solitary, melancholic and patient"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempoBucket {
    Low,
    Medium,
    High,
}

impl TempoBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            TempoBucket::Low => "low",
            TempoBucket::Medium => "medium",
            TempoBucket::High => "high",
        }
    }
}

pub fn tempo_bucket(bpm: f32) -> TempoBucket {
    if bpm < 80.0 {
        TempoBucket::Low
    } else if bpm < 120.0 {
        TempoBucket::Medium
    } else {
        TempoBucket::High
    }
}

pub fn key_name(key: i32) -> Result<&'static str, DescriptorError> {
    usize::try_from(key)
        .ok()
        .and_then(|index| KEY_NAMES.get(index).copied())
        .ok_or(DescriptorError::UnknownKey(key))
}

/// Mode number to its name. Anything other than 0 or 1 means no mode was detected.
pub fn mode_name(mode: i32) -> &'static str {
    match mode {
        0 => "minor",
        1 => "major",
        _ => "",
    }
}

/// Full spoken key, e.g. "C major". Falls back to the bare key name when there is no mode.
pub fn key_with_mode(key: i32, mode: i32) -> Result<String, DescriptorError> {
    let key = key_name(key)?;
    Ok(match mode_name(mode) {
        "" => key.to_string(),
        mode => format!("{} {}", key, mode),
    })
}

/// Emotional reading of a key such as "C major". Keys without a mode have no entry.
pub fn key_emotion(key_and_mode: &str) -> Option<&'static str> {
    KEY_EMOTIONS
        .iter()
        .find(|(key, _)| *key == key_and_mode)
        .map(|(_, emotion)| *emotion)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Danceability {
    Unsuitable,
    Moderate,
    Suitable,
}

impl Danceability {
    pub fn as_str(self) -> &'static str {
        match self {
            Danceability::Unsuitable => "unsuitable",
            Danceability::Moderate => "moderate",
            Danceability::Suitable => "suitable",
        }
    }

    pub fn phrase(self) -> &'static str {
        match self {
            Danceability::Unsuitable => "relatively unsuitable for dancing to",
            Danceability::Moderate => "moderately suitable for dancing to",
            Danceability::Suitable => "suitable for dancing to",
        }
    }
}

pub fn danceability_suitability(score: f32) -> Danceability {
    if score < 0.4 {
        Danceability::Unsuitable
    } else if score < 0.7 {
        Danceability::Moderate
    } else {
        Danceability::Suitable
    }
}

/// Contrasts the key's mode with the melody's valence. Valence in [0.30, 0.70] says nothing.
pub fn mode_valence_combination(mode: i32, valence: f32) -> Option<&'static str> {
    match (mode, valence) {
        (0, v) if v < 0.30 => {
            Some("Along with the minor key, the song's low valence suggests that it has a negative melody.")
        }
        (1, v) if v < 0.30 => {
            Some("Despite the major key, the song's low valence suggests that it has a negative melody.")
        }
        (0, v) if v > 0.70 => {
            Some("Despite the minor key, the song's high valence suggests that it has a positive melody.")
        }
        (1, v) if v > 0.70 => {
            Some("Along with the major key, the song's high valence suggests that it has a positive melody.")
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

pub fn sentiment_qualifier(score: f32) -> Sentiment {
    if score > 0.0 {
        Sentiment::Positive
    } else if score < 0.0 {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Certainty {
    Moderate,
    Extreme,
}

impl Certainty {
    pub fn as_str(self) -> &'static str {
        match self {
            Certainty::Moderate => "moderate",
            Certainty::Extreme => "extreme",
        }
    }

    /// Adverb with its article, as in "with an extremely high degree of certainty".
    pub fn phrase(self) -> &'static str {
        match self {
            Certainty::Moderate => "a moderately",
            Certainty::Extreme => "an extremely",
        }
    }
}

pub fn certainty_qualifier(score: f32) -> Certainty {
    if score < 0.75 {
        Certainty::Moderate
    } else {
        Certainty::Extreme
    }
}
