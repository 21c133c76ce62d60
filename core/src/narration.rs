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

//! Spoken sentences for a recommended song.

use crate::descriptors::{
    certainty_qualifier, danceability_suitability, key_emotion, key_with_mode,
    mode_valence_combination, sentiment_qualifier, tempo_bucket, Sentiment,
};
use crate::models::{AudioFeatures, SongRecord};
use crate::sentiment::LyricSentiment;

fn extract_annotation(sentiment: Sentiment) -> &'static str {
    match sentiment {
        Sentiment::Positive => "which I have analysed as being positive",
        Sentiment::Negative => "which I have analysed as being negative",
        Sentiment::Neutral => "which I will now read",
    }
}

/// Introduces the song and reads out its most emotional lyric.
pub fn compose_recommendation(song: &SongRecord, sentiment: &dyn LyricSentiment) -> String {
    let mut parts = vec![format!("I recommend {} by {}.", song.song, song.artist)];

    let emotion = song.max_emotion.spoken();
    if let Some(emotion) = emotion {
        parts.push(format!(
            "According to my lyrics analysis, those used in {} are mainly {} with {} high degree of certainty.",
            song.song,
            emotion,
            certainty_qualifier(song.emotion_score).phrase()
        ));
    }

    let extract = song.max_sentence.trim();
    if !extract.is_empty() {
        let annotation = extract_annotation(sentiment_qualifier(sentiment.score(extract)));
        parts.push(format!(
            "The following extract, {}, was found to be the most {} lyric in the entire song.",
            annotation,
            emotion.unwrap_or("telling")
        ));
        parts.push(format!("I'll read it to you now, Ahem... {}...", extract));
    }

    parts.join(" ")
}

pub fn analysis_prompt(song: &SongRecord) -> String {
    format!("Would you like to hear audio analysis of {}'s melody?", song.song)
}

/// Describes tempo, danceability, key and valence of the song's audio analysis.
pub fn compose_audio_analysis(song: &SongRecord, features: &AudioFeatures) -> String {
    let mut parts = vec![format!(
        "{} has a {} tempo with {} beats per minute and is {}.",
        song.song,
        tempo_bucket(features.tempo).as_str(),
        features.tempo.round() as i64,
        danceability_suitability(features.danceability).phrase()
    )];

    match key_with_mode(features.key, features.mode) {
        Ok(key) => {
            parts.push(format!("It is in the key of {}...", key));
            if let Some(emotion) = key_emotion(&key) {
                parts.push(format!(
                    "Songs that are written in the key of {} often evoke {} emotions...",
                    key, emotion
                ));
            }
        }
        Err(_) => parts.push("I couldn't make out which key it is in...".to_string()),
    }

    if let Some(phrase) = mode_valence_combination(features.mode, features.valence) {
        parts.push(phrase.to_string());
    }

    parts.push("Would you still like to listen to this song?".to_string());
    parts.join(" ")
}
