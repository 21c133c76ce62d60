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

//! Lyric polarity scoring. The narration only cares about the sign of the score.

/// Scores a piece of text: positive above zero, negative below, zero when undecided.
pub trait LyricSentiment: Send + Sync {
    fn score(&self, text: &str) -> f32;
}

const POSITIVE_WORDS: &[(&str, f32)] = &[
    ("love", 0.625),
    ("loved", 0.5),
    ("happy", 0.875),
    ("joy", 0.75),
    ("smile", 0.5),
    ("good", 0.625),
    ("beautiful", 0.75),
    ("free", 0.375),
    ("hope", 0.5),
    ("bright", 0.5),
    ("shine", 0.375),
    ("sweet", 0.5),
    ("alive", 0.375),
    ("strong", 0.375),
    ("dance", 0.25),
    ("dream", 0.25),
    ("heaven", 0.5),
    ("laugh", 0.5),
    ("win", 0.5),
    ("glory", 0.5),
    ("proud", 0.375),
    ("best", 0.75),
    ("kind", 0.5),
    ("warm", 0.375),
    ("gold", 0.25),
];

const NEGATIVE_WORDS: &[(&str, f32)] = &[
    ("hate", 0.75),
    ("sad", 0.75),
    ("cry", 0.625),
    ("tears", 0.5),
    ("pain", 0.75),
    ("hurt", 0.625),
    ("alone", 0.5),
    ("lonely", 0.625),
    ("die", 0.625),
    ("dead", 0.625),
    ("death", 0.625),
    ("dark", 0.375),
    ("broken", 0.625),
    ("lost", 0.375),
    ("fear", 0.5),
    ("angry", 0.625),
    ("rage", 0.625),
    ("kill", 0.75),
    ("lie", 0.375),
    ("wrong", 0.5),
    ("cold", 0.25),
    ("bleed", 0.5),
    ("goodbye", 0.25),
    ("never", 0.125),
    ("worst", 0.75),
];

const NEGATIONS: &[&str] = &["not", "no", "never", "don't", "can't", "won't", "ain't"];

/// Word-list scorer. Each known word adds its weight, flipped when the previous word negates it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexiconSentiment;

impl LexiconSentiment {
    fn weight(word: &str) -> f32 {
        if let Some((_, w)) = POSITIVE_WORDS.iter().find(|(p, _)| *p == word) {
            return *w;
        }
        if let Some((_, w)) = NEGATIVE_WORDS.iter().find(|(n, _)| *n == word) {
            return -*w;
        }
        0.0
    }
}

impl LyricSentiment for LexiconSentiment {
    fn score(&self, text: &str) -> f32 {
        let words: Vec<String> = text
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect();

        let mut total = 0.0;
        for (i, word) in words.iter().enumerate() {
            let mut weight = Self::weight(word);
            if i > 0 && NEGATIONS.contains(&words[i - 1].as_str()) {
                weight = -weight;
            }
            total += weight;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexicon_polarity() {
        let scorer = LexiconSentiment;
        assert!(scorer.score("All you need is love, love is all you need") > 0.0);
        assert!(scorer.score("Everyone I know goes away in the end, I hurt myself today") < 0.0);
        assert_eq!(scorer.score("Take the A train"), 0.0);
        assert_eq!(scorer.score(""), 0.0);
    }

    #[test]
    fn test_negation_flips_weight() {
        let scorer = LexiconSentiment;
        assert!(scorer.score("I am happy") > 0.0);
        assert!(scorer.score("I am not happy") < 0.0);
    }
}
