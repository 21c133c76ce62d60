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

use crate::models::{Mood, MoodRange, SongRecord};
use crate::store::{SongStore, StoreError};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};

/// Outcome of picking a song for a mood.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub index: u32,
    pub song: SongRecord,
    /// Bare track ID, `None` when the stored URI is malformed. Such songs can be
    /// recommended but not analysed or played.
    pub track_id: Option<String>,
}

/// Draws an index from `range` uniformly, never returning `last`.
///
/// When `last` lies inside the range the draw happens over the remaining
/// `size - 1` slots and skips past `last`, so no redraw loop is needed.
/// A single-slot range always returns its only index.
pub fn draw_index<R: Rng + ?Sized>(range: MoodRange, last: Option<u32>, rng: &mut R) -> u32 {
    match last {
        Some(last) if range.size() > 1 && range.contains(last) => {
            let candidate = range.low + rng.gen_range(0..range.size() - 1);
            if candidate >= last {
                candidate + 1
            } else {
                candidate
            }
        }
        _ => rng.gen_range(range.as_range()),
    }
}

pub struct MoodSelector {
    store: Arc<dyn SongStore>,
    rng: Mutex<StdRng>,
}

impl MoodSelector {
    pub fn new(store: Arc<dyn SongStore>) -> Self {
        Self {
            store,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(store: Arc<dyn SongStore>, seed: u64) -> Self {
        Self {
            store,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn next_index(&self, mood: Mood, last_index: Option<u32>) -> u32 {
        // A poisoned lock only means another turn panicked mid-draw; the rng is still usable.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        draw_index(mood.range(), last_index, &mut *rng)
    }

    /// Picks a song for `mood` that differs from the previously selected index.
    pub async fn select(
        &self,
        mood: Mood,
        last_index: Option<u32>,
    ) -> Result<Selection, StoreError> {
        let index = self.next_index(mood, last_index);
        debug!("Drew index {} for mood {} (previous: {:?})", index, mood, last_index);

        let song = self.store.fetch(index).await?;
        let track_id = match song.track_id() {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Song {} has no playable track: {}", index, e);
                None
            }
        };

        info!("Selected song {} for mood {}: {}", index, mood, song);
        Ok(Selection {
            index,
            song,
            track_id,
        })
    }
}
