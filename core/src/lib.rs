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

pub mod auth;
pub mod config;
pub mod descriptors;
pub mod dispatcher;
pub mod identity;
pub mod models;
pub mod narration;
pub mod selector;
pub mod sentiment;
pub mod server;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

// Re-export key items for convenience
pub use auth::{MusicProvider, SpotifyProvider};
pub use config::AppConfig;
pub use dispatcher::{dispatch_table, ConversationState, Dispatcher, Turn, TurnError};
pub use identity::InMemoryIdentityStore;
pub use models::{AudioFeatures, Mood, SongRecord};
pub use selector::MoodSelector;
pub use sentiment::LexiconSentiment;
pub use server::{make_app, run_server, ServerState};
pub use store::{open_song_store, SongStore};
