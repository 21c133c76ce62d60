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

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use log::info;
use moodtune_core::{
    dispatch_table, narration, open_song_store, run_server, AppConfig, Dispatcher,
    InMemoryIdentityStore, LexiconSentiment, MoodSelector, ServerState, SongStore, SpotifyProvider,
};
use std::fs::File;
use std::io::Write;
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "moodtune")]
#[command(about = "Mood-driven song recommendations for voice assistants", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the sign-in endpoints and the fulfillment webhook.
    Serve {
        /// Address to listen on (overrides MOODTUNE_BIND)
        #[arg(long)]
        bind: Option<String>,

        /// JSON export path or Firebase database URL (overrides MOODTUNE_SONG_STORE)
        #[arg(long)]
        store: Option<String>,
    },
    /// Prints the recommendation the assistant would speak for one stored song
    Describe {
        /// Index of the song in the store
        #[arg(value_name = "INDEX")]
        index: u32,

        /// JSON export path or Firebase database URL (overrides MOODTUNE_SONG_STORE)
        #[arg(long)]
        store: Option<String>,

        /// Also write the stored record to a JSON file (e.g., --json=song.json)
        #[arg(long)]
        json: Option<String>,
    },
    /// Lists every conversation label the webhook understands
    Intents,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if dotenv().is_err() {
        // Silently ignore
    }

    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { bind, store } => {
            if let Err(e) = handle_serve(bind.as_deref(), store.as_deref()).await {
                eprintln!("[ERROR] Server stopped: {:#}", e);
                process::exit(1);
            }
        }
        Commands::Describe { index, store, json } => {
            handle_describe(*index, store.as_deref(), json.as_deref()).await;
        }
        Commands::Intents => {
            handle_intents();
        }
    }
}

fn load_config(store: Option<&str>) -> AppConfig {
    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error reading configuration: {}", e);
            process::exit(1);
        }
    };
    if let Some(store) = store {
        config.song_store = Some(store.to_string());
    }
    config
}

fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn SongStore>> {
    let source = config.song_store()?;
    open_song_store(source).with_context(|| format!("failed to open song store {}", source))
}

async fn handle_serve(bind: Option<&str>, store: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(store);
    if let Some(bind) = bind {
        config.bind = bind.to_string();
    }

    let songs = open_store(&config)?;
    let provider = Arc::new(SpotifyProvider::from_env()?);
    let identities = Arc::new(InMemoryIdentityStore::new());

    let dispatcher = Dispatcher::new(
        MoodSelector::new(songs),
        provider.clone(),
        identities.clone(),
        Arc::new(LexiconSentiment),
        config.outbound_timeout,
    )
    .with_session_idle_timeout(config.session_idle_timeout);

    info!("Serving songs from {}", config.song_store()?);
    let state = ServerState {
        dispatcher: Arc::new(dispatcher),
        provider,
        identities,
        secure_cookies: config.secure_cookies,
        outbound_timeout: config.outbound_timeout,
    };
    run_server(&config, state).await?;
    Ok(())
}

async fn handle_describe(index: u32, store: Option<&str>, json_path: Option<&str>) {
    let config = load_config(store);
    let songs = match open_store(&config) {
        Ok(songs) => songs,
        Err(e) => {
            eprintln!("Error opening song store: {:#}", e);
            process::exit(1);
        }
    };

    match songs.fetch(index).await {
        Ok(song) => {
            println!();
            println!("---------------------------------------------------");
            println!("SONG {}", index);
            println!("---------------------------------------------------");
            println!("Title:         {}", song.song);
            println!("Artist:        {}", song.artist);
            println!("URI:           {}", song.track_uri);
            match song.track_id() {
                Ok(id) => println!("Track ID:      {}", id),
                Err(e) => println!("Track ID:      [UNPLAYABLE] {}", e),
            }
            println!("---------------------------------------------------");
            println!("{}", narration::compose_recommendation(&song, &LexiconSentiment));
            println!("{}", narration::analysis_prompt(&song));

            if let Some(path) = json_path {
                match File::create(path) {
                    Ok(mut file) => {
                        let json_content = serde_json::to_string_pretty(&song).unwrap_or_default();
                        if let Err(e) = file.write_all(json_content.as_bytes()) {
                            eprintln!();
                            eprintln!("[ERROR] Failed to write song to file: {}", e);
                        } else {
                            println!();
                            println!("[SAVED] Song saved to: {}", path);
                        }
                    }
                    Err(e) => eprintln!("[ERROR] Failed to create file '{}': {}", path, e),
                }
            }
        }
        Err(e) => {
            eprintln!();
            eprintln!("[ERROR] Could not fetch song {}: {}", index, e);
            process::exit(1);
        }
    }
}

fn handle_intents() {
    let mut states: Vec<_> = dispatch_table().values().collect();
    states.sort_by_key(|state| state.label());

    println!();
    println!("{:<32} | {:<30}", "Label", "Action");
    println!("{:-<32}-+-{:-<30}", "", "");
    for state in states {
        println!("{:<32} | {:<30}", state.label(), format!("{:?}", state.action()));
    }
    println!();
    println!("Labels also match the front-end form, e.g. '-Sad - yes - yes'.");
}
