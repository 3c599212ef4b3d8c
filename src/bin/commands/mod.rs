pub mod replay;

use chrono::{DateTime, Utc};
use clap::Subcommand;
use scrobble_broker::{NowPlayingInfo, RequestContext, Result, ScrobbleBroker};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Report that a track started playing
    ///
    /// Usage examples:
    /// # Report track 123 on the default player
    /// scrobble-broker now-playing 123
    ///
    /// # Report on a named player
    /// scrobble-broker now-playing 123 --player-id kitchen --player-name "Kitchen Speaker"
    NowPlaying {
        /// Track id from the library
        track_id: String,

        /// Player id
        #[arg(long, default_value = "cli")]
        player_id: String,

        /// Player display name
        #[arg(long, default_value = "Command Line")]
        player_name: String,
    },

    /// Submit a completed play
    ///
    /// Usage examples:
    /// # Scrobble track 123 now
    /// scrobble-broker submit 123
    ///
    /// # Scrobble with an explicit RFC 3339 timestamp
    /// scrobble-broker submit 123 --timestamp 2024-05-01T20:15:00Z
    Submit {
        /// Track id from the library
        track_id: String,

        /// When the play completed (defaults to now)
        #[arg(long)]
        timestamp: Option<DateTime<Utc>>,
    },

    /// Run a scripted sequence of now playing reports and submissions
    ///
    /// The script is a JSON array of steps, each either
    /// {"type": "now_playing", "user_id", "player_id", "player_name", "track_id"} or
    /// {"type": "submit", "user_id", "track_id", "timestamp"}.
    /// The now playing table is printed once all steps ran.
    Replay {
        /// Path to the script
        script: PathBuf,
    },
}

pub async fn execute_command(
    command: Commands,
    broker: &ScrobbleBroker,
    ctx: &RequestContext,
) -> Result<()> {
    match command {
        Commands::NowPlaying {
            track_id,
            player_id,
            player_name,
        } => {
            broker
                .now_playing(ctx, &player_id, &player_name, &track_id)
                .await?;
            println!("✅ Now playing {track_id} on {player_name}");
            Ok(())
        }
        Commands::Submit {
            track_id,
            timestamp,
        } => {
            let timestamp = timestamp.unwrap_or_else(Utc::now);
            broker.submit(ctx, &track_id, timestamp).await?;
            println!("✅ Scrobbled {track_id} at {}", timestamp.to_rfc3339());
            Ok(())
        }
        Commands::Replay { script } => {
            replay::run(&script, broker).await?;
            print_now_playing(&broker.get_now_playing(ctx).await?);
            Ok(())
        }
    }
}

pub fn print_now_playing(playing: &[NowPlayingInfo]) {
    if playing.is_empty() {
        println!("Nothing is playing");
        return;
    }

    println!("Now playing ({} players):", playing.len());
    for info in playing {
        println!(
            "  {} [{}] {}: {} - {} ({})",
            info.player_name,
            info.player_id,
            info.username,
            info.track.artist,
            info.track.title,
            info.track_id
        );
    }
}
