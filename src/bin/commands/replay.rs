use chrono::{DateTime, Utc};
use scrobble_broker::{RequestContext, Result, ScrobbleBroker, User};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ReplayStep {
    NowPlaying {
        user_id: String,
        username: Option<String>,
        player_id: String,
        player_name: String,
        track_id: String,
    },
    Submit {
        user_id: String,
        username: Option<String>,
        track_id: String,
        timestamp: Option<DateTime<Utc>>,
    },
}

fn context_for(user_id: &str, username: Option<&str>) -> RequestContext {
    RequestContext::new().with_user(User::new(user_id, username.unwrap_or(user_id)))
}

/// Execute every step, reporting failures per step without stopping.
pub async fn run(script: &Path, broker: &ScrobbleBroker) -> Result<()> {
    let content = std::fs::read_to_string(script)?;
    let steps: Vec<ReplayStep> = serde_json::from_str(&content)?;
    log::info!("Replaying {} steps from {}", steps.len(), script.display());

    for (i, step) in steps.into_iter().enumerate() {
        let (label, result) = match step {
            ReplayStep::NowPlaying {
                user_id,
                username,
                player_id,
                player_name,
                track_id,
            } => {
                let ctx = context_for(&user_id, username.as_deref());
                let result = broker
                    .now_playing(&ctx, &player_id, &player_name, &track_id)
                    .await;
                (format!("now playing {track_id} on {player_id}"), result)
            }
            ReplayStep::Submit {
                user_id,
                username,
                track_id,
                timestamp,
            } => {
                let ctx = context_for(&user_id, username.as_deref());
                let result = broker
                    .submit(&ctx, &track_id, timestamp.unwrap_or_else(Utc::now))
                    .await;
                (format!("submit {track_id} for {user_id}"), result)
            }
        };

        match result {
            Ok(()) => println!("✅ {}: {label}", i + 1),
            Err(e) => println!("❌ {}: {label}: {e}", i + 1),
        }
    }

    Ok(())
}
