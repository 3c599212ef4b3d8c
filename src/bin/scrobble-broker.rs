mod commands;

use clap::Parser;
use commands::{execute_command, Commands};
use scrobble_broker::{
    agents, shared, BrokerConfig, MemoryTrackStore, RequestContext, TrackStore, User,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Send now playing reports and scrobbles to every configured agent
#[derive(Parser)]
#[command(
    name = "scrobble-broker",
    about = "Send now playing reports and scrobbles to every configured agent",
    long_about = None
)]
struct Cli {
    /// Show detailed debug information
    #[arg(long, global = true)]
    verbose: bool,

    /// JSON file holding the track catalog (an array of tracks)
    #[arg(long, global = true, default_value = "library.json")]
    library: PathBuf,

    /// Broker config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Id of the acting user
    #[arg(long, global = true, default_value = "local")]
    user_id: String,

    /// Display name of the acting user (defaults to the user id)
    #[arg(long, global = true)]
    username: Option<String>,

    /// Also append scrobbles to this JSON-lines history file
    #[arg(long, global = true)]
    history: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = match &args.config {
        Some(path) => BrokerConfig::load(path),
        None => BrokerConfig::load_or_default(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    let store = match MemoryTrackStore::from_json_file(&args.library) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("❌ Failed to load library {}: {e}", args.library.display());
            std::process::exit(1);
        }
    };
    let store: Arc<dyn TrackStore> = Arc::new(store);

    let registry = shared::agent_registry();
    agents::console::register(&registry);
    if let Some(path) = &args.history {
        agents::history::register(&registry, path.clone());
    }
    log::debug!("Enabled agents: {:?}", registry.names());

    let broker = shared::get_broker_with_config(&store, config);
    let username = args.username.unwrap_or_else(|| args.user_id.clone());
    let ctx = RequestContext::new().with_user(User::new(args.user_id, username));

    if let Err(e) = execute_command(args.command, &broker, &ctx).await {
        eprintln!("❌ Command failed: {e}");
        for failure in e.agent_failures() {
            eprintln!("   {failure}");
        }
        std::process::exit(1);
    }

    Ok(())
}
