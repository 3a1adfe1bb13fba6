//! teammy-chat: join a Teammy chat session and print hub events.
//!
//! Reads the bearer token from the web client's persisted storage, joins
//! the requested session, prints every push event, and re-joins after the
//! transport reconnects. Ctrl-C prints the member list and leaves.

mod output;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use teammy_common::{Result, TeammyError};
use teammy_config::{AuthConfig, LogLevel, RealtimeConfig, TeammyConfig};
use teammy_realtime::{
    ConnectionState, FileStore, PresenceRoster, RealtimeClientConfig, RealtimeSessionClient,
    ReconnectPolicy, StorageTokenProvider, TokenProvider,
};

#[derive(Parser, Debug)]
#[command(name = "teammy-chat", about = "Join a Teammy chat session and print hub events")]
struct Args {
    /// Config file (defaults to the platform config directory).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// REST API base URL; overrides the config file.
    #[arg(long)]
    base_url: Option<String>,

    /// Session to join.
    #[arg(short, long)]
    session: Option<String>,

    /// Current user id, highlighted in the member list.
    #[arg(short, long)]
    user: Option<String>,

    /// Token storage file, a JSON object keyed like the web client's
    /// storage; overrides the config file.
    #[arg(long)]
    storage: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("teammy-chat: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.logging.level);

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "teammy-chat failed");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<TeammyConfig> {
    let config = match path {
        Some(path) => teammy_config::load_config_from(path)?,
        None => teammy_config::load_config()?,
    };
    Ok(config)
}

fn init_tracing(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(args: Args, config: TeammyConfig) -> Result<()> {
    let token_provider = token_provider(&config.auth, args.storage.as_deref())?;
    let mut client_config = client_config(&config.realtime);
    if let Some(base_url) = args.base_url {
        client_config.api_base_url = base_url;
    }

    let client = Arc::new(RealtimeSessionClient::new(client_config, token_provider));
    let subscriptions = output::print_events(&client);
    let roster = PresenceRoster::attach(&client);

    client.start().await?;
    if let Some(session) = &args.session {
        client.join_session(session).await?;
        info!(session_id = %session, "Joined session, press Ctrl-C to leave");
    }

    let mut rejoin = spawn_rejoin(Arc::clone(&client), args.session.clone());
    tokio::select! {
        signal = tokio::signal::ctrl_c() => signal?,
        _ = &mut rejoin => warn!("Hub connection closed for good, shutting down"),
    }
    rejoin.abort();

    output::print_members(&roster.groups(args.user.as_deref()));
    if let Some(session) = &args.session {
        client.leave_session(session).await;
    }
    client.stop().await;

    roster.detach();
    for subscription in subscriptions {
        subscription.unsubscribe();
    }
    Ok(())
}

fn token_provider(
    auth: &AuthConfig,
    storage_override: Option<&Path>,
) -> Result<Arc<dyn TokenProvider>> {
    let path = storage_override
        .map(Path::to_path_buf)
        .or_else(|| auth.resolved_storage_path())
        .ok_or_else(|| TeammyError::Storage("no data directory for token storage".into()))?;
    info!(path = %path.display(), "Reading access token from storage");

    let store = Arc::new(FileStore::new(path));
    Ok(Arc::new(StorageTokenProvider::with_keys(
        store,
        auth.primary_key.as_str(),
        auth.fallback_key.as_str(),
    )))
}

fn client_config(realtime: &RealtimeConfig) -> RealtimeClientConfig {
    let reconnect = &realtime.reconnect;
    RealtimeClientConfig {
        api_base_url: realtime.api_base_url.clone(),
        hub_path: realtime.hub_path.clone(),
        connect_timeout: Duration::from_secs(realtime.connect_timeout_secs.into()),
        keepalive_interval: Duration::from_secs(realtime.keepalive_interval_secs.into()),
        server_timeout: Duration::from_secs(realtime.server_timeout_secs.into()),
        reconnect: ReconnectPolicy {
            enabled: reconnect.enabled,
            base_delay: Duration::from_millis(reconnect.base_delay_ms.into()),
            max_delay: Duration::from_millis(reconnect.max_delay_ms.into()),
            max_attempts: (reconnect.max_attempts > 0).then_some(reconnect.max_attempts),
            jitter: reconnect.jitter,
        },
        log_frames: realtime.log_frames,
    }
}

/// Re-join `session` whenever the transport recovers from a reconnect; the
/// client itself never re-joins. Finishes once the transport shuts itself
/// down.
fn spawn_rejoin(client: Arc<RealtimeSessionClient>, session: Option<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(mut states) = client.state_changes() else {
            return;
        };
        let mut previous = *states.borrow_and_update();
        while states.changed().await.is_ok() {
            let current = *states.borrow_and_update();
            info!(state = %current, "Connection state changed");
            if current == ConnectionState::Disconnected {
                break;
            }
            if previous == ConnectionState::Reconnecting && current == ConnectionState::Connected {
                if let Some(session) = &session {
                    if let Err(e) = client.join_session(session).await {
                        warn!(session_id = %session, error = %e, "Re-join after reconnect failed");
                    }
                }
            }
            previous = current;
        }
    })
}
