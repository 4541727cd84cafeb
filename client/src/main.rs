//! Headless monitor: mirrors a mixing backend and logs every change.

use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use mixdesk_client::config::ConfigOverrides;
use mixdesk_client::store::Snapshot;
use mixdesk_client::{
    ApiClient, ClientConfig, EventChannel, Selection, Session, SessionHandle, TrackSearch,
};

/// mixdesk - follow the state of an audio mixing backend
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend base URL (overrides server.url)
    #[arg(long)]
    server: Option<String>,

    /// Bearer token for the backend (overrides server.auth_token)
    #[arg(long, env = "MIXDESK_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log level (overrides logging.level and RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Run one library search and log the matches
    #[arg(long)]
    search: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ClientConfig::from_figment(&ConfigOverrides {
        server_url: args.server,
        auth_token: args.token,
        log_level: args.log_level,
    })?;

    // Initialize logging - configured level, else RUST_LOG, else info
    let filter = match config.logging.level {
        Some(ref level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    fmt().with_env_filter(filter).with_target(false).compact().init();

    info!("Following backend at {}", config.api_url());

    let api = Arc::new(ApiClient::new_with_auth(
        config.api_url(),
        config.server.auth_token.clone(),
    ));
    let events = EventChannel::new(
        config.events_url(),
        config.server.auth_token.clone(),
        config.session.event_buffer,
    );

    let (handle, session) =
        Session::new(config.debounce, api.clone(), api.clone(), events.clone()).spawn();
    let connection = events.connect(handle.cancellation().child_token());

    let search = args.search.map(|query| {
        let search = TrackSearch::new(
            api.as_ref().clone(),
            config.debounce.search_delay(),
            handle.cancellation(),
        );
        search.set_query(query);
        search
    });

    tokio::spawn(log_changes(handle.clone()));
    if let Some(ref search) = search {
        tokio::spawn(log_search(search.results()));
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    handle.shutdown();

    let (session, connection) = tokio::join!(session, connection);
    if let Err(e) = session.and(connection) {
        warn!("Task ended abnormally: {}", e);
    }
    Ok(())
}

fn summary<E>(kind: &str, snapshot: &Snapshot<E>) -> String
where
    E: mixdesk_client::store::Entity,
{
    format!("{} {} ({:?})", snapshot.len(), kind, snapshot.phase())
}

async fn log_changes(handle: SessionHandle) {
    let mut inputs = handle.inputs();
    let mut outputs = handle.outputs();
    let mut mixers = handle.mixers();
    let mut channels = handle.channels();
    let mut players = handle.players();
    let mut connection = handle.connection();

    loop {
        tokio::select! {
            Ok(()) = connection.changed() => {
                info!("Event stream: {}", connection.borrow_and_update().description());
            }
            Ok(()) = inputs.changed() => {
                let snapshot = inputs.borrow_and_update().clone();
                info!("{}", summary("inputs", &snapshot));
                for input in snapshot.iter() {
                    info!("  input {} {:?}", input.id, input.display_name);
                }
            }
            Ok(()) = outputs.changed() => {
                let snapshot = outputs.borrow_and_update().clone();
                let catalog = handle.catalog().borrow().clone();
                info!("{}", summary("outputs", &snapshot));
                for output in snapshot.iter() {
                    let source = match catalog.resolve(output.input_id.as_ref()) {
                        Selection::Unset => "-".to_string(),
                        Selection::Source(source) => source.display_name,
                    };
                    info!("  output {} {:?} <- {}", output.id, output.display_name, source);
                }
            }
            Ok(()) = mixers.changed() => {
                let snapshot = mixers.borrow_and_update().clone();
                info!("{}", summary("mixers", &snapshot));
            }
            Ok(()) = channels.changed() => {
                let snapshot = channels.borrow_and_update().clone();
                let catalog = handle.catalog().borrow().clone();
                for (mixer, strips) in snapshot.iter() {
                    for channel in strips.iter() {
                        let source = match catalog.resolve(channel.input_id.as_ref()) {
                            Selection::Unset => "-".to_string(),
                            Selection::Source(source) => source.display_name,
                        };
                        info!(
                            "  mixer {} channel {} volume {:.2} <- {}",
                            mixer, channel.id, channel.volume, source
                        );
                    }
                }
            }
            Ok(()) = players.changed() => {
                let snapshot = players.borrow_and_update().clone();
                info!("{}", summary("players", &snapshot));
                for player in snapshot.iter() {
                    info!(
                        "  player {} {:?} {:?} {} queued",
                        player.id,
                        player.name,
                        player.state,
                        player.tracks.as_ref().map_or(0, Vec::len)
                    );
                }
            }
            else => break,
        }
    }
}

async fn log_search(mut results: watch::Receiver<mixdesk_client::SearchResults>) {
    while results.changed().await.is_ok() {
        let page = results.borrow_and_update().clone();
        if page.loading {
            continue;
        }
        info!("{} match(es) for {:?}", page.count, page.query);
        for track in &page.tracks {
            info!("  {} - {} ({:.0}s)", track.artist, track.title, track.length);
        }
    }
}
