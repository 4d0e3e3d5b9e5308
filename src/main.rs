use std::{net::SocketAddr, sync::Arc, time::Duration};

use deckbridge::{
    common::{self, http::HttpClient, types::AnyResult},
    configs::Config,
    log_println,
    player::{
        Announcement, CatalogResolver, HttpCatalog, OfflineCatalog, PlayerService, TimedConnector,
        TrackResolver, VoiceConnector,
    },
    server::AppState,
    transport,
};
use tracing::{info, warn};

fn build_resolver(config: &Config) -> AnyResult<Arc<dyn TrackResolver>> {
    let catalog = &config.catalog;
    match &catalog.base_url {
        Some(base_url) => {
            let client = HttpClient::with_timeout(Duration::from_millis(catalog.timeout_ms))?;
            info!("Resolving tracks through catalog at {}", base_url);
            Ok(Arc::new(CatalogResolver::new(
                HttpCatalog::new(client, base_url.as_str()),
                catalog.search_limit,
            )))
        }
        None => {
            warn!("No catalog configured; only direct URLs and templated ids will resolve");
            Ok(Arc::new(CatalogResolver::new(
                OfflineCatalog::new(catalog.stream_url_template.clone()),
                catalog.search_limit,
            )))
        }
    }
}

/// Stands in for the chat layer: announcements end up in the log.
fn spawn_announcement_logger(rx: flume::Receiver<Announcement>) {
    tokio::spawn(async move {
        while let Ok(announcement) = rx.recv_async().await {
            info!(target: "announce", "#{} {}", announcement.channel, announcement.text);
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = Config::load()?;
    common::logger::init(config.logging.as_ref(), "player");
    log_println!("deckbridge player v{}", env!("CARGO_PKG_VERSION"));

    let resolver = build_resolver(&config)?;
    let connector: Option<Arc<dyn VoiceConnector>> = if config.player.simulate_playback {
        Some(Arc::new(TimedConnector))
    } else {
        None
    };

    let (announce_tx, announce_rx) = flume::unbounded();
    spawn_announcement_logger(announce_rx);

    let player = Arc::new(PlayerService::new(
        &config.player,
        resolver,
        connector,
        announce_tx,
    ));
    let address: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = Arc::new(AppState::new(player.clone(), config));
    let app = transport::router(state);

    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("Player control endpoint listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    player.shutdown();
    info!("Player stopped");
    Ok(())
}
