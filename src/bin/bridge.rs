use std::sync::Arc;

use deckbridge::{
    bridge::{BridgeConnection, ConsoleOperator, HttpNotifier, Operator, SyncBridge},
    common::{self, http::HttpClient, types::AnyResult},
    configs::Config,
    log_println,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = Config::load()?;
    common::logger::init(config.logging.as_ref(), "bridge");
    log_println!("deckbridge bridge v{}", env!("CARGO_PKG_VERSION"));

    let bridge_config = config.bridge.clone();
    let notifier = Arc::new(HttpNotifier::new(
        HttpClient::new()?,
        bridge_config.control_url.as_str(),
    ));
    let operator: Arc<dyn Operator> =
        Arc::new(ConsoleOperator::new(bridge_config.pairing_code.clone()));
    let bridge = Arc::new(SyncBridge::new(
        bridge_config.session_label.as_str(),
        notifier,
        operator.clone(),
    ));
    info!(
        "Mirroring {} into {}",
        bridge_config.desktop_url, bridge_config.control_url
    );

    let cancel_token = CancellationToken::new();
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                signal_token.cancel();
            }
            Err(e) => warn!("Failed to listen for ctrl-c: {}", e),
        }
    });

    let connection = BridgeConnection::new(bridge, operator, bridge_config, cancel_token);
    if let Err(e) = connection.run().await {
        error!("Bridge stopped: {}", e);
        return Err(e.into());
    }

    info!("Bridge stopped");
    Ok(())
}
