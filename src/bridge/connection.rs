use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    bridge::{
        BridgeError, HandshakeInstruction, Operator, SyncBridge, backoff::Backoff,
        constants::WRITE_TASK_SHUTDOWN_MS,
    },
    configs::BridgeConfig,
};

/// How a single websocket session ended.
enum SessionOutcome {
    Reconnect,
    Shutdown,
}

/// Keeps the bridge connected to the desktop client, reconnecting with backoff.
pub struct BridgeConnection {
    bridge: Arc<SyncBridge>,
    operator: Arc<dyn Operator>,
    config: BridgeConfig,
    cancel_token: CancellationToken,
}

impl BridgeConnection {
    pub fn new(
        bridge: Arc<SyncBridge>,
        operator: Arc<dyn Operator>,
        config: BridgeConfig,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            bridge,
            operator,
            config,
            cancel_token,
        }
    }

    /// Runs until cancelled or the operator gives up. Failing to establish the very
    /// first connection is returned to the caller instead of being retried.
    pub async fn run(&self) -> Result<(), BridgeError> {
        let mut backoff = Backoff::new(
            self.config.backoff_base_ms,
            self.config.max_reconnect_attempts,
        );
        let mut connected_once = false;

        loop {
            if self.cancel_token.is_cancelled() {
                return Ok(());
            }

            self.bridge.reset_connection();
            let error = match self.connect(&mut backoff, &mut connected_once).await {
                Ok(SessionOutcome::Shutdown) => {
                    debug!("Bridge connection shutting down cleanly");
                    return Ok(());
                }
                Ok(SessionOutcome::Reconnect) => {
                    BridgeError::ConnectionLost("desktop client closed the connection".into())
                }
                Err(e) if !connected_once => {
                    error!("Could not reach desktop client at {}: {}", self.config.desktop_url, e);
                    return Err(e);
                }
                Err(e) => e,
            };

            if backoff.is_exhausted() {
                warn!("Max reconnect attempts reached: {}", error);
                if !self.operator.confirm_retry(&error).await {
                    return Err(BridgeError::Aborted);
                }
                backoff.reset();
            }

            let delay = backoff.next();
            warn!("{}. Reconnecting in {:?}", error, delay);
            tokio::select! {
                _ = self.cancel_token.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn connect(
        &self,
        backoff: &mut Backoff,
        connected_once: &mut bool,
    ) -> Result<SessionOutcome, BridgeError> {
        debug!("Connecting to desktop client: {}", self.config.desktop_url);
        let (ws_stream, _) = tokio_tungstenite::connect_async(self.config.desktop_url.as_str())
            .await
            .map_err(|e| BridgeError::ConnectionLost(e.to_string()))?;
        info!("Connected to desktop client at {}", self.config.desktop_url);
        *connected_once = true;
        backoff.reset();

        let (mut write, mut read) = ws_stream.split();

        // Instructions live only as long as this connection; a reconnect starts empty.
        let (tx, rx) = flume::unbounded::<HandshakeInstruction>();
        if self.config.request_connect_on_open {
            let _ = tx.send(HandshakeInstruction::RequestConnect);
        }

        let connection_token = self.cancel_token.child_token();
        let writer_token = connection_token.clone();
        let label = self.bridge.label().to_string();
        let write_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_token.cancelled() => break,
                    instruction = rx.recv_async() => {
                        let Ok(instruction) = instruction else { break };
                        let message = instruction.to_message(&label);
                        let json = match serde_json::to_string(&message) {
                            Ok(json) => json,
                            Err(e) => {
                                warn!("Failed to encode handshake message: {}", e);
                                continue;
                            }
                        };
                        debug!("Sending handshake message: {}", json);
                        if let Err(e) = write.send(Message::Text(json.into())).await {
                            warn!("Desktop write error: {}", e);
                            break;
                        }
                    }
                }
            }
        });

        let outcome = loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => break SessionOutcome::Shutdown,
                msg = read.next() => {
                    let msg = match msg {
                        Some(Ok(msg)) => msg,
                        Some(Err(e)) => {
                            warn!("Desktop read error: {}", e);
                            break SessionOutcome::Reconnect;
                        }
                        None => {
                            debug!("Desktop stream ended");
                            break SessionOutcome::Reconnect;
                        }
                    };

                    match msg {
                        Message::Text(text) => {
                            // Handling can wait on the operator or the control endpoint.
                            let handled = tokio::select! {
                                _ = self.cancel_token.cancelled() => break SessionOutcome::Shutdown,
                                handled = self.bridge.handle_text(text.as_str(), &tx) => handled,
                            };
                            if let Err(e) = handled {
                                match e {
                                    BridgeError::Aborted => break SessionOutcome::Shutdown,
                                    other => warn!("Dropped desktop event: {}", other),
                                }
                            }
                        }
                        Message::Close(frame) => {
                            let (code, reason) = frame
                                .map(|cf| (cf.code.into(), cf.reason.to_string()))
                                .unwrap_or((1000u16, "No reason".into()));
                            info!("Desktop closed connection: code={}, reason='{}'", code, reason);
                            break SessionOutcome::Reconnect;
                        }
                        _ => {}
                    }
                }
            }
        };

        connection_token.cancel();
        drop(tx);
        let _ = tokio::time::timeout(
            std::time::Duration::from_millis(WRITE_TASK_SHUTDOWN_MS),
            write_task,
        )
        .await;

        Ok(outcome)
    }
}
