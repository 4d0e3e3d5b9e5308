use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The desktop client reported a current track missing from its last queue snapshot.
    #[error("track '{0}' is not in the queue snapshot")]
    TrackNotQueued(String),

    #[error("control endpoint delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("connection to desktop client lost: {0}")]
    ConnectionLost(String),

    #[error("malformed desktop message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("aborted by operator")]
    Aborted,
}
