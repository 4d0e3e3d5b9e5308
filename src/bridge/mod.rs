pub mod backoff;
pub mod catalog;
pub mod connection;
pub mod constants;
pub mod error;
pub mod handshake;
pub mod notifier;
pub mod sync;

pub use catalog::TrackCatalog;
pub use connection::BridgeConnection;
pub use error::BridgeError;
pub use handshake::{ConnectionPhase, ConsoleOperator, HandshakeInstruction, Operator};
pub use notifier::{ControlNotifier, HttpNotifier};
pub use sync::{SyncBridge, SyncOutcome};
