pub mod bridge;
pub mod common;
pub mod configs;
pub mod player;
pub mod protocol;
pub mod server;
pub mod transport;
