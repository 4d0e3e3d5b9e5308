pub mod base;
pub mod bridge;
pub mod catalog;
pub mod logging;
pub mod player;
pub mod server;

pub use base::*;
pub use bridge::*;
pub use catalog::*;
pub use logging::*;
pub use player::*;
pub use server::*;
