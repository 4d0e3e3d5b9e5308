pub mod control;
pub mod desktop;
pub mod tracks;

pub use control::*;
pub use desktop::*;
pub use tracks::*;
