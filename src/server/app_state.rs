use std::sync::Arc;

use crate::{configs::Config, player::PlayerService};

/// Top-level state shared by the player's HTTP routes.
pub struct AppState {
    pub player: Arc<PlayerService>,
    pub config: Config,
}

impl AppState {
    pub fn new(player: Arc<PlayerService>, config: Config) -> Self {
        Self { player, config }
    }
}
