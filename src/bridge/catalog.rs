use std::collections::HashMap;

use crate::protocol::TrackRef;

/// Title-indexed view of the desktop client's most recent queue snapshot.
#[derive(Debug, Default, Clone)]
pub struct TrackCatalog {
    tracks: HashMap<String, TrackRef>,
}

impl TrackCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole catalog. Titles from the previous snapshot are dropped;
    /// when a snapshot repeats a title the later track wins.
    pub fn replace(&mut self, snapshot: Vec<TrackRef>) {
        self.tracks = snapshot
            .into_iter()
            .map(|track| (track.title.clone(), track))
            .collect();
    }

    pub fn get(&self, title: &str) -> Option<&TrackRef> {
        self.tracks.get(title)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn titles(&self) -> Vec<String> {
        let mut titles: Vec<String> = self.tracks.keys().cloned().collect();
        titles.sort();
        titles
    }
}
