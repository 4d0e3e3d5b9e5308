pub mod entry;
pub mod error;
pub mod resolver;
pub mod service;
pub mod sink;
pub mod state;
pub mod timed_sink;

pub use entry::{PlaybackSource, Requester, VoiceEntry};
pub use error::{PlayerError, ResolveError};
pub use resolver::{
    CatalogHit, CatalogResolver, ContentRating, HttpCatalog, MusicCatalog, OfflineCatalog,
    ResolvedTrack, TrackResolver, pick_preferred,
};
pub use service::{Enqueued, FollowTarget, PlayerService};
pub use sink::{CompletionSignal, VoiceConnector, VoiceSink};
pub use state::{Announcement, GuildVoiceState, SkipOutcome, StatusSnapshot};
pub use timed_sink::{TimedConnector, TimedSink};
