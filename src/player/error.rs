use thiserror::Error;

/// Failures turning a query or stream id into something playable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no results for '{0}'")]
    NotFound(String),
    #[error("could not resolve a stream for '{id}': {cause}")]
    ResolutionFailed { id: String, cause: String },
}

impl ResolveError {
    pub fn failed(id: impl Into<String>, cause: impl ToString) -> Self {
        Self::ResolutionFailed {
            id: id.into(),
            cause: cause.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    #[error("not playing any music right now")]
    NothingPlaying,
    #[error(transparent)]
    Resolution(#[from] ResolveError),
    #[error("no session is registered to follow the desktop client")]
    NotFollowing,
    #[error("voice sink error: {0}")]
    Sink(String),
    #[error("session was stopped")]
    SessionStopped,
}
