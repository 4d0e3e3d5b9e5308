use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{player::ResolveError, protocol::TrackRef};

/// A track with a URL the sink can stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTrack {
    pub track: TrackRef,
    pub stream_url: String,
}

#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Free-text search, or a direct URL.
    async fn resolve_query(&self, query: &str) -> Result<ResolvedTrack, ResolveError>;
    /// A track whose stream id is already known.
    async fn resolve_id(&self, track: &TrackRef) -> Result<ResolvedTrack, ResolveError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentRating {
    Explicit,
    Clean,
    #[default]
    #[serde(other)]
    Unrated,
}

/// One search result of the music catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogHit {
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album_artist: String,
    pub store_id: String,
    #[serde(default, deserialize_with = "crate::protocol::tracks::deserialize_millis")]
    pub duration_millis: u64,
    #[serde(default)]
    pub rating: ContentRating,
}

impl CatalogHit {
    fn to_track(&self) -> TrackRef {
        TrackRef::new(
            self.title.clone(),
            self.artist.clone(),
            self.store_id.clone(),
            self.duration_millis,
        )
    }
}

#[async_trait]
pub trait MusicCatalog: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<CatalogHit>, ResolveError>;
    /// `Ok(None)` when the catalog has no stream for this id.
    async fn stream_url(&self, stream_id: &str) -> Result<Option<String>, ResolveError>;
}

/// Takes the first hit, except when it is explicit and the second hit is the clean
/// edit of the same song.
pub fn pick_preferred(hits: &[CatalogHit]) -> Option<&CatalogHit> {
    match hits {
        [first, second, ..]
            if first.rating == ContentRating::Explicit
                && second.rating == ContentRating::Clean
                && first.title == second.title
                && first.album_artist == second.album_artist =>
        {
            debug!("Preferring clean variant of '{}'", second.title);
            Some(second)
        }
        [first, ..] => Some(first),
        [] => None,
    }
}

fn is_direct_url(query: &str) -> bool {
    query.contains("http")
}

pub struct CatalogResolver<C> {
    catalog: C,
    search_limit: usize,
}

impl<C: MusicCatalog> CatalogResolver<C> {
    pub fn new(catalog: C, search_limit: usize) -> Self {
        Self {
            catalog,
            search_limit: search_limit.max(1),
        }
    }

    async fn stream_for(&self, track: TrackRef) -> Result<ResolvedTrack, ResolveError> {
        match self.catalog.stream_url(&track.stream_id).await? {
            Some(stream_url) => Ok(ResolvedTrack { track, stream_url }),
            None => Err(ResolveError::failed(
                track.stream_id,
                "catalog has no stream for this track",
            )),
        }
    }
}

#[async_trait]
impl<C: MusicCatalog> TrackResolver for CatalogResolver<C> {
    async fn resolve_query(&self, query: &str) -> Result<ResolvedTrack, ResolveError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolveError::NotFound(String::new()));
        }
        if is_direct_url(query) {
            return Ok(ResolvedTrack {
                track: TrackRef::new(query, "", query, 0),
                stream_url: query.to_string(),
            });
        }

        let hits = self.catalog.search(query, self.search_limit).await?;
        let hit = pick_preferred(&hits).ok_or_else(|| ResolveError::NotFound(query.to_string()))?;
        self.stream_for(hit.to_track()).await
    }

    async fn resolve_id(&self, track: &TrackRef) -> Result<ResolvedTrack, ResolveError> {
        if track.stream_id.is_empty() {
            return Err(ResolveError::failed(&track.title, "track has no stream id"));
        }
        self.stream_for(track.clone()).await
    }
}

#[derive(Deserialize)]
struct StreamResponse {
    url: Option<String>,
}

/// Catalog reached over HTTP: `GET {base}/search?q=&limit=` and
/// `GET {base}/tracks/{id}/stream`.
pub struct HttpCatalog {
    client: Client,
    base_url: String,
}

impl HttpCatalog {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `{base}/tracks/{stream_id}/stream`, with the id encoded as one path segment.
    fn stream_endpoint(&self, stream_id: &str) -> Result<Url, ResolveError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| ResolveError::failed(stream_id, e))?;
        url.path_segments_mut()
            .map_err(|_| ResolveError::failed(stream_id, "catalog URL cannot have a path"))?
            .pop_if_empty()
            .extend(["tracks", stream_id, "stream"]);
        Ok(url)
    }
}

#[async_trait]
impl MusicCatalog for HttpCatalog {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<CatalogHit>, ResolveError> {
        let url = format!("{}/search", self.base_url);
        let limit = limit.to_string();
        let res = self
            .client
            .get(&url)
            .query(&[("q", query), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(|e| ResolveError::failed(query, e))?;

        if !res.status().is_success() {
            warn!("Catalog search for '{}' returned {}", query, res.status());
            return Err(ResolveError::failed(query, res.status()));
        }
        res.json::<Vec<CatalogHit>>()
            .await
            .map_err(|e| ResolveError::failed(query, e))
    }

    async fn stream_url(&self, stream_id: &str) -> Result<Option<String>, ResolveError> {
        let url = self.stream_endpoint(stream_id)?;
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ResolveError::failed(stream_id, e))?;

        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !res.status().is_success() {
            return Err(ResolveError::failed(stream_id, res.status()));
        }
        let body: StreamResponse = res
            .json()
            .await
            .map_err(|e| ResolveError::failed(stream_id, e))?;
        Ok(body.url.filter(|u| !u.is_empty()))
    }
}

/// Stand-in when no catalog is configured: searches find nothing and stream ids
/// map through an optional `{id}` template.
pub struct OfflineCatalog {
    stream_url_template: Option<String>,
}

impl OfflineCatalog {
    pub fn new(stream_url_template: Option<String>) -> Self {
        Self {
            stream_url_template,
        }
    }
}

#[async_trait]
impl MusicCatalog for OfflineCatalog {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<CatalogHit>, ResolveError> {
        Ok(Vec::new())
    }

    async fn stream_url(&self, stream_id: &str) -> Result<Option<String>, ResolveError> {
        Ok(self
            .stream_url_template
            .as_ref()
            .map(|template| template.replace("{id}", stream_id)))
    }
}
