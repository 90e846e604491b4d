use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use super::job::{ResolutionMethod, ResolvedTrack, TrackDescriptor};
use crate::ports::music_service::{MusicService, ServiceError, SongResult};
use crate::services::retry::{self, RetryPolicy};

static MEDIA_ID_RE: OnceLock<Regex> = OnceLock::new();

/// 11-character id following a `v=` query parameter or a `youtu.be/` path
/// segment.
fn media_id_pattern() -> &'static Regex {
    MEDIA_ID_RE.get_or_init(|| {
        Regex::new(r"(?:v=|youtu\.be/)([A-Za-z0-9_-]{11})").unwrap()
    })
}

pub fn extract_media_id(url: &str) -> Option<String> {
    media_id_pattern()
        .captures(url)
        .map(|captures| captures[1].to_string())
}

/// Per-run memo of search outcomes, keyed by the normalized query string.
///
/// A `Some(None)` value records a search that came back empty, so repeated
/// unresolvable tracks do not hit the network again. The cache belongs to
/// exactly one reconciliation run.
#[derive(Debug, Default)]
pub struct SearchCache {
    entries: HashMap<String, Option<String>>,
}

impl SearchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, query: &str) -> Option<&Option<String>> {
        self.entries.get(query)
    }

    pub fn insert(&mut self, query: String, media_id: Option<String>) {
        self.entries.insert(query, media_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build the search query: exact-phrase title plus artist when both are
/// present, else whichever field is non-empty.
pub fn build_query(title: &str, artist: &str) -> String {
    match (title.is_empty(), artist.is_empty()) {
        (false, false) => format!("\"{title}\" {artist}"),
        (false, true) => title.to_string(),
        (true, false) => artist.to_string(),
        (true, true) => String::new(),
    }
}

/// Pick a result by fixed-order rules: first result whose title contains the
/// track title, else first whose artist list contains the artist, else the
/// first result. The first satisfied rule wins; there is no combined score.
fn pick_result(results: &[SongResult], title: &str, artist: &str) -> Option<String> {
    let first = results.first()?;

    let title_lc = title.to_lowercase();
    if !title_lc.is_empty() {
        if let Some(hit) = results
            .iter()
            .find(|result| result.title.to_lowercase().contains(&title_lc))
        {
            return Some(hit.media_id.clone());
        }
    }

    let artist_lc = artist.to_lowercase();
    if !artist_lc.is_empty() {
        if let Some(hit) = results.iter().find(|result| {
            result
                .artists
                .iter()
                .any(|candidate| candidate.to_lowercase().contains(&artist_lc))
        }) {
            return Some(hit.media_id.clone());
        }
    }

    Some(first.media_id.clone())
}

/// Resolve a `(title, artist)` pair to a media id via search, consulting the
/// cache first. A cached miss short-circuits without a remote call.
pub async fn search_resolve<S: MusicService>(
    service: &S,
    cache: &mut SearchCache,
    retry: &RetryPolicy,
    limit: usize,
    title: &str,
    artist: &str,
) -> Result<Option<String>, ServiceError> {
    let title = collapse_whitespace(title);
    let artist = collapse_whitespace(artist);
    let query = build_query(&title, &artist);

    if let Some(cached) = cache.get(&query) {
        log::debug!("Search cache hit for {query:?}");
        return Ok(cached.clone());
    }

    log::debug!("Searching for {query:?}");
    let results = retry::with_retry(retry, "search_songs", || {
        service.search_songs(&query, limit)
    })
    .await?;

    let media_id = pick_result(&results, &title, &artist);
    cache.insert(query, media_id.clone());
    Ok(media_id)
}

/// Resolve one descriptor to a media id. Only the search path touches the
/// network; an explicit id or an extractable URL short-circuits.
pub async fn resolve<S: MusicService>(
    service: &S,
    cache: &mut SearchCache,
    retry: &RetryPolicy,
    search_limit: usize,
    descriptor: &TrackDescriptor,
) -> Result<ResolvedTrack, ServiceError> {
    if let Some(id) = descriptor
        .explicit_id
        .as_deref()
        .filter(|id| !id.is_empty())
    {
        return Ok(ResolvedTrack {
            descriptor: descriptor.clone(),
            media_id: Some(id.to_string()),
            method: ResolutionMethod::Direct,
        });
    }

    if let Some(url) = descriptor.source_url.as_deref() {
        if let Some(id) = extract_media_id(url) {
            return Ok(ResolvedTrack {
                descriptor: descriptor.clone(),
                media_id: Some(id),
                method: ResolutionMethod::UrlExtracted,
            });
        }
    }

    if !descriptor.title.trim().is_empty() {
        let media_id = search_resolve(
            service,
            cache,
            retry,
            search_limit,
            &descriptor.title,
            &descriptor.artist,
        )
        .await?;
        let method = match media_id {
            Some(_) => ResolutionMethod::Searched,
            None => ResolutionMethod::Unresolved,
        };
        return Ok(ResolvedTrack {
            descriptor: descriptor.clone(),
            media_id,
            method,
        });
    }

    Ok(ResolvedTrack {
        descriptor: descriptor.clone(),
        media_id: None,
        method: ResolutionMethod::Unresolved,
    })
}
