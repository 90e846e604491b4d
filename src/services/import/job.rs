use crate::ports::music_service::Visibility;

/// One row's worth of track metadata before identifier resolution.
#[derive(Debug, Clone, Default)]
pub struct TrackDescriptor {
    pub title: String,
    pub artist: String,
    /// Explicit media id; wins over everything else when present.
    pub explicit_id: Option<String>,
    /// Source URL to extract an id from; wins over search.
    pub source_url: Option<String>,
    /// 1-based data row in the source file, when the descriptor came from one.
    pub row_ref: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMethod {
    Direct,
    UrlExtracted,
    Searched,
    Unresolved,
}

/// The outcome of resolving one descriptor. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct ResolvedTrack {
    pub descriptor: TrackDescriptor,
    pub media_id: Option<String>,
    pub method: ResolutionMethod,
}

/// One target playlist to reconcile against the remote library.
#[derive(Debug, Clone)]
pub struct PlaylistImportJob {
    pub name: String,
    /// Playlist description; left blank when the source supplied none.
    pub description: String,
    pub tracks: Vec<TrackDescriptor>,
    /// Append to an existing playlist with a matching title instead of
    /// always creating a new one.
    pub append_if_exists: bool,
    pub visibility: Visibility,
}
