//! Extraction helpers for youtubei renderer trees.
//!
//! The API nests everything a dozen levels deep and shifts layout between
//! surfaces; keeping the pointer-walking here leaves the client readable and
//! makes the shapes testable from JSON fixtures.

use serde_json::Value;

use crate::ports::music_service::{PlaylistSummary, SongResult};

const SEARCH_CONTENTS: &str =
    "/contents/tabbedSearchResultsRenderer/tabs/0/tabRenderer/content/sectionListRenderer/contents";
const LIBRARY_GRID_ITEMS: &str = "/contents/singleColumnBrowseResultsRenderer/tabs/0/tabRenderer/content/sectionListRenderer/contents/0/gridRenderer/items";
const PLAYLIST_SHELF: &str = "/contents/singleColumnBrowseResultsRenderer/tabs/0/tabRenderer/content/sectionListRenderer/contents/0/musicPlaylistShelfRenderer/contents";
const PLAYLIST_SHELF_TWO_COLUMN: &str = "/contents/twoColumnBrowseResultsRenderer/secondaryContents/sectionListRenderer/contents/0/musicPlaylistShelfRenderer/contents";

fn as_array<'a>(value: &'a Value, pointer: &str) -> &'a [Value] {
    value
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn run_text(item: &Value, pointer: &str) -> Option<String> {
    item.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Artist names from the secondary flex column. The runs read
/// `artist (" & " artist)* " • " album " • " duration`; everything before the
/// first bullet separator is the artist credit.
fn artists_from_runs(runs: &[Value]) -> Vec<String> {
    let mut artists = Vec::new();
    for run in runs {
        let Some(text) = run.get("text").and_then(Value::as_str) else {
            continue;
        };
        if text.trim() == "•" {
            break;
        }
        if matches!(text.trim(), "&" | "," | "") {
            continue;
        }
        artists.push(text.to_string());
    }
    artists
}

fn parse_list_item(item: &Value) -> Option<SongResult> {
    let renderer = item.get("musicResponsiveListItemRenderer")?;
    let media_id = run_text(renderer, "/playlistItemData/videoId")?;
    let title = run_text(
        renderer,
        "/flexColumns/0/musicResponsiveListItemFlexColumnRenderer/text/runs/0/text",
    )?;
    let artist_runs = as_array(
        renderer,
        "/flexColumns/1/musicResponsiveListItemFlexColumnRenderer/text/runs",
    );
    Some(SongResult {
        media_id,
        title,
        artists: artists_from_runs(artist_runs),
    })
}

/// Songs from a search response, capped at `limit`.
pub fn parse_search_results(response: &Value, limit: usize) -> Vec<SongResult> {
    let mut results = Vec::new();
    for section in as_array(response, SEARCH_CONTENTS) {
        for item in as_array(section, "/musicShelfRenderer/contents") {
            if let Some(song) = parse_list_item(item) {
                results.push(song);
                if results.len() >= limit {
                    return results;
                }
            }
        }
    }
    results
}

/// Library playlists from the liked-playlists browse response. Action tiles
/// (the "New playlist" card) carry no browse id and are skipped; browse ids
/// come prefixed with `VL`, which is stripped to get the playlist id.
pub fn parse_library_playlists(response: &Value) -> Vec<PlaylistSummary> {
    let mut playlists = Vec::new();
    for item in as_array(response, LIBRARY_GRID_ITEMS) {
        let Some(renderer) = item.get("musicTwoRowItemRenderer") else {
            continue;
        };
        let Some(browse_id) = run_text(renderer, "/navigationEndpoint/browseEndpoint/browseId")
        else {
            continue;
        };
        let Some(title) = run_text(renderer, "/title/runs/0/text") else {
            continue;
        };
        playlists.push(PlaylistSummary {
            id: browse_id.strip_prefix("VL").unwrap_or(&browse_id).to_string(),
            title,
        });
    }
    playlists
}

/// Tracks of one playlist, in playlist order.
pub fn parse_playlist_items(response: &Value) -> Vec<SongResult> {
    let mut contents = as_array(response, PLAYLIST_SHELF);
    if contents.is_empty() {
        contents = as_array(response, PLAYLIST_SHELF_TWO_COLUMN);
    }
    contents.iter().filter_map(parse_list_item).collect()
}
