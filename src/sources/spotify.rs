use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use serde::Deserialize;

use super::SourceOptions;
use crate::services::import::job::{PlaylistImportJob, TrackDescriptor};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ApiPlaylist {
    name: String,
    #[serde(default)]
    description: Option<String>,
    tracks: ApiTrackPage,
}

#[derive(Debug, Deserialize)]
struct ApiTrackPage {
    items: Vec<ApiPlaylistItem>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPlaylistItem {
    // Removed or local-only entries come through as null.
    track: Option<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    name: String,
    #[serde(default)]
    artists: Vec<ApiArtist>,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    name: String,
}

/// Extract the playlist id from an `open.spotify.com/playlist/...` URL; a
/// bare id passes through unchanged.
pub fn extract_playlist_id(url: &str) -> &str {
    let id = url.rsplit("playlist/").next().unwrap_or(url);
    id.split('?').next().unwrap_or(id).trim_end_matches('/')
}

async fn fetch_token(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
) -> Result<String> {
    let response = client
        .post(TOKEN_URL)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .send()
        .await
        .wrap_err("Failed to request Spotify access token")?
        .error_for_status()
        .wrap_err("Spotify rejected the client credentials")?;

    let token: TokenResponse = response
        .json()
        .await
        .wrap_err("Failed to parse Spotify token response")?;
    Ok(token.access_token)
}

fn descriptor_from(track: ApiTrack) -> TrackDescriptor {
    TrackDescriptor {
        title: track.name,
        artist: track
            .artists
            .into_iter()
            .map(|artist| artist.name)
            .collect::<Vec<_>>()
            .join(", "),
        ..TrackDescriptor::default()
    }
}

/// Fetch a public Spotify playlist and turn it into one import job whose
/// tracks are resolved by search downstream (Spotify carries no usable
/// media ids for the target service).
pub async fn fetch_playlist_job(
    client_id: &str,
    client_secret: &str,
    url: &str,
    options: &SourceOptions,
) -> Result<PlaylistImportJob> {
    let playlist_id = extract_playlist_id(url);
    if playlist_id.is_empty() {
        return Err(eyre!("Could not extract a playlist id from {url:?}"));
    }
    log::info!("Fetching Spotify playlist {playlist_id}");

    let client = reqwest::Client::new();
    let token = fetch_token(&client, client_id, client_secret).await?;

    let playlist: ApiPlaylist = client
        .get(format!("{API_BASE}/playlists/{playlist_id}"))
        .bearer_auth(&token)
        .send()
        .await
        .wrap_err("Failed to fetch Spotify playlist")?
        .error_for_status()
        .wrap_err_with(|| format!("Spotify playlist {playlist_id} was not accessible"))?
        .json()
        .await
        .wrap_err("Failed to parse Spotify playlist response")?;

    let mut tracks: Vec<TrackDescriptor> = Vec::new();
    let mut page = playlist.tracks;
    loop {
        tracks.extend(
            page.items
                .into_iter()
                .filter_map(|item| item.track)
                .map(descriptor_from),
        );
        let Some(next) = page.next else {
            break;
        };
        page = client
            .get(&next)
            .bearer_auth(&token)
            .send()
            .await
            .wrap_err("Failed to fetch Spotify playlist page")?
            .error_for_status()
            .wrap_err("Spotify playlist page was not accessible")?
            .json()
            .await
            .wrap_err("Failed to parse Spotify playlist page")?;
    }

    log::info!(
        "Spotify playlist '{}' has {} track(s)",
        playlist.name,
        tracks.len()
    );
    Ok(PlaylistImportJob {
        name: playlist.name,
        description: playlist.description.unwrap_or_default(),
        tracks,
        append_if_exists: options.append_if_exists,
        visibility: options.visibility,
    })
}
