use color_eyre::Result;
use reqwest::header::HeaderMap;
use serde_json::{Value, json};

use super::response;
use crate::auth::Credentials;
use crate::ports::music_service::{
    MusicService, PlaylistSummary, ServiceError, SongResult, Visibility,
};

const API_BASE: &str = "https://music.youtube.com/youtubei/v1";
const CLIENT_NAME: &str = "WEB_REMIX";
const CLIENT_VERSION: &str = "1.20250825.03.00";
/// Search filter params restricting results to songs.
const SONGS_FILTER: &str = "EgWKAQIIAWoMEA4QChADEAQQCRAF";
const LIBRARY_PLAYLISTS_BROWSE_ID: &str = "FEmusic_liked_playlists";

/// `MusicService` adapter over the YouTube Music internal API, replaying
/// captured browser headers for authentication.
pub struct YtMusicClient {
    client: reqwest::Client,
    headers: HeaderMap,
}

impl YtMusicClient {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            headers: credentials.header_map()?,
        })
    }

    fn context() -> Value {
        json!({
            "client": {
                "clientName": CLIENT_NAME,
                "clientVersion": CLIENT_VERSION,
                "hl": "en"
            },
            "user": {}
        })
    }

    async fn post(
        &self,
        operation: &'static str,
        endpoint: &str,
        mut body: Value,
    ) -> Result<Value, ServiceError> {
        body["context"] = Self::context();
        let url = format!("{API_BASE}/{endpoint}?alt=json");

        let response = self
            .client
            .post(&url)
            .headers(self.headers.clone())
            .json(&body)
            .send()
            .await
            .map_err(|err| ServiceError::from_reqwest(operation, err))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                operation,
                status: status.as_u16(),
                message: truncate(&message),
            });
        }

        response
            .json()
            .await
            .map_err(|err| ServiceError::from_reqwest(operation, err))
    }
}

/// Error bodies can be whole HTML pages; keep logs readable.
fn truncate(message: &str) -> String {
    const LIMIT: usize = 300;
    if message.len() <= LIMIT {
        message.to_string()
    } else {
        let cut = message
            .char_indices()
            .take_while(|(index, _)| *index < LIMIT)
            .last()
            .map(|(index, ch)| index + ch.len_utf8())
            .unwrap_or(0);
        format!("{}...", &message[..cut])
    }
}

/// Browse ids carry a `VL` prefix in front of the playlist id.
fn browse_id(playlist_id: &str) -> String {
    if playlist_id.starts_with("VL") {
        playlist_id.to_string()
    } else {
        format!("VL{playlist_id}")
    }
}

#[async_trait::async_trait]
impl MusicService for YtMusicClient {
    async fn search_songs(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SongResult>, ServiceError> {
        let body = json!({
            "query": query,
            "params": SONGS_FILTER,
        });
        let value = self.post("search_songs", "search", body).await?;
        Ok(response::parse_search_results(&value, limit))
    }

    async fn list_library_playlists(&self) -> Result<Vec<PlaylistSummary>, ServiceError> {
        let body = json!({ "browseId": LIBRARY_PLAYLISTS_BROWSE_ID });
        let value = self.post("list_library_playlists", "browse", body).await?;
        Ok(response::parse_library_playlists(&value))
    }

    async fn create_playlist(
        &self,
        title: &str,
        description: &str,
        visibility: Visibility,
    ) -> Result<String, ServiceError> {
        let mut body = json!({
            "title": title,
            "privacyStatus": visibility.privacy_status(),
        });
        if !description.is_empty() {
            body["description"] = json!(description);
        }

        let value = self.post("create_playlist", "playlist/create", body).await?;
        value
            .get("playlistId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ServiceError::UnexpectedResponse {
                operation: "create_playlist",
                message: "response is missing playlistId".into(),
            })
    }

    async fn add_playlist_items(
        &self,
        playlist_id: &str,
        media_ids: &[String],
        allow_duplicates: bool,
    ) -> Result<(), ServiceError> {
        let actions: Vec<Value> = media_ids
            .iter()
            .map(|media_id| {
                let mut action = json!({
                    "action": "ACTION_ADD_VIDEO",
                    "addedVideoId": media_id,
                });
                if allow_duplicates {
                    action["dedupeOption"] = json!("DEDUPE_OPTION_SKIP");
                }
                action
            })
            .collect();
        let body = json!({
            "playlistId": playlist_id.strip_prefix("VL").unwrap_or(playlist_id),
            "actions": actions,
        });

        let value = self
            .post("add_playlist_items", "browse/edit_playlist", body)
            .await?;
        let status = value.get("status").and_then(Value::as_str).unwrap_or("");
        if status == "STATUS_SUCCEEDED" {
            Ok(())
        } else {
            Err(ServiceError::Api {
                operation: "add_playlist_items",
                message: format!("edit_playlist returned {status:?}"),
            })
        }
    }

    async fn playlist_items(&self, playlist_id: &str) -> Result<Vec<SongResult>, ServiceError> {
        let body = json!({ "browseId": browse_id(playlist_id) });
        let value = self.post("playlist_items", "browse", body).await?;
        Ok(response::parse_playlist_items(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browse_id_is_prefixed_once() {
        assert_eq!(browse_id("PLabc"), "VLPLabc");
        assert_eq!(browse_id("VLPLabc"), "VLPLabc");
    }

    #[test]
    fn truncate_caps_long_bodies() {
        let long = "x".repeat(1000);
        let short = truncate(&long);
        assert!(short.len() < 320);
        assert!(short.ends_with("..."));
        assert_eq!(truncate("short"), "short");
    }
}
