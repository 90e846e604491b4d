use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use regex::Regex;

use crate::ports::music_service::{MusicService, SongResult};
use crate::services::retry::{self, RetryPolicy};

static RESERVED_CHARS_RE: OnceLock<Regex> = OnceLock::new();

/// Turn a playlist title into a safe file name: strip filesystem-reserved
/// characters, collapse whitespace, cap the length.
pub fn sanitize_filename(name: &str) -> String {
    let pattern = RESERVED_CHARS_RE
        .get_or_init(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).unwrap());
    let cleaned = pattern.replace_all(name.trim(), "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let capped: String = collapsed.chars().take(240).collect();
    if capped.is_empty() {
        "playlist".to_string()
    } else {
        capped
    }
}

fn write_csv(path: &Path, tracks: &[SongResult]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .wrap_err_with(|| format!("Failed to create {}", path.display()))?;
    writer
        .write_record(["Title", "Artists", "MediaId"])
        .wrap_err("Failed to write CSV header")?;
    for track in tracks {
        writer
            .write_record([
                track.title.as_str(),
                &track.artists.join(", "),
                track.media_id.as_str(),
            ])
            .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
    }
    writer
        .flush()
        .wrap_err_with(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}

async fn export_one<S: MusicService>(
    service: &S,
    retry: &RetryPolicy,
    playlist_id: &str,
    title: &str,
    out_dir: &Path,
) -> Result<PathBuf> {
    let tracks = retry::with_retry(retry, "playlist_items", || {
        service.playlist_items(playlist_id)
    })
    .await
    .wrap_err_with(|| format!("Failed to fetch tracks of '{title}'"))?;

    std::fs::create_dir_all(out_dir)
        .wrap_err_with(|| format!("Failed to create {}", out_dir.display()))?;
    let path = out_dir.join(format!("{}.csv", sanitize_filename(title)));
    write_csv(&path, &tracks)?;
    log::info!("Exported '{title}' ({} tracks) -> {}", tracks.len(), path.display());
    Ok(path)
}

/// Export one playlist found by case-insensitive title, trying an exact
/// match before falling back to substring containment. The first match wins.
pub async fn export_by_name<S: MusicService>(
    service: &S,
    retry: &RetryPolicy,
    name: &str,
    out_dir: &Path,
) -> Result<PathBuf> {
    let playlists = retry::with_retry(retry, "list_library_playlists", || {
        service.list_library_playlists()
    })
    .await
    .wrap_err("Failed to list library playlists")?;

    let wanted = name.trim().to_lowercase();
    let mut matches: Vec<_> = playlists
        .iter()
        .filter(|playlist| playlist.title.trim().to_lowercase() == wanted)
        .collect();
    if matches.is_empty() {
        matches = playlists
            .iter()
            .filter(|playlist| playlist.title.trim().to_lowercase().contains(&wanted))
            .collect();
    }

    let Some(playlist) = matches.first() else {
        return Err(eyre!("Playlist not found: {name}"));
    };
    if matches.len() > 1 {
        log::warn!(
            "Multiple playlists match '{name}'; exporting the first: '{}'",
            playlist.title
        );
    }

    export_one(service, retry, &playlist.id, &playlist.title, out_dir).await
}

/// Export every library playlist. A playlist whose tracks cannot be fetched
/// is skipped with a warning; the count of written files is returned.
pub async fn export_all<S: MusicService>(
    service: &S,
    retry: &RetryPolicy,
    out_dir: &Path,
) -> Result<usize> {
    let playlists = retry::with_retry(retry, "list_library_playlists", || {
        service.list_library_playlists()
    })
    .await
    .wrap_err("Failed to list library playlists")?;

    let total = playlists.len();
    let mut exported = 0;
    for playlist in playlists {
        match export_one(service, retry, &playlist.id, &playlist.title, out_dir).await {
            Ok(_) => exported += 1,
            Err(err) => log::warn!("Skipped '{}': {err:#}", playlist.title),
        }
    }
    log::info!("Exported {exported}/{total} playlists to {}", out_dir.display());
    Ok(exported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::music_service::{MockMusicService, PlaylistSummary, ServiceError};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        }
    }

    fn library() -> Vec<PlaylistSummary> {
        vec![
            PlaylistSummary {
                id: "PL1".into(),
                title: "Road Trip".into(),
            },
            PlaylistSummary {
                id: "PL2".into(),
                title: "Road Trip 2".into(),
            },
        ]
    }

    fn track(media_id: &str) -> SongResult {
        SongResult {
            media_id: media_id.into(),
            title: "Song A".into(),
            artists: vec!["Band X".into(), "Band Y".into()],
        }
    }

    #[test]
    fn sanitizes_reserved_characters_and_whitespace() {
        assert_eq!(sanitize_filename("  My / Mix: <vol.2>?  "), "My Mix vol.2");
        assert_eq!(sanitize_filename("***"), "playlist");
        assert_eq!(sanitize_filename("").len(), "playlist".len());
        assert_eq!(sanitize_filename(&"x".repeat(500)).chars().count(), 240);
    }

    #[tokio::test]
    async fn exports_exact_title_match_over_substring() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockMusicService::new();
        mock.expect_list_library_playlists()
            .returning(|| Ok(library()));
        mock.expect_playlist_items()
            .withf(|playlist_id| playlist_id == "PL1")
            .times(1)
            .returning(|_| Ok(vec![track("abc12345678")]));

        let path = export_by_name(&mock, &policy(), "road trip", dir.path())
            .await
            .unwrap();

        assert_eq!(path.file_name().unwrap(), "Road Trip.csv");
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("Title,Artists,MediaId"));
        assert!(contents.contains("Song A,\"Band X, Band Y\",abc12345678"));
    }

    #[tokio::test]
    async fn substring_fallback_finds_partial_title() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockMusicService::new();
        mock.expect_list_library_playlists()
            .returning(|| Ok(library()));
        mock.expect_playlist_items()
            .withf(|playlist_id| playlist_id == "PL2")
            .times(1)
            .returning(|_| Ok(vec![]));

        let path = export_by_name(&mock, &policy(), "trip 2", dir.path())
            .await
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "Road Trip 2.csv");
    }

    #[tokio::test]
    async fn unknown_name_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockMusicService::new();
        mock.expect_list_library_playlists()
            .returning(|| Ok(library()));

        assert!(
            export_by_name(&mock, &policy(), "nope", dir.path())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn export_all_skips_unfetchable_playlists() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockMusicService::new();
        mock.expect_list_library_playlists()
            .returning(|| Ok(library()));
        mock.expect_playlist_items().returning(|playlist_id| {
            if playlist_id == "PL1" {
                Ok(vec![track("abc12345678")])
            } else {
                Err(ServiceError::Status {
                    operation: "playlist_items",
                    status: 404,
                    message: "gone".into(),
                })
            }
        });

        let exported = export_all(&mock, &policy(), dir.path()).await.unwrap();
        assert_eq!(exported, 1);
        assert!(dir.path().join("Road Trip.csv").exists());
        assert!(!dir.path().join("Road Trip 2.csv").exists());
    }
}
