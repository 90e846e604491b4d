pub mod batch;
pub mod job;
pub mod report;
pub mod resolver;

use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::WrapErr;

use crate::ports::music_service::MusicService;
use crate::services::retry::{self, RetryPolicy};
use batch::{BatchSubmitter, PendingTrack};
use job::{PlaylistImportJob, ResolutionMethod, TrackDescriptor};
use report::{ImportReport, TrackFailure};
use resolver::SearchCache;

/// Knobs for one reconciliation run.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub batch_size: usize,
    pub search_limit: usize,
    pub flush_pause: Duration,
    pub retry: RetryPolicy,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            search_limit: 5,
            flush_pause: Duration::from_millis(1000),
            retry: RetryPolicy::default(),
        }
    }
}

/// Reconciles `PlaylistImportJob`s against the remote library.
///
/// Owns the search cache for the lifetime of one run; concurrent runs must
/// each construct their own importer so cached resolutions cannot leak
/// between them.
pub struct PlaylistImporter<S: MusicService> {
    service: S,
    config: ImportConfig,
    cache: SearchCache,
}

impl<S: MusicService> PlaylistImporter<S> {
    pub fn new(service: S, config: ImportConfig) -> Self {
        Self {
            service,
            config,
            cache: SearchCache::new(),
        }
    }

    /// Import every job in source order. A job whose playlist setup fails is
    /// logged and skipped; the run continues with the next one.
    pub async fn import_all(&mut self, jobs: Vec<PlaylistImportJob>) -> Vec<ImportReport> {
        let mut reports = Vec::new();
        for job in jobs {
            let name = job.name.clone();
            match self.import_playlist(job).await {
                Ok(report) => {
                    report.log_summary();
                    reports.push(report);
                }
                Err(err) => log::error!("Skipping playlist '{name}': {err:#}"),
            }
        }
        reports
    }

    /// Run one job to completion. Individual track failures accumulate in
    /// the report; only playlist lookup/creation raising an unrecoverable
    /// error fails the job itself.
    pub async fn import_playlist(&mut self, job: PlaylistImportJob) -> Result<ImportReport> {
        log::info!("Processing '{}' ({} tracks)", job.name, job.tracks.len());

        let playlist_id = self.ensure_playlist(&job).await?;

        let mut report = ImportReport::new(job.name.clone(), job.tracks.len());
        let service = &self.service;
        let cache = &mut self.cache;
        let mut submitter = BatchSubmitter::new(
            service,
            playlist_id,
            self.config.batch_size,
            self.config.flush_pause,
            self.config.retry,
        );

        for descriptor in &job.tracks {
            let resolved = resolver::resolve(
                service,
                cache,
                &self.config.retry,
                self.config.search_limit,
                descriptor,
            )
            .await;

            match resolved {
                Ok(resolved) => match resolved.media_id {
                    Some(media_id) => {
                        if resolved.method == ResolutionMethod::Searched {
                            report.record_searched();
                        }
                        let flushed = submitter
                            .push(PendingTrack {
                                media_id,
                                row_ref: descriptor.row_ref,
                                title: descriptor.title.clone(),
                                artist: descriptor.artist.clone(),
                            })
                            .await;
                        if let Some(outcome) = flushed {
                            apply_outcome(&mut report, outcome);
                        }
                    }
                    None => report.record_failure(unresolved_failure(descriptor)),
                },
                Err(err) => report.record_failure(TrackFailure {
                    row_ref: descriptor.row_ref,
                    title: descriptor.title.clone(),
                    artist: descriptor.artist.clone(),
                    cause: err.to_string(),
                }),
            }
        }

        if let Some(outcome) = submitter.finish().await {
            apply_outcome(&mut report, outcome);
        }

        Ok(report)
    }

    /// Find the playlist to add to, creating one when append mode is off or
    /// no existing title matches.
    async fn ensure_playlist(&self, job: &PlaylistImportJob) -> Result<String> {
        if job.append_if_exists {
            if let Some(existing) = self.find_existing_playlist(&job.name).await {
                log::info!("Appending to existing playlist '{}' ({existing})", job.name);
                return Ok(existing);
            }
        }

        let id = retry::with_retry(&self.config.retry, "create_playlist", || {
            self.service
                .create_playlist(&job.name, &job.description, job.visibility)
        })
        .await
        .wrap_err_with(|| format!("Failed to create playlist '{}'", job.name))?;

        log::info!("Created playlist '{}' ({id})", job.name);
        Ok(id)
    }

    /// Case-insensitive, whitespace-trimmed exact title match; first match
    /// wins. A listing failure degrades to creating a new playlist instead
    /// of aborting the job.
    async fn find_existing_playlist(&self, name: &str) -> Option<String> {
        let playlists = match retry::with_retry(&self.config.retry, "list_library_playlists", || {
            self.service.list_library_playlists()
        })
        .await
        {
            Ok(playlists) => playlists,
            Err(err) => {
                log::warn!("Could not list library playlists ({err}); creating a new playlist");
                return None;
            }
        };

        let wanted = name.trim().to_lowercase();
        playlists
            .into_iter()
            .find(|playlist| playlist.title.trim().to_lowercase() == wanted)
            .map(|playlist| playlist.id)
    }
}

fn apply_outcome(report: &mut ImportReport, outcome: batch::BatchOutcome) {
    report.succeeded += outcome.succeeded.len();
    report.skipped_duplicate += outcome.duplicates.len();
    for failure in outcome.failed {
        report.record_failure(failure);
    }
}

fn unresolved_failure(descriptor: &TrackDescriptor) -> TrackFailure {
    let cause = if descriptor.title.trim().is_empty() {
        "no media id and no searchable text".to_string()
    } else {
        "no match found in search".to_string()
    };
    TrackFailure {
        row_ref: descriptor.row_ref,
        title: descriptor.title.clone(),
        artist: descriptor.artist.clone(),
        cause,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::music_service::{
        MockMusicService, PlaylistSummary, ServiceError, SongResult, Visibility,
    };

    fn test_config() -> ImportConfig {
        ImportConfig {
            flush_pause: Duration::ZERO,
            retry: RetryPolicy {
                max_attempts: 1,
                ..RetryPolicy::default()
            },
            ..ImportConfig::default()
        }
    }

    fn job(name: &str, tracks: Vec<TrackDescriptor>, append: bool) -> PlaylistImportJob {
        PlaylistImportJob {
            name: name.into(),
            description: String::new(),
            tracks,
            append_if_exists: append,
            visibility: Visibility::Private,
        }
    }

    fn searchable(title: &str, artist: &str) -> TrackDescriptor {
        TrackDescriptor {
            title: title.into(),
            artist: artist.into(),
            ..TrackDescriptor::default()
        }
    }

    #[tokio::test]
    async fn append_mode_reuses_case_insensitive_title_match() {
        let mut mock = MockMusicService::new();
        mock.expect_list_library_playlists().times(1).returning(|| {
            Ok(vec![
                PlaylistSummary {
                    id: "PLother".into(),
                    title: "Other".into(),
                },
                PlaylistSummary {
                    id: "PLmix".into(),
                    title: "  My Mix ".into(),
                },
            ])
        });
        mock.expect_create_playlist().times(0);
        mock.expect_add_playlist_items()
            .withf(|playlist_id, ids, _| playlist_id == "PLmix" && ids.len() == 1)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut importer = PlaylistImporter::new(mock, test_config());
        let report = importer
            .import_playlist(job(
                "my mix",
                vec![TrackDescriptor {
                    explicit_id: Some("abc12345678".into()),
                    ..TrackDescriptor::default()
                }],
                true,
            ))
            .await
            .unwrap();

        assert_eq!(report.succeeded, 1);
    }

    #[tokio::test]
    async fn no_match_creates_exactly_one_playlist() {
        let mut mock = MockMusicService::new();
        mock.expect_list_library_playlists()
            .times(1)
            .returning(|| Ok(vec![]));
        mock.expect_create_playlist()
            .withf(|title, description, _| title == "Fresh" && description.is_empty())
            .times(1)
            .returning(|_, _, _| Ok("PLnew".into()));
        mock.expect_add_playlist_items().returning(|_, _, _| Ok(()));

        let mut importer = PlaylistImporter::new(mock, test_config());
        let report = importer
            .import_playlist(job(
                "Fresh",
                vec![TrackDescriptor {
                    explicit_id: Some("abc12345678".into()),
                    ..TrackDescriptor::default()
                }],
                true,
            ))
            .await
            .unwrap();

        assert_eq!(report.succeeded, 1);
    }

    #[tokio::test]
    async fn create_mode_skips_library_lookup() {
        let mut mock = MockMusicService::new();
        mock.expect_list_library_playlists().times(0);
        mock.expect_create_playlist()
            .times(1)
            .returning(|_, _, _| Ok("PLnew".into()));

        let mut importer = PlaylistImporter::new(mock, test_config());
        let report = importer
            .import_playlist(job("Fresh", vec![], false))
            .await
            .unwrap();

        assert_eq!(report.total_tracks, 0);
    }

    #[tokio::test]
    async fn lookup_failure_degrades_to_create() {
        let mut mock = MockMusicService::new();
        mock.expect_list_library_playlists().times(1).returning(|| {
            Err(ServiceError::Status {
                operation: "list_library_playlists",
                status: 403,
                message: "forbidden".into(),
            })
        });
        mock.expect_create_playlist()
            .times(1)
            .returning(|_, _, _| Ok("PLnew".into()));

        let mut importer = PlaylistImporter::new(mock, test_config());
        let report = importer
            .import_playlist(job("Mix", vec![], true))
            .await
            .unwrap();

        assert_eq!(report.total_tracks, 0);
    }

    #[tokio::test]
    async fn create_failure_is_a_job_setup_failure() {
        let mut mock = MockMusicService::new();
        mock.expect_create_playlist().times(1).returning(|_, _, _| {
            Err(ServiceError::Status {
                operation: "create_playlist",
                status: 400,
                message: "invalid title".into(),
            })
        });

        let mut importer = PlaylistImporter::new(mock, test_config());
        let result = importer
            .import_playlist(job("Mix", vec![searchable("Song A", "Band X")], false))
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn failed_job_does_not_stop_the_run() {
        let mut mock = MockMusicService::new();
        mock.expect_create_playlist()
            .times(2)
            .returning(|title: &str, _, _| {
                if title == "Broken" {
                    Err(ServiceError::Status {
                        operation: "create_playlist",
                        status: 400,
                        message: "invalid title".into(),
                    })
                } else {
                    Ok("PLok".into())
                }
            });

        let mut importer = PlaylistImporter::new(mock, test_config());
        let reports = importer
            .import_all(vec![job("Broken", vec![], false), job("Fine", vec![], false)])
            .await;

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].playlist_name, "Fine");
    }

    #[tokio::test]
    async fn end_to_end_direct_searched_and_unresolved() {
        let mut mock = MockMusicService::new();
        mock.expect_list_library_playlists()
            .times(1)
            .returning(|| Ok(vec![]));
        mock.expect_create_playlist()
            .withf(|title, _, _| title == "Road Trip")
            .times(1)
            .returning(|_, _, _| Ok("PLroad".into()));
        mock.expect_search_songs()
            .times(1)
            .returning(|_, _| {
                Ok(vec![SongResult {
                    media_id: "srch0000000".into(),
                    title: "Song A".into(),
                    artists: vec!["Band X".into()],
                }])
            });
        mock.expect_add_playlist_items()
            .withf(|_, ids, _| ids == ["abc12345678".to_string(), "srch0000000".to_string()])
            .times(1)
            .returning(|_, _, _| Ok(()));

        let tracks = vec![
            TrackDescriptor {
                explicit_id: Some("abc12345678".into()),
                ..TrackDescriptor::default()
            },
            searchable("Song A", "Band X"),
            TrackDescriptor::default(),
        ];

        let mut importer = PlaylistImporter::new(mock, test_config());
        let report = importer
            .import_playlist(job("Road Trip", tracks, true))
            .await
            .unwrap();

        assert_eq!(report.total_tracks, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.searched, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped_duplicate, 0);
        assert_eq!(report.failures().len(), 1);
        assert!(report.failures()[0].cause.contains("no media id"));
    }

    #[tokio::test]
    async fn search_error_fails_only_that_track() {
        let mut mock = MockMusicService::new();
        mock.expect_create_playlist()
            .returning(|_, _, _| Ok("PL1".into()));
        mock.expect_search_songs().times(1).returning(|_, _| {
            Err(ServiceError::Status {
                operation: "search_songs",
                status: 400,
                message: "bad query".into(),
            })
        });
        mock.expect_add_playlist_items()
            .withf(|_, ids, _| ids.len() == 1)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let tracks = vec![
            searchable("Song A", "Band X"),
            TrackDescriptor {
                explicit_id: Some("abc12345678".into()),
                ..TrackDescriptor::default()
            },
        ];

        let mut importer = PlaylistImporter::new(mock, test_config());
        let report = importer
            .import_playlist(job("Mix", tracks, false))
            .await
            .unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert!(report.failures()[0].cause.contains("bad query"));
    }

    #[tokio::test]
    async fn duplicate_batches_count_as_skipped() {
        let mut mock = MockMusicService::new();
        mock.expect_create_playlist()
            .returning(|_, _, _| Ok("PL1".into()));
        mock.expect_add_playlist_items().returning(|_, _, _| {
            Err(ServiceError::Api {
                operation: "add_playlist_items",
                message: "every item is already in the playlist".into(),
            })
        });

        let tracks = vec![
            TrackDescriptor {
                explicit_id: Some("abc12345678".into()),
                ..TrackDescriptor::default()
            },
            TrackDescriptor {
                explicit_id: Some("def12345678".into()),
                ..TrackDescriptor::default()
            },
        ];

        let mut importer = PlaylistImporter::new(mock, test_config());
        let report = importer
            .import_playlist(job("Mix", tracks, false))
            .await
            .unwrap();

        assert_eq!(report.skipped_duplicate, 2);
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn search_cache_spans_jobs_within_one_run() {
        let mut mock = MockMusicService::new();
        mock.expect_create_playlist()
            .times(2)
            .returning(|_, _, _| Ok("PL1".into()));
        mock.expect_search_songs().times(1).returning(|_, _| {
            Ok(vec![SongResult {
                media_id: "srch0000000".into(),
                title: "Song A".into(),
                artists: vec!["Band X".into()],
            }])
        });
        mock.expect_add_playlist_items().returning(|_, _, _| Ok(()));

        let mut importer = PlaylistImporter::new(mock, test_config());
        let reports = importer
            .import_all(vec![
                job("First", vec![searchable("Song A", "Band X")], false),
                job("Second", vec![searchable("Song A", "Band X")], false),
            ])
            .await;

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].succeeded, 1);
        assert_eq!(reports[1].succeeded, 1);
    }
}
