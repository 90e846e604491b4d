use std::time::Duration;

use super::report::TrackFailure;
use crate::ports::music_service::{self, AddDisposition, MusicService};
use crate::services::retry::{self, RetryPolicy};

/// A resolved track queued for submission, carrying enough context to report
/// a failure against its source row.
#[derive(Debug, Clone)]
pub struct PendingTrack {
    pub media_id: String,
    pub row_ref: Option<u64>,
    pub title: String,
    pub artist: String,
}

/// Result of one flush. Ids within a flush share one fate: the service
/// accepts or rejects the whole call, so the classification applies to every
/// member of the batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<String>,
    pub duplicates: Vec<String>,
    pub failed: Vec<TrackFailure>,
}

/// Accumulates resolved ids and flushes them in fixed-size batches, pausing
/// after each flush so the service does not throttle the run.
pub struct BatchSubmitter<'a, S: MusicService> {
    service: &'a S,
    playlist_id: String,
    batch_size: usize,
    flush_pause: Duration,
    retry: RetryPolicy,
    pending: Vec<PendingTrack>,
}

impl<'a, S: MusicService> BatchSubmitter<'a, S> {
    pub fn new(
        service: &'a S,
        playlist_id: String,
        batch_size: usize,
        flush_pause: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            service,
            playlist_id,
            batch_size: batch_size.max(1),
            flush_pause,
            retry,
            pending: Vec::new(),
        }
    }

    /// Queue one track, flushing when the batch is full.
    pub async fn push(&mut self, track: PendingTrack) -> Option<BatchOutcome> {
        self.pending.push(track);
        if self.pending.len() >= self.batch_size {
            Some(self.flush().await)
        } else {
            None
        }
    }

    /// Flush whatever remains at the end of the track stream.
    pub async fn finish(&mut self) -> Option<BatchOutcome> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.flush().await)
        }
    }

    async fn flush(&mut self) -> BatchOutcome {
        let batch = std::mem::take(&mut self.pending);
        let ids: Vec<String> = batch.iter().map(|track| track.media_id.clone()).collect();
        log::debug!(
            "Flushing {} tracks to playlist {}",
            ids.len(),
            self.playlist_id
        );

        let result = retry::with_retry(&self.retry, "add_playlist_items", || {
            self.service
                .add_playlist_items(&self.playlist_id, &ids, false)
        })
        .await;

        let outcome = match result {
            Ok(()) => BatchOutcome {
                succeeded: ids,
                ..BatchOutcome::default()
            },
            Err(err) => match music_service::classify_add_failure(&err) {
                AddDisposition::ReportedSuccess => {
                    log::debug!("Service reported failure that denotes success: {err}");
                    BatchOutcome {
                        succeeded: ids,
                        ..BatchOutcome::default()
                    }
                }
                AddDisposition::AlreadyPresent => {
                    log::debug!("Batch already present in playlist: {err}");
                    BatchOutcome {
                        duplicates: ids,
                        ..BatchOutcome::default()
                    }
                }
                AddDisposition::Failed => {
                    let cause = err.to_string();
                    log::warn!("Batch of {} failed: {cause}", batch.len());
                    BatchOutcome {
                        failed: batch
                            .into_iter()
                            .map(|track| TrackFailure {
                                row_ref: track.row_ref,
                                title: track.title,
                                artist: track.artist,
                                cause: cause.clone(),
                            })
                            .collect(),
                        ..BatchOutcome::default()
                    }
                }
            },
        };

        // Pacing between flushes; dropping this sleep gets the run throttled.
        tokio::time::sleep(self.flush_pause).await;
        outcome
    }
}
