/// How many failure details are rendered before truncating.
pub const FAILURES_SHOWN: usize = 10;

/// Outcome detail for one track that could not be added.
#[derive(Debug, Clone)]
pub struct TrackFailure {
    pub row_ref: Option<u64>,
    pub title: String,
    pub artist: String,
    pub cause: String,
}

/// Aggregated outcome of one playlist import job.
///
/// Every track lands in exactly one of `succeeded`, `skipped_duplicate` or
/// `failed`; `searched` overlays those counts with how many ids came from
/// search resolution.
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub playlist_name: String,
    pub total_tracks: usize,
    pub succeeded: usize,
    pub searched: usize,
    pub skipped_duplicate: usize,
    pub failed: usize,
    pub bounded_at: usize,
    failures: Vec<TrackFailure>,
}

impl ImportReport {
    pub fn new(playlist_name: String, total_tracks: usize) -> Self {
        Self {
            playlist_name,
            total_tracks,
            succeeded: 0,
            searched: 0,
            skipped_duplicate: 0,
            failed: 0,
            bounded_at: FAILURES_SHOWN,
            failures: Vec::new(),
        }
    }

    pub fn record_searched(&mut self) {
        self.searched += 1;
    }

    pub fn record_failure(&mut self, failure: TrackFailure) {
        self.failed += 1;
        self.failures.push(failure);
    }

    pub fn failures(&self) -> &[TrackFailure] {
        &self.failures
    }

    /// The first `bounded_at` failures plus how many were cut off.
    pub fn bounded_failures(&self) -> (&[TrackFailure], usize) {
        let shown = self.failures.len().min(self.bounded_at);
        (&self.failures[..shown], self.failures.len() - shown)
    }

    pub fn log_summary(&self) {
        log::info!(
            "Completed '{}': {}/{} tracks added",
            self.playlist_name,
            self.succeeded,
            self.total_tracks
        );
        if self.searched > 0 {
            log::info!("  {} resolved by search", self.searched);
        }
        if self.skipped_duplicate > 0 {
            log::info!("  {} skipped as duplicates", self.skipped_duplicate);
        }
        if self.failed > 0 {
            log::warn!("  {} failed:", self.failed);
            let (shown, remaining) = self.bounded_failures();
            for failure in shown {
                let row = failure
                    .row_ref
                    .map(|row| format!(" (row {row})"))
                    .unwrap_or_default();
                log::warn!(
                    "  - {} by {}{}: {}",
                    failure.title,
                    failure.artist,
                    row,
                    failure.cause
                );
            }
            if remaining > 0 {
                log::warn!("  ... and {remaining} more");
            }
        }
    }
}
