use thiserror::Error;

/// One ranked hit from a song search.
#[derive(Debug, Clone)]
pub struct SongResult {
    pub media_id: String,
    pub title: String,
    pub artists: Vec<String>,
}

/// A playlist in the caller's remote library.
#[derive(Debug, Clone)]
pub struct PlaylistSummary {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Private,
    Public,
}

impl Visibility {
    pub fn privacy_status(&self) -> &'static str {
        match self {
            Visibility::Private => "PRIVATE",
            Visibility::Public => "PUBLIC",
        }
    }
}

/// Remote-call failure surfaced by a `MusicService` implementation.
///
/// The variants carry enough shape for the retry wrapper to tell transient
/// failures from permanent ones without knowing which backend produced them.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// Connection-level failure: DNS, refused or dropped connection.
    #[error("network error during {operation}: {message}")]
    Network {
        operation: &'static str,
        message: String,
    },
    /// The request did not complete in time.
    #[error("{operation} timed out: {message}")]
    Timeout {
        operation: &'static str,
        message: String,
    },
    /// The service answered with a non-success HTTP status.
    #[error("{operation} returned status {status}: {message}")]
    Status {
        operation: &'static str,
        status: u16,
        message: String,
    },
    /// The service answered 200 but reported a failure in the response body.
    #[error("{operation} failed: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },
    /// The response body did not have the expected shape.
    #[error("unexpected {operation} response: {message}")]
    UnexpectedResponse {
        operation: &'static str,
        message: String,
    },
}

impl ServiceError {
    /// Whether retrying the call might help. Connection problems, timeouts
    /// and 5xx statuses qualify; everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Network { .. } | ServiceError::Timeout { .. } => true,
            ServiceError::Status { status, .. } => *status >= 500,
            ServiceError::Api { .. } | ServiceError::UnexpectedResponse { .. } => false,
        }
    }

    pub fn from_reqwest(operation: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout {
                operation,
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            ServiceError::Status {
                operation,
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            ServiceError::UnexpectedResponse {
                operation,
                message: err.to_string(),
            }
        } else {
            ServiceError::Network {
                operation,
                message: err.to_string(),
            }
        }
    }
}

/// How a failed add-items call should be accounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddDisposition {
    /// The service rejected the call but its failure text says the items
    /// were in fact added.
    ReportedSuccess,
    /// The items are already in the playlist.
    AlreadyPresent,
    Failed,
}

/// Classify an add-items failure from the service's error text.
///
/// The backend reports success-as-error for a subset of already-processed
/// items; keeping the string sniffing here gives the batch submitter a stable
/// contract instead of scattering adapter quirks through the core.
pub fn classify_add_failure(err: &ServiceError) -> AddDisposition {
    let text = err.to_string().to_uppercase();
    if text.contains("STATUS_SUCCEEDED") {
        AddDisposition::ReportedSuccess
    } else if text.contains("DUPLICATE") || text.contains("ALREADY") {
        AddDisposition::AlreadyPresent
    } else {
        AddDisposition::Failed
    }
}

/// Port trait wrapping the music-service API capabilities used by business logic.
///
/// Implementations live in `services::ytmusic` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MusicService: Send + Sync {
    /// Search for songs, returning up to `limit` ranked results.
    async fn search_songs(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SongResult>, ServiceError>;

    async fn list_library_playlists(&self) -> Result<Vec<PlaylistSummary>, ServiceError>;

    /// Create a playlist and return its id.
    async fn create_playlist(
        &self,
        title: &str,
        description: &str,
        visibility: Visibility,
    ) -> Result<String, ServiceError>;

    async fn add_playlist_items(
        &self,
        playlist_id: &str,
        media_ids: &[String],
        allow_duplicates: bool,
    ) -> Result<(), ServiceError>;

    /// Fetch the tracks of one playlist, in playlist order.
    async fn playlist_items(&self, playlist_id: &str) -> Result<Vec<SongResult>, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(message: &str) -> ServiceError {
        ServiceError::Api {
            operation: "add_playlist_items",
            message: message.to_string(),
        }
    }

    #[test]
    fn transient_classification() {
        assert!(
            ServiceError::Network {
                operation: "search",
                message: "connection refused".into()
            }
            .is_transient()
        );
        assert!(
            ServiceError::Timeout {
                operation: "search",
                message: "deadline elapsed".into()
            }
            .is_transient()
        );
        assert!(
            ServiceError::Status {
                operation: "search",
                status: 503,
                message: "unavailable".into()
            }
            .is_transient()
        );
        assert!(
            !ServiceError::Status {
                operation: "search",
                status: 404,
                message: "not found".into()
            }
            .is_transient()
        );
        assert!(!api_error("bad request").is_transient());
    }

    #[test]
    fn add_failure_reported_success() {
        assert_eq!(
            classify_add_failure(&api_error("edit_playlist returned STATUS_SUCCEEDED")),
            AddDisposition::ReportedSuccess
        );
    }

    #[test]
    fn add_failure_duplicate() {
        assert_eq!(
            classify_add_failure(&api_error("some items are already in the playlist")),
            AddDisposition::AlreadyPresent
        );
        assert_eq!(
            classify_add_failure(&api_error("duplicate video id rejected")),
            AddDisposition::AlreadyPresent
        );
    }

    #[test]
    fn add_failure_other() {
        assert_eq!(
            classify_add_failure(&api_error("edit_playlist returned STATUS_FAILED")),
            AddDisposition::Failed
        );
    }
}
