pub mod csv;
pub mod spotify;

use crate::ports::music_service::Visibility;

/// Job-level policy applied to every playlist a source produces.
#[derive(Debug, Clone, Copy)]
pub struct SourceOptions {
    pub append_if_exists: bool,
    pub visibility: Visibility,
}
