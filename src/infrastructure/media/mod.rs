//! External transcoding and media probing.

pub mod ffmpeg;
pub mod probe;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use ffmpeg::FfmpegTranscoder;
pub use probe::MediaInfo;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {code:?}: {stderr}")]
    ProcessFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("invalid probe output: {0}")]
    InvalidProbe(String),
    #[error("input file not found: {0}")]
    FileNotFound(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type MediaResult<T> = Result<T, MediaError>;

/// Media operations the transcode stage depends on.
#[async_trait]
pub trait MediaTranscoder: Send + Sync {
    /// Produces an H.264/AAC MP4 at `output` and removes `input` on success.
    async fn transcode(&self, input: &Path, output: &Path) -> MediaResult<()>;

    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo>;
}
