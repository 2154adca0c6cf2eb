use super::probe::{parse_ffprobe_json, MediaInfo};
use super::{MediaError, MediaResult, MediaTranscoder};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Caps width at 1920 and keeps the aspect ratio with an even height.
const SCALE_FILTER: &str = "scale='if(gt(iw,1920),1920,iw)':-2";

#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg_bin: String,
    ffprobe_bin: String,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_bin: impl Into<String>, ffprobe_bin: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
        }
    }

    fn transcode_args(input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-i".into(), input.into()];
        args.extend(
            [
                "-c:v", "libx264",
                "-preset", "medium",
                "-crf", "23",
                "-vf", SCALE_FILTER,
                "-c:a", "aac",
                "-b:a", "128k",
                "-movflags", "+faststart",
                "-y",
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(output.into());
        args
    }

    fn probe_args(path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-v", "quiet",
            "-print_format", "json",
            "-show_format",
            "-show_streams",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(path.into());
        args
    }
}

#[async_trait]
impl MediaTranscoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, output: &Path) -> MediaResult<()> {
        if !tokio::fs::try_exists(input).await? {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        debug!("Running {} on {}", self.ffmpeg_bin, input.display());

        // Runs as its own OS process; killed if the awaiting task goes away.
        let result = Command::new(&self.ffmpeg_bin)
            .args(Self::transcode_args(input, output))
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                program: self.ffmpeg_bin.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(MediaError::ProcessFailed {
                program: self.ffmpeg_bin.clone(),
                code: result.status.code(),
                stderr: tail(&result.stderr),
            });
        }

        if let Err(e) = tokio::fs::remove_file(input).await {
            warn!("Failed to remove transcode source {}: {}", input.display(), e);
        }

        Ok(())
    }

    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        let result = Command::new(&self.ffprobe_bin)
            .args(Self::probe_args(path))
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                program: self.ffprobe_bin.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(MediaError::ProcessFailed {
                program: self.ffprobe_bin.clone(),
                code: result.status.code(),
                stderr: tail(&result.stderr),
            });
        }

        parse_ffprobe_json(&result.stdout)
    }
}

/// Last few lines of process stderr, enough to explain a failure in a log line.
fn tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().rev().take(5).collect();
    lines.into_iter().rev().collect::<Vec<_>>().join("\n")
}
