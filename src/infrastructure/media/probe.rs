use super::{MediaError, MediaResult};
use serde::Deserialize;

/// What the pipeline needs to know about a transcoded file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    /// Seconds, as reported by the container.
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

impl MediaInfo {
    pub fn rounded_duration(&self) -> i32 {
        self.duration.round() as i32
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Parses `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_ffprobe_json(raw: &[u8]) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput =
        serde_json::from_slice(raw).map_err(|e| MediaError::InvalidProbe(e.to_string()))?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| MediaError::InvalidProbe("no video stream found".to_string()))?;

    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite())
        .ok_or_else(|| MediaError::InvalidProbe("missing format duration".to_string()))?;

    match (video.width, video.height) {
        (Some(width), Some(height)) => Ok(MediaInfo {
            duration,
            width,
            height,
        }),
        _ => Err(MediaError::InvalidProbe(
            "video stream has no dimensions".to_string(),
        )),
    }
}
