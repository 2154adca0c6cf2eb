use prost::Message;

#[derive(Clone, PartialEq, Message)]
pub struct MediaType {
    #[prost(string, optional, tag = "1")]
    pub codec_name: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub container: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub mime_media_type: Option<String>,
}

/// Subset of the content directory's video metadata the pipeline writes.
/// `video` and `thumbnail_photo` index into the transaction's asset list.
#[derive(Clone, PartialEq, Message)]
pub struct VideoMetadata {
    #[prost(string, optional, tag = "1")]
    pub title: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub description: Option<String>,
    #[prost(uint32, optional, tag = "3")]
    pub video: Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    pub thumbnail_photo: Option<u32>,
    #[prost(uint32, optional, tag = "5")]
    pub duration: Option<u32>,
    #[prost(uint32, optional, tag = "6")]
    pub media_pixel_height: Option<u32>,
    #[prost(uint32, optional, tag = "7")]
    pub media_pixel_width: Option<u32>,
    #[prost(message, optional, tag = "8")]
    pub media_type: Option<MediaType>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ContentMetadata {
    #[prost(message, optional, tag = "1")]
    pub video_metadata: Option<VideoMetadata>,
}

/// Probe results of a transcoded media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaProperties {
    pub duration: u32,
    pub height: u32,
    pub width: u32,
}

pub const MEDIA_CODEC: &str = "h264";
pub const MEDIA_CONTAINER: &str = "mp4";
pub const MEDIA_MIME_TYPE: &str = "video/mp4";

pub fn media_metadata(props: MediaProperties) -> ContentMetadata {
    ContentMetadata {
        video_metadata: Some(VideoMetadata {
            video: Some(0),
            duration: Some(props.duration),
            media_pixel_height: Some(props.height),
            media_pixel_width: Some(props.width),
            media_type: Some(MediaType {
                codec_name: Some(MEDIA_CODEC.to_string()),
                container: Some(MEDIA_CONTAINER.to_string()),
                mime_media_type: Some(MEDIA_MIME_TYPE.to_string()),
            }),
            ..Default::default()
        }),
    }
}

pub fn thumbnail_metadata() -> ContentMetadata {
    ContentMetadata {
        video_metadata: Some(VideoMetadata {
            thumbnail_photo: Some(0),
            ..Default::default()
        }),
    }
}
