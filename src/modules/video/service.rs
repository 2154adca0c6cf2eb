use super::dto::{CreateVideoResponse, VideoStatusResponse};
use crate::common::response::ApiError;
use crate::common::upload::{read_head, remove_quietly, stream_to_disk, UploadError};
use crate::modules::jobs::{FileType, NewJob, NewVideo, StoreError};
use crate::state::AppState;
use axum::extract::multipart::Field;
use axum::extract::Multipart;
use axum::http::StatusCode;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("a video with id {0} already exists")]
    Duplicate(String),
    #[error("video {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<VideoError> for ApiError {
    fn from(err: VideoError) -> Self {
        let status = match &err {
            VideoError::Invalid(_) => StatusCode::BAD_REQUEST,
            VideoError::Upload(UploadError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            VideoError::Upload(_) => StatusCode::BAD_REQUEST,
            VideoError::Duplicate(_) => StatusCode::CONFLICT,
            VideoError::NotFound(_) => StatusCode::NOT_FOUND,
            VideoError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(err.to_string(), status)
    }
}

/// A file part already written to disk.
#[derive(Debug)]
pub struct StoredFile {
    pub job_id: Uuid,
    pub file_name: String,
    pub path: PathBuf,
    pub size: u64,
}

impl StoredFile {
    fn into_new_job(self, file_type: FileType) -> Result<NewJob, VideoError> {
        let original_file_size = i64::try_from(self.size)
            .map_err(|_| VideoError::Invalid(format!("file too large: {} bytes", self.size)))?;
        Ok(NewJob {
            id: self.job_id,
            file_name: self.file_name,
            original_file_size,
            file_type,
        })
    }
}

#[derive(Debug, Default)]
pub struct VideoForm {
    pub video_id: Option<String>,
    pub channel_id: Option<String>,
    pub media: Option<StoredFile>,
    pub thumbnail: Option<StoredFile>,
}

impl VideoForm {
    fn missing_part(&self) -> Option<&'static str> {
        if self.media.is_none() || self.thumbnail.is_none() {
            return Some("media and thumbnail files");
        }
        let blank = |value: &Option<String>| value.as_deref().is_none_or(str::is_empty);
        if blank(&self.video_id) {
            Some("videoId")
        } else if blank(&self.channel_id) {
            Some("channelId")
        } else {
            None
        }
    }

    /// Removes whatever files this form wrote.
    pub async fn discard(self) {
        for file in [self.media, self.thumbnail].into_iter().flatten() {
            remove_quietly(&file.path).await;
        }
    }
}

fn valid_video_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub struct VideoService;

impl VideoService {
    /// Drains the multipart body, writing file parts to disk as they arrive.
    pub async fn read_form(state: &AppState, mut multipart: Multipart) -> Result<VideoForm, VideoError> {
        let mut form = VideoForm::default();
        match Self::fill_form(state, &mut multipart, &mut form).await {
            Ok(()) => Ok(form),
            Err(e) => {
                form.discard().await;
                Err(e)
            }
        }
    }

    async fn fill_form(
        state: &AppState,
        multipart: &mut Multipart,
        form: &mut VideoForm,
    ) -> Result<(), VideoError> {
        while let Some(field) = multipart.next_field().await.map_err(UploadError::from)? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "videoId" => form.video_id = Some(text(field).await?),
                "channelId" => form.channel_id = Some(text(field).await?),
                "media" | "thumbnail" => {
                    let (file_type, slot) = if name == "media" {
                        (FileType::Media, &mut form.media)
                    } else {
                        (FileType::Thumbnail, &mut form.thumbnail)
                    };
                    if slot.is_some() {
                        return Err(VideoError::Invalid(format!("duplicate {name} part")));
                    }
                    *slot = Some(Self::store_file(state, field, file_type).await?);
                }
                other => debug!("Ignoring multipart field {:?}", other),
            }
        }
        Ok(())
    }

    async fn store_file(
        state: &AppState,
        mut field: Field<'_>,
        file_type: FileType,
    ) -> Result<StoredFile, VideoError> {
        let expected = match file_type {
            FileType::Media => mime::VIDEO,
            FileType::Thumbnail => mime::IMAGE,
        };
        let head = read_head(&mut field, expected).await?;
        if let Some(declared) = field.content_type() {
            if declared != head.content_type.essence_str() {
                debug!("Part declared {} but contains {}", declared, head.content_type);
            }
        }

        let job_id = Uuid::new_v4();
        let file_name = format!("{}.{}", job_id, head.extension);
        // Media waits for the transcoder; thumbnails go straight to hashing.
        let path = match file_type {
            FileType::Media => state.dirs.pending_processing(&file_name),
            FileType::Thumbnail => state.dirs.pending_upload(&file_name),
        };

        let size = stream_to_disk(field, head, path.clone()).await?;
        Ok(StoredFile {
            job_id,
            file_name,
            path,
            size,
        })
    }

    pub async fn create(state: &AppState, form: VideoForm) -> Result<CreateVideoResponse, VideoError> {
        if let Some(part) = form.missing_part() {
            form.discard().await;
            return Err(VideoError::Invalid(format!("missing required part: {part}")));
        }
        let video_id = form.video_id.clone().unwrap_or_default();
        if !valid_video_id(&video_id) {
            form.discard().await;
            return Err(VideoError::Invalid(format!("invalid video id {video_id:?}")));
        }
        let VideoForm {
            channel_id: Some(channel_id),
            media: Some(media),
            thumbnail: Some(thumbnail),
            ..
        } = form
        else {
            return Err(VideoError::Invalid("incomplete upload".to_string()));
        };

        let media_path = media.path.clone();
        let thumbnail_path = thumbnail.path.clone();
        let jobs = media
            .into_new_job(FileType::Media)
            .and_then(|media| Ok((media, thumbnail.into_new_job(FileType::Thumbnail)?)));
        let (media_job, thumbnail_job) = match jobs {
            Ok(jobs) => jobs,
            Err(e) => {
                remove_quietly(&media_path).await;
                remove_quietly(&thumbnail_path).await;
                return Err(e);
            }
        };
        let new_video = NewVideo {
            id: video_id.clone(),
            channel_id,
            media: media_job,
            thumbnail: thumbnail_job,
        };

        match state.store.create_video(new_video).await {
            Ok((video, media, thumbnail)) => {
                info!(
                    "📥 Video {} accepted: media job {}, thumbnail job {}",
                    video.id, media.id, thumbnail.id
                );
                Ok(CreateVideoResponse {
                    video_id: video.id,
                    media_job_id: media.id,
                    thumbnail_job_id: thumbnail.id,
                })
            }
            Err(e) => {
                remove_quietly(&media_path).await;
                remove_quietly(&thumbnail_path).await;
                match e {
                    StoreError::Conflict(_) => Err(VideoError::Duplicate(video_id)),
                    other => Err(VideoError::Store(other)),
                }
            }
        }
    }

    pub async fn status(state: &AppState, video_id: &str) -> Result<VideoStatusResponse, VideoError> {
        let not_found = || VideoError::NotFound(video_id.to_string());
        let video = state
            .store
            .find_video(video_id)
            .await
            .map_err(VideoError::Store)?
            .ok_or_else(not_found)?;

        let media = state
            .store
            .get_job(video.media_job_id)
            .await
            .map_err(VideoError::Store)?
            .ok_or_else(not_found)?;
        let thumbnail = state
            .store
            .get_job(video.thumbnail_job_id)
            .await
            .map_err(VideoError::Store)?
            .ok_or_else(not_found)?;

        Ok(VideoStatusResponse::new(video.id, media, thumbnail))
    }
}

async fn text(field: Field<'_>) -> Result<String, VideoError> {
    let value = field.text().await.map_err(UploadError::from)?;
    Ok(value.trim().to_string())
}
