use crate::modules::jobs::{Job, JobStatus};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateVideoResponse {
    pub video_id: String,
    pub media_job_id: Uuid,
    pub thumbnail_job_id: Uuid,
}

/// Public view of a job. Internal fields (file name, chain ids, probe data) are left out.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub id: Uuid,
    pub status: JobStatus,
    pub original_file_size: i64,
    pub processed_file_size: Option<i64>,
    pub hash: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: OffsetDateTime,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            status: job.status,
            original_file_size: job.original_file_size,
            processed_file_size: job.processed_file_size,
            hash: job.hash,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatusResponse {
    pub video_id: String,
    /// Both assets are on storage.
    pub published: bool,
    pub media: JobStatusResponse,
    pub thumbnail: JobStatusResponse,
}

impl VideoStatusResponse {
    pub fn new(video_id: String, media: Job, thumbnail: Job) -> Self {
        let published = media.status == JobStatus::Completed && thumbnail.status == JobStatus::Completed;
        Self {
            video_id,
            published,
            media: media.into(),
            thumbnail: thumbnail.into(),
        }
    }
}
