use super::model::{Job, JobStatus, JobUpdate, NewJob, NewVideo, Video};
use super::repository::{JobStore, StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    videos: HashMap<String, Video>,
    jobs: HashMap<Uuid, Job>,
}

/// Process-local [`JobStore`] for tests and single-process dry runs.
#[derive(Default)]
pub struct MemoryJobStore {
    tables: Mutex<Tables>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a job row verbatim, timestamps included.
    pub async fn put_job(&self, job: Job) {
        self.tables.lock().await.jobs.insert(job.id, job);
    }

    pub async fn put_video(&self, video: Video) {
        self.tables.lock().await.videos.insert(video.id.clone(), video);
    }

    pub async fn jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.tables.lock().await.jobs.values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    fn materialize(video_id: &str, new_job: &NewJob, now: OffsetDateTime) -> Job {
        Job {
            id: new_job.id,
            video_id: video_id.to_string(),
            file_name: new_job.file_name.clone(),
            original_file_size: new_job.original_file_size,
            processed_file_size: new_job.processed_file_size(),
            file_type: new_job.file_type,
            status: new_job.initial_status(),
            hash: None,
            data_object_id: None,
            duration: None,
            height: None,
            width: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn find_oldest(
        &self,
        status: JobStatus,
        updated_before: Option<OffsetDateTime>,
    ) -> StoreResult<Option<Job>> {
        let tables = self.tables.lock().await;
        let oldest = tables
            .jobs
            .values()
            .filter(|job| job.status == status)
            .filter(|job| updated_before.is_none_or(|cutoff| job.updated_at <= cutoff))
            .min_by_key(|job| (job.created_at, job.id))
            .cloned();
        Ok(oldest)
    }

    async fn get_job(&self, id: Uuid) -> StoreResult<Option<Job>> {
        Ok(self.tables.lock().await.jobs.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, update: &JobUpdate) -> StoreResult<()> {
        if let Some(job) = self.tables.lock().await.jobs.get_mut(&id) {
            update.apply(job, OffsetDateTime::now_utc());
        }
        Ok(())
    }

    async fn transition(&self, id: Uuid, from: JobStatus, update: &JobUpdate) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.jobs.get_mut(&id) {
            Some(job) if job.status == from => {
                update.apply(job, OffsetDateTime::now_utc());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_video(&self, id: &str) -> StoreResult<Option<Video>> {
        Ok(self.tables.lock().await.videos.get(id).cloned())
    }

    async fn create_video(&self, video: NewVideo) -> StoreResult<(Video, Job, Job)> {
        let mut tables = self.tables.lock().await;
        if tables.videos.contains_key(&video.id) {
            return Err(StoreError::Conflict(format!(
                "a video with id {} already exists",
                video.id
            )));
        }

        let now = OffsetDateTime::now_utc();
        let media = Self::materialize(&video.id, &video.media, now);
        let thumbnail = Self::materialize(&video.id, &video.thumbnail, now);
        let record = Video {
            id: video.id.clone(),
            channel_id: video.channel_id,
            thumbnail_job_id: thumbnail.id,
            media_job_id: media.id,
            created_at: now,
            updated_at: now,
        };

        tables.videos.insert(record.id.clone(), record.clone());
        tables.jobs.insert(media.id, media.clone());
        tables.jobs.insert(thumbnail.id, thumbnail.clone());
        Ok((record, media, thumbnail))
    }

    async fn reset_all(&self, failed_only: bool) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        let now = OffsetDateTime::now_utc();
        let mut count = 0;
        for job in tables.jobs.values_mut() {
            if failed_only && job.status != JobStatus::Failed {
                continue;
            }
            job.status = job.reset_status();
            job.updated_at = now;
            count += 1;
        }
        Ok(count)
    }
}
