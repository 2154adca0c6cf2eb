use super::model::{FileType, Job, JobStatus, JobUpdate, NewJob, NewVideo, Video};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Conflict(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable keyed store of jobs and videos. Workers coordinate only through it.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Oldest job (by creation time) in `status`, optionally only those last
    /// updated at or before `updated_before`.
    async fn find_oldest(
        &self,
        status: JobStatus,
        updated_before: Option<OffsetDateTime>,
    ) -> StoreResult<Option<Job>>;

    async fn get_job(&self, id: Uuid) -> StoreResult<Option<Job>>;

    /// Unconditional write, for operator tooling. Workers go through
    /// [`JobStore::transition`] instead.
    async fn update(&self, id: Uuid, update: &JobUpdate) -> StoreResult<()>;

    /// Applies `update` only while the job is still in `from`. Returns whether a
    /// row changed.
    async fn transition(&self, id: Uuid, from: JobStatus, update: &JobUpdate) -> StoreResult<bool>;

    async fn find_video(&self, id: &str) -> StoreResult<Option<Video>>;

    /// Inserts the video and both of its jobs atomically.
    async fn create_video(&self, video: NewVideo) -> StoreResult<(Video, Job, Job)>;

    /// Puts jobs back where their pipeline can resume; see [`Job::reset_status`].
    async fn reset_all(&self, failed_only: bool) -> StoreResult<u64>;
}

#[derive(FromRow)]
struct JobRow {
    id: Uuid,
    video_id: String,
    file_name: String,
    original_file_size: i64,
    processed_file_size: Option<i64>,
    file_type: String,
    status: String,
    hash: Option<String>,
    data_object_id: Option<String>,
    duration: Option<i32>,
    height: Option<i32>,
    width: Option<i32>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: row.id,
            video_id: row.video_id,
            file_name: row.file_name,
            original_file_size: row.original_file_size,
            processed_file_size: row.processed_file_size,
            file_type: row.file_type.parse().map_err(StoreError::Corrupt)?,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            hash: row.hash,
            data_object_id: row.data_object_id,
            duration: row.duration,
            height: row.height,
            width: row.width,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct VideoRow {
    id: String,
    channel_id: String,
    thumbnail_job_id: Uuid,
    media_job_id: Uuid,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<VideoRow> for Video {
    fn from(row: VideoRow) -> Self {
        Video {
            id: row.id,
            channel_id: row.channel_id,
            thumbnail_job_id: row.thumbnail_job_id,
            media_job_id: row.media_job_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const JOB_COLUMNS: &str = "id, video_id, file_name, original_file_size, processed_file_size, \
     file_type, status, hash, data_object_id, duration, height, width, created_at, updated_at";

#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_job(
        tx: &mut Transaction<'_, Postgres>,
        video_id: &str,
        job: &NewJob,
    ) -> StoreResult<Job> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            INSERT INTO jobs (id, video_id, file_name, original_file_size, processed_file_size, file_type, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job.id)
        .bind(video_id)
        .bind(&job.file_name)
        .bind(job.original_file_size)
        .bind(job.processed_file_size())
        .bind(job.file_type.as_str())
        .bind(job.initial_status().as_str())
        .fetch_one(&mut **tx)
        .await?;

        Job::try_from(row)
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn find_oldest(
        &self,
        status: JobStatus,
        updated_before: Option<OffsetDateTime>,
    ) -> StoreResult<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM jobs
            WHERE status = $1
              AND ($2::timestamptz IS NULL OR updated_at <= $2)
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#
        ))
        .bind(status.as_str())
        .bind(updated_before)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn get_job(&self, id: Uuid) -> StoreResult<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Job::try_from).transpose()
    }

    async fn update(&self, id: Uuid, update: &JobUpdate) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET
                status = $2,
                file_name = COALESCE($3, file_name),
                processed_file_size = COALESCE($4, processed_file_size),
                hash = COALESCE($5, hash),
                data_object_id = COALESCE($6, data_object_id),
                duration = COALESCE($7, duration),
                height = COALESCE($8, height),
                width = COALESCE($9, width),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.status.as_str())
        .bind(&update.file_name)
        .bind(update.processed_file_size)
        .bind(&update.hash)
        .bind(&update.data_object_id)
        .bind(update.duration)
        .bind(update.height)
        .bind(update.width)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn transition(&self, id: Uuid, from: JobStatus, update: &JobUpdate) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET
                status = $3,
                file_name = COALESCE($4, file_name),
                processed_file_size = COALESCE($5, processed_file_size),
                hash = COALESCE($6, hash),
                data_object_id = COALESCE($7, data_object_id),
                duration = COALESCE($8, duration),
                height = COALESCE($9, height),
                width = COALESCE($10, width),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(update.status.as_str())
        .bind(&update.file_name)
        .bind(update.processed_file_size)
        .bind(&update.hash)
        .bind(&update.data_object_id)
        .bind(update.duration)
        .bind(update.height)
        .bind(update.width)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_video(&self, id: &str) -> StoreResult<Option<Video>> {
        let row = sqlx::query_as::<_, VideoRow>(
            r#"
            SELECT id, channel_id, thumbnail_job_id, media_job_id, created_at, updated_at
            FROM videos
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Video::from))
    }

    async fn create_video(&self, video: NewVideo) -> StoreResult<(Video, Job, Job)> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, VideoRow>(
            r#"
            INSERT INTO videos (id, channel_id, thumbnail_job_id, media_job_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, channel_id, thumbnail_job_id, media_job_id, created_at, updated_at
            "#,
        )
        .bind(&video.id)
        .bind(&video.channel_id)
        .bind(video.thumbnail.id)
        .bind(video.media.id)
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(StoreError::Conflict(format!(
                    "a video with id {} already exists",
                    video.id
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let media = Self::insert_job(&mut tx, &video.id, &video.media).await?;
        let thumbnail = Self::insert_job(&mut tx, &video.id, &video.thumbnail).await?;

        tx.commit().await?;
        Ok((Video::from(row), media, thumbnail))
    }

    async fn reset_all(&self, failed_only: bool) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET
                status = CASE
                    WHEN file_type = 'thumbnail' THEN $2
                    WHEN processed_file_size IS NULL THEN $1
                    ELSE $3
                END,
                updated_at = NOW()
            WHERE NOT $4 OR status = $5
            "#,
        )
        .bind(JobStatus::initial_for(FileType::Media).as_str())
        .bind(JobStatus::initial_for(FileType::Thumbnail).as_str())
        .bind(JobStatus::Hashing.as_str())
        .bind(failed_only)
        .bind(JobStatus::Failed.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
