use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Media,
    Thumbnail,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Media => "media",
            FileType::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "media" => Ok(FileType::Media),
            "thumbnail" => Ok(FileType::Thumbnail),
            other => Err(format!("unknown file type {other:?}")),
        }
    }
}

/// Lifecycle of a job. Each non-terminal value is owned by exactly one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    PendingProcessing,
    Processing,
    Hashing,
    CreatingAsset,
    Uploading,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 7] = [
        JobStatus::PendingProcessing,
        JobStatus::Processing,
        JobStatus::Hashing,
        JobStatus::CreatingAsset,
        JobStatus::Uploading,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::PendingProcessing => "pending_processing",
            JobStatus::Processing => "processing",
            JobStatus::Hashing => "hashing",
            JobStatus::CreatingAsset => "creating_asset",
            JobStatus::Uploading => "uploading",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Status a freshly ingested job starts in. Thumbnails skip transcoding.
    pub fn initial_for(file_type: FileType) -> Self {
        match file_type {
            FileType::Media => JobStatus::PendingProcessing,
            FileType::Thumbnail => JobStatus::Hashing,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// The forward edge out of this status, if any.
    pub fn successor(&self) -> Option<JobStatus> {
        match self {
            JobStatus::PendingProcessing => Some(JobStatus::Processing),
            JobStatus::Processing => Some(JobStatus::Hashing),
            JobStatus::Hashing => Some(JobStatus::CreatingAsset),
            JobStatus::CreatingAsset => Some(JobStatus::Uploading),
            JobStatus::Uploading => Some(JobStatus::Completed),
            JobStatus::Completed | JobStatus::Failed => None,
        }
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == JobStatus::Failed || self.successor() == Some(next)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown job status {s:?}"))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct Video {
    pub id: String,
    pub channel_id: String,
    pub thumbnail_job_id: Uuid,
    pub media_job_id: Uuid,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: OffsetDateTime,
}

impl Video {
    /// Storage bag holding the channel's data objects.
    pub fn bag_id(&self) -> String {
        format!("dynamic:channel:{}", self.channel_id)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct Job {
    pub id: Uuid,
    pub video_id: String,
    pub file_name: String,
    pub original_file_size: i64,
    pub processed_file_size: Option<i64>,
    pub file_type: FileType,
    pub status: JobStatus,
    pub hash: Option<String>,
    pub data_object_id: Option<String>,
    pub duration: Option<i32>,
    pub height: Option<i32>,
    pub width: Option<i32>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: OffsetDateTime,
}

impl Job {
    /// Status an operator reset sends this job back to. Media that was already
    /// transcoded resumes at hashing, since its source file is gone.
    pub fn reset_status(&self) -> JobStatus {
        match (self.file_type, self.processed_file_size) {
            (FileType::Media, Some(_)) => JobStatus::Hashing,
            (file_type, _) => JobStatus::initial_for(file_type),
        }
    }
}

/// A status write plus the fields a stage produced. `None` keeps the stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub file_name: Option<String>,
    pub processed_file_size: Option<i64>,
    pub hash: Option<String>,
    pub data_object_id: Option<String>,
    pub duration: Option<i32>,
    pub height: Option<i32>,
    pub width: Option<i32>,
}

impl JobUpdate {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            file_name: None,
            processed_file_size: None,
            hash: None,
            data_object_id: None,
            duration: None,
            height: None,
            width: None,
        }
    }

    pub fn failed() -> Self {
        Self::new(JobStatus::Failed)
    }

    pub(crate) fn apply(&self, job: &mut Job, now: OffsetDateTime) {
        job.status = self.status;
        if let Some(file_name) = &self.file_name {
            job.file_name = file_name.clone();
        }
        if let Some(size) = self.processed_file_size {
            job.processed_file_size = Some(size);
        }
        if let Some(hash) = &self.hash {
            job.hash = Some(hash.clone());
        }
        if let Some(id) = &self.data_object_id {
            job.data_object_id = Some(id.clone());
        }
        if let Some(duration) = self.duration {
            job.duration = Some(duration);
        }
        if let Some(height) = self.height {
            job.height = Some(height);
        }
        if let Some(width) = self.width {
            job.width = Some(width);
        }
        job.updated_at = now;
    }
}

/// One file of a new upload, written to disk before the job row exists.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: Uuid,
    pub file_name: String,
    pub original_file_size: i64,
    pub file_type: FileType,
}

impl NewJob {
    pub fn initial_status(&self) -> JobStatus {
        JobStatus::initial_for(self.file_type)
    }

    /// Thumbnails are uploaded as-is, so their processed size is known up front.
    pub fn processed_file_size(&self) -> Option<i64> {
        match self.file_type {
            FileType::Media => None,
            FileType::Thumbnail => Some(self.original_file_size),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub id: String,
    pub channel_id: String,
    pub media: NewJob,
    pub thumbnail: NewJob,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_path_is_linear() {
        let mut status = JobStatus::initial_for(FileType::Media);
        let mut path = vec![status];
        while let Some(next) = status.successor() {
            assert!(status.can_transition_to(next));
            status = next;
            path.push(status);
        }
        assert_eq!(
            path,
            vec![
                JobStatus::PendingProcessing,
                JobStatus::Processing,
                JobStatus::Hashing,
                JobStatus::CreatingAsset,
                JobStatus::Uploading,
                JobStatus::Completed,
            ]
        );
    }

    #[test]
    fn thumbnails_start_in_hashing() {
        assert_eq!(JobStatus::initial_for(FileType::Thumbnail), JobStatus::Hashing);
    }

    #[test]
    fn every_non_terminal_status_can_fail() {
        for status in JobStatus::ALL {
            assert_eq!(status.can_transition_to(JobStatus::Failed), !status.is_terminal());
        }
    }

    #[test]
    fn terminal_statuses_have_no_exits() {
        for next in JobStatus::ALL {
            assert!(!JobStatus::Completed.can_transition_to(next));
            assert!(!JobStatus::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn no_backward_or_skipping_edges() {
        assert!(!JobStatus::Hashing.can_transition_to(JobStatus::PendingProcessing));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::PendingProcessing));
        assert!(!JobStatus::Hashing.can_transition_to(JobStatus::Uploading));
        assert!(!JobStatus::PendingProcessing.can_transition_to(JobStatus::Hashing));
    }

    #[test]
    fn status_text_round_trips() {
        for status in JobStatus::ALL {
            assert_eq!(status.as_str().parse::<JobStatus>(), Ok(status));
        }
        assert!("pending_upload".parse::<JobStatus>().is_err());
    }

    #[test]
    fn transcoded_media_resets_to_hashing() {
        let now = OffsetDateTime::now_utc();
        let mut job = Job {
            id: Uuid::new_v4(),
            video_id: "v1".into(),
            file_name: "in.mov".into(),
            original_file_size: 10,
            processed_file_size: None,
            file_type: FileType::Media,
            status: JobStatus::Failed,
            hash: None,
            data_object_id: None,
            duration: None,
            height: None,
            width: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(job.reset_status(), JobStatus::PendingProcessing);

        job.processed_file_size = Some(5);
        assert_eq!(job.reset_status(), JobStatus::Hashing);

        job.file_type = FileType::Thumbnail;
        job.processed_file_size = Some(10);
        assert_eq!(job.reset_status(), JobStatus::Hashing);
    }

    #[test]
    fn update_keeps_unset_fields() {
        let now = OffsetDateTime::now_utc();
        let mut job = Job {
            id: Uuid::new_v4(),
            video_id: "v1".into(),
            file_name: "a.png".into(),
            original_file_size: 10,
            processed_file_size: Some(10),
            file_type: FileType::Thumbnail,
            status: JobStatus::Hashing,
            hash: None,
            data_object_id: None,
            duration: None,
            height: None,
            width: None,
            created_at: now,
            updated_at: now,
        };
        let update = JobUpdate {
            hash: Some("zQm".into()),
            ..JobUpdate::new(JobStatus::CreatingAsset)
        };
        update.apply(&mut job, now);
        assert_eq!(job.status, JobStatus::CreatingAsset);
        assert_eq!(job.hash.as_deref(), Some("zQm"));
        assert_eq!(job.file_name, "a.png");
        assert_eq!(job.processed_file_size, Some(10));
    }
}
