use super::Stage;
use crate::common::paths::UploadDirs;
use crate::error::PipelineResult;
use crate::infrastructure::hashing::hash_file;
use crate::modules::jobs::{Job, JobStatus, JobUpdate};
use async_trait::async_trait;

/// hashing -> creating_asset.
pub struct HashStage {
    dirs: UploadDirs,
}

impl HashStage {
    pub fn new(dirs: UploadDirs) -> Self {
        Self { dirs }
    }
}

#[async_trait]
impl Stage for HashStage {
    fn name(&self) -> &'static str {
        "Hashing"
    }

    fn source_status(&self) -> JobStatus {
        JobStatus::Hashing
    }

    async fn process(&self, job: &Job) -> PipelineResult<JobUpdate> {
        let path = self.dirs.pending_upload(&job.file_name);
        let hash = hash_file(&path).await?;

        Ok(JobUpdate {
            hash: Some(hash),
            ..JobUpdate::new(JobStatus::CreatingAsset)
        })
    }
}
