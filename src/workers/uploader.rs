use super::Stage;
use crate::common::paths::UploadDirs;
use crate::error::{PipelineError, PipelineResult};
use crate::infrastructure::storage::{fastest_endpoint, upload_file, StorageDiscovery, UploadTarget};
use crate::modules::jobs::{Job, JobStatus, JobStore, JobUpdate};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// uploading -> completed. Only picks jobs whose asset has had `min_delay` to
/// propagate to the storage nodes.
pub struct UploadStage {
    discovery: Arc<dyn StorageDiscovery>,
    http: reqwest::Client,
    store: Arc<dyn JobStore>,
    dirs: UploadDirs,
    min_delay: Duration,
}

impl UploadStage {
    pub fn new(
        discovery: Arc<dyn StorageDiscovery>,
        http: reqwest::Client,
        store: Arc<dyn JobStore>,
        dirs: UploadDirs,
        min_delay: Duration,
    ) -> Self {
        Self {
            discovery,
            http,
            store,
            dirs,
            min_delay,
        }
    }
}

#[async_trait]
impl Stage for UploadStage {
    fn name(&self) -> &'static str {
        "Upload"
    }

    fn source_status(&self) -> JobStatus {
        JobStatus::Uploading
    }

    fn min_age(&self) -> Option<Duration> {
        Some(self.min_delay)
    }

    async fn process(&self, job: &Job) -> PipelineResult<JobUpdate> {
        let data_object_id = job
            .data_object_id
            .as_deref()
            .ok_or_else(|| PipelineError::missing(job.id, "data_object_id"))?;
        let video = self
            .store
            .find_video(&job.video_id)
            .await?
            .ok_or_else(|| PipelineError::VideoNotFound(job.video_id.clone()))?;
        let bag_id = video.bag_id();

        let candidates = self.discovery.list_endpoints(&bag_id).await?;
        let node = fastest_endpoint(&self.http, candidates).await?;

        let target = UploadTarget {
            endpoint: &node.endpoint,
            data_object_id,
            storage_bucket_id: &node.bucket_id,
            bag_id: &bag_id,
        };
        let path = self.dirs.pending_upload(&job.file_name);
        upload_file(&self.http, &target, &path, &job.file_name).await?;

        info!(
            "📦 File uploaded for job {} to bucket {} ({})",
            job.id, node.bucket_id, node.endpoint
        );

        Ok(JobUpdate::new(JobStatus::Completed))
    }
}
