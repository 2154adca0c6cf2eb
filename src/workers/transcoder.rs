use super::Stage;
use crate::common::format::format_mb;
use crate::common::paths::UploadDirs;
use crate::error::{PipelineError, PipelineResult};
use crate::infrastructure::media::MediaTranscoder;
use crate::modules::jobs::{Job, JobStatus, JobUpdate};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// pending_processing -> processing -> hashing.
pub struct TranscodeStage {
    transcoder: Arc<dyn MediaTranscoder>,
    dirs: UploadDirs,
}

impl TranscodeStage {
    pub fn new(transcoder: Arc<dyn MediaTranscoder>, dirs: UploadDirs) -> Self {
        Self { transcoder, dirs }
    }

    pub fn output_name(job: &Job) -> String {
        format!("{}.mp4", job.id)
    }
}

#[async_trait]
impl Stage for TranscodeStage {
    fn name(&self) -> &'static str {
        "Transcoding"
    }

    fn source_status(&self) -> JobStatus {
        JobStatus::PendingProcessing
    }

    fn claim_status(&self) -> Option<JobStatus> {
        Some(JobStatus::Processing)
    }

    async fn process(&self, job: &Job) -> PipelineResult<JobUpdate> {
        let input = self.dirs.pending_processing(&job.file_name);
        let output_name = Self::output_name(job);
        let output = self.dirs.pending_upload(&output_name);

        info!("🎥 Transcoding job {} ({})", job.id, input.display());
        self.transcoder.transcode(&input, &output).await?;

        let info = self.transcoder.probe(&output).await?;
        let size = tokio::fs::metadata(&output).await?.len() as i64;
        let height = i32::try_from(info.height).map_err(|_| PipelineError::OutOfRange {
            field: "height",
            value: info.height.into(),
        })?;
        let width = i32::try_from(info.width).map_err(|_| PipelineError::OutOfRange {
            field: "width",
            value: info.width.into(),
        })?;

        info!(
            "Job {} transcoded: {} -> {}, {}x{}, {}s",
            job.id,
            format_mb(job.original_file_size),
            format_mb(size),
            width,
            height,
            info.rounded_duration()
        );

        Ok(JobUpdate {
            file_name: Some(output_name),
            processed_file_size: Some(size),
            duration: Some(info.rounded_duration()),
            height: Some(height),
            width: Some(width),
            ..JobUpdate::new(JobStatus::Hashing)
        })
    }
}
