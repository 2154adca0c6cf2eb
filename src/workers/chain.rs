use super::Stage;
use crate::error::{PipelineError, PipelineResult};
use crate::infrastructure::chain::events::{created_data_object_id, EventError};
use crate::infrastructure::chain::metadata::{media_metadata, thumbnail_metadata, MediaProperties};
use crate::infrastructure::chain::{
    ChainClient, ChainError, DataObjectCreation, StorageAssets, StorageFees, TransactorAccount,
    UpdateVideoTx,
};
use crate::modules::jobs::{FileType, Job, JobStatus, JobStore, JobUpdate, Video};
use async_trait::async_trait;
use prost::Message;
use std::sync::Arc;
use tracing::info;

/// creating_asset -> uploading. Registers the file as a data object of its
/// video and records the id the chain assigned.
pub struct ChainStage {
    client: Arc<dyn ChainClient>,
    account: TransactorAccount,
    store: Arc<dyn JobStore>,
}

impl ChainStage {
    pub fn new(client: Arc<dyn ChainClient>, account: TransactorAccount, store: Arc<dyn JobStore>) -> Self {
        Self {
            client,
            account,
            store,
        }
    }
}

fn non_negative(job: &Job, field: &'static str, value: Option<i32>) -> PipelineResult<u32> {
    let value = value.ok_or_else(|| PipelineError::missing(job.id, field))?;
    u32::try_from(value).map_err(|_| PipelineError::OutOfRange {
        field,
        value: value.into(),
    })
}

/// Builds the `updateVideo` transaction for one job's asset.
pub fn build_update_tx(
    job: &Job,
    video: &Video,
    fees: &StorageFees,
    member_id: u64,
) -> PipelineResult<UpdateVideoTx> {
    let hash = job
        .hash
        .clone()
        .ok_or_else(|| PipelineError::missing(job.id, "hash"))?;
    let size = job
        .processed_file_size
        .ok_or_else(|| PipelineError::missing(job.id, "processed_file_size"))?;
    let size = u64::try_from(size).map_err(|_| PipelineError::OutOfRange {
        field: "processed_file_size",
        value: size,
    })?;

    let metadata = match job.file_type {
        FileType::Media => media_metadata(MediaProperties {
            duration: non_negative(job, "duration", job.duration)?,
            height: non_negative(job, "height", job.height)?,
            width: non_negative(job, "width", job.width)?,
        }),
        FileType::Thumbnail => thumbnail_metadata(),
    };

    Ok(UpdateVideoTx {
        actor_member_id: member_id,
        video_id: video.id.clone(),
        channel_id: video.channel_id.clone(),
        assets_to_upload: StorageAssets {
            object_creation_list: vec![DataObjectCreation {
                size,
                ipfs_content_id: hash,
            }],
            expected_data_size_fee: fees.data_object_per_megabyte_fee,
        },
        new_meta: metadata.encode_to_vec(),
        expected_data_object_state_bloat_bond: fees.data_object_state_bloat_bond,
        storage_buckets_num_witness: fees.storage_buckets_num,
    })
}

#[async_trait]
impl Stage for ChainStage {
    fn name(&self) -> &'static str {
        "Chain"
    }

    fn source_status(&self) -> JobStatus {
        JobStatus::CreatingAsset
    }

    async fn process(&self, job: &Job) -> PipelineResult<JobUpdate> {
        let video = self
            .store
            .find_video(&job.video_id)
            .await?
            .ok_or_else(|| PipelineError::VideoNotFound(job.video_id.clone()))?;

        let fees = self.client.storage_fees(&video.channel_id).await?;
        let tx = build_update_tx(job, &video, &fees, self.account.member_id)?;
        let result = self.client.submit(&tx, &self.account).await?;

        // Inclusion alone is not success; the asset must actually have been created.
        let data_object_id = match created_data_object_id(&result.events) {
            Ok(id) => id,
            Err(EventError::ExtrinsicFailed) => {
                return Err(ChainError::ExtrinsicFailed {
                    block_hash: result.block_hash,
                }
                .into());
            }
            Err(EventError::Missing(event)) => return Err(PipelineError::MissingEvent(event)),
        };

        info!(
            "⛓️ Asset created on-chain for job {}: data object {} (tx {})",
            job.id, data_object_id, result.tx_hash
        );

        Ok(JobUpdate {
            data_object_id: Some(data_object_id),
            ..JobUpdate::new(JobStatus::Uploading)
        })
    }
}
