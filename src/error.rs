use crate::infrastructure::chain::ChainError;
use crate::infrastructure::media::MediaError;
use crate::infrastructure::storage::StorageError;
use crate::modules::jobs::{JobStatus, StoreError};
use thiserror::Error;
use uuid::Uuid;

/// Everything that can make a stage attempt fail. All variants are handled the
/// same way: the job is marked failed and the error is logged.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("job {job_id} is missing required field {field}")]
    MissingField { job_id: Uuid, field: &'static str },
    #[error("video {0} not found")]
    VideoNotFound(String),
    #[error("expected chain event {0} was not emitted")]
    MissingEvent(&'static str),
    #[error("value of {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },
    #[error("illegal status transition {from} -> {to}")]
    IllegalTransition { from: JobStatus, to: JobStatus },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn missing(job_id: Uuid, field: &'static str) -> Self {
        PipelineError::MissingField { job_id, field }
    }
}
