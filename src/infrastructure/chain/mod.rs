//! Chain-side asset registration: transaction shapes, metadata encoding and the
//! client capability the chain stage submits through.

pub mod client;
pub mod events;
pub mod metadata;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use client::HttpChainClient;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("transaction rejected before inclusion: {0}")]
    Submission(String),
    #[error("extrinsic failed in block {block_hash}")]
    ExtrinsicFailed { block_hash: String },
    #[error("malformed chain response: {0}")]
    Malformed(String),
}

pub type ChainResult<T> = Result<T, ChainError>;

/// Service account that signs every transaction. Only one chain worker may
/// use it at a time since nonces are not coordinated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactorAccount {
    pub member_id: u64,
    pub address: String,
}

/// Storage pricing and witness values an `updateVideo` call must echo back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageFees {
    pub data_object_state_bloat_bond: u128,
    pub data_object_per_megabyte_fee: u128,
    pub storage_buckets_num: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DataObjectCreation {
    pub size: u64,
    pub ipfs_content_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageAssets {
    pub object_creation_list: Vec<DataObjectCreation>,
    pub expected_data_size_fee: u128,
}

/// `content.updateVideo` issued by the transactor member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVideoTx {
    pub actor_member_id: u64,
    pub video_id: String,
    pub channel_id: String,
    pub assets_to_upload: StorageAssets,
    /// Protobuf-encoded `ContentMetadata`.
    pub new_meta: Vec<u8>,
    pub expected_data_object_state_bloat_bond: u128,
    pub storage_buckets_num_witness: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainEvent {
    pub section: String,
    pub method: String,
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

impl ChainEvent {
    pub fn is(&self, section: &str, method: &str) -> bool {
        self.section == section && self.method == method
    }
}

impl std::fmt::Display for ChainEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.section, self.method)
    }
}

/// Outcome of a transaction that made it into a block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtrinsicResult {
    pub events: Vec<ChainEvent>,
    pub block_hash: String,
    pub tx_hash: String,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn storage_fees(&self, channel_id: &str) -> ChainResult<StorageFees>;

    /// Signs with `account`, submits, and resolves once the transaction is in a block.
    async fn submit(&self, tx: &UpdateVideoTx, account: &TransactorAccount) -> ChainResult<ExtrinsicResult>;
}
