use super::events::EXTRINSIC_FAILED;
use super::{
    ChainClient, ChainError, ChainResult, ExtrinsicResult, StorageFees, TransactorAccount,
    UpdateVideoTx,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// JSON-RPC 2.0 client for the signing transactor gateway. The gateway owns
/// the keys, builds the extrinsic, and answers `submitAndWatch` once the
/// transaction is in a block.
pub struct HttpChainClient {
    client: reqwest::Client,
    rpc_url: String,
    next_id: AtomicU64,
}

#[derive(Serialize)]
struct RpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl HttpChainClient {
    pub fn new(client: reqwest::Client, rpc_url: impl Into<String>) -> Self {
        Self {
            client,
            rpc_url: rpc_url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<P, T>(&self, method: &str, params: P) -> ChainResult<T>
    where
        P: Serialize + Send,
        T: DeserializeOwned + Send,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("chain rpc #{} {}", id, method);

        let response: RpcResponse<T> = self
            .client
            .post(&self.rpc_url)
            .json(&RpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match (response.result, response.error) {
            (_, Some(err)) => Err(ChainError::Submission(format!(
                "{} (code {})",
                err.message, err.code
            ))),
            (Some(result), None) => Ok(result),
            (None, None) => Err(ChainError::Malformed(format!(
                "{method} returned neither result nor error"
            ))),
        }
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn storage_fees(&self, channel_id: &str) -> ChainResult<StorageFees> {
        self.call("transactor_storageFees", [channel_id]).await
    }

    async fn submit(&self, tx: &UpdateVideoTx, account: &TransactorAccount) -> ChainResult<ExtrinsicResult> {
        let result: ExtrinsicResult = self
            .call("transactor_submitAndWatch", (account, tx))
            .await?;

        let (section, method) = EXTRINSIC_FAILED;
        if result.events.iter().any(|e| e.is(section, method)) {
            return Err(ChainError::ExtrinsicFailed {
                block_hash: result.block_hash,
            });
        }

        info!(
            "⛓️ Extrinsic {} included in block {}",
            result.tx_hash, result.block_hash
        );
        Ok(result)
    }
}
