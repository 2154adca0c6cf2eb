use super::{endpoint_url, StorageError, StorageResult};
use async_trait::async_trait;
use futures_util::future::{select_ok, BoxFuture, FutureExt};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const ACTIVE_OPERATOR_STATUS: &str = "StorageBucketOperatorStatusActive";

const BAG_STORAGE_BUCKETS_QUERY: &str = r#"
query GetBagStorageBuckets($id: ID!) {
  storageBags(where: { id_eq: $id }) {
    storageBuckets {
      id
      operatorStatus {
        __typename
      }
      operatorMetadata {
        nodeEndpoint
      }
    }
  }
}
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEndpoint {
    pub endpoint: String,
    pub bucket_id: String,
}

/// Lists candidate upload endpoints for a storage bag.
#[async_trait]
pub trait StorageDiscovery: Send + Sync {
    async fn list_endpoints(&self, bag_id: &str) -> StorageResult<Vec<StorageEndpoint>>;
}

/// Discovery backed by the query node's GraphQL API.
pub struct QueryNodeDiscovery {
    client: reqwest::Client,
    url: String,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<BagsData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BagsData {
    storage_bags: Vec<StorageBag>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageBag {
    storage_buckets: Vec<StorageBucket>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageBucket {
    id: String,
    operator_status: OperatorStatus,
    operator_metadata: Option<OperatorMetadata>,
}

#[derive(Deserialize)]
struct OperatorStatus {
    #[serde(rename = "__typename")]
    typename: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperatorMetadata {
    node_endpoint: Option<String>,
}

impl QueryNodeDiscovery {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

/// Keeps active buckets that advertise an HTTP(S) node endpoint.
fn live_candidates(buckets: Vec<StorageBucket>) -> Vec<StorageEndpoint> {
    buckets
        .into_iter()
        .filter(|b| b.operator_status.typename == ACTIVE_OPERATOR_STATUS)
        .filter_map(|b| {
            let endpoint = b.operator_metadata?.node_endpoint?;
            endpoint.contains("http").then_some(StorageEndpoint {
                endpoint,
                bucket_id: b.id,
            })
        })
        .collect()
}

#[async_trait]
impl StorageDiscovery for QueryNodeDiscovery {
    async fn list_endpoints(&self, bag_id: &str) -> StorageResult<Vec<StorageEndpoint>> {
        let response: GraphQlResponse = self
            .client
            .post(&self.url)
            .json(&json!({
                "query": BAG_STORAGE_BUCKETS_QUERY,
                "variables": { "id": bag_id },
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.errors.first() {
            return Err(StorageError::QueryNode(err.message.clone()));
        }

        let bag = response
            .data
            .and_then(|d| d.storage_bags.into_iter().next())
            .ok_or_else(|| StorageError::BagNotFound(bag_id.to_string()))?;

        Ok(live_candidates(bag.storage_buckets))
    }
}

async fn probe(client: reqwest::Client, candidate: StorageEndpoint) -> StorageResult<StorageEndpoint> {
    let url = endpoint_url(&candidate.endpoint, "api/v1/version")?;
    client.get(url).send().await?.error_for_status()?;
    Ok(candidate)
}

/// Probes every candidate's version route concurrently; the first node to
/// answer with a 2xx wins.
pub async fn fastest_endpoint(
    client: &reqwest::Client,
    candidates: Vec<StorageEndpoint>,
) -> StorageResult<StorageEndpoint> {
    let total = candidates.len();
    if total == 0 {
        return Err(StorageError::NoLiveEndpoint { candidates: 0 });
    }

    let probes: Vec<BoxFuture<'static, StorageResult<StorageEndpoint>>> = candidates
        .into_iter()
        .map(|candidate| probe(client.clone(), candidate).boxed())
        .collect();

    match select_ok(probes).await {
        Ok((winner, _pending)) => {
            debug!("Storage node {} (bucket {}) answered first", winner.endpoint, winner.bucket_id);
            Ok(winner)
        }
        Err(_) => Err(StorageError::NoLiveEndpoint { candidates: total }),
    }
}
