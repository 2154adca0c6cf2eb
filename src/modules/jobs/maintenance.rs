use super::repository::{JobStore, StoreResult};
use tracing::info;

/// Sends jobs back to where their pipeline can run again: thumbnails and
/// already transcoded media to hashing, other media to pending_processing.
/// With `failed_only`, jobs in any other status are left alone.
pub async fn reset_jobs(store: &dyn JobStore, failed_only: bool) -> StoreResult<u64> {
    let count = store.reset_all(failed_only).await?;
    if failed_only {
        info!("🔁 Reset {} failed jobs", count);
    } else {
        info!("🔁 Reset {} jobs", count);
    }
    Ok(count)
}
