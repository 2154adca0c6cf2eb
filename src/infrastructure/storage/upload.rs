use super::{endpoint_url, StorageError, StorageResult};
use reqwest::multipart::{Form, Part};
use std::path::Path;
use tokio_util::io::ReaderStream;
use tracing::debug;

const USER_AGENT: &str = concat!("transcoder/", env!("CARGO_PKG_VERSION"));

/// Where a data object's bytes go.
#[derive(Debug, Clone)]
pub struct UploadTarget<'a> {
    pub endpoint: &'a str,
    pub data_object_id: &'a str,
    pub storage_bucket_id: &'a str,
    pub bag_id: &'a str,
}

/// Streams the file at `path` to the node as a multipart `file` part.
pub async fn upload_file(
    client: &reqwest::Client,
    target: &UploadTarget<'_>,
    path: &Path,
    file_name: &str,
) -> StorageResult<()> {
    let mut url = endpoint_url(target.endpoint, "api/v1/files")?;
    url.query_pairs_mut()
        .append_pair("dataObjectId", target.data_object_id)
        .append_pair("storageBucketId", target.storage_bucket_id)
        .append_pair("bagId", target.bag_id);

    let file = tokio::fs::File::open(path).await?;
    let length = file.metadata().await?.len();
    let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
    let part = Part::stream_with_length(body, length).file_name(file_name.to_string());
    let form = Form::new().part("file", part);

    debug!("Uploading {} ({} bytes) to {}", file_name, length, url);

    let response = client
        .post(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .multipart(form)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StorageError::UploadRejected {
            status: status.as_u16(),
            body,
        });
    }

    Ok(())
}
