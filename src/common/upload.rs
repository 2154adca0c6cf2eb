use axum::extract::multipart::{Field, MultipartError};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid content type {found:?}: expected {expected}/*")]
    InvalidContentType { expected: mime::Name<'static>, found: String },
    #[error("upload stream interrupted: {0}")]
    Stream(#[from] MultipartError),
    #[error("failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes an incoming file to disk chunk by chunk.
pub struct DiskWriter {
    path: PathBuf,
    file: BufWriter<File>,
    written: u64,
}

impl DiskWriter {
    pub async fn new(path: PathBuf) -> std::io::Result<Self> {
        let file = File::create(&path).await?;
        Ok(Self {
            path,
            file: BufWriter::new(file),
            written: 0,
        })
    }

    pub async fn write_chunk(&mut self, chunk: Bytes) -> std::io::Result<()> {
        self.file.write_all(&chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flushes and returns the number of bytes written. If the flush fails the
    /// file is removed.
    pub async fn finish(self) -> std::io::Result<u64> {
        let Self {
            path,
            mut file,
            written,
        } = self;
        let flushed = async {
            file.flush().await?;
            file.into_inner().sync_all().await
        }
        .await;

        match flushed {
            Ok(()) => Ok(written),
            Err(e) => {
                remove_quietly(&path).await;
                Err(e)
            }
        }
    }

    pub async fn abort(self) {
        drop(self.file);
        remove_quietly(&self.path).await;
    }
}

/// Removes a partially written or orphaned upload, logging instead of failing.
pub async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            error!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

/// Bytes read from the start of a file part before deciding what it is.
const SNIFF_LEN: usize = 8 * 1024;

/// The first bytes of a file part and the type its magic bytes identify.
#[derive(Debug)]
pub struct SniffedHead {
    head: Bytes,
    pub content_type: mime::Mime,
    pub extension: &'static str,
}

/// Checks a detected content type against a top-level type.
pub fn check_content_type(
    found: &str,
    expected: mime::Name<'static>,
) -> Result<mime::Mime, UploadError> {
    match found.parse::<mime::Mime>() {
        Ok(parsed) if parsed.type_() == expected => Ok(parsed),
        _ => Err(UploadError::InvalidContentType {
            expected,
            found: found.to_string(),
        }),
    }
}

/// Identifies already buffered bytes by their magic number.
pub fn sniff(head: Bytes, expected: mime::Name<'static>) -> Result<SniffedHead, UploadError> {
    let Some(kind) = infer::get(&head) else {
        return Err(UploadError::InvalidContentType {
            expected,
            found: "unrecognized content".to_string(),
        });
    };
    let content_type = check_content_type(kind.mime_type(), expected)?;
    Ok(SniffedHead {
        head,
        content_type,
        extension: kind.extension(),
    })
}

/// Buffers the start of `field` and checks what it contains. The declared
/// `Content-Type` of the part is not trusted.
pub async fn read_head(
    field: &mut Field<'_>,
    expected: mime::Name<'static>,
) -> Result<SniffedHead, UploadError> {
    let mut head = BytesMut::with_capacity(SNIFF_LEN);
    while head.len() < SNIFF_LEN {
        match field.chunk().await? {
            Some(chunk) => head.extend_from_slice(&chunk),
            None => break,
        }
    }
    sniff(head.freeze(), expected)
}

/// Writes `head` and then the rest of `field` to `path`. Returns the stored
/// size. On any error the partial file is removed.
pub async fn stream_to_disk(
    mut field: Field<'_>,
    head: SniffedHead,
    path: PathBuf,
) -> Result<u64, UploadError> {
    let mut writer = DiskWriter::new(path.clone()).await?;
    if let Err(e) = writer.write_chunk(head.head).await {
        error!("Write error for {}: {}", path.display(), e);
        writer.abort().await;
        return Err(e.into());
    }

    while let Some(chunk) = field.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                error!("Stream error while writing {}: {}", path.display(), e);
                writer.abort().await;
                return Err(e.into());
            }
        };

        if let Err(e) = writer.write_chunk(chunk).await {
            error!("Write error for {}: {}", path.display(), e);
            writer.abort().await;
            return Err(e.into());
        }
    }

    match writer.finish().await {
        Ok(size) => {
            debug!("Stored {} ({} bytes)", path.display(), size);
            Ok(size)
        }
        Err(e) => {
            error!("Failed to flush {}: {}", path.display(), e);
            Err(e.into())
        }
    }
}
