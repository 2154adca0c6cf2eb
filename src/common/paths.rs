use std::path::{Path, PathBuf};

/// On-disk layout of uploaded files. Media waits in `pending-processing` until
/// transcoded; everything ready for hashing and upload lives in `pending-upload`.
#[derive(Debug, Clone)]
pub struct UploadDirs {
    pending_processing: PathBuf,
    pending_upload: PathBuf,
}

impl UploadDirs {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            pending_processing: root.join("pending-processing"),
            pending_upload: root.join("pending-upload"),
        }
    }

    pub async fn ensure(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.pending_processing).await?;
        tokio::fs::create_dir_all(&self.pending_upload).await
    }

    pub fn pending_processing(&self, file_name: &str) -> PathBuf {
        self.pending_processing.join(file_name)
    }

    pub fn pending_upload(&self, file_name: &str) -> PathBuf {
        self.pending_upload.join(file_name)
    }
}
