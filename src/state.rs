use crate::common::paths::UploadDirs;
use crate::modules::jobs::JobStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub dirs: UploadDirs,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(store: Arc<dyn JobStore>, dirs: UploadDirs, max_upload_bytes: usize) -> Self {
        Self {
            store,
            dirs,
            max_upload_bytes,
        }
    }
}
