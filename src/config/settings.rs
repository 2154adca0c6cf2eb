use crate::config::env::{self, EnvKey};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("environment variable {key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub uploads_dir: PathBuf,
    pub worker_interval_ms: u64,
    pub upload_min_delay_secs: u64,
    pub max_upload_mb: usize,
    pub chain_rpc_url: String,
    pub query_node_url: String,
    pub transactor_member_id: u64,
    pub transactor_account: String,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3001),
            database_url: required(EnvKey::DatabaseUrl)?,
            uploads_dir: PathBuf::from(env::get_or(EnvKey::UploadsDir, "./uploads")),
            worker_interval_ms: env::get_parsed(EnvKey::WorkerIntervalMs, 5000),
            upload_min_delay_secs: env::get_parsed(EnvKey::UploadMinDelaySecs, 20),
            max_upload_mb: env::get_parsed(EnvKey::MaxUploadMb, 4096),
            chain_rpc_url: required(EnvKey::ChainRpcUrl)?,
            query_node_url: required(EnvKey::QueryNodeUrl)?,
            transactor_member_id: parsed_required(EnvKey::TransactorMemberId)?,
            transactor_account: required(EnvKey::TransactorAccount)?,
            ffmpeg_bin: env::get_or(EnvKey::FfmpegBin, "ffmpeg"),
            ffprobe_bin: env::get_or(EnvKey::FfprobeBin, "ffprobe"),
        })
    }

    pub fn worker_interval(&self) -> Duration {
        Duration::from_millis(self.worker_interval_ms)
    }

    pub fn upload_min_delay(&self) -> Duration {
        Duration::from_secs(self.upload_min_delay_secs)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

fn required(key: EnvKey) -> Result<String, ConfigError> {
    let name = key.as_str();
    match env::get(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parsed_required<T: std::str::FromStr>(key: EnvKey) -> Result<T, ConfigError> {
    let name = key.as_str();
    let raw = required(key)?;
    raw.trim()
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid { key: name, value: raw })
}
