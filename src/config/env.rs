use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    DatabaseUrl,
    UploadsDir,
    WorkerIntervalMs,
    UploadMinDelaySecs,
    MaxUploadMb,
    ChainRpcUrl,
    QueryNodeUrl,
    TransactorMemberId,
    TransactorAccount,
    FfmpegBin,
    FfprobeBin,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::UploadsDir => "UPLOADS_DIR",
            EnvKey::WorkerIntervalMs => "WORKER_INTERVAL_MS",
            EnvKey::UploadMinDelaySecs => "UPLOAD_MIN_DELAY_SECS",
            EnvKey::MaxUploadMb => "MAX_UPLOAD_MB",
            EnvKey::ChainRpcUrl => "CHAIN_RPC_URL",
            EnvKey::QueryNodeUrl => "QUERY_NODE_URL",
            EnvKey::TransactorMemberId => "TRANSACTOR_MEMBER_ID",
            EnvKey::TransactorAccount => "TRANSACTOR_ACCOUNT",
            EnvKey::FfmpegBin => "FFMPEG_BIN",
            EnvKey::FfprobeBin => "FFPROBE_BIN",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
