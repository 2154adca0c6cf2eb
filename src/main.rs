use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use transcoder::app::create_app;
use transcoder::common::paths::UploadDirs;
use transcoder::config::settings::AppConfig;
use transcoder::infrastructure::chain::{HttpChainClient, TransactorAccount};
use transcoder::infrastructure::db::pool::{connect_to_db, run_migrations};
use transcoder::infrastructure::media::FfmpegTranscoder;
use transcoder::infrastructure::storage::QueryNodeDiscovery;
use transcoder::modules::jobs::{reset_jobs, JobStore, PgJobStore};
use transcoder::state::AppState;
use transcoder::workers::{spawn_workers, ChainStage, HashStage, Stages, TranscodeStage, UploadStage};

#[derive(Parser, Debug)]
#[command(name = "transcoder")]
#[command(author, version, about = "Video asset pipeline: upload API and processing workers")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API and all pipeline workers (default)
    Serve,

    /// Send jobs back to the start of their pipeline
    ResetJobs {
        /// Only reset jobs that failed
        #[arg(long)]
        failed_only: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::new().context("invalid configuration")?;

    let pool = connect_to_db(&config.database_url)
        .await
        .context("failed to connect to database")?;
    run_migrations(&pool).await.context("failed to run migrations")?;
    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, store).await,
        Command::ResetJobs { failed_only } => {
            reset_jobs(store.as_ref(), failed_only).await?;
            Ok(())
        }
    }
}

async fn serve(config: AppConfig, store: Arc<dyn JobStore>) -> Result<()> {
    let dirs = UploadDirs::new(&config.uploads_dir);
    dirs.ensure()
        .await
        .with_context(|| format!("failed to create {}", config.uploads_dir.display()))?;

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let stages = Stages {
        transcode: TranscodeStage::new(
            Arc::new(FfmpegTranscoder::new(&config.ffmpeg_bin, &config.ffprobe_bin)),
            dirs.clone(),
        ),
        hash: HashStage::new(dirs.clone()),
        chain: ChainStage::new(
            Arc::new(HttpChainClient::new(http.clone(), &config.chain_rpc_url)),
            TransactorAccount {
                member_id: config.transactor_member_id,
                address: config.transactor_account.clone(),
            },
            store.clone(),
        ),
        upload: UploadStage::new(
            Arc::new(QueryNodeDiscovery::new(http.clone(), &config.query_node_url)),
            http,
            store.clone(),
            dirs.clone(),
            config.upload_min_delay(),
        ),
    };
    let workers = spawn_workers(stages, store.clone(), config.worker_interval());

    let app = create_app(AppState::new(store, dirs, config.max_upload_bytes()));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("🚀 Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    workers.shutdown().await;
    info!("Workers stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
