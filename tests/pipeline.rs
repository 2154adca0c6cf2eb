use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use transcoder::app::create_app;
use transcoder::common::paths::UploadDirs;
use transcoder::infrastructure::chain::{
    ChainClient, ChainEvent, ChainResult, ExtrinsicResult, StorageFees, TransactorAccount,
    UpdateVideoTx,
};
use transcoder::infrastructure::media::{MediaError, MediaInfo, MediaResult, MediaTranscoder};
use transcoder::infrastructure::storage::{StorageDiscovery, StorageEndpoint, StorageResult};
use time::OffsetDateTime;
use transcoder::modules::jobs::{
    reset_jobs, FileType, Job, JobStatus, JobStore, JobUpdate, MemoryJobStore, NewVideo, StoreResult,
    Video,
};
use transcoder::state::AppState;
use transcoder::workers::{ChainStage, HashStage, Tick, TranscodeStage, UploadStage, Worker};
use wiremock::matchers::{method, path};
use uuid::Uuid;
use wiremock::{Mock, MockServer, ResponseTemplate};

const BOUNDARY: &str = "pipeline-test-boundary";
const CORRUPT_MARKER: &[u8] = b"CORRUPT";
const MP4_HEAD: &[u8] = b"\x00\x00\x00\x18ftypisom\x00\x00\x02\x00isomiso2avc1mp41";
const PNG_HEAD: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR";

/// Copies instead of transcoding. Inputs ending with the corrupt marker fail
/// the way ffmpeg does on a damaged stream.
struct FakeTranscoder;

#[async_trait]
impl MediaTranscoder for FakeTranscoder {
    async fn transcode(&self, input: &Path, output: &Path) -> MediaResult<()> {
        let bytes = tokio::fs::read(input).await?;
        if bytes.ends_with(CORRUPT_MARKER) {
            return Err(MediaError::ProcessFailed {
                program: "ffmpeg".into(),
                code: Some(1),
                stderr: "Invalid data found when processing input".into(),
            });
        }
        tokio::fs::write(output, &bytes[..bytes.len() / 2]).await?;
        tokio::fs::remove_file(input).await?;
        Ok(())
    }

    async fn probe(&self, _path: &Path) -> MediaResult<MediaInfo> {
        Ok(MediaInfo {
            duration: 61.4,
            width: 1920,
            height: 1080,
        })
    }
}

/// Assigns sequential data object ids. The first `failures_left` submissions
/// are included without creating any data object.
struct FakeChain {
    next_id: AtomicU64,
    failures_left: AtomicU64,
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn storage_fees(&self, _channel_id: &str) -> ChainResult<StorageFees> {
        Ok(StorageFees {
            data_object_state_bloat_bond: 100,
            data_object_per_megabyte_fee: 1,
            storage_buckets_num: 1,
        })
    }

    async fn submit(&self, _tx: &UpdateVideoTx, _account: &TransactorAccount) -> ChainResult<ExtrinsicResult> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Ok(ExtrinsicResult {
                events: vec![ChainEvent {
                    section: "system".into(),
                    method: "ExtrinsicSuccess".into(),
                    data: vec![],
                }],
                block_hash: format!("0xblock{id}"),
                tx_hash: format!("0xtx{id}"),
            });
        }
        Ok(ExtrinsicResult {
            events: vec![
                ChainEvent {
                    section: "storage".into(),
                    method: "DataObjectsUploaded".into(),
                    data: vec![json!([id]), json!({}), json!(100)],
                },
                ChainEvent {
                    section: "system".into(),
                    method: "ExtrinsicSuccess".into(),
                    data: vec![],
                },
            ],
            block_hash: format!("0xblock{id}"),
            tx_hash: format!("0xtx{id}"),
        })
    }
}

struct SingleNode(String);

#[async_trait]
impl StorageDiscovery for SingleNode {
    async fn list_endpoints(&self, _bag_id: &str) -> StorageResult<Vec<StorageEndpoint>> {
        Ok(vec![StorageEndpoint {
            endpoint: self.0.clone(),
            bucket_id: "0".into(),
        }])
    }
}

/// Delegates to the in-memory store and records every status change as
/// `(job, from, to)`.
struct RecordingStore {
    inner: Arc<MemoryJobStore>,
    transitions: Mutex<Vec<(Uuid, JobStatus, JobStatus)>>,
}

impl RecordingStore {
    fn record(&self, id: Uuid, from: JobStatus, to: JobStatus) {
        self.transitions.lock().unwrap().push((id, from, to));
    }
}

#[async_trait]
impl JobStore for RecordingStore {
    async fn find_oldest(
        &self,
        status: JobStatus,
        updated_before: Option<OffsetDateTime>,
    ) -> StoreResult<Option<Job>> {
        self.inner.find_oldest(status, updated_before).await
    }

    async fn get_job(&self, id: Uuid) -> StoreResult<Option<Job>> {
        self.inner.get_job(id).await
    }

    async fn update(&self, id: Uuid, update: &JobUpdate) -> StoreResult<()> {
        let before = self.inner.get_job(id).await?;
        self.inner.update(id, update).await?;
        if let Some(job) = before {
            self.record(id, job.status, update.status);
        }
        Ok(())
    }

    async fn transition(&self, id: Uuid, from: JobStatus, update: &JobUpdate) -> StoreResult<bool> {
        let changed = self.inner.transition(id, from, update).await?;
        if changed {
            self.record(id, from, update.status);
        }
        Ok(changed)
    }

    async fn find_video(&self, id: &str) -> StoreResult<Option<Video>> {
        self.inner.find_video(id).await
    }

    async fn create_video(&self, video: NewVideo) -> StoreResult<(Video, Job, Job)> {
        self.inner.create_video(video).await
    }

    async fn reset_all(&self, failed_only: bool) -> StoreResult<u64> {
        self.inner.reset_all(failed_only).await
    }
}

struct Harness {
    root: tempfile::TempDir,
    _node: MockServer,
    store: Arc<MemoryJobStore>,
    recorder: Arc<RecordingStore>,
    app: Router,
    transcode: Worker<TranscodeStage>,
    hash: Worker<HashStage>,
    chain: Worker<ChainStage>,
    upload: Worker<UploadStage>,
}

impl Harness {
    async fn new() -> Self {
        Self::with_chain_failures(0).await
    }

    async fn with_chain_failures(failures: u64) -> Self {
        let root = tempfile::tempdir().unwrap();
        let dirs = UploadDirs::new(root.path());
        dirs.ensure().await.unwrap();

        let node = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "4.0.0"})))
            .mount(&node)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "ok"})))
            .mount(&node)
            .await;

        let store = Arc::new(MemoryJobStore::new());
        let recorder = Arc::new(RecordingStore {
            inner: store.clone(),
            transitions: Mutex::new(Vec::new()),
        });
        let shared: Arc<dyn JobStore> = recorder.clone();
        let interval = Duration::from_millis(10);

        let transcode = Worker::new(
            TranscodeStage::new(Arc::new(FakeTranscoder), dirs.clone()),
            shared.clone(),
            interval,
        );
        let hash = Worker::new(HashStage::new(dirs.clone()), shared.clone(), interval);
        let chain = Worker::new(
            ChainStage::new(
                Arc::new(FakeChain {
                    next_id: AtomicU64::new(100),
                    failures_left: AtomicU64::new(failures),
                }),
                TransactorAccount {
                    member_id: 1,
                    address: "5Transactor".into(),
                },
                shared.clone(),
            ),
            shared.clone(),
            interval,
        );
        let upload = Worker::new(
            UploadStage::new(
                Arc::new(SingleNode(format!("{}/", node.uri()))),
                reqwest::Client::new(),
                shared.clone(),
                dirs.clone(),
                Duration::ZERO,
            ),
            shared.clone(),
            interval,
        );

        let app = create_app(AppState::new(shared, dirs.clone(), 64 * 1024 * 1024));

        Self {
            root,
            _node: node,
            store,
            recorder,
            app,
            transcode,
            hash,
            chain,
            upload,
        }
    }

    /// Ticks every worker until none of them finds work.
    async fn drain(&self) {
        for _ in 0..20 {
            let ticks = [
                self.transcode.process_next_job().await,
                self.hash.process_next_job().await,
                self.chain.process_next_job().await,
                self.upload.process_next_job().await,
            ];
            if ticks.iter().all(|tick| *tick == Tick::Idle) {
                return;
            }
        }
        panic!("pipeline did not settle");
    }

    fn transitions_of(&self, job_id: Uuid) -> Vec<(JobStatus, JobStatus)> {
        self.recorder
            .transitions
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _, _)| *id == job_id)
            .map(|(_, from, to)| (*from, *to))
            .collect()
    }

    fn assert_only_legal_transitions(&self) {
        for (id, from, to) in self.recorder.transitions.lock().unwrap().iter() {
            assert!(from.can_transition_to(*to), "job {id}: {from} -> {to}");
        }
    }

    async fn job_of(&self, file_type: FileType) -> Job {
        self.store
            .jobs()
            .await
            .into_iter()
            .find(|job| job.file_type == file_type)
            .unwrap()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn post_video(&self, parts: &[Part<'_>]) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/video")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.send(request).await
    }

    async fn status(&self, video_id: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(format!("/video/{video_id}"))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: Vec<u8>,
    },
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
                );
            }
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn with_head(head: &[u8], len: usize) -> Vec<u8> {
    let mut bytes = head.to_vec();
    bytes.resize(len, 7);
    bytes
}

fn mp4(len: usize) -> Vec<u8> {
    with_head(MP4_HEAD, len)
}

fn png(len: usize) -> Vec<u8> {
    with_head(PNG_HEAD, len)
}

fn media(bytes: Vec<u8>) -> Part<'static> {
    Part::File {
        name: "media",
        file_name: "clip.mov",
        content_type: "video/quicktime",
        bytes,
    }
}

fn thumbnail(bytes: Vec<u8>) -> Part<'static> {
    Part::File {
        name: "thumbnail",
        file_name: "cover.png",
        content_type: "image/png",
        bytes,
    }
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[tokio::test]
async fn uploaded_video_runs_through_every_stage() {
    let harness = Harness::new().await;
    let (status, body) = harness
        .post_video(&[
            Part::Text("videoId", "v1"),
            Part::Text("channelId", "7"),
            media(mp4(10 * 1024 * 1024)),
            thumbnail(png(50 * 1024)),
        ])
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["videoId"], "v1");

    let (_, before) = harness.status("v1").await;
    assert_eq!(before["data"]["media"]["status"], "pending_processing");
    assert_eq!(before["data"]["thumbnail"]["status"], "hashing");
    assert_eq!(before["data"]["thumbnail"]["processedFileSize"], 50 * 1024);
    assert_eq!(before["data"]["published"], false);

    harness.drain().await;

    let (status, after) = harness.status("v1").await;
    assert_eq!(status, StatusCode::OK);
    let data = &after["data"];
    assert_eq!(data["published"], true);
    for kind in ["media", "thumbnail"] {
        assert_eq!(data[kind]["status"], "completed", "{kind}");
        assert!(data[kind]["hash"].is_string(), "{kind}");
    }
    assert_eq!(data["media"]["processedFileSize"], 5 * 1024 * 1024);
    // Internal fields stay out of the public view.
    assert!(data["media"].get("dataObjectId").is_none());
    assert!(data["media"].get("fileName").is_none());

    let jobs = harness.store.jobs().await;
    let media_job = jobs.iter().find(|j| j.original_file_size == 10 * 1024 * 1024).unwrap();
    assert!(media_job.data_object_id.is_some());
    assert_eq!(media_job.duration, Some(61));
    assert_eq!((media_job.width, media_job.height), (Some(1920), Some(1080)));
    assert_eq!(media_job.file_name, format!("{}.mp4", media_job.id));
    assert!(jobs.iter().all(|j| j.data_object_id.is_some()));

    use JobStatus::*;
    assert_eq!(
        harness.transitions_of(media_job.id),
        vec![
            (PendingProcessing, Processing),
            (Processing, Hashing),
            (Hashing, CreatingAsset),
            (CreatingAsset, Uploading),
            (Uploading, Completed),
        ]
    );
    let thumbnail_job = harness.job_of(FileType::Thumbnail).await;
    assert_eq!(
        harness.transitions_of(thumbnail_job.id),
        vec![(Hashing, CreatingAsset), (CreatingAsset, Uploading), (Uploading, Completed)]
    );
    harness.assert_only_legal_transitions();
}

#[tokio::test]
async fn corrupt_media_fails_without_blocking_the_thumbnail() {
    let harness = Harness::new().await;
    let mut corrupt = mp4(4096);
    corrupt.extend_from_slice(CORRUPT_MARKER);
    let (status, _) = harness
        .post_video(&[
            Part::Text("videoId", "broken"),
            Part::Text("channelId", "7"),
            media(corrupt),
            thumbnail(png(2048)),
        ])
        .await;
    assert_eq!(status, StatusCode::CREATED);

    harness.drain().await;

    let (_, body) = harness.status("broken").await;
    let data = &body["data"];
    assert_eq!(data["media"]["status"], "failed");
    assert_eq!(data["thumbnail"]["status"], "completed");
    assert_eq!(data["published"], false);

    // Failed jobs stay put; nothing picks them up again.
    harness.drain().await;
    let jobs = harness.store.jobs().await;
    assert_eq!(jobs.iter().filter(|j| j.status == JobStatus::Failed).count(), 1);

    let media_job = harness.job_of(FileType::Media).await;
    assert_eq!(
        harness.transitions_of(media_job.id),
        vec![
            (JobStatus::PendingProcessing, JobStatus::Processing),
            (JobStatus::Processing, JobStatus::Failed),
        ]
    );
    harness.assert_only_legal_transitions();
}

#[tokio::test]
async fn reset_resumes_jobs_that_failed_on_chain() {
    let harness = Harness::with_chain_failures(2).await;
    let (status, _) = harness
        .post_video(&[
            Part::Text("videoId", "retry"),
            Part::Text("channelId", "7"),
            media(mp4(8192)),
            thumbnail(png(1024)),
        ])
        .await;
    assert_eq!(status, StatusCode::CREATED);

    harness.drain().await;
    let (_, body) = harness.status("retry").await;
    assert_eq!(body["data"]["media"]["status"], "failed");
    assert_eq!(body["data"]["thumbnail"]["status"], "failed");

    let media_job = harness.job_of(FileType::Media).await;
    assert_eq!(media_job.processed_file_size, Some(4096));
    assert!(!harness.root.path().join("pending-processing").join(&media_job.file_name).exists());

    assert_eq!(reset_jobs(harness.recorder.as_ref(), true).await.unwrap(), 2);
    let media_job = harness.job_of(FileType::Media).await;
    assert_eq!(media_job.status, JobStatus::Hashing);

    harness.drain().await;
    let (_, body) = harness.status("retry").await;
    assert_eq!(body["data"]["media"]["status"], "completed");
    assert_eq!(body["data"]["thumbnail"]["status"], "completed");
    assert_eq!(body["data"]["published"], true);

    // Transcoded once; hashed and submitted twice.
    let media_path = harness.transitions_of(media_job.id);
    let count = |edge: (JobStatus, JobStatus)| media_path.iter().filter(|e| **e == edge).count();
    assert_eq!(count((JobStatus::PendingProcessing, JobStatus::Processing)), 1);
    assert_eq!(count((JobStatus::Hashing, JobStatus::CreatingAsset)), 2);
    assert_eq!(count((JobStatus::CreatingAsset, JobStatus::Failed)), 1);
    harness.assert_only_legal_transitions();
}

#[tokio::test]
async fn duplicate_video_id_is_a_conflict() {
    let harness = Harness::new().await;
    let parts = [
        Part::Text("videoId", "dup"),
        Part::Text("channelId", "7"),
        media(mp4(1024)),
        thumbnail(png(1024)),
    ];
    let (first, _) = harness.post_video(&parts).await;
    let (second, body) = harness.post_video(&parts).await;

    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");
    assert_eq!(harness.store.jobs().await.len(), 2);
    // The rejected request's files are cleaned up.
    assert_eq!(count_files(&harness.root.path().join("pending-processing")), 1);
}

#[tokio::test]
async fn missing_thumbnail_is_rejected() {
    let harness = Harness::new().await;
    let (status, body) = harness
        .post_video(&[
            Part::Text("videoId", "v2"),
            Part::Text("channelId", "7"),
            media(mp4(1024)),
        ])
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(harness.store.jobs().await.is_empty());
    assert_eq!(count_files(&harness.root.path().join("pending-processing")), 0);
}

#[tokio::test]
async fn wrong_content_type_is_rejected() {
    let harness = Harness::new().await;
    let (status, _) = harness
        .post_video(&[
            Part::Text("videoId", "v3"),
            Part::Text("channelId", "7"),
            Part::File {
                name: "media",
                file_name: "not-a-video.png",
                content_type: "image/png",
                bytes: png(64),
            },
            thumbnail(png(64)),
        ])
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(harness.store.jobs().await.is_empty());
}

#[tokio::test]
async fn declared_type_is_not_trusted() {
    let harness = Harness::new().await;
    let (status, body) = harness
        .post_video(&[
            Part::Text("videoId", "v4"),
            Part::Text("channelId", "7"),
            Part::File {
                name: "media",
                file_name: "notes.mp4",
                content_type: "video/mp4",
                bytes: b"these are meeting notes, not a movie".to_vec(),
            },
            thumbnail(png(64)),
        ])
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(harness.store.jobs().await.is_empty());
    assert_eq!(count_files(&harness.root.path().join("pending-upload")), 0);
}

#[tokio::test]
async fn unknown_video_is_not_found() {
    let harness = Harness::new().await;
    let (status, body) = harness.status("nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn health_and_openapi_are_served() {
    let harness = Harness::new().await;
    let health = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = harness.app.clone().oneshot(health).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, doc) = harness
        .send(Request::builder().uri("/api-docs/openapi.json").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/video/{id}"].is_object());
}
