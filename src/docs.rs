use crate::modules::jobs::JobStatus;
use crate::modules::video::dto::{CreateVideoResponse, JobStatusResponse, VideoStatusResponse};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::video::handler::upload_video,
        crate::modules::video::handler::get_video,
    ),
    components(
        schemas(
            CreateVideoResponse, VideoStatusResponse, JobStatusResponse, JobStatus,
        )
    ),
    tags(
        (name = "Video", description = "Video asset ingestion and processing status")
    )
)]
pub struct ApiDoc;
