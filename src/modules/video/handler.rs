use super::dto::{CreateVideoResponse, VideoStatusResponse};
use super::service::VideoService;
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

/// Upload a video's media file and thumbnail
/// Both files are streamed to disk, then the video and its two jobs are created.
#[utoipa::path(
    post,
    path = "/video",
    request_body(content = String, content_type = "multipart/form-data", description = "Fields: videoId, channelId, media (video/*), thumbnail (image/*)"),
    responses(
        (status = 201, description = "Upload accepted", body = ApiResponse<CreateVideoResponse>),
        (status = 400, description = "Missing part or wrong content type"),
        (status = 409, description = "Video id already exists"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Video"
)]
pub async fn upload_video(State(state): State<AppState>, multipart: Multipart) -> impl IntoResponse {
    let form = match VideoService::read_form(&state, multipart).await {
        Ok(form) => form,
        Err(e) => return ApiError::from(e).into_response(),
    };

    match VideoService::create(&state, form).await {
        Ok(res) => ApiSuccess(
            ApiResponse::success(res, "Media and thumbnail uploaded successfully"),
            StatusCode::CREATED,
        )
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Get processing status of a video
#[utoipa::path(
    get,
    path = "/video/{id}",
    params(
        ("id" = String, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Status of both jobs", body = ApiResponse<VideoStatusResponse>),
        (status = 404, description = "Video not found")
    ),
    tag = "Video"
)]
pub async fn get_video(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match VideoService::status(&state, &id).await {
        Ok(res) => ApiSuccess(ApiResponse::success(res, "Video status retrieved"), StatusCode::OK).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}
