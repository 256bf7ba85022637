use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

pub const ROOT_MESSAGE: &str = "Transcription server running";

#[derive(Serialize)]
pub struct RootResponse {
    pub msg: String,
}

pub async fn root_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(RootResponse {
            msg: ROOT_MESSAGE.to_string(),
        }),
    )
}
