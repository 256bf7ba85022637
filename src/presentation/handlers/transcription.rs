use axum::Json;
use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::services::TranscriptionServiceError;
use crate::presentation::state::AppState;

/// Multipart field carrying the audio upload.
pub const FILE_FIELD: &str = "file";

#[derive(Serialize)]
pub struct TranscriptionResponse {
    pub text: String,
    pub language: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

#[tracing::instrument(skip(state, multipart))]
pub async fn transcription_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Response {
    let (filename, data) = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(response) => return response,
    };

    tracing::debug!(filename = %filename, bytes = data.len(), "Audio upload received");

    match state.transcription_service.transcribe(&data).await {
        Ok(transcription) => (
            StatusCode::OK,
            Json(TranscriptionResponse {
                text: transcription.text,
                language: transcription.language.to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, filename = %filename, "Transcription failed");
            let status = match e {
                TranscriptionServiceError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
                TranscriptionServiceError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
                TranscriptionServiceError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            };
            error_response(status, format!("Transcription failed: {}", e))
        }
    }
}

/// Reads the first `file` field fully into memory, skipping any other fields.
async fn read_upload(mut multipart: Multipart) -> Result<(String, Bytes), Response> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                tracing::warn!("Transcription request with no file");
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    format!("No `{}` field uploaded", FILE_FIELD),
                ));
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read multipart");
                return Err(error_response(
                    e.status(),
                    format!("Failed to read multipart: {}", e),
                ));
            }
        };

        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("unknown").to_string();
        return match field.bytes().await {
            Ok(data) => Ok((filename, data)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read file bytes");
                Err(error_response(
                    e.status(),
                    format!("Failed to read file: {}", e),
                ))
            }
        };
    }
}
