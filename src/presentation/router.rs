use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::infrastructure::observability::request_id_middleware;
use crate::presentation::config::{CorsSettings, Settings};
use crate::presentation::handlers::{root_handler, transcription_handler};
use crate::presentation::state::AppState;

pub fn create_router(state: AppState, settings: &Settings) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/", get(root_handler))
        .route("/api/handle_transcription", post(transcription_handler))
        .layer(DefaultBodyLimit::max(settings.server.max_upload_bytes()))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors_layer(&settings.cors))
        .with_state(state)
}

/// Only the configured origins may read responses. Methods and headers are
/// mirrored from the preflight, since wildcards are not allowed alongside
/// credentials.
fn cors_layer(settings: &CorsSettings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
