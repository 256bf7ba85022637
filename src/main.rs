use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use parlance::application::services::TranscriptionService;
use parlance::infrastructure::observability::{TracingConfig, init_tracing};
use parlance::presentation::{AppState, Environment, Settings, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment = Environment::from_env().map_err(anyhow::Error::msg)?;
    let settings = Settings::load(environment)?;

    init_tracing(&TracingConfig::from_settings(environment, &settings.logging));

    let transcription = &settings.transcription;
    tracing::info!(
        provider = ?transcription.provider,
        model = %transcription.model,
        beam_size = transcription.beam_size,
        "Loading transcription engine"
    );
    let engine = transcription.build_engine()?;
    tracing::info!("Transcription engine loaded");

    let transcription_service = Arc::new(TranscriptionService::new(
        engine,
        transcription.decoding_options(),
        transcription.max_concurrent,
        transcription.timeout(),
    ));

    let state = AppState::new(Arc::clone(&transcription_service));
    let router = create_router(state, &settings);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;
    tracing::info!(
        %addr,
        allowed_origins = ?settings.cors.allowed_origins,
        "Listening"
    );

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received");
            transcription_service.close();
        })
        .await?;

    Ok(())
}
